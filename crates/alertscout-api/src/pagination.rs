// Link header pagination
//
// GitHub advertises further pages with an RFC 8288 style header:
//   <https://api.github.com/...&page=2>; rel="next", <...&page=5>; rel="last"
// The enumerator only needs to know whether a "next" relation exists.

/// One `<target>; rel="..."` entry from a Link header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkEntry {
    pub target: String,
    pub relations: Vec<String>,
}

/// Parse a Link header into its entries, skipping anything malformed
pub fn parse_link_header(header: &str) -> Vec<LinkEntry> {
    header
        .split(',')
        .filter_map(|part| {
            let mut pieces = part.split(';');
            let target = pieces.next()?.trim();
            let target = target.strip_prefix('<')?.strip_suffix('>')?;

            let relations = pieces
                .filter_map(|param| {
                    let (key, value) = param.split_once('=')?;
                    if !key.trim().eq_ignore_ascii_case("rel") {
                        return None;
                    }
                    Some(value.trim().trim_matches('"').to_string())
                })
                // rel can carry several space separated relation types
                .flat_map(|value| {
                    value
                        .split_whitespace()
                        .map(|r| r.to_lowercase())
                        .collect::<Vec<_>>()
                })
                .collect();

            Some(LinkEntry {
                target: target.to_string(),
                relations,
            })
        })
        .collect()
}

/// URL of the "next" page, if the header advertises one
pub fn next_link(header: Option<&str>) -> Option<String> {
    parse_link_header(header?)
        .into_iter()
        .find(|entry| entry.relations.iter().any(|r| r == "next"))
        .map(|entry| entry.target)
}

pub fn has_next_page(header: Option<&str>) -> bool {
    next_link(header).is_some()
}
