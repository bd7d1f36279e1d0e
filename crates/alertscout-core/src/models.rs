use serde::{Deserialize, Serialize};

/// A single Dependabot alert, flattened into the shape we filter and print
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alert {
    /// owner/repo the alert was raised in
    pub repository: String,
    pub number: u64,
    pub state: String,
    pub url: String,
    pub package: Package,
    pub advisory: Advisory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub ecosystem: String,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Advisory {
    pub summary: String,
    pub severity: String,
    pub identifiers: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(rename = "type")]
    pub id_type: String,
    pub value: String,
}

impl Alert {
    pub fn is_open(&self) -> bool {
        self.state.eq_ignore_ascii_case("open")
    }

    /// First CVE identifier in source order, if any
    pub fn cve(&self) -> Option<&str> {
        self.advisory
            .identifiers
            .iter()
            .find(|id| id.id_type.eq_ignore_ascii_case("CVE"))
            .map(|id| id.value.as_str())
    }

    pub fn severity_label(&self) -> String {
        normalize_severity(&self.advisory.severity)
    }
}

/// Repository seen while walking an organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySummary {
    pub name: String,
    pub archived: bool,
}

/// Severity levels in display order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Critical,
    High,
    Moderate,
    Low,
    Unspecified,
}

impl Severity {
    /// Order grouped output walks the buckets in
    pub const ORDER: [Severity; 5] = [
        Severity::Critical,
        Severity::High,
        Severity::Moderate,
        Severity::Low,
        Severity::Unspecified,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Severity::Critical => "Critical",
            Severity::High => "High",
            Severity::Moderate => "Moderate",
            Severity::Low => "Low",
            Severity::Unspecified => "Unspecified",
        }
    }

    /// Parse a severity in any case
    ///
    /// Dependabot reports "medium" where the advisory database says
    /// "moderate"; both land on `Moderate`.
    pub fn from_label(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "moderate" | "medium" => Some(Severity::Moderate),
            "low" => Some(Severity::Low),
            "" | "unspecified" => Some(Severity::Unspecified),
            _ => None,
        }
    }

    /// Bucket for grouped output; anything unrecognised goes to Unspecified
    pub fn bucket(raw: &str) -> Self {
        Self::from_label(raw).unwrap_or(Severity::Unspecified)
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// "" -> "Unspecified", otherwise first letter upper and the rest lower
///
/// ASCII case mapping only, so normalizing twice is the same as once.
pub fn normalize_severity(raw: &str) -> String {
    let raw = raw.trim();
    let mut chars = raw.chars();

    match chars.next() {
        None => Severity::Unspecified.label().to_string(),
        Some(first) => {
            let mut label = String::with_capacity(raw.len());
            label.push(first.to_ascii_uppercase());
            label.extend(chars.map(|c| c.to_ascii_lowercase()));
            label
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alert_with_identifiers(identifiers: &[(&str, &str)]) -> Alert {
        Alert {
            repository: "acme/web".to_string(),
            number: 1,
            state: "open".to_string(),
            url: "https://github.com/acme/web/security/dependabot/1".to_string(),
            package: Package::default(),
            advisory: Advisory {
                identifiers: identifiers
                    .iter()
                    .map(|(t, v)| Identifier {
                        id_type: t.to_string(),
                        value: v.to_string(),
                    })
                    .collect(),
                ..Advisory::default()
            },
        }
    }

    #[test]
    fn test_normalize_severity() {
        assert_eq!(normalize_severity(""), "Unspecified");
        assert_eq!(normalize_severity("CRITICAL"), "Critical");
        assert_eq!(normalize_severity("high"), "High");
        assert_eq!(normalize_severity("mODERATE"), "Moderate");
        assert_eq!(normalize_severity("  "), "Unspecified");
    }

    #[test]
    fn test_normalize_severity_is_idempotent() {
        for raw in ["", "critical", "HIGH", "Low", "medium", "weird-Value", "é", "ßharp", "x"] {
            let once = normalize_severity(raw);
            assert_eq!(normalize_severity(&once), once, "not stable for {:?}", raw);
        }
    }

    #[test]
    fn test_severity_parsing() {
        assert_eq!(Severity::from_label("CRITICAL"), Some(Severity::Critical));
        assert_eq!(Severity::from_label("medium"), Some(Severity::Moderate));
        assert_eq!(Severity::from_label(""), Some(Severity::Unspecified));
        assert_eq!(Severity::from_label("severe"), None);
        assert_eq!(Severity::bucket("severe"), Severity::Unspecified);
    }

    #[test]
    fn test_severity_order_matches_labels() {
        let labels: Vec<_> = Severity::ORDER.iter().map(Severity::label).collect();
        assert_eq!(labels, vec!["Critical", "High", "Moderate", "Low", "Unspecified"]);
    }

    #[test]
    fn test_cve_takes_first_match() {
        let alert = alert_with_identifiers(&[
            ("GHSA", "GHSA-aaaa-bbbb-cccc"),
            ("cve", "CVE-2021-1234"),
            ("CVE", "CVE-2022-0001"),
        ]);
        assert_eq!(alert.cve(), Some("CVE-2021-1234"));

        let alert = alert_with_identifiers(&[("GHSA", "GHSA-aaaa-bbbb-cccc")]);
        assert_eq!(alert.cve(), None);
    }

    #[test]
    fn test_is_open_ignores_case() {
        let mut alert = alert_with_identifiers(&[]);
        alert.state = "OPEN".to_string();
        assert!(alert.is_open());
        alert.state = "dismissed".to_string();
        assert!(!alert.is_open());
    }
}
