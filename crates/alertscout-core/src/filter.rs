use std::collections::BTreeSet;

use crate::models::{normalize_severity, Alert, Severity};

/// Client-side alert filters
///
/// Every category that is set must match (logical AND). The package list is
/// the one exception internally: any filter matching the package name is
/// enough. Closed alerts never survive regardless of what is set here.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterCriteria {
    /// Only this severity, compared after normalization
    pub severity: Option<String>,
    /// Substring of the package name or advisory summary
    pub text_match: Option<String>,
    /// Substring of a CVE identifier
    pub cve_match: Option<String>,
    /// Lowercased package-name substrings
    pub package_filters: BTreeSet<String>,
}

impl FilterCriteria {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn severity(mut self, severity: &str) -> Self {
        self.severity = non_empty(severity);
        self
    }

    pub fn text_match(mut self, text: &str) -> Self {
        self.text_match = non_empty(text).map(|t| t.to_lowercase());
        self
    }

    pub fn cve_match(mut self, cve: &str) -> Self {
        self.cve_match = non_empty(cve).map(|c| c.to_lowercase());
        self
    }

    /// Add package filters; blanks are dropped and everything is lowercased
    pub fn packages<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.package_filters.extend(
            filters
                .into_iter()
                .filter_map(|f| non_empty(f.as_ref()))
                .map(|f| f.to_lowercase()),
        );
        self
    }

    /// Parse a comma separated `--package` value
    pub fn package_list(self, list: &str) -> Self {
        self.packages(list.split(','))
    }

    pub fn matches(&self, alert: &Alert) -> bool {
        if !alert.is_open() {
            return false;
        }

        if let Some(wanted) = &self.severity {
            if !severity_matches(wanted, &alert.advisory.severity) {
                return false;
            }
        }

        let package = alert.package.name.to_lowercase();

        if let Some(text) = &self.text_match {
            let text = text.to_lowercase();
            let summary = alert.advisory.summary.to_lowercase();
            if !package.contains(&text) && !summary.contains(&text) {
                return false;
            }
        }

        if let Some(cve) = &self.cve_match {
            let cve = cve.to_lowercase();
            let found = alert.advisory.identifiers.iter().any(|id| {
                id.id_type.eq_ignore_ascii_case("CVE") && id.value.to_lowercase().contains(&cve)
            });
            if !found {
                return false;
            }
        }

        if !self.package_filters.is_empty()
            && !self
                .package_filters
                .iter()
                .any(|f| package.contains(&f.to_lowercase()))
        {
            return false;
        }

        true
    }
}

/// Keep the alerts that match, in their original order
pub fn apply(alerts: Vec<Alert>, criteria: &FilterCriteria) -> Vec<Alert> {
    alerts
        .into_iter()
        .filter(|alert| criteria.matches(alert))
        .collect()
}

fn non_empty(value: &str) -> Option<String> {
    let value = value.trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn severity_matches(wanted: &str, actual: &str) -> bool {
    let wanted = normalize_severity(wanted);
    let actual = normalize_severity(actual);

    if wanted == actual {
        return true;
    }

    // medium/moderate are the same level under two names
    matches!(
        (Severity::from_label(&wanted), Severity::from_label(&actual)),
        (Some(a), Some(b)) if a == b
    )
}
