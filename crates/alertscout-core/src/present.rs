use std::io::Write;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::{Alert, Severity};
use crate::Result;

const DIVIDER: &str = "----------------------------------------";
const HEADER_WIDTH: usize = 40;

pub const NO_RESULTS: &str = "No vulnerabilities found.";

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable blocks
    #[default]
    #[serde(alias = "text")]
    Default,
    /// Indented JSON array
    Json,
}

impl OutputFormat {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "default" | "text" => Some(OutputFormat::Default),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Default => "default",
            OutputFormat::Json => "json",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Self::from_name(s).ok_or_else(|| format!("unknown format '{}' (expected default or json)", s))
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Renders filtered alerts for a person or for a pipe
#[derive(Debug, Clone, Copy, Default)]
pub struct Presenter {
    pub format: OutputFormat,
    pub group: bool,
}

impl Presenter {
    pub fn new(format: OutputFormat, group: bool) -> Self {
        Self { format, group }
    }

    /// Render one result set; `title` names what was scanned
    ///
    /// An empty set still produces output: the no-results line for people,
    /// `[]` for JSON so consumers always get a document.
    pub fn render<W: Write>(&self, title: &str, alerts: &[Alert], out: &mut W) -> Result<()> {
        match self.format {
            OutputFormat::Json => {
                writeln!(out, "{}", Self::to_json(alerts)?)?;
            }
            OutputFormat::Default if alerts.is_empty() => {
                writeln!(out, "{}", NO_RESULTS)?;
            }
            OutputFormat::Default if self.group => Self::write_grouped(title, alerts, out)?,
            OutputFormat::Default => Self::write_ungrouped(alerts, out)?,
        }
        Ok(())
    }

    pub fn to_json(alerts: &[Alert]) -> Result<String> {
        Ok(serde_json::to_string_pretty(alerts)?)
    }

    /// Non-empty severity buckets in Critical..Unspecified order
    pub fn group_by_severity(alerts: &[Alert]) -> Vec<(Severity, Vec<&Alert>)> {
        Severity::ORDER
            .iter()
            .map(|level| {
                let members: Vec<&Alert> = alerts
                    .iter()
                    .filter(|a| Severity::bucket(&a.advisory.severity) == *level)
                    .collect();
                (*level, members)
            })
            .filter(|(_, members)| !members.is_empty())
            .collect()
    }

    fn write_ungrouped<W: Write>(alerts: &[Alert], out: &mut W) -> Result<()> {
        for alert in alerts {
            Self::write_alert(alert, out)?;
        }
        writeln!(out, "{}", DIVIDER)?;
        Ok(())
    }

    fn write_grouped<W: Write>(title: &str, alerts: &[Alert], out: &mut W) -> Result<()> {
        writeln!(out, "Grouped Dependabot alerts for {}", title)?;

        for (level, members) in Self::group_by_severity(alerts) {
            writeln!(out)?;
            writeln!(out, "{}", Self::section_header(level))?;
            for alert in members {
                Self::write_alert(alert, out)?;
            }
        }

        writeln!(out, "{}", DIVIDER)?;
        Ok(())
    }

    fn section_header(level: Severity) -> String {
        let label = level.label();
        format!(
            "==== {} Severity ===={}",
            label,
            "=".repeat(HEADER_WIDTH.saturating_sub(label.len()))
        )
    }

    fn write_alert<W: Write>(alert: &Alert, out: &mut W) -> Result<()> {
        writeln!(out, "{}", DIVIDER)?;
        writeln!(out, "Severity:           {}", alert.severity_label())?;
        writeln!(out, "Vulnerability Name: {}", alert.advisory.summary)?;
        writeln!(out, "Package Affected:   {}", alert.package.name)?;
        if let Some(cve) = alert.cve() {
            writeln!(out, "CVE:                {}", cve)?;
        }
        writeln!(out, "More Info:          {}", alert.url)?;
        Ok(())
    }
}
