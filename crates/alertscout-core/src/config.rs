use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::present::OutputFormat;

/// Main configuration structure
///
/// Read from a TOML file, then overridden by CLI flags. The file is
/// optional and never written back.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Config {
    #[serde(default)]
    pub github: GitHubConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load config from an explicit path, or the default location if it exists
    ///
    /// An explicit path that doesn't exist is an error; a missing default
    /// file just means defaults.
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => match Self::default_path() {
                Some(path) if path.exists() => Self::from_file(&path),
                _ => Ok(Self::default()),
            },
        }
    }

    pub fn from_file(path: &Path) -> crate::Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            crate::Error::ConfigError(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&contents)
            .map_err(|e| crate::Error::ConfigError(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default config file path
    /// Uses XDG on Linux/macOS, AppData on Windows
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("alertscout").join("config.toml"))
    }

    fn validate(&self) -> crate::Result<()> {
        if self.github.timeout_secs == 0 {
            return Err(crate::Error::ConfigError(
                "github.timeout_secs must be greater than zero".into(),
            ));
        }
        if !(1..=100).contains(&self.github.per_page) {
            return Err(crate::Error::ConfigError(
                "github.per_page must be between 1 and 100".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GitHubConfig {
    /// API URL (for GitHub Enterprise)
    #[serde(default = "default_github_url")]
    pub api_url: String,

    /// Bound on every request so one dead repository can't hang a scan
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Repositories requested per listing page
    #[serde(default = "default_per_page")]
    pub per_page: u32,
}

impl GitHubConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_github_url() -> String {
    "https://api.github.com".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_per_page() -> u32 {
    100 // GitHub's maximum
}

impl Default for GitHubConfig {
    fn default() -> Self {
        Self {
            api_url: default_github_url(),
            timeout_secs: default_timeout_secs(),
            per_page: default_per_page(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,

    /// Group human-readable output by severity
    #[serde(default)]
    pub group: bool,
}
