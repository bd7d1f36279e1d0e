// Core alert pipeline: filter, present, and the scan orchestration around them
pub mod config;
pub mod error;
pub mod filter;
pub mod models;
pub mod present;
pub mod providers;
pub mod scan;

pub use config::Config;
pub use error::Error;
pub use filter::FilterCriteria;
pub use models::{Alert, RepositorySummary, Severity};
pub use present::{OutputFormat, Presenter};
pub use providers::GitHubAlertProvider;
pub use scan::{AlertProvider, FetchedAlerts, ScanSummary, ScanTarget, Scanner};

/// Result type alias because typing Result<T, Error> everywhere is tedious
pub type Result<T> = std::result::Result<T, Error>;
