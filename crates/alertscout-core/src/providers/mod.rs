// Provider implementations - bridge API clients to the AlertProvider trait
pub mod github;

pub use github::GitHubAlertProvider;
