// API client for GitHub's Dependabot alert endpoints
pub mod github;
pub mod pagination;
pub mod transport;

// Re-export common types
pub use github::{
    decode_alerts, AlertFetch, FetchError, FetchWarning, GitHubAdvisory, GitHubAlert,
    GitHubClient, GitHubError, GitHubIdentifier, GitHubPackage, GitHubRepoSummary, RepoPage,
};
pub use transport::{HttpResponse, HttpTransport, ReqwestTransport};

// Status codes show up in HttpResponse, so callers shouldn't need reqwest for them
pub use reqwest::StatusCode;
