use futures::future;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use reqwest::StatusCode;
use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::pagination;
use crate::transport::HttpTransport;

const GITHUB_API_BASE: &str = "https://api.github.com";

/// GitHub caps list endpoints at 100 items per page
pub const MAX_PER_PAGE: u32 = 100;

const ALERTS_DISABLED_MARKER: &str = "Dependabot alerts are disabled";
const RATE_LIMIT_MARKER: &str = "API rate limit exceeded";

#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("API request failed: Status {status}: {body}")]
    RequestFailed { status: StatusCode, body: String },

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("JSON parsing failed: {0}")]
    ParseError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, GitHubError>;

/// Alert fetch for one repository failed outright
#[derive(Error, Debug)]
#[error("Failed to fetch alerts for {owner}/{repo}: {source}")]
pub struct FetchError {
    pub owner: String,
    pub repo: String,
    #[source]
    pub source: GitHubError,
}

/// Why a repository produced no alerts without it being an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchWarning {
    AlertsDisabled,
    RateLimited,
    /// Some other 403/404; carries the status line
    Unavailable(String),
}

impl FetchWarning {
    fn classify(status: StatusCode, body: &str) -> Self {
        if body.contains(ALERTS_DISABLED_MARKER) {
            FetchWarning::AlertsDisabled
        } else if body.contains(RATE_LIMIT_MARKER) {
            FetchWarning::RateLimited
        } else {
            FetchWarning::Unavailable(status.to_string())
        }
    }
}

impl std::fmt::Display for FetchWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FetchWarning::AlertsDisabled => write!(f, "alerts disabled"),
            FetchWarning::RateLimited => write!(f, "rate limit exceeded"),
            FetchWarning::Unavailable(status) => write!(f, "alerts unavailable ({})", status),
        }
    }
}

/// Result of a single alert fetch
#[derive(Debug, Clone, Default)]
pub struct AlertFetch {
    pub alerts: Vec<GitHubAlert>,
    pub warning: Option<FetchWarning>,
}

impl AlertFetch {
    fn skipped(warning: FetchWarning) -> Self {
        Self {
            alerts: Vec::new(),
            warning: Some(warning),
        }
    }
}

/// One page of an organization's repository listing
#[derive(Debug, Clone, Default)]
pub struct RepoPage {
    pub repos: Vec<GitHubRepoSummary>,
    pub has_next: bool,
}

pub struct GitHubClient {
    transport: Box<dyn HttpTransport>,
    token: String,
    base_url: String,
    per_page: u32,
}

impl GitHubClient {
    pub fn new(token: impl Into<String>, transport: impl HttpTransport + 'static) -> Self {
        Self {
            transport: Box::new(transport),
            token: token.into(),
            base_url: GITHUB_API_BASE.to_string(),
            per_page: MAX_PER_PAGE,
        }
    }

    /// For GitHub Enterprise Server or a test double
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.clamp(1, MAX_PER_PAGE);
        self
    }

    /// Fetch Dependabot alerts for one repository
    ///
    /// A 403/404 is not fatal: the body is inspected for known reasons
    /// (alerts disabled, rate limit) and an empty set comes back with a
    /// warning, so one locked-down repository can't sink an org scan.
    /// Anything else that isn't a 200 is a `FetchError`.
    pub async fn fetch_alerts(
        &self,
        owner: &str,
        repo: &str,
    ) -> std::result::Result<AlertFetch, FetchError> {
        self.try_fetch_alerts(owner, repo)
            .await
            .map_err(|source| FetchError {
                owner: owner.to_string(),
                repo: repo.to_string(),
                source,
            })
    }

    async fn try_fetch_alerts(&self, owner: &str, repo: &str) -> Result<AlertFetch> {
        let url = format!(
            "{}/repos/{}/{}/dependabot/alerts?per_page={}",
            self.base_url,
            urlencoding::encode(owner),
            urlencoding::encode(repo),
            self.per_page
        );

        let response = self.transport.get(&url, &self.token).await?;

        match response.status {
            StatusCode::OK => {
                let alerts = decode_alerts(&response.body)?;

                if pagination::has_next_page(response.header("link")) {
                    warn!(
                        "{}/{} has more than {} alerts; only the first page is reported",
                        owner, repo, self.per_page
                    );
                }

                debug!("{}/{}: {} alerts", owner, repo, alerts.len());
                Ok(AlertFetch {
                    alerts,
                    warning: None,
                })
            }
            StatusCode::FORBIDDEN | StatusCode::NOT_FOUND => {
                let warning = FetchWarning::classify(response.status, &response.text());
                debug!("{}/{}: {} -> {}", owner, repo, response.status, warning);
                Ok(AlertFetch::skipped(warning))
            }
            status => Err(GitHubError::RequestFailed {
                status,
                body: response.text(),
            }),
        }
    }

    /// Fetch a single page of an organization's repositories
    pub async fn list_org_repos_page(&self, org: &str, page: u32) -> Result<RepoPage> {
        let url = format!(
            "{}/orgs/{}/repos?per_page={}&page={}",
            self.base_url,
            urlencoding::encode(org),
            self.per_page,
            page
        );

        let response = self.transport.get(&url, &self.token).await?;

        if !response.status.is_success() {
            return Err(GitHubError::RequestFailed {
                status: response.status,
                body: response.text(),
            });
        }

        let repos: Vec<GitHubRepoSummary> = serde_json::from_slice(&response.body)?;
        let has_next = pagination::has_next_page(response.header("link"));

        debug!(
            "{} page {}: {} repositories (more: {})",
            org,
            page,
            repos.len(),
            has_next
        );

        Ok(RepoPage { repos, has_next })
    }

    /// Lazily walk every non-archived repository in an organization
    ///
    /// Pages are requested one at a time starting from page 1; the walk
    /// ends on an empty page or when the Link header has no "next". Order is
    /// whatever GitHub returns. The stream is single pass.
    pub fn org_repositories<'a>(
        &'a self,
        org: &'a str,
    ) -> BoxStream<'a, Result<GitHubRepoSummary>> {
        stream::try_unfold(Some(1u32), move |page| async move {
            let Some(page) = page else {
                return Ok(None);
            };

            let RepoPage { repos, has_next } = self.list_org_repos_page(org, page).await?;
            if repos.is_empty() {
                return Ok(None);
            }

            let next = if has_next { Some(page + 1) } else { None };
            Ok::<_, GitHubError>(Some((repos, next)))
        })
        .map_ok(|repos| stream::iter(repos.into_iter().map(Ok::<_, GitHubError>)))
        .try_flatten()
        .try_filter(|repo| {
            if repo.archived {
                debug!("Skipping archived repository {}", repo.name);
            }
            future::ready(!repo.archived)
        })
        .boxed()
    }
}

/// Decode an alerts response body
///
/// Unknown fields are ignored and missing or null fields fall back to
/// empty values; only a body that isn't a JSON array of objects fails.
pub fn decode_alerts(body: &[u8]) -> Result<Vec<GitHubAlert>> {
    Ok(serde_json::from_slice(body)?)
}

/// Treat an explicit JSON null the same as a missing field
fn nullable<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Dependabot alert as returned by `GET /repos/{owner}/{repo}/dependabot/alerts`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubAlert {
    #[serde(default, deserialize_with = "nullable")]
    pub number: u64,
    #[serde(default, deserialize_with = "nullable")]
    pub state: String,
    #[serde(default, deserialize_with = "nullable")]
    pub html_url: String,
    #[serde(default, deserialize_with = "nullable")]
    pub dependency: GitHubDependency,
    #[serde(default, deserialize_with = "nullable")]
    pub security_advisory: GitHubAdvisory,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubDependency {
    #[serde(default, deserialize_with = "nullable")]
    pub package: GitHubPackage,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubPackage {
    #[serde(default, deserialize_with = "nullable")]
    pub ecosystem: String,
    #[serde(default, deserialize_with = "nullable")]
    pub name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubAdvisory {
    #[serde(default, deserialize_with = "nullable")]
    pub summary: String,
    #[serde(default, deserialize_with = "nullable")]
    pub severity: String,
    #[serde(default, deserialize_with = "nullable")]
    pub identifiers: Vec<GitHubIdentifier>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubIdentifier {
    #[serde(rename = "type", default, deserialize_with = "nullable")]
    pub id_type: String, // "CVE", "GHSA"
    #[serde(default, deserialize_with = "nullable")]
    pub value: String,
}

/// The slice of `GET /orgs/{org}/repos` we care about
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitHubRepoSummary {
    pub name: String,
    #[serde(default)]
    pub archived: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{HttpResponse, MockHttpTransport};

    const ALERTS_BODY: &str = r#"[
        {
            "number": 7,
            "state": "open",
            "html_url": "https://github.com/acme/web/security/dependabot/7",
            "dismissed_reason": null,
            "dependency": {
                "package": {"ecosystem": "npm", "name": "lodash"},
                "manifest_path": "package-lock.json"
            },
            "security_advisory": {
                "ghsa_id": "GHSA-xxxx-yyyy-zzzz",
                "summary": "Prototype pollution",
                "severity": "critical",
                "identifiers": [
                    {"type": "GHSA", "value": "GHSA-xxxx-yyyy-zzzz"},
                    {"type": "CVE", "value": "CVE-2021-1234"}
                ]
            }
        }
    ]"#;

    fn repos_body(names: &[(&str, bool)]) -> String {
        let repos: Vec<_> = names
            .iter()
            .map(|(name, archived)| {
                serde_json::json!({"name": name, "full_name": format!("acme/{}", name), "archived": archived})
            })
            .collect();
        serde_json::to_string(&repos).unwrap()
    }

    fn client(mock: MockHttpTransport) -> GitHubClient {
        GitHubClient::new("test-token", mock).with_base_url("https://api.test/")
    }

    #[test]
    fn test_decode_alerts_ignores_unknown_fields() {
        let alerts = decode_alerts(ALERTS_BODY.as_bytes()).unwrap();

        assert_eq!(alerts.len(), 1);
        let alert = &alerts[0];
        assert_eq!(alert.number, 7);
        assert_eq!(alert.dependency.package.name, "lodash");
        assert_eq!(alert.security_advisory.identifiers.len(), 2);
        assert_eq!(alert.security_advisory.identifiers[1].id_type, "CVE");
    }

    #[test]
    fn test_decode_alerts_defaults_missing_fields() {
        let body = r#"[{"number": 1, "state": "open", "security_advisory": {"summary": null}}]"#;
        let alerts = decode_alerts(body.as_bytes()).unwrap();

        assert_eq!(alerts[0].security_advisory.summary, "");
        assert_eq!(alerts[0].security_advisory.severity, "");
        assert!(alerts[0].security_advisory.identifiers.is_empty());
        assert_eq!(alerts[0].dependency.package.name, "");
    }

    #[test]
    fn test_decode_alerts_rejects_non_array() {
        assert!(matches!(
            decode_alerts(br#"{"message": "Bad credentials"}"#),
            Err(GitHubError::ParseError(_))
        ));
        assert!(decode_alerts(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_fetch_alerts_success() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .withf(|url, bearer| {
                url == "https://api.test/repos/acme/web/dependabot/alerts?per_page=100"
                    && bearer == "test-token"
            })
            .times(1)
            .returning(|_, _| Ok(HttpResponse::new(StatusCode::OK).with_body(ALERTS_BODY)));

        let fetched = client(mock).fetch_alerts("acme", "web").await.unwrap();

        assert_eq!(fetched.alerts.len(), 1);
        assert!(fetched.warning.is_none());
    }

    #[tokio::test]
    async fn test_fetch_alerts_disabled_is_a_warning() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get().returning(|_, _| {
            Ok(HttpResponse::new(StatusCode::FORBIDDEN).with_body(
                r#"{"message":"Dependabot alerts are disabled for this repository."}"#,
            ))
        });

        let fetched = client(mock).fetch_alerts("acme", "web").await.unwrap();

        assert!(fetched.alerts.is_empty());
        assert_eq!(fetched.warning, Some(FetchWarning::AlertsDisabled));
        assert!(fetched.warning.unwrap().to_string().contains("disabled"));
    }

    #[tokio::test]
    async fn test_fetch_alerts_rate_limited_is_a_warning() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get().returning(|_, _| {
            Ok(HttpResponse::new(StatusCode::FORBIDDEN)
                .with_body(r#"{"message":"API rate limit exceeded for user ID 1."}"#))
        });

        let fetched = client(mock).fetch_alerts("acme", "web").await.unwrap();

        assert!(fetched.alerts.is_empty());
        assert_eq!(
            fetched.warning.map(|w| w.to_string()).as_deref(),
            Some("rate limit exceeded")
        );
    }

    #[tokio::test]
    async fn test_fetch_alerts_not_found_carries_status() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get().returning(|_, _| {
            Ok(HttpResponse::new(StatusCode::NOT_FOUND).with_body(r#"{"message":"Not Found"}"#))
        });

        let fetched = client(mock).fetch_alerts("acme", "gone").await.unwrap();

        assert!(fetched.alerts.is_empty());
        let warning = fetched.warning.unwrap().to_string();
        assert!(warning.contains("404"), "unexpected warning: {}", warning);
    }

    #[tokio::test]
    async fn test_fetch_alerts_server_error_is_fatal() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get().returning(|_, _| {
            Ok(HttpResponse::new(StatusCode::INTERNAL_SERVER_ERROR).with_body("boom"))
        });

        let err = client(mock).fetch_alerts("acme", "web").await.unwrap_err();

        assert_eq!(err.owner, "acme");
        assert_eq!(err.repo, "web");
        assert!(matches!(
            err.source,
            GitHubError::RequestFailed { status, .. } if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    #[tokio::test]
    async fn test_fetch_alerts_transport_and_decode_failures_are_fatal() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .times(1)
            .returning(|_, _| Err(GitHubError::Timeout(30)));
        let err = client(mock).fetch_alerts("acme", "web").await.unwrap_err();
        assert!(matches!(err.source, GitHubError::Timeout(30)));
        assert!(err.to_string().contains("acme/web"));

        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .returning(|_, _| Ok(HttpResponse::new(StatusCode::OK).with_body("{")));
        let err = client(mock).fetch_alerts("acme", "web").await.unwrap_err();
        assert!(matches!(err.source, GitHubError::ParseError(_)));
    }

    #[tokio::test]
    async fn test_org_repositories_follows_next_and_skips_archived() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .withf(|url, _| url == "https://api.test/orgs/acme/repos?per_page=100&page=1")
            .times(1)
            .returning(|_, _| {
                Ok(HttpResponse::new(StatusCode::OK)
                    .with_header("Link", "<https://api.test/orgs/acme/repos?per_page=100&page=2>; rel=\"next\"")
                    .with_body(repos_body(&[("web", false), ("legacy", true)])))
            });
        mock.expect_get()
            .withf(|url, _| url == "https://api.test/orgs/acme/repos?per_page=100&page=2")
            .times(1)
            .returning(|_, _| {
                Ok(HttpResponse::new(StatusCode::OK).with_body(repos_body(&[("api", false)])))
            });

        let client = client(mock);
        let names: Vec<String> = client
            .org_repositories("acme")
            .map_ok(|repo| repo.name)
            .try_collect()
            .await
            .unwrap();

        assert_eq!(names, vec!["web", "api"]);
    }

    #[tokio::test]
    async fn test_org_repositories_stops_on_empty_page() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get()
            .withf(|url, _| url.ends_with("page=1"))
            .times(1)
            .returning(|_, _| {
                Ok(HttpResponse::new(StatusCode::OK)
                    .with_header("link", "<https://api.test/next>; rel=\"next\"")
                    .with_body(repos_body(&[("web", false)])))
            });
        mock.expect_get()
            .withf(|url, _| url.ends_with("page=2"))
            .times(1)
            .returning(|_, _| {
                Ok(HttpResponse::new(StatusCode::OK)
                    .with_header("link", "<https://api.test/next>; rel=\"next\"")
                    .with_body("[]"))
            });

        let client = client(mock);
        let repos: Vec<GitHubRepoSummary> =
            client.org_repositories("acme").try_collect().await.unwrap();

        assert_eq!(repos.len(), 1);
    }

    #[tokio::test]
    async fn test_org_repositories_surfaces_listing_error() {
        let mut mock = MockHttpTransport::new();
        mock.expect_get().times(1).returning(|_, _| {
            Ok(HttpResponse::new(StatusCode::NOT_FOUND).with_body(r#"{"message":"Not Found"}"#))
        });

        let client = client(mock);
        let result: Result<Vec<GitHubRepoSummary>> =
            client.org_repositories("nope").try_collect().await;

        assert!(matches!(
            result,
            Err(GitHubError::RequestFailed { status, .. }) if status == StatusCode::NOT_FOUND
        ));
    }

    #[test]
    fn test_per_page_is_clamped() {
        let mock = MockHttpTransport::new();
        let client = GitHubClient::new("t", mock).with_per_page(500);
        assert_eq!(client.per_page, MAX_PER_PAGE);
        assert_eq!(client.base_url, GITHUB_API_BASE);
    }
}
