// GitHub provider implementation - bridges API client with AlertProvider trait
use alertscout_api::{GitHubAlert, GitHubClient, GitHubRepoSummary};
use async_trait::async_trait;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};

use crate::{
    models::{Advisory, Alert, Identifier, Package, RepositorySummary},
    scan::{AlertProvider, FetchedAlerts},
    Error, Result,
};

/// Wrapper around GitHubClient that implements AlertProvider
pub struct GitHubAlertProvider {
    client: GitHubClient,
}

impl GitHubAlertProvider {
    pub fn new(client: GitHubClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl AlertProvider for GitHubAlertProvider {
    async fn fetch_alerts(&self, owner: &str, repo: &str) -> Result<FetchedAlerts> {
        let fetched = self.client.fetch_alerts(owner, repo).await?;
        let repository = format!("{}/{}", owner, repo);

        Ok(FetchedAlerts {
            alerts: fetched
                .alerts
                .into_iter()
                .map(|alert| github_to_alert(&repository, alert))
                .collect(),
            warning: fetched.warning.map(|w| w.to_string()),
        })
    }

    fn repositories<'a>(&'a self, org: &'a str) -> BoxStream<'a, Result<RepositorySummary>> {
        self.client
            .org_repositories(org)
            .map_ok(github_to_summary)
            .map_err(Error::from)
            .boxed()
    }
}

/// Convert a Dependabot wire alert to our internal Alert model
fn github_to_alert(repository: &str, gh: GitHubAlert) -> Alert {
    let advisory = gh.security_advisory;

    Alert {
        repository: repository.to_string(),
        number: gh.number,
        state: gh.state,
        url: gh.html_url,
        package: Package {
            ecosystem: gh.dependency.package.ecosystem,
            name: gh.dependency.package.name,
        },
        advisory: Advisory {
            summary: advisory.summary,
            severity: advisory.severity,
            identifiers: advisory
                .identifiers
                .into_iter()
                .map(|id| Identifier {
                    id_type: id.id_type,
                    value: id.value,
                })
                .collect(),
        },
    }
}

fn github_to_summary(gh: GitHubRepoSummary) -> RepositorySummary {
    RepositorySummary {
        name: gh.name,
        archived: gh.archived,
    }
}
