use std::io::Write;

use futures::stream::{BoxStream, TryStreamExt};
use tracing::{error, info, warn};

use crate::{
    filter::{self, FilterCriteria},
    models::{Alert, RepositorySummary},
    present::{OutputFormat, Presenter},
    Error, Result,
};

/// What one fetch produced: alerts, or a reason there are none
#[derive(Debug, Clone, Default)]
pub struct FetchedAlerts {
    pub alerts: Vec<Alert>,
    pub warning: Option<String>,
}

/// Trait for alert sources - the scanner never sees HTTP
///
/// Keeps the orchestration testable with an in-memory provider.
#[async_trait::async_trait]
pub trait AlertProvider: Send + Sync {
    async fn fetch_alerts(&self, owner: &str, repo: &str) -> Result<FetchedAlerts>;

    /// Non-archived repositories of an organization, lazily, in platform order
    fn repositories<'a>(&'a self, org: &'a str) -> BoxStream<'a, Result<RepositorySummary>>;
}

/// Either one repository or a whole organization
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanTarget {
    Repository { owner: String, repo: String },
    Organization(String),
}

impl ScanTarget {
    /// Work out the target from the `--repo` / `--org` pair
    ///
    /// `--repo owner/name` stands on its own. A bare `--repo name` borrows
    /// the owner from `--org`. `--org` alone scans the organization.
    pub fn resolve(repo: Option<&str>, org: Option<&str>) -> Result<Self> {
        let repo = repo.map(str::trim).filter(|r| !r.is_empty());
        let org = org.map(str::trim).filter(|o| !o.is_empty());

        match (repo, org) {
            (Some(repo), org) if repo.contains('/') => {
                let (owner, name) = repo
                    .split_once('/')
                    .filter(|(owner, name)| !owner.is_empty() && !name.is_empty() && !name.contains('/'))
                    .ok_or_else(|| {
                        Error::InvalidTarget(format!("expected owner/repo, got '{}'", repo))
                    })?;

                if let Some(org) = org {
                    if !org.eq_ignore_ascii_case(owner) {
                        warn!("--org {} ignored; {} already names its owner", org, repo);
                    }
                }

                Ok(ScanTarget::Repository {
                    owner: owner.to_string(),
                    repo: name.to_string(),
                })
            }
            (Some(repo), Some(org)) => Ok(ScanTarget::Repository {
                owner: org.to_string(),
                repo: repo.to_string(),
            }),
            (Some(repo), None) => Err(Error::InvalidTarget(format!(
                "'{}' has no owner; use --repo owner/{} or add --org",
                repo, repo
            ))),
            (None, Some(org)) => Ok(ScanTarget::Organization(org.to_string())),
            (None, None) => Err(Error::InvalidTarget(
                "either --repo or --org is required".to_string(),
            )),
        }
    }
}

impl std::fmt::Display for ScanTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScanTarget::Repository { owner, repo } => write!(f, "{}/{}", owner, repo),
            ScanTarget::Organization(org) => write!(f, "organization {}", org),
        }
    }
}

/// Tally of a finished scan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanSummary {
    pub repositories: usize,
    pub with_alerts: usize,
    /// Repositories that came back with a warning instead of alerts
    pub skipped: usize,
    /// Repositories whose fetch failed outright
    pub failed: usize,
    pub alerts: usize,
    /// Organization listing broke off before the last page
    pub listing_incomplete: bool,
}

impl std::fmt::Display for ScanSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Scanned {} repositories: {} with matching alerts ({} alerts), {} skipped, {} failed",
            self.repositories, self.with_alerts, self.alerts, self.skipped, self.failed
        )?;
        if self.listing_incomplete {
            write!(f, " (repository listing incomplete)")?;
        }
        Ok(())
    }
}

/// Drives fetch -> filter -> present for a scan target
///
/// Runs strictly one request at a time. Results go to `out`; progress and
/// per-repository problems go to `diag` so they never mix with JSON output.
pub struct Scanner<'a> {
    provider: &'a dyn AlertProvider,
    criteria: FilterCriteria,
    presenter: Presenter,
}

impl<'a> Scanner<'a> {
    pub fn new(provider: &'a dyn AlertProvider, criteria: FilterCriteria, presenter: Presenter) -> Self {
        Self {
            provider,
            criteria,
            presenter,
        }
    }

    pub async fn run<W: Write, D: Write>(
        &self,
        target: &ScanTarget,
        out: &mut W,
        diag: &mut D,
    ) -> Result<ScanSummary> {
        match target {
            ScanTarget::Repository { owner, repo } => {
                self.scan_repository(owner, repo, out, diag).await
            }
            ScanTarget::Organization(org) => self.scan_organization(org, out, diag).await,
        }
    }

    /// Single repository: a failed fetch ends the scan with an error
    pub async fn scan_repository<W: Write, D: Write>(
        &self,
        owner: &str,
        repo: &str,
        out: &mut W,
        diag: &mut D,
    ) -> Result<ScanSummary> {
        let full_name = format!("{}/{}", owner, repo);
        let mut summary = ScanSummary {
            repositories: 1,
            ..ScanSummary::default()
        };

        writeln!(diag, "Fetching alerts for {}...", full_name)?;
        let fetched = self.provider.fetch_alerts(owner, repo).await?;

        if let Some(warning) = fetched.warning {
            warn!("{}: {}", full_name, warning);
            writeln!(diag, "Skipping {}: {}", full_name, warning)?;
            summary.skipped = 1;
            return Ok(summary);
        }

        let alerts = filter::apply(fetched.alerts, &self.criteria);
        if !alerts.is_empty() {
            summary.with_alerts = 1;
            summary.alerts = alerts.len();
        }

        self.presenter.render(&full_name, &alerts, out)?;
        Ok(summary)
    }

    /// Whole organization: per-repository failures are reported and skipped
    ///
    /// Human output streams as each repository finishes. JSON output is
    /// collected and written once at the end as a single array. A listing
    /// failure before any repository arrives fails the scan; a later one
    /// stops the walk and the repositories already scanned are still reported.
    pub async fn scan_organization<W: Write, D: Write>(
        &self,
        org: &str,
        out: &mut W,
        diag: &mut D,
    ) -> Result<ScanSummary> {
        let mut summary = ScanSummary::default();
        let mut collected: Vec<Alert> = Vec::new();
        let mut repositories = self.provider.repositories(org);

        info!("Scanning organization {}", org);

        loop {
            let repository = match repositories.try_next().await {
                Ok(Some(repository)) => repository,
                Ok(None) => break,
                Err(err) if summary.repositories == 0 => return Err(err),
                Err(err) => {
                    error!("Repository listing for {} stopped: {}", org, err);
                    writeln!(
                        diag,
                        "Listing stopped after {} repositories: {}",
                        summary.repositories, err
                    )?;
                    summary.listing_incomplete = true;
                    break;
                }
            };

            let full_name = format!("{}/{}", org, repository.name);
            summary.repositories += 1;

            writeln!(diag, "Fetching alerts for {}...", full_name)?;
            let fetched = match self.provider.fetch_alerts(org, &repository.name).await {
                Ok(fetched) => fetched,
                Err(err) => {
                    error!("{}", err);
                    writeln!(diag, "Skipping {}: {}", full_name, err)?;
                    summary.failed += 1;
                    continue;
                }
            };

            if let Some(warning) = fetched.warning {
                warn!("{}: {}", full_name, warning);
                writeln!(diag, "Skipping {}: {}", full_name, warning)?;
                summary.skipped += 1;
                continue;
            }

            let alerts = filter::apply(fetched.alerts, &self.criteria);
            if alerts.is_empty() {
                writeln!(diag, "No matching alerts in {}", full_name)?;
                continue;
            }

            summary.with_alerts += 1;
            summary.alerts += alerts.len();

            match self.presenter.format {
                OutputFormat::Json => collected.extend(alerts),
                OutputFormat::Default => {
                    writeln!(out, "\n=== {} ===", full_name)?;
                    self.presenter.render(&full_name, &alerts, out)?;
                }
            }
        }

        match self.presenter.format {
            OutputFormat::Json => self.presenter.render(org, &collected, out)?,
            OutputFormat::Default if summary.alerts == 0 => {
                self.presenter.render(org, &[], out)?
            }
            OutputFormat::Default => {}
        }

        info!("{}", summary);
        writeln!(diag, "{}", summary)?;
        Ok(summary)
    }
}
