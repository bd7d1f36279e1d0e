use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use alertscout_api::{GitHubClient, ReqwestTransport};
use alertscout_core::{
    Config, FilterCriteria, GitHubAlertProvider, OutputFormat, Presenter, ScanTarget, Scanner,
};
use clap::{error::ErrorKind, ArgGroup, CommandFactory, Parser};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod credential;

#[derive(Parser, Debug)]
#[command(name = "alertscout")]
#[command(version, about = "Report Dependabot security alerts for a repository or a whole organization", long_about = None)]
#[command(group(ArgGroup::new("target").required(true).multiple(true).args(["repo", "org"])))]
struct Cli {
    /// Repository to scan: owner/repo, or a bare name together with --org
    #[arg(short, long)]
    repo: Option<String>,

    /// Organization to scan (every non-archived repository)
    #[arg(short, long)]
    org: Option<String>,

    /// Only show alerts of this severity (e.g. Critical)
    #[arg(short, long)]
    severity: Option<String>,

    /// Partial match in package name or advisory summary
    #[arg(short = 'm', long = "match")]
    text_match: Option<String>,

    /// Partial match for CVE IDs
    #[arg(long)]
    cve: Option<String>,

    /// Package names to keep, comma separated (any match wins)
    #[arg(short, long = "package", value_delimiter = ',')]
    packages: Vec<String>,

    /// Group alerts by severity
    #[arg(short, long)]
    group: bool,

    /// Output format: default or json
    #[arg(short, long)]
    format: Option<OutputFormat>,

    /// Config file (defaults to the platform config dir if present)
    #[arg(long)]
    config: Option<PathBuf>,

    /// API base URL, for GitHub Enterprise
    #[arg(long)]
    api_url: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..))]
    timeout: Option<u64>,

    /// Log verbosity for diagnostics on stderr
    #[arg(long, default_value = "warn", value_parser = ["error", "warn", "info", "debug", "trace"])]
    log_level: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so JSON on stdout stays clean
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(log_directive(&cli.log_level)))
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    // Usage problems exit before we ask for a token or touch the network
    let target = match ScanTarget::resolve(cli.repo.as_deref(), cli.org.as_deref()) {
        Ok(target) => target,
        Err(err) => Cli::command()
            .error(ErrorKind::ValueValidation, err.to_string())
            .exit(),
    };

    let config = Config::load(cli.config.as_deref())?;
    let token = credential::read_token()?;

    let timeout = cli
        .timeout
        .map(Duration::from_secs)
        .unwrap_or_else(|| config.github.timeout());
    let client = GitHubClient::new(token, ReqwestTransport::with_timeout(timeout)?)
        .with_base_url(cli.api_url.clone().unwrap_or(config.github.api_url.clone()))
        .with_per_page(config.github.per_page);
    let provider = GitHubAlertProvider::new(client);

    let criteria = FilterCriteria::new()
        .severity(cli.severity.as_deref().unwrap_or_default())
        .text_match(cli.text_match.as_deref().unwrap_or_default())
        .cve_match(cli.cve.as_deref().unwrap_or_default())
        .packages(&cli.packages);
    let presenter = Presenter::new(
        cli.format.unwrap_or(config.output.format),
        cli.group || config.output.group,
    );

    tracing::info!("Scanning {}", target);

    let scanner = Scanner::new(&provider, criteria, presenter);
    let mut out = io::stdout().lock();
    let mut diag = io::stderr().lock();
    scanner.run(&target, &mut out, &mut diag).await?;
    out.flush()?;

    Ok(())
}

/// Our crates at the requested level, everything else (hyper, rustls) at warn
fn log_directive(level: &str) -> String {
    format!(
        "warn,alertscout={0},alertscout_core={0},alertscout_api={0}",
        level
    )
}
