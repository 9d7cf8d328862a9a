//! Cookiescan application shell.
//!
//! Parses the command line, initialises logging and hands the loaded site
//! configs to the [`batch`] driver. Scanning logic lives in the `crates/`
//! directory.

pub mod batch;
pub mod error;

use anyhow::{Context, Result};
use clap::Parser;
use cookiescan_browser::ChromiumLauncher;
use cookiescan_core::{AppConfig, SiteConfig, SiteConfigLoader};
use cookiescan_policy::PolicyClient;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use batch::{budget_exhausted, BatchRunner, BatchSummary};
pub use error::{BatchError, SiteError};

const POLICY_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Scan sites for cookies and web storage not declared by their consent policy.
#[derive(Debug, Parser)]
#[command(name = "cookiescan", version, about)]
pub struct Cli {
    /// Directory with one TOML file per site (defaults to the config dir's `sites/`)
    #[arg(long, env = "COOKIESCAN_SITES_DIR")]
    pub sites: Option<PathBuf>,

    /// Application config file (defaults to `~/.config/cookiescan/config.toml`)
    #[arg(long, env = "COOKIESCAN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory receiving JSON reports
    #[arg(long)]
    pub report_dir: Option<PathBuf>,

    /// Only scan the site with this name or main URL
    #[arg(long)]
    pub site: Option<String>,
}

/// Initialize tracing subscriber for logging
pub fn init_tracing() {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,cookiescan=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .init();
}

/// Resolve the application config from flags, file and environment.
pub fn load_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    }
    .context("failed to load application config")?;
    config.apply_env_overrides();
    if let Some(dir) = &cli.report_dir {
        config.reports.dir.clone_from(dir);
    }
    Ok(config)
}

/// Load site configs, keeping only `filter` when given.
pub fn load_sites(cli: &Cli) -> Result<Vec<SiteConfig>> {
    let dir = match &cli.sites {
        Some(dir) => dir.clone(),
        None => AppConfig::sites_dir().context("cannot determine sites directory")?,
    };
    let sites: Vec<SiteConfig> = SiteConfigLoader::new(&dir)
        .with_context(|| format!("cannot open sites directory {}", dir.display()))?
        .load_all()?
        .into_iter()
        .map(|(_, site)| site)
        .filter(|site| {
            cli.site
                .as_deref()
                .map_or(true, |wanted| site.label() == wanted || site.main_url == wanted)
        })
        .collect();
    anyhow::ensure!(!sites.is_empty(), "no site configs to scan in {}", dir.display());
    Ok(sites)
}

/// Run the scanner with the given command line.
pub async fn run(cli: Cli) -> Result<BatchSummary> {
    let config = load_config(&cli)?;
    let sites = load_sites(&cli)?;

    info!(
        "Starting cookiescan v{} with {} site config(s)",
        env!("CARGO_PKG_VERSION"),
        sites.len()
    );

    let launcher = Arc::new(ChromiumLauncher::new(&config.browser));
    let policy = PolicyClient::new(POLICY_REQUEST_TIMEOUT)?;
    let runner = BatchRunner::new(config, launcher, policy);

    let summary = runner.run_all(&sites).await?;
    info!(
        reports = summary.reports.len(),
        skipped = summary.skipped.len(),
        "batch finished"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_flags() {
        let cli = Cli::parse_from([
            "cookiescan",
            "--sites",
            "sites",
            "--report-dir",
            "/tmp/reports",
            "--site",
            "hel.fi",
        ]);
        assert_eq!(cli.sites, Some(PathBuf::from("sites")));
        assert_eq!(cli.report_dir, Some(PathBuf::from("/tmp/reports")));
        assert_eq!(cli.site.as_deref(), Some("hel.fi"));
    }

    #[test]
    fn test_report_dir_flag_overrides_config() {
        let dir = tempfile::TempDir::new().expect("create temp dir");
        let cli = Cli {
            sites: None,
            config: Some(dir.path().join("missing.toml")),
            report_dir: Some(PathBuf::from("out/json")),
            site: None,
        };
        let config = load_config(&cli).unwrap();
        assert_eq!(config.reports.dir, PathBuf::from("out/json"));
    }
}
