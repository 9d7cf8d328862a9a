//! Batch driver: runs every site config in turn.
//!
//! Site configs run strictly one after another with a short pause in between.
//! A site whose policy or hashes cannot be fetched is skipped; a browser
//! launch or report write failure stops the batch.

use crate::error::{BatchError, SiteError};
use cookiescan_browser::BrowserLauncher;
use cookiescan_compliance::check_compliance;
use cookiescan_core::{AppConfig, RunContext, SiteConfig};
use cookiescan_policy::{fetch_tracking_domains, harvest_group_hashes, HarvestSettings, PolicyClient};
use cookiescan_report::{assemble, ReportInput, ReportStore, PROCESSING_TIME};
use cookiescan_scanner::{expand_tasks, CoordinatorSettings, ScanCoordinator};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Outcome of a whole batch.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BatchSummary {
    /// Detail reports written, in site order
    pub reports: Vec<PathBuf>,
    /// Sites skipped because their policy source failed
    pub skipped: Vec<String>,
}

/// Whether no new site config may start after `elapsed`.
#[must_use]
pub fn budget_exhausted(elapsed: Duration, budget: Option<Duration>, high_water: f64) -> bool {
    budget.is_some_and(|budget| elapsed.as_secs_f64() >= budget.as_secs_f64() * high_water)
}

/// Runs site configs against one browser launcher.
pub struct BatchRunner {
    config: AppConfig,
    launcher: Arc<dyn BrowserLauncher>,
    policy: PolicyClient,
    store: ReportStore,
}

impl BatchRunner {
    #[must_use]
    pub fn new(config: AppConfig, launcher: Arc<dyn BrowserLauncher>, policy: PolicyClient) -> Self {
        let store = ReportStore::new(config.reports.dir.clone());
        Self {
            config,
            launcher,
            policy,
            store,
        }
    }

    /// Run `sites` sequentially.
    pub async fn run_all(&self, sites: &[SiteConfig]) -> Result<BatchSummary, BatchError> {
        let started = Instant::now();
        let budget = self.config.scanning.budget();
        let inter_config_delay = Duration::from_millis(self.config.scanning.inter_config_delay_ms);
        let mut summary = BatchSummary::default();

        for (index, site) in sites.iter().enumerate() {
            if budget_exhausted(started.elapsed(), budget, self.config.scanning.budget_high_water) {
                let remaining = sites.len() - index;
                error!(remaining, "time budget high-water mark reached, stopping");
                return Err(BatchError::BudgetExhausted { remaining });
            }
            if index > 0 {
                tokio::time::sleep(inter_config_delay).await;
            }

            info!(site = %site.label(), "starting site config");
            match self.run_site(site).await {
                Ok(path) => summary.reports.push(path),
                Err(e) if e.is_systemic() => {
                    return Err(BatchError::Systemic {
                        site: site.label().to_string(),
                        source: e,
                    });
                }
                Err(e) => {
                    error!(site = %site.label(), error = %e, "skipping site config");
                    summary.skipped.push(site.label().to_string());
                }
            }
        }

        Ok(summary)
    }

    /// Scan one site config and write its report.
    pub async fn run_site(&self, site: &SiteConfig) -> Result<PathBuf, SiteError> {
        let ctx = RunContext::new(site.label());
        ctx.timer.start(PROCESSING_TIME);

        let harvest = HarvestSettings {
            consent_wait_timeout: Duration::from_secs(self.config.browser.consent_wait_timeout_secs),
            network_idle_timeout: self.config.scanning.network_idle_timeout(),
        };

        ctx.timer.start("Collecting policy");
        // Both sides run to completion so the harvest browser is always closed.
        let (hashes, policy) = tokio::join!(
            harvest_group_hashes(self.launcher.as_ref(), &site.main_url, harvest),
            self.policy.fetch_group_settings(&site.api_url),
        );
        let (hashes, policy) = (hashes?, policy?);
        ctx.timer.end("Collecting policy");

        let tasks = expand_tasks(&site.selected_pages(), &hashes, &policy.group_settings);
        info!(site = %site.label(), tasks = tasks.len(), "scanning");

        let coordinator = ScanCoordinator::new(
            Arc::clone(&self.launcher),
            CoordinatorSettings::from(&self.config.scanning),
        );
        let (tracking_domains, scanned) = tokio::join!(
            self.tracking_domains(&ctx),
            coordinator.run(&tasks, &ctx)
        );
        let mut inventory = scanned?;

        // A failed download keeps the previous list on disk.
        if self.config.tracking.enabled && !tracking_domains.is_empty() {
            self.store.save_known_trackers(&tracking_domains).await?;
        }

        ctx.timer.start("Checking compliance");
        let outcome = check_compliance(
            &policy.group_settings,
            &mut inventory,
            &site.main_url,
            &site.settings_domain_substitution,
        )?;
        ctx.timer.end("Checking compliance");

        info!(
            site = %site.label(),
            items = outcome.found_items.len(),
            compliant = outcome.compliant_count(),
            warnings = outcome.warning_count(),
            failed_tasks = tasks.len() - inventory.len(),
            "compliance checked"
        );

        ctx.timer.end(PROCESSING_TIME);
        let report = assemble(
            ReportInput {
                site,
                group_hashes: &hashes.group_hashes,
                group_settings: &policy.group_settings,
                site_settings: &policy.site_settings,
                tasks: &tasks,
                inventory,
                outcome,
                tracking_domains: &tracking_domains,
            },
            &ctx,
            chrono::Utc::now(),
        );

        Ok(self.store.save(&report).await?)
    }

    async fn tracking_domains(&self, ctx: &RunContext) -> Vec<String> {
        if !self.config.tracking.enabled {
            return Vec::new();
        }
        ctx.timer.start("Fetching tracking domains");
        let domains = fetch_tracking_domains(self.policy.http(), &self.config.tracking.blocklist_url).await;
        ctx.timer.end("Fetching tracking domains");
        if domains.is_empty() {
            warn!("no known tracking domains available, tracker flags will be empty");
        }
        domains
    }
}
