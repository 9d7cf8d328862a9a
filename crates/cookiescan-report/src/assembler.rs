//! Report assembly: one [`ScanReport`] per site config run.

use crate::domains::{summarize_domains, DomainSummary};
use chrono::{DateTime, SecondsFormat, Utc};
use cookiescan_compliance::{ComplianceOutcome, FoundItem};
use cookiescan_core::{
    ConsentGroupSetting, FlatItemRule, InventoryItem, PageSpec, RunContext, ScanTask, SiteConfig,
    TimingRecord,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;

/// Timer label covering one whole site config run.
pub const PROCESSING_TIME: &str = "Processing time";

/// Counts shown at the top of a report and in the history list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total: usize,
    pub compliant: usize,
    pub non_compliant: usize,
    /// Compliant items whose declaring rules all disagree on host or lifetime
    pub warnings: usize,
    /// Scan tasks requested
    pub urls: usize,
    /// Scan tasks that returned no data
    pub failed_urls: usize,
    /// Formatted processing time of the run
    pub timing: String,
    /// Number of flattened policy rules
    pub site_settings_flat: usize,
}

/// Site config fields echoed into the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfigEcho {
    pub main_url: String,
    pub settings_domain_substitution: String,
    pub api_url: String,
    pub urls: Vec<PageSpec>,
}

impl From<&SiteConfig> for ConfigEcho {
    fn from(site: &SiteConfig) -> Self {
        Self {
            main_url: site.main_url.clone(),
            settings_domain_substitution: site.settings_domain_substitution.clone(),
            api_url: site.api_url.clone(),
            urls: site.selected_pages(),
        }
    }
}

/// Full detail record of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanReport {
    /// RFC 3339, millisecond precision
    pub time_stamp: String,
    pub summary: ReportSummary,
    pub config: ConfigEcho,
    pub group_hashes: BTreeMap<String, String>,
    pub group_settings: Vec<ConsentGroupSetting>,
    /// Raw policy document as fetched
    pub site_settings: serde_json::Value,
    pub urls: Vec<ScanTask>,
    pub inventory_items: Vec<InventoryItem>,
    pub found_items: Vec<FoundItem>,
    pub site_settings_flat: Vec<FlatItemRule>,
    pub timing: BTreeMap<String, TimingRecord>,
    pub domains: Vec<DomainSummary>,
}

/// Everything a report is built from.
#[derive(Debug)]
pub struct ReportInput<'a> {
    pub site: &'a SiteConfig,
    pub group_hashes: &'a BTreeMap<String, String>,
    pub group_settings: &'a [ConsentGroupSetting],
    pub site_settings: &'a serde_json::Value,
    pub tasks: &'a [ScanTask],
    pub inventory: Vec<InventoryItem>,
    pub outcome: ComplianceOutcome,
    pub tracking_domains: &'a [String],
}

/// Count verdicts into a summary.
#[must_use]
pub fn summarize(
    found_items: &[FoundItem],
    tasks: usize,
    completed: usize,
    timing: String,
    site_settings_flat: usize,
) -> ReportSummary {
    let compliant = found_items.iter().filter(|item| item.compliant).count();
    ReportSummary {
        total: found_items.len(),
        compliant,
        non_compliant: found_items.len() - compliant,
        warnings: found_items.iter().filter(|item| item.is_warning()).count(),
        urls: tasks,
        failed_urls: tasks.saturating_sub(completed),
        timing,
        site_settings_flat,
    }
}

/// Build the report for a finished run, stamped `now`.
///
/// Reads the timings recorded so far, so the caller ends the
/// [`PROCESSING_TIME`] span first.
#[must_use]
pub fn assemble(input: ReportInput<'_>, ctx: &RunContext, now: DateTime<Utc>) -> ScanReport {
    let timing = ctx.timer.report();
    let processing_time = match timing.get(PROCESSING_TIME) {
        Some(record) => record.formatted_elapsed.clone(),
        None => {
            warn!(run = %ctx.label, "no processing time recorded for report");
            String::new()
        }
    };

    let summary = summarize(
        &input.outcome.found_items,
        input.tasks.len(),
        input.inventory.len(),
        processing_time,
        input.outcome.site_settings_flat.len(),
    );
    let domains = summarize_domains(&input.inventory, input.tracking_domains, now.timestamp());

    ScanReport {
        time_stamp: now.to_rfc3339_opts(SecondsFormat::Millis, true),
        summary,
        config: ConfigEcho::from(input.site),
        group_hashes: input.group_hashes.clone(),
        group_settings: input.group_settings.to_vec(),
        site_settings: input.site_settings.clone(),
        urls: input.tasks.to_vec(),
        inventory_items: input.inventory,
        found_items: input.outcome.found_items,
        site_settings_flat: input.outcome.site_settings_flat,
        timing,
        domains,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use cookiescan_core::{ComplianceData, ItemRule, MatchedRule, StorageEntry, StorageItem, StorageKind};

    fn found(compliant: bool, host_matches: bool) -> FoundItem {
        let rule = FlatItemRule {
            group_id: "essential".to_string(),
            required: true,
            rule: ItemRule {
                name: "session".to_string(),
                host: "www.hel.fi".to_string(),
                storage_type: StorageKind::LocalStorage,
                expiration: "-".to_string(),
            },
        };
        let matching_settings = if compliant {
            vec![MatchedRule {
                setting: rule,
                host_matches,
                expires_matches: true,
            }]
        } else {
            vec![]
        };
        FoundItem {
            kind: StorageKind::LocalStorage,
            item_id: "session".to_string(),
            item: StorageItem::Entry(StorageEntry::new("session", "1")),
            groups: vec![],
            name: "Frontpage with none accepted".to_string(),
            url: "https://www.hel.fi/fi".to_string(),
            frame_url: "https://www.hel.fi/fi".to_string(),
            compliant,
            compliance_data: ComplianceData {
                compliant,
                matching_settings,
            },
        }
    }

    fn site() -> SiteConfig {
        SiteConfig {
            name: None,
            main_url: "https://www.hel.fi/fi".to_string(),
            api_url: "https://www.hel.fi/api/cookie-consent".to_string(),
            settings_domain_substitution: String::new(),
            pages: vec![],
        }
    }

    #[test]
    fn test_summary_counts() {
        let items = [found(true, true), found(true, false), found(false, false)];
        let summary = summarize(&items, 4, 3, "1.000s".to_string(), 7);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.compliant, 2);
        assert_eq!(summary.non_compliant, 1);
        assert_eq!(summary.warnings, 1);
        assert_eq!(summary.urls, 4);
        assert_eq!(summary.failed_urls, 1);
        assert_eq!(summary.site_settings_flat, 7);
    }

    #[test]
    fn test_assemble_uses_processing_time() {
        let ctx = RunContext::new("www.hel.fi");
        ctx.timer.start(PROCESSING_TIME);
        ctx.timer.end(PROCESSING_TIME);

        let site = site();
        let hashes = BTreeMap::from([("essential".to_string(), "h1".to_string())]);
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let report = assemble(
            ReportInput {
                site: &site,
                group_hashes: &hashes,
                group_settings: &[],
                site_settings: &serde_json::json!({ "requiredGroups": [] }),
                tasks: &[],
                inventory: vec![],
                outcome: ComplianceOutcome::default(),
                tracking_domains: &[],
            },
            &ctx,
            now,
        );

        assert_eq!(report.time_stamp, "2024-05-01T12:00:00.000Z");
        assert!(!report.summary.timing.is_empty());
        assert!(report.timing.contains_key(PROCESSING_TIME));
        assert_eq!(report.config.main_url, "https://www.hel.fi/fi");

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["nonCompliant"], 0);
        assert_eq!(json["groupHashes"]["essential"], "h1");
        assert!(json["inventoryItems"].is_array());
        assert!(json["siteSettingsFlat"].is_array());
    }

    fn page(name_base: &str, only: bool) -> PageSpec {
        PageSpec {
            only,
            name_base: name_base.to_string(),
            url: format!("https://www.hel.fi/{name_base}"),
            actions: vec![],
            variants: vec![],
            headless: true,
            pause: false,
            skip_network_idle: false,
            wait_for_network_idle_ms: 0,
        }
    }

    #[test]
    fn test_config_echo_lists_only_selected_pages() {
        let mut site = site();
        site.pages = vec![page("fi", false), page("en", true), page("sv", false)];

        let echo = ConfigEcho::from(&site);
        let names: Vec<&str> = echo.urls.iter().map(|p| p.name_base.as_str()).collect();
        assert_eq!(names, vec!["en"]);

        site.pages = vec![page("fi", false), page("sv", false)];
        assert_eq!(ConfigEcho::from(&site).urls.len(), 2);
    }
}
