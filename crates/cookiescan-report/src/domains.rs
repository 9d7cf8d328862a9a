//! Domain and certificate summary across every frame of a run.

use cookiescan_core::{CertificateSummary, InventoryItem};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// Certificates expiring within this many days are flagged.
pub const EXPIRY_WARNING_DAYS: i64 = 30;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// One contacted domain, aggregated over all tasks and frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomainSummary {
    pub domain: String,
    /// Requests across all frames
    pub hits: u64,
    /// Frames that contacted the domain
    pub frames: usize,
    /// First certificate seen
    pub certificate: Option<CertificateSummary>,
    pub days_until_expiry: Option<i64>,
    pub is_expiring: bool,
    pub is_expired: bool,
    /// Domain or one of its parent domains is on the tracker list
    pub known_tracker: bool,
}

/// Whole days until `valid_to`, rounded down.
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn days_until_expiry(valid_to: f64, now: i64) -> i64 {
    #[allow(clippy::cast_precision_loss)]
    let now = now as f64;
    ((valid_to - now) / SECONDS_PER_DAY).floor() as i64
}

/// Whether `domain` or any parent domain of it is listed.
#[must_use]
pub fn is_known_tracker(domain: &str, trackers: &HashSet<&str>) -> bool {
    let mut candidate = domain;
    loop {
        if trackers.contains(candidate) {
            return true;
        }
        match candidate.split_once('.') {
            Some((_, parent)) if parent.contains('.') => candidate = parent,
            _ => return false,
        }
    }
}

/// Summarize domain usage over `inventory`, sorted by hits, most first.
#[must_use]
pub fn summarize_domains(
    inventory: &[InventoryItem],
    tracking_domains: &[String],
    now: i64,
) -> Vec<DomainSummary> {
    let trackers: HashSet<&str> = tracking_domains.iter().map(String::as_str).collect();
    let mut by_domain: BTreeMap<&str, (u64, usize, Option<&CertificateSummary>)> = BTreeMap::new();

    for usage in inventory
        .iter()
        .flat_map(|item| &item.frames)
        .flat_map(|frame| &frame.frame_domains)
    {
        let entry = by_domain.entry(usage.domain.as_str()).or_default();
        entry.0 += usage.hits;
        entry.1 += 1;
        if entry.2.is_none() {
            entry.2 = usage.certificate.as_ref();
        }
    }

    let mut summaries: Vec<DomainSummary> = by_domain
        .into_iter()
        .map(|(domain, (hits, frames, certificate))| {
            let days = certificate.map(|cert| days_until_expiry(cert.valid_to, now));
            DomainSummary {
                domain: domain.to_string(),
                hits,
                frames,
                certificate: certificate.cloned(),
                days_until_expiry: days,
                is_expiring: days.is_some_and(|d| d <= EXPIRY_WARNING_DAYS),
                is_expired: days.is_some_and(|d| d <= 0),
                known_tracker: is_known_tracker(domain, &trackers),
            }
        })
        .collect();

    summaries.sort_by(|a, b| b.hits.cmp(&a.hits).then_with(|| a.domain.cmp(&b.domain)));
    summaries
}
