//! Per-task accumulator of request domains and certificates, keyed by frame.

use cookiescan_browser::{extract_domain, NetworkEvent, NetworkObserver};
use cookiescan_core::{CertificateSummary, DomainUsage};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tracing::trace;

#[derive(Debug, Default)]
struct FrameDomains {
    /// First-seen order
    domains: Vec<DomainUsage>,
    index: HashMap<String, usize>,
}

impl FrameDomains {
    fn entry(&mut self, domain: &str) -> &mut DomainUsage {
        let next = self.domains.len();
        let slot = *self.index.entry(domain.to_string()).or_insert(next);
        if slot == next {
            self.domains.push(DomainUsage {
                domain: domain.to_string(),
                hits: 0,
                certificate: None,
            });
        }
        &mut self.domains[slot]
    }
}

/// Domains contacted by each frame of one page.
///
/// Owned by a single scan task; clones share the same state so the network
/// observer can feed it.
#[derive(Debug, Clone, Default)]
pub struct DomainTracker {
    frames: Arc<Mutex<HashMap<String, FrameDomains>>>,
}

impl DomainTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one request from `frame_id` to the host of `url`.
    pub fn record_request(&self, frame_id: &str, url: &str) {
        let domain = match extract_domain(url) {
            Ok(domain) => domain,
            Err(e) => {
                trace!(error = %e, "request without host");
                return;
            }
        };
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        frames
            .entry(frame_id.to_string())
            .or_default()
            .entry(&domain)
            .hits += 1;
    }

    /// Keep the first certificate seen for a domain.
    pub fn record_certificate(&self, frame_id: &str, url: &str, certificate: CertificateSummary) {
        let Ok(domain) = extract_domain(url) else {
            return;
        };
        let mut frames = self.frames.lock().unwrap_or_else(PoisonError::into_inner);
        let usage = frames.entry(frame_id.to_string()).or_default().entry(&domain);
        if usage.certificate.is_none() {
            usage.certificate = Some(certificate);
        }
    }

    /// Network observer feeding this tracker.
    #[must_use]
    pub fn observer(&self) -> NetworkObserver {
        let tracker = self.clone();
        Arc::new(move |event: NetworkEvent| match event {
            NetworkEvent::Request {
                frame_id: Some(frame_id),
                url,
            } => tracker.record_request(&frame_id, &url),
            NetworkEvent::Response {
                frame_id: Some(frame_id),
                url,
                security: Some(certificate),
            } => tracker.record_certificate(&frame_id, &url, certificate),
            _ => {}
        })
    }

    /// Domains contacted by `frame_id`, in first-seen order.
    #[must_use]
    pub fn usage(&self, frame_id: &str) -> Vec<DomainUsage> {
        self.frames
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(frame_id)
            .map(|frame| frame.domains.clone())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn certificate(subject: &str) -> CertificateSummary {
        CertificateSummary {
            subject_name: subject.to_string(),
            valid_from: 1_700_000_000.0,
            valid_to: 1_800_000_000.0,
            issuer: "R3".to_string(),
            protocol: "TLS 1.3".to_string(),
        }
    }

    #[test]
    fn test_hits_per_frame_in_first_seen_order() {
        let tracker = DomainTracker::new();
        tracker.record_request("main", "https://www.hel.fi/fi");
        tracker.record_request("main", "https://cdn.hel.fi/app.js");
        tracker.record_request("main", "https://www.hel.fi/style.css");
        tracker.record_request("embed", "https://www.youtube.com/embed/x");

        let main = tracker.usage("main");
        assert_eq!(main.len(), 2);
        assert_eq!(main[0].domain, "www.hel.fi");
        assert_eq!(main[0].hits, 2);
        assert_eq!(main[1].domain, "cdn.hel.fi");
        assert_eq!(tracker.usage("embed")[0].hits, 1);
        assert!(tracker.usage("unknown").is_empty());
    }

    #[test]
    fn test_first_certificate_is_kept() {
        let tracker = DomainTracker::new();
        let observe = tracker.observer();
        observe(NetworkEvent::Request {
            frame_id: Some("main".to_string()),
            url: "https://www.hel.fi/".to_string(),
        });
        observe(NetworkEvent::Response {
            frame_id: Some("main".to_string()),
            url: "https://www.hel.fi/".to_string(),
            security: Some(certificate("www.hel.fi")),
        });
        observe(NetworkEvent::Response {
            frame_id: Some("main".to_string()),
            url: "https://www.hel.fi/other".to_string(),
            security: Some(certificate("second")),
        });

        let usage = tracker.usage("main");
        assert_eq!(usage[0].hits, 1);
        assert_eq!(
            usage[0].certificate.as_ref().map(|c| c.subject_name.as_str()),
            Some("www.hel.fi")
        );
    }

    #[test]
    fn test_events_without_frame_or_host_are_ignored() {
        let tracker = DomainTracker::new();
        let observe = tracker.observer();
        observe(NetworkEvent::Request {
            frame_id: None,
            url: "https://www.hel.fi/".to_string(),
        });
        tracker.record_request("main", "data:image/png;base64,AAAA");
        assert!(tracker.usage("main").is_empty());
    }
}
