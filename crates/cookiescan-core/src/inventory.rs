//! Harvested storage inventory.
//!
//! One [`InventoryItem`] is produced per completed scan task. Compliance
//! annotations (`compliance`, `compliant`, `all_compliant`) start empty and are
//! filled in by the compliance engine.

use crate::types::{FlatItemRule, StorageKind};
use serde::{Deserialize, Serialize};

/// A cookie visible to a frame at capture time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieItem {
    /// Cookie name
    pub name: String,
    /// Cookie value
    pub value: String,
    /// Cookie domain
    pub domain: String,
    /// Cookie path
    pub path: String,
    /// Expiry in unix seconds, `-1` for session cookies
    pub expires: f64,
    /// `HttpOnly` flag
    pub http_only: bool,
    /// `Secure` flag
    pub secure: bool,
    /// `SameSite` attribute as reported by the browser
    #[serde(default)]
    pub same_site: Option<String>,
    /// Capture instant (unix seconds) of the owning frame
    pub frame_timestamp: i64,
    /// Human-readable lifetime, computed during compliance checking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expiration_text: Option<String>,
    /// Compliance verdict data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceData>,
}

/// A key/value (or key/summary) entry of a non-cookie storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageEntry {
    /// Storage key, `"<db>/<store>"` for IndexedDB, cache name for Cache API
    pub key: String,
    /// Stored value, or `"<n> items"` summary
    pub value: String,
    /// Compliance verdict data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ComplianceData>,
}

impl StorageEntry {
    /// Create an unannotated entry.
    #[must_use]
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            compliance: None,
        }
    }
}

/// A storage artifact of any kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StorageItem {
    /// Cookie with expiry semantics
    Cookie(CookieItem),
    /// localStorage, sessionStorage, IndexedDB or Cache API entry
    Entry(StorageEntry),
}

impl StorageItem {
    /// Identifier matched against policy rule names.
    #[must_use]
    pub fn item_id(&self) -> &str {
        match self {
            Self::Cookie(cookie) => &cookie.name,
            Self::Entry(entry) => &entry.key,
        }
    }
}

/// TLS certificate metadata captured from a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    /// Certificate subject
    pub subject_name: String,
    /// Start of validity, unix seconds
    pub valid_from: f64,
    /// End of validity, unix seconds
    pub valid_to: f64,
    /// Certificate issuer
    pub issuer: String,
    /// TLS protocol, e.g. `TLS 1.3`
    pub protocol: String,
}

/// Requests a frame made to one domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainUsage {
    /// Request host
    pub domain: String,
    /// Number of requests
    pub hits: u64,
    /// First certificate seen for the domain, if any
    pub certificate: Option<CertificateSummary>,
}

/// Everything harvested from one frame.
///
/// A storage list is `None` when its collector failed; the other lists are
/// still present.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameSnapshot {
    /// Frame URL at capture time
    pub frame_url: String,
    /// Capture instant, unix seconds
    pub frame_timestamp: i64,
    /// Cookies visible to the frame URL
    pub cookies: Option<Vec<CookieItem>>,
    /// localStorage entries
    pub local_storage: Option<Vec<StorageEntry>>,
    /// sessionStorage entries
    pub session_storage: Option<Vec<StorageEntry>>,
    /// IndexedDB store summaries
    #[serde(rename = "indexedDB")]
    pub indexed_db: Option<Vec<StorageEntry>>,
    /// Cache API summaries
    pub cache_storage: Option<Vec<StorageEntry>>,
    /// Request domains seen from this frame
    pub frame_domains: Vec<DomainUsage>,
    /// Frame verdict, set by the compliance engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compliant: Option<bool>,
}

impl FrameSnapshot {
    /// Entries of a non-cookie storage kind.
    #[must_use]
    pub fn entries(&self, kind: StorageKind) -> Option<&Vec<StorageEntry>> {
        match kind {
            StorageKind::Cookie => None,
            StorageKind::LocalStorage => self.local_storage.as_ref(),
            StorageKind::SessionStorage => self.session_storage.as_ref(),
            StorageKind::IndexedDb => self.indexed_db.as_ref(),
            StorageKind::CacheStorage => self.cache_storage.as_ref(),
        }
    }

    /// Mutable entries of a non-cookie storage kind.
    pub fn entries_mut(&mut self, kind: StorageKind) -> Option<&mut Vec<StorageEntry>> {
        match kind {
            StorageKind::Cookie => None,
            StorageKind::LocalStorage => self.local_storage.as_mut(),
            StorageKind::SessionStorage => self.session_storage.as_mut(),
            StorageKind::IndexedDb => self.indexed_db.as_mut(),
            StorageKind::CacheStorage => self.cache_storage.as_mut(),
        }
    }

    /// Total number of harvested storage items.
    #[must_use]
    pub fn item_count(&self) -> usize {
        let cookies = self.cookies.as_ref().map_or(0, Vec::len);
        let entries: usize = StorageKind::ALL
            .into_iter()
            .filter_map(|kind| self.entries(kind))
            .map(Vec::len)
            .sum();
        cookies + entries
    }
}

/// Result of one scan task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    /// Scan task name, the join key to report rows
    pub name: String,
    /// Granted group IDs
    pub groups: Vec<String>,
    /// Scanned page URL
    pub url: String,
    /// One snapshot per frame
    pub frames: Vec<FrameSnapshot>,
    /// Inventory verdict, set by the compliance engine
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_compliant: Option<bool>,
}

/// Policy rules that declared an item, with diagnostic flags.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplianceData {
    /// At least one rule matched on name and kind
    pub compliant: bool,
    /// Every rule that matched on name and kind
    pub matching_settings: Vec<MatchedRule>,
}

/// One rule matching an item by name and kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedRule {
    /// The matching rule
    #[serde(flatten)]
    pub setting: FlatItemRule,
    /// The rule's host pattern matched the page URL
    pub host_matches: bool,
    /// The rule's declared lifetime matched the item's lifetime
    pub expires_matches: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> FrameSnapshot {
        FrameSnapshot {
            frame_url: "https://www.hel.fi/fi".to_string(),
            frame_timestamp: 1_700_000_000,
            cookies: Some(vec![]),
            local_storage: Some(vec![StorageEntry::new("a", "1"), StorageEntry::new("b", "2")]),
            session_storage: None,
            indexed_db: Some(vec![StorageEntry::new("db/store", "3 items")]),
            cache_storage: Some(vec![]),
            frame_domains: vec![],
            compliant: None,
        }
    }

    #[test]
    fn test_item_count_skips_failed_collectors() {
        assert_eq!(frame().item_count(), 3);
    }

    #[test]
    fn test_frame_serializes_with_report_keys() {
        let json = serde_json::to_value(frame()).unwrap();
        assert!(json.get("frameUrl").is_some());
        assert!(json.get("indexedDB").is_some());
        assert!(json["sessionStorage"].is_null());
        assert!(json.get("compliant").is_none());
    }

    #[test]
    fn test_storage_item_id() {
        let entry = StorageItem::Entry(StorageEntry::new("hds-cookie-consent", "{}"));
        assert_eq!(entry.item_id(), "hds-cookie-consent");
    }
}
