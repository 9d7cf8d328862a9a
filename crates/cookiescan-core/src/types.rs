//! Consent policy types, consent cookies and scan tasks.
//!
//! Policy data ([`ConsentGroupSetting`], [`ItemRule`]) is fetched from an
//! external endpoint and treated as read-only. [`ScanTask`] is produced once
//! by the variant expander and consumed once by the scan coordinator.

use crate::error::CoreError;
use crate::site::ScanAction;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Name of the first-party cookie carrying the consent state.
pub const CONSENT_COOKIE_NAME: &str = "helfi-cookie-consents";

/// The five client-side storage categories that are harvested per frame.
///
/// On the wire a kind is a numeric code (`1` = cookie .. `5` = cacheStorage),
/// which is how policy endpoints express it. Names are accepted as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StorageKind {
    /// HTTP cookies
    Cookie,
    /// `window.localStorage`
    LocalStorage,
    /// `window.sessionStorage`
    SessionStorage,
    /// IndexedDB object stores
    IndexedDb,
    /// Cache API caches
    CacheStorage,
}

impl StorageKind {
    /// All kinds in collection order.
    pub const ALL: [StorageKind; 5] = [
        Self::Cookie,
        Self::LocalStorage,
        Self::SessionStorage,
        Self::IndexedDb,
        Self::CacheStorage,
    ];

    /// Numeric code used by policy data.
    #[must_use]
    pub fn code(self) -> u8 {
        match self {
            Self::Cookie => 1,
            Self::LocalStorage => 2,
            Self::SessionStorage => 3,
            Self::IndexedDb => 4,
            Self::CacheStorage => 5,
        }
    }

    /// Reverse of [`StorageKind::code`].
    #[must_use]
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }

    /// Browser-facing name of the storage category.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cookie => "cookie",
            Self::LocalStorage => "localStorage",
            Self::SessionStorage => "sessionStorage",
            Self::IndexedDb => "indexedDB",
            Self::CacheStorage => "cacheStorage",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StorageKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        match lowered.as_str() {
            "cookie" | "cookies" => Ok(Self::Cookie),
            "localstorage" => Ok(Self::LocalStorage),
            "sessionstorage" => Ok(Self::SessionStorage),
            "indexeddb" => Ok(Self::IndexedDb),
            "cachestorage" => Ok(Self::CacheStorage),
            other => other
                .parse::<u8>()
                .ok()
                .and_then(Self::from_code)
                .ok_or_else(|| CoreError::Validation(format!("unknown storage type '{s}'"))),
        }
    }
}

impl Serialize for StorageKind {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(self.code())
    }
}

impl<'de> Deserialize<'de> for StorageKind {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Code(u8),
            Name(String),
        }

        match Repr::deserialize(deserializer)? {
            Repr::Code(code) => Self::from_code(code)
                .ok_or_else(|| D::Error::custom(format!("unknown storage type code {code}"))),
            Repr::Name(name) => name.parse().map_err(D::Error::custom),
        }
    }
}

/// One allow-listed storage item declared by a consent group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemRule {
    /// Name pattern (`*` wildcard)
    pub name: String,
    /// Host pattern (`*` wildcard, prefix match)
    pub host: String,
    /// Storage category the rule applies to
    #[serde(alias = "type")]
    pub storage_type: StorageKind,
    /// Declared lifetime text (`"Session"`, `"1 day"`, `"-"` for non-cookie storage)
    pub expiration: String,
}

/// A consent group and the storage items it allows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentGroupSetting {
    /// Group identifier, e.g. `"statistics"`
    pub group_id: String,
    /// Whether the group cannot be declined
    pub required: bool,
    /// Storage items declared by the group
    #[serde(rename = "cookies")]
    pub rules: Vec<ItemRule>,
}

impl ConsentGroupSetting {
    /// Flatten the groups into one rule list carrying group identity.
    #[must_use]
    pub fn flatten(groups: &[ConsentGroupSetting]) -> Vec<FlatItemRule> {
        groups
            .iter()
            .flat_map(|group| {
                group.rules.iter().map(|rule| FlatItemRule {
                    group_id: group.group_id.clone(),
                    required: group.required,
                    rule: rule.clone(),
                })
            })
            .collect()
    }
}

/// An [`ItemRule`] annotated with the group that declares it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FlatItemRule {
    /// Declaring group
    pub group_id: String,
    /// Whether the declaring group is required
    pub required: bool,
    /// The rule itself
    #[serde(flatten)]
    pub rule: ItemRule,
}

/// Consent group hashes harvested from the live consent widget.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsentHashes {
    /// `groupId -> hash`
    pub group_hashes: BTreeMap<String, String>,
    /// Expiry (unix seconds) of the harvested consent cookie
    pub expires: f64,
    /// Domain the harvested consent cookie was set on
    pub domain: Option<String>,
}

/// `SameSite` attribute of an injected cookie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
    /// `SameSite=Strict`
    Strict,
    /// `SameSite=Lax`
    Lax,
    /// `SameSite=None`
    None,
}

/// A cookie injected into an isolated browsing context before navigation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookieSpec {
    /// Cookie name
    pub name: String,
    /// Already URL-encoded value
    pub value: String,
    /// Cookie domain
    pub domain: String,
    /// Cookie path
    pub path: String,
    /// Expiry, unix seconds
    pub expires: f64,
    /// `HttpOnly` flag
    pub http_only: bool,
    /// `Secure` flag
    pub secure: bool,
    /// `SameSite` attribute
    pub same_site: SameSite,
}

/// One concrete page × consent-variant scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanTask {
    /// `"<nameBase> with <variant> accepted"`
    pub name: String,
    /// Page URL
    pub url: String,
    /// Consent cookies injected into the isolated context
    pub cookies: Vec<CookieSpec>,
    /// Group IDs the consent state grants
    pub groups: Vec<String>,
    /// Scripted post-load interactions
    pub actions: Vec<ScanAction>,
    /// Scan in the headless browser
    pub headless: bool,
    /// Wait for the operator after actions
    pub pause: bool,
    /// Use a fixed delay instead of a network-idle wait
    pub skip_network_idle: bool,
    /// Fixed delay used when `skip_network_idle` is set
    pub wait_for_network_idle_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_kind_codes_round_trip() {
        for kind in StorageKind::ALL {
            assert_eq!(StorageKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(StorageKind::from_code(9), None);
    }

    #[test]
    fn test_storage_kind_from_name() {
        assert_eq!("indexedDB".parse::<StorageKind>().unwrap(), StorageKind::IndexedDb);
        assert_eq!("localStorage".parse::<StorageKind>().unwrap(), StorageKind::LocalStorage);
        assert_eq!("3".parse::<StorageKind>().unwrap(), StorageKind::SessionStorage);
        assert!("webSql".parse::<StorageKind>().is_err());
    }

    #[test]
    fn test_item_rule_accepts_type_alias_and_names() {
        let rule: ItemRule = serde_json::from_value(serde_json::json!({
            "name": "_ga*",
            "host": "*.hel.fi",
            "type": 1,
            "expiration": "2 years"
        }))
        .unwrap();
        assert_eq!(rule.storage_type, StorageKind::Cookie);

        let rule: ItemRule = serde_json::from_value(serde_json::json!({
            "name": "cache",
            "host": "www.hel.fi",
            "storageType": "cacheStorage",
            "expiration": "-"
        }))
        .unwrap();
        assert_eq!(rule.storage_type, StorageKind::CacheStorage);
    }

    #[test]
    fn test_storage_kind_serializes_as_code() {
        let json = serde_json::to_string(&StorageKind::SessionStorage).unwrap();
        assert_eq!(json, "3");
    }

    #[test]
    fn test_flatten_keeps_group_identity() {
        let groups = vec![
            ConsentGroupSetting {
                group_id: "essential".to_string(),
                required: true,
                rules: vec![ItemRule {
                    name: "SSESS*".to_string(),
                    host: "www.hel.fi".to_string(),
                    storage_type: StorageKind::Cookie,
                    expiration: "Session".to_string(),
                }],
            },
            ConsentGroupSetting {
                group_id: "statistics".to_string(),
                required: false,
                rules: vec![],
            },
        ];

        let flat = ConsentGroupSetting::flatten(&groups);
        assert_eq!(flat.len(), 1);
        assert_eq!(flat[0].group_id, "essential");
        assert!(flat[0].required);

        let json = serde_json::to_value(&flat[0]).unwrap();
        assert_eq!(json["groupId"], "essential");
        assert_eq!(json["storageType"], 1);
    }
}
