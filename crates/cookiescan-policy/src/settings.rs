//! Consent policy fetched from a site's cookie banner endpoint.

use crate::error::{PolicyError, Result};
use cookiescan_core::{ConsentGroupSetting, ItemRule, StorageKind};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error};

/// Policy groups plus the endpoint's raw answer, which is echoed into reports.
#[derive(Debug, Clone, PartialEq)]
pub struct PolicySettings {
    /// Required groups first, then optional groups
    pub group_settings: Vec<ConsentGroupSetting>,
    pub site_settings: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawSiteSettings {
    #[serde(default)]
    required_groups: Vec<RawGroup>,
    #[serde(default)]
    optional_groups: Vec<RawGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawGroup {
    group_id: String,
    #[serde(default)]
    cookies: Vec<RawItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawItem {
    name: String,
    host: String,
    #[serde(alias = "type")]
    storage_type: StorageKind,
    expiration: Expiration,
}

/// Lifetime text, plain or per language.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Expiration {
    Text(String),
    Localized { en: String },
}

impl Expiration {
    fn into_text(self) -> String {
        match self {
            Self::Text(text) | Self::Localized { en: text } => text,
        }
    }
}

impl RawGroup {
    fn strip(self, required: bool) -> ConsentGroupSetting {
        ConsentGroupSetting {
            group_id: self.group_id,
            required,
            rules: self
                .cookies
                .into_iter()
                .map(|item| ItemRule {
                    name: item.name,
                    host: item.host,
                    storage_type: item.storage_type,
                    expiration: item.expiration.into_text(),
                })
                .collect(),
        }
    }
}

/// Reduce the endpoint's answer to the policy groups used for matching.
pub fn strip_site_settings(site_settings: &serde_json::Value) -> Result<Vec<ConsentGroupSetting>> {
    let raw = RawSiteSettings::deserialize(site_settings)?;
    Ok(raw
        .required_groups
        .into_iter()
        .map(|group| group.strip(true))
        .chain(raw.optional_groups.into_iter().map(|group| group.strip(false)))
        .collect())
}

/// Append a `cacheBuster` query parameter so CDN caches never answer.
pub fn with_cache_buster(api_url: &str, millis: i64) -> Result<String> {
    let mut url = url::Url::parse(api_url).map_err(|e| PolicyError::InvalidUrl {
        url: api_url.to_string(),
        reason: e.to_string(),
    })?;
    url.query_pairs_mut()
        .append_pair("cacheBuster", &millis.to_string());
    Ok(url.into())
}

/// HTTP client for policy endpoints.
#[derive(Debug, Clone)]
pub struct PolicyClient {
    client: Client,
}

impl PolicyClient {
    /// Create a client with a per-request timeout.
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    /// The underlying HTTP client, shared with the tracker list download.
    #[must_use]
    pub fn http(&self) -> &Client {
        &self.client
    }

    /// Fetch and strip the consent policy published at `api_url`.
    pub async fn fetch_group_settings(&self, api_url: &str) -> Result<PolicySettings> {
        let url = with_cache_buster(api_url, chrono::Utc::now().timestamp_millis())?;
        debug!(url = %url, "fetching consent policy");

        let result = self.request(&url, api_url).await;

        if let Err(e) = &result {
            error!(url = %api_url, error = %e, "error fetching consent policy");
        }
        result
    }

    async fn request(&self, url: &str, api_url: &str) -> Result<PolicySettings> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PolicyError::Status {
                url: api_url.to_string(),
                status: status.as_u16(),
            });
        }
        let site_settings: serde_json::Value = response.json().await?;
        let group_settings = strip_site_settings(&site_settings)?;
        Ok(PolicySettings {
            group_settings,
            site_settings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn banner() -> serde_json::Value {
        json!({
            "cookieName": "helfi-cookie-consents",
            "requiredGroups": [{
                "groupId": "essential",
                "title": { "en": "Essential" },
                "cookies": [
                    { "name": "SSESS*", "host": "www.hel.fi", "storageType": 1,
                      "expiration": "Session", "description": { "en": "Drupal" } },
                    { "name": "helfi-cookie-consents", "host": "www.hel.fi", "type": 1,
                      "expiration": { "en": "100 days", "fi": "100 päivää" } }
                ]
            }],
            "optionalGroups": [{
                "groupId": "statistics",
                "cookies": [
                    { "name": "matomo*", "host": "webanalytics.digiaiiris.com",
                      "storageType": "localStorage", "expiration": "-" }
                ]
            }]
        })
    }

    #[test]
    fn test_strip_site_settings() {
        let groups = strip_site_settings(&banner()).unwrap();

        assert_eq!(groups.len(), 2);
        assert!(groups[0].required);
        assert!(!groups[1].required);
        assert_eq!(groups[0].rules[1].expiration, "100 days");
        assert_eq!(groups[0].rules[1].storage_type, StorageKind::Cookie);
        assert_eq!(groups[1].rules[0].storage_type, StorageKind::LocalStorage);
    }

    #[test]
    fn test_strip_rejects_unknown_storage_type() {
        let bad = json!({
            "requiredGroups": [{ "groupId": "x", "cookies": [
                { "name": "a", "host": "b", "storageType": 9, "expiration": "-" }
            ]}]
        });
        assert!(strip_site_settings(&bad).is_err());
    }

    #[test]
    fn test_cache_buster_appended() {
        assert_eq!(
            with_cache_buster("https://www.hel.fi/en/api/cookie-banner", 1_700_000_000_000).unwrap(),
            "https://www.hel.fi/en/api/cookie-banner?cacheBuster=1700000000000"
        );
        assert_eq!(
            with_cache_buster("https://x.fi/api?lang=fi", 5).unwrap(),
            "https://x.fi/api?lang=fi&cacheBuster=5"
        );
        assert!(with_cache_buster("not a url", 5).is_err());
    }

    #[tokio::test]
    async fn test_fetch_group_settings() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/en/api/cookie-banner"))
            .respond_with(ResponseTemplate::new(200).set_body_json(banner()))
            .expect(1)
            .mount(&server)
            .await;

        let client = PolicyClient::new(Duration::from_secs(5)).unwrap();
        let settings = client
            .fetch_group_settings(&format!("{}/en/api/cookie-banner", server.uri()))
            .await
            .unwrap();

        assert_eq!(settings.group_settings.len(), 2);
        assert_eq!(settings.site_settings["cookieName"], "helfi-cookie-consents");

        let requests = server.received_requests().await.unwrap();
        assert!(requests[0]
            .url
            .query_pairs()
            .any(|(key, _)| key == "cacheBuster"));
    }

    #[tokio::test]
    async fn test_fetch_group_settings_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let client = PolicyClient::new(Duration::from_secs(5)).unwrap();
        let err = client
            .fetch_group_settings(&format!("{}/api", server.uri()))
            .await
            .unwrap_err();

        assert!(matches!(err, PolicyError::Status { status: 500, .. }));
    }
}
