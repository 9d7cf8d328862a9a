//! Group hash harvesting from a site's live consent widget.
//!
//! The hashes identify the current policy revision; a consent cookie is only
//! honoured by the site when it carries them.

use crate::error::{PolicyError, Result};
use cookiescan_browser::scripts::{ACCEPT_ALL_CONSENT, CONSENT_WIDGET_READY};
use cookiescan_browser::{BrowserLauncher, BrowserSession, BrowsingContext, Visibility};
use cookiescan_core::{ConsentHashes, CONSENT_COOKIE_NAME};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

const WIDGET_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Time bounds for harvesting.
#[derive(Debug, Clone, Copy)]
pub struct HarvestSettings {
    /// How long to wait for the consent widget API to appear
    pub consent_wait_timeout: Duration,
    /// Upper bound of the network-idle wait after accepting
    pub network_idle_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct ConsentCookieValue {
    #[serde(default)]
    groups: BTreeMap<String, serde_json::Value>,
}

/// Parse the percent-encoded JSON value of a consent cookie into `groupId -> hash`.
pub fn parse_consent_cookie(raw: &str) -> Result<BTreeMap<String, String>> {
    let decoded = urlencoding::decode(raw)
        .map_err(|e| PolicyError::MalformedConsentCookie(e.to_string()))?;
    let value: ConsentCookieValue = serde_json::from_str(&decoded)?;
    Ok(value
        .groups
        .into_iter()
        .map(|(group, hash)| {
            let hash = match hash {
                serde_json::Value::String(hash) => hash,
                other => other.to_string(),
            };
            (group, hash)
        })
        .collect())
}

/// Accept every consent group on `url` and read back the resulting consent cookie.
///
/// A fresh headless browser is launched for this and closed on every path.
pub async fn harvest_group_hashes(
    launcher: &dyn BrowserLauncher,
    url: &str,
    settings: HarvestSettings,
) -> Result<ConsentHashes> {
    let session = launcher.launch(Visibility::Headless).await?;

    let result = harvest_in_session(session.as_ref(), url, settings).await;

    if let Err(e) = session.close().await {
        warn!(error = %e, "error closing consent harvesting browser");
    }

    match &result {
        Ok(hashes) => info!(url, groups = hashes.group_hashes.len(), "harvested group hashes"),
        Err(e) => warn!(url, error = %e, "group hash harvesting failed"),
    }
    result
}

async fn harvest_in_session(
    session: &dyn BrowserSession,
    url: &str,
    settings: HarvestSettings,
) -> Result<ConsentHashes> {
    let context = session.new_isolated_context(&[]).await?;

    let result = harvest_in_context(context.as_ref(), url, settings).await;

    if let Err(e) = context.close().await {
        warn!(error = %e, "error closing consent harvesting context");
    }
    result
}

async fn harvest_in_context(
    context: &dyn BrowsingContext,
    url: &str,
    settings: HarvestSettings,
) -> Result<ConsentHashes> {
    let page = context.new_page().await?;
    page.goto(url).await?;

    let main_frame = page
        .frames()
        .await?
        .into_iter()
        .find(|frame| frame.is_main)
        .ok_or_else(|| PolicyError::ConsentWidgetTimeout {
            url: url.to_string(),
        })?;

    let deadline = Instant::now() + settings.consent_wait_timeout;
    loop {
        let ready = page
            .run_in_frame(&main_frame, CONSENT_WIDGET_READY)
            .await
            .ok()
            .and_then(|value| value.as_bool())
            .unwrap_or(false);
        if ready {
            break;
        }
        if Instant::now() >= deadline {
            return Err(PolicyError::ConsentWidgetTimeout {
                url: url.to_string(),
            });
        }
        tokio::time::sleep(WIDGET_POLL_INTERVAL).await;
    }

    let clicked = page.run_in_frame(&main_frame, ACCEPT_ALL_CONSENT).await?;
    if clicked.as_bool() != Some(true) {
        warn!(url, "accept-all button not found in consent banner");
    }

    if !page
        .wait_for_network_idle(settings.network_idle_timeout)
        .await?
    {
        debug!(url, "network idle timeout after accepting consent");
    }

    let cookie = context
        .read_cookies(url)
        .await?
        .into_iter()
        .find(|cookie| cookie.name == CONSENT_COOKIE_NAME)
        .ok_or_else(|| PolicyError::ConsentCookieMissing {
            url: url.to_string(),
        })?;

    Ok(ConsentHashes {
        group_hashes: parse_consent_cookie(&cookie.value)?,
        expires: cookie.expires,
        domain: Some(cookie.domain).filter(|domain| !domain.is_empty()),
    })
}
