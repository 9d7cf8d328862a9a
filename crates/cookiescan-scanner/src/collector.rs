//! Frame collector: snapshots the five storage kinds of every frame.

use crate::domains::DomainTracker;
use cookiescan_browser::{scripts, BrowserCookie, BrowserPage, BrowsingContext, FrameRef};
use cookiescan_core::{CookieItem, FrameSnapshot, StorageEntry};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, error, warn};

#[derive(Debug, Deserialize)]
struct RawEntry {
    key: String,
    value: serde_json::Value,
}

/// Decode a storage script result into entries.
fn parse_entries(value: serde_json::Value) -> serde_json::Result<Vec<StorageEntry>> {
    let raw: Vec<RawEntry> = serde_json::from_value(value)?;
    Ok(raw
        .into_iter()
        .map(|entry| {
            let value = match entry.value {
                serde_json::Value::String(text) => text,
                other => other.to_string(),
            };
            StorageEntry::new(entry.key, value)
        })
        .collect())
}

fn cookie_item(cookie: BrowserCookie, frame_timestamp: i64) -> CookieItem {
    CookieItem {
        name: cookie.name,
        value: cookie.value,
        domain: cookie.domain,
        path: cookie.path,
        expires: cookie.expires,
        http_only: cookie.http_only,
        secure: cookie.secure,
        same_site: cookie.same_site,
        frame_timestamp,
        expiration_text: None,
        compliance: None,
    }
}

async fn collect_cookies(
    context: &dyn BrowsingContext,
    frame: &FrameRef,
    frame_timestamp: i64,
) -> Option<Vec<CookieItem>> {
    match context.read_cookies(&frame.url).await {
        Ok(cookies) => Some(
            cookies
                .into_iter()
                .map(|cookie| cookie_item(cookie, frame_timestamp))
                .collect(),
        ),
        Err(e) => {
            warn!(frame = %frame.url, error = %e, "error collecting cookies from frame");
            None
        }
    }
}

async fn collect_entries(
    page: &dyn BrowserPage,
    frame: &FrameRef,
    script: &str,
    kind: &str,
) -> Option<Vec<StorageEntry>> {
    let value = match page.run_in_frame(frame, script).await {
        Ok(value) => value,
        Err(e) => {
            warn!(frame = %frame.url, kind, error = %e, "error collecting storage from frame");
            return None;
        }
    };
    match parse_entries(value) {
        Ok(entries) => Some(entries),
        Err(e) => {
            warn!(frame = %frame.url, kind, error = %e, "unexpected storage script result");
            None
        }
    }
}

/// Snapshot every frame of `page` after waiting `settle_delay`.
///
/// A failing storage kind yields `None` for that kind only. If the frames
/// cannot be listed at all, the result is empty.
pub async fn collect_frames(
    context: &dyn BrowsingContext,
    page: &dyn BrowserPage,
    domains: &DomainTracker,
    settle_delay: Duration,
) -> Vec<FrameSnapshot> {
    // Late storage writes (consent banner scripts) land during this wait.
    tokio::time::sleep(settle_delay).await;

    let frames = match page.frames().await {
        Ok(frames) => frames,
        Err(e) => {
            let url = page.url().await.unwrap_or_default();
            error!(url = %url, error = %e, "error collecting data from all frames on page");
            return Vec::new();
        }
    };

    let mut snapshots = Vec::with_capacity(frames.len());
    for frame in &frames {
        let frame_timestamp = chrono::Utc::now().timestamp();

        let (cookies, local_storage, session_storage, indexed_db, cache_storage) = tokio::join!(
            collect_cookies(context, frame, frame_timestamp),
            collect_entries(page, frame, scripts::LOCAL_STORAGE, "localStorage"),
            collect_entries(page, frame, scripts::SESSION_STORAGE, "sessionStorage"),
            collect_entries(page, frame, scripts::INDEXED_DB, "indexedDB"),
            collect_entries(page, frame, scripts::CACHE_STORAGE, "cacheStorage"),
        );

        snapshots.push(FrameSnapshot {
            frame_url: frame.url.clone(),
            frame_timestamp,
            cookies,
            local_storage,
            session_storage,
            indexed_db,
            cache_storage,
            frame_domains: domains.usage(&frame.id),
            compliant: None,
        });
    }

    debug!(frames = snapshots.len(), "collected frame snapshots");
    snapshots
}
