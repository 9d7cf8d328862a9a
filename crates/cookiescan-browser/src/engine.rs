//! Chromium implementation of the browser capability traits.

use crate::actions::PageActions;
use crate::error::{BrowserError, Result};
use crate::network::{IdleTracker, NetworkEvent, NetworkObserver};
use crate::scripts;
use crate::session::{
    BrowserCookie, BrowserLauncher, BrowserPage, BrowserSession, BrowsingContext, FrameRef,
    Visibility,
};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::browser::BrowserContextId;
use chromiumoxide::cdp::browser_protocol::network::{
    CookieParam, CookieSameSite, EnableParams, EventLoadingFailed, EventLoadingFinished,
    EventRequestWillBeSent, EventResponseReceived, GetCookiesParams, TimeSinceEpoch,
};
use chromiumoxide::cdp::browser_protocol::page::{FrameId, FrameTree, GetFrameTreeParams};
use chromiumoxide::cdp::browser_protocol::storage::SetCookiesParams;
use chromiumoxide::cdp::browser_protocol::target::{
    CreateBrowserContextParams, CreateTargetParams, DisposeBrowserContextParams,
};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::Page;
use cookiescan_core::{BrowserConfig as BrowserSettings, CertificateSummary, CookieSpec, SameSite};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Keep cross-origin iframes in the page's renderer so every frame has an
/// execution context and reports its requests on the page session.
/// `TranslateUI` repeats the launcher default this flag would otherwise replace.
const SITE_ISOLATION_ARGS: [&str; 2] = [
    "--disable-features=site-per-process,IsolateOrigins,TranslateUI",
    "--disable-site-isolation-trials",
];

fn chromium(e: impl std::fmt::Display) -> BrowserError {
    BrowserError::ChromiumError(e.to_string())
}

/// Launches local Chromium processes.
#[derive(Debug, Clone)]
pub struct ChromiumLauncher {
    settings: BrowserSettings,
}

impl ChromiumLauncher {
    #[must_use]
    pub fn new(settings: &BrowserSettings) -> Self {
        Self {
            settings: settings.clone(),
        }
    }

    fn browser_config(&self, visibility: Visibility) -> Result<BrowserConfig> {
        let mut builder = BrowserConfig::builder()
            .window_size(self.settings.window_width, self.settings.window_height)
            .launch_timeout(Duration::from_secs(self.settings.launch_timeout_secs))
            .args(SITE_ISOLATION_ARGS);
        if !visibility.is_headless() {
            builder = builder.with_head();
        }
        if self.settings.no_sandbox {
            builder = builder.no_sandbox();
        }
        builder.build().map_err(BrowserError::LaunchError)
    }
}

#[async_trait::async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self, visibility: Visibility) -> Result<Box<dyn BrowserSession>> {
        let config = self.browser_config(visibility)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| BrowserError::LaunchError(e.to_string()))?;

        // Spawn browser handler
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!(error = %e, "browser handler event error");
                }
            }
        });

        debug!(?visibility, "browser launched");

        Ok(Box::new(ChromiumSession {
            browser: Arc::new(RwLock::new(browser)),
            handler: Mutex::new(Some(handler)),
        }))
    }
}

struct ChromiumSession {
    browser: Arc<RwLock<Browser>>,
    handler: Mutex<Option<JoinHandle<()>>>,
}

fn cookie_param(spec: &CookieSpec) -> Result<CookieParam> {
    let same_site = match spec.same_site {
        SameSite::Strict => CookieSameSite::Strict,
        SameSite::Lax => CookieSameSite::Lax,
        SameSite::None => CookieSameSite::None,
    };
    CookieParam::builder()
        .name(spec.name.clone())
        .value(spec.value.clone())
        .domain(spec.domain.clone())
        .path(spec.path.clone())
        .expires(TimeSinceEpoch::new(spec.expires))
        .http_only(spec.http_only)
        .secure(spec.secure)
        .same_site(same_site)
        .build()
        .map_err(chromium)
}

#[async_trait::async_trait]
impl BrowserSession for ChromiumSession {
    async fn new_isolated_context(
        &self,
        cookies: &[CookieSpec],
    ) -> Result<Box<dyn BrowsingContext>> {
        let browser = self.browser.read().await;
        let id = browser
            .execute(CreateBrowserContextParams::default())
            .await
            .map_err(chromium)?
            .result
            .browser_context_id;

        if !cookies.is_empty() {
            let params = cookies
                .iter()
                .map(cookie_param)
                .collect::<Result<Vec<_>>>()?;
            let mut set_cookies = SetCookiesParams::new(params);
            set_cookies.browser_context_id = Some(id.clone());
            if let Err(e) = browser.execute(set_cookies).await {
                // Context is useless without its consent state.
                if let Err(dispose) = browser.execute(DisposeBrowserContextParams::new(id)).await {
                    warn!(error = %dispose, "error disposing browsing context");
                }
                return Err(chromium(e));
            }
        }

        Ok(Box::new(ChromiumContext {
            browser: Arc::clone(&self.browser),
            id,
            pages: Mutex::new(Vec::new()),
        }))
    }

    async fn close(&self) -> Result<()> {
        let mut browser = self.browser.write().await;
        let closed = browser.close().await.map_err(chromium);
        if closed.is_ok() {
            if let Err(e) = browser.wait().await {
                warn!(error = %e, "browser process did not exit cleanly");
            }
        }
        if let Some(handler) = self.handler.lock().await.take() {
            handler.abort();
        }
        closed.map(|_| ())
    }
}

struct ChromiumContext {
    browser: Arc<RwLock<Browser>>,
    id: BrowserContextId,
    pages: Mutex<Vec<Page>>,
}

#[async_trait::async_trait]
impl BrowsingContext for ChromiumContext {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>> {
        let mut params = CreateTargetParams::new("about:blank");
        params.browser_context_id = Some(self.id.clone());

        let page = self
            .browser
            .read()
            .await
            .new_page(params)
            .await
            .map_err(chromium)?;
        self.pages.lock().await.push(page.clone());

        Ok(Box::new(ChromiumPage::attach(page).await?))
    }

    async fn read_cookies(&self, url: &str) -> Result<Vec<BrowserCookie>> {
        let page = self
            .pages
            .lock()
            .await
            .first()
            .cloned()
            .ok_or_else(|| BrowserError::ChromiumError("context has no page".to_string()))?;

        let cookies = page
            .execute(GetCookiesParams {
                urls: Some(vec![url.to_string()]),
            })
            .await
            .map_err(chromium)?
            .result
            .cookies;

        Ok(cookies
            .into_iter()
            .map(|c| BrowserCookie {
                name: c.name,
                value: c.value,
                domain: c.domain,
                path: c.path,
                expires: c.expires,
                http_only: c.http_only,
                secure: c.secure,
                same_site: c.same_site.map(|s| s.as_ref().to_string()),
            })
            .collect())
    }

    async fn close(&self) -> Result<()> {
        for page in self.pages.lock().await.drain(..) {
            if let Err(e) = page.close().await {
                debug!(error = %e, "page already closed");
            }
        }
        self.browser
            .read()
            .await
            .execute(DisposeBrowserContextParams::new(self.id.clone()))
            .await
            .map_err(chromium)?;
        Ok(())
    }
}

/// A Chromium tab with network-idle tracking attached from creation.
struct ChromiumPage {
    page: Page,
    idle: Arc<IdleTracker>,
    listeners: std::sync::Mutex<Vec<JoinHandle<()>>>,
}

impl ChromiumPage {
    async fn attach(page: Page) -> Result<Self> {
        page.execute(EnableParams::default())
            .await
            .map_err(chromium)?;

        let idle = Arc::new(IdleTracker::new());
        let mut listeners = Vec::new();

        let mut started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(chromium)?;
        let tracker = Arc::clone(&idle);
        listeners.push(tokio::spawn(async move {
            while let Some(event) = started.next().await {
                tracker.request_started(event.request_id.inner());
            }
        }));

        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(chromium)?;
        let tracker = Arc::clone(&idle);
        listeners.push(tokio::spawn(async move {
            while let Some(event) = finished.next().await {
                tracker.request_finished(event.request_id.inner());
            }
        }));

        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(chromium)?;
        let tracker = Arc::clone(&idle);
        listeners.push(tokio::spawn(async move {
            while let Some(event) = failed.next().await {
                tracker.request_finished(event.request_id.inner());
            }
        }));

        Ok(Self {
            page,
            idle,
            listeners: std::sync::Mutex::new(listeners),
        })
    }

    fn track(&self, handle: JoinHandle<()>) {
        self.listeners
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(handle);
    }

    async fn element(&self, selector: &str) -> Result<chromiumoxide::Element> {
        self.page
            .find_element(selector)
            .await
            .map_err(|_| BrowserError::SelectorNotFound(selector.to_string()))
    }
}

impl Drop for ChromiumPage {
    fn drop(&mut self) {
        let listeners = self
            .listeners
            .get_mut()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        for handle in listeners.drain(..) {
            handle.abort();
        }
    }
}

fn collect_frames(tree: &FrameTree, is_main: bool, frames: &mut Vec<FrameRef>) {
    frames.push(FrameRef {
        id: tree.frame.id.inner().clone(),
        url: tree.frame.url.clone(),
        is_main,
    });
    for child in tree.child_frames.iter().flatten() {
        collect_frames(child, false, frames);
    }
}

#[async_trait::async_trait]
impl PageActions for ChromiumPage {
    async fn click(&self, selector: &str) -> Result<()> {
        self.element(selector).await?.click().await.map_err(chromium)?;
        Ok(())
    }

    async fn fill_field(&self, selector: &str, value: &str) -> Result<()> {
        let element = self.element(selector).await?;
        element
            .call_js_fn("function() { this.value = ''; }", false)
            .await
            .map_err(chromium)?;
        element
            .click()
            .await
            .map_err(chromium)?
            .type_str(value)
            .await
            .map_err(chromium)?;
        Ok(())
    }

    async fn scroll_into_view(&self, selector: &str) -> Result<()> {
        self.element(selector)
            .await?
            .scroll_into_view()
            .await
            .map_err(chromium)?;
        Ok(())
    }

    async fn remove_element(&self, selector: &str) -> Result<()> {
        let removed = self
            .page
            .evaluate_expression(scripts::remove_element(selector))
            .await
            .map_err(chromium)?
            .value()
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false);
        if !removed {
            debug!(selector, "no element to remove");
        }
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.page
            .reload()
            .await
            .map_err(|e| BrowserError::NavigationError(e.to_string()))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl BrowserPage for ChromiumPage {
    async fn on_network_event(&self, observer: NetworkObserver) -> Result<()> {
        let mut requests = self
            .page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(chromium)?;
        let on_request = Arc::clone(&observer);
        self.track(tokio::spawn(async move {
            while let Some(event) = requests.next().await {
                on_request(NetworkEvent::Request {
                    frame_id: event.frame_id.as_ref().map(|id| id.inner().clone()),
                    url: event.request.url.clone(),
                });
            }
        }));

        let mut responses = self
            .page
            .event_listener::<EventResponseReceived>()
            .await
            .map_err(chromium)?;
        self.track(tokio::spawn(async move {
            while let Some(event) = responses.next().await {
                let security = event.response.security_details.as_ref().map(|details| {
                    CertificateSummary {
                        subject_name: details.subject_name.clone(),
                        valid_from: *details.valid_from.inner(),
                        valid_to: *details.valid_to.inner(),
                        issuer: details.issuer.clone(),
                        protocol: details.protocol.clone(),
                    }
                });
                observer(NetworkEvent::Response {
                    frame_id: event.frame_id.as_ref().map(|id| id.inner().clone()),
                    url: event.response.url.clone(),
                    security,
                });
            }
        }));

        Ok(())
    }

    async fn goto(&self, url: &str) -> Result<()> {
        self.page
            .goto(url)
            .await
            .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
        Ok(())
    }

    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<bool> {
        Ok(self.idle.wait_for_idle(timeout).await)
    }

    async fn frames(&self) -> Result<Vec<FrameRef>> {
        let tree = self
            .page
            .execute(GetFrameTreeParams::default())
            .await
            .map_err(chromium)?
            .result
            .frame_tree;

        let mut frames = Vec::new();
        collect_frames(&tree, true, &mut frames);
        Ok(frames)
    }

    async fn run_in_frame(&self, frame: &FrameRef, script: &str) -> Result<serde_json::Value> {
        let script_error = |reason: String| BrowserError::ScriptError {
            frame: frame.url.clone(),
            reason,
        };

        let context = self
            .page
            .frame_execution_context(FrameId::new(frame.id.clone()))
            .await
            .map_err(|e| script_error(e.to_string()))?
            .ok_or_else(|| script_error("no execution context".to_string()))?;

        let params = EvaluateParams::builder()
            .expression(script)
            .await_promise(true)
            .return_by_value(true)
            .context_id(context)
            .build()
            .map_err(script_error)?;

        let result = self
            .page
            .evaluate_expression(params)
            .await
            .map_err(|e| script_error(e.to_string()))?;

        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn url(&self) -> Result<String> {
        Ok(self
            .page
            .url()
            .await
            .map_err(chromium)?
            .unwrap_or_default())
    }
}
