use crate::actions::PageActions;
use crate::error::Result;
use crate::network::NetworkObserver;
use cookiescan_core::CookieSpec;
use std::time::Duration;

/// Whether a browser process shows a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Visibility {
    /// No window
    Headless,
    /// Visible window, used for debugging and pages that misbehave headless
    Headful,
}

impl Visibility {
    /// Map a page's `headless` flag to a visibility mode.
    #[must_use]
    pub fn from_headless(headless: bool) -> Self {
        if headless {
            Self::Headless
        } else {
            Self::Headful
        }
    }

    #[must_use]
    pub fn is_headless(self) -> bool {
        self == Self::Headless
    }
}

/// A frame present in a page at inspection time.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameRef {
    pub id: String,
    pub url: String,
    /// Top-level frame of the page
    pub is_main: bool,
}

/// A cookie as reported by the browser's cookie jar.
#[derive(Debug, Clone, PartialEq)]
pub struct BrowserCookie {
    pub name: String,
    pub value: String,
    pub domain: String,
    pub path: String,
    /// Unix seconds, `-1` for session cookies
    pub expires: f64,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<String>,
}

/// Starts browser processes.
#[async_trait::async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Launch one browser process in the given visibility mode.
    async fn launch(&self, visibility: Visibility) -> Result<Box<dyn BrowserSession>>;
}

/// One running browser process, shared by the tasks of a visibility mode.
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    /// Create a browsing context with its own cookie jar and storage,
    /// pre-seeded with `cookies`.
    async fn new_isolated_context(&self, cookies: &[CookieSpec])
        -> Result<Box<dyn BrowsingContext>>;

    /// Shut the browser process down.
    async fn close(&self) -> Result<()>;
}

/// An isolated browsing context. Nothing leaks between two contexts.
#[async_trait::async_trait]
pub trait BrowsingContext: Send + Sync {
    async fn new_page(&self) -> Result<Box<dyn BrowserPage>>;

    /// Cookies that would be sent to `url`.
    async fn read_cookies(&self, url: &str) -> Result<Vec<BrowserCookie>>;

    /// Close every page and discard the context.
    async fn close(&self) -> Result<()>;
}

/// A page inside a browsing context.
#[async_trait::async_trait]
pub trait BrowserPage: PageActions + Send + Sync {
    /// Register an observer for requests and responses issued by any frame.
    ///
    /// Must be called before [`BrowserPage::goto`] to see the initial requests.
    async fn on_network_event(&self, observer: NetworkObserver) -> Result<()>;

    /// Navigate and wait for the load event.
    async fn goto(&self, url: &str) -> Result<()>;

    /// Wait until no request has been in flight for a short quiet window.
    ///
    /// Returns `false` when `timeout` elapsed first.
    async fn wait_for_network_idle(&self, timeout: Duration) -> Result<bool>;

    /// Frames currently attached to the page, main frame first.
    async fn frames(&self) -> Result<Vec<FrameRef>>;

    /// Evaluate `script` in `frame`, awaiting a returned promise.
    async fn run_in_frame(&self, frame: &FrameRef, script: &str) -> Result<serde_json::Value>;

    /// Current URL of the main frame.
    async fn url(&self) -> Result<String>;
}
