use cookiescan_browser::BrowserError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PolicyError>;

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("policy endpoint {url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("browser error: {0}")]
    Browser(#[from] BrowserError),

    #[error("consent widget did not appear on {url}")]
    ConsentWidgetTimeout { url: String },

    #[error("helfi-cookie-consents cookie not found on {url}")]
    ConsentCookieMissing { url: String },

    #[error("malformed consent cookie: {0}")]
    MalformedConsentCookie(String),
}
