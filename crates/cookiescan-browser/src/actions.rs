use crate::error::{BrowserError, Result};

/// Scripted interactions applied to a page after it settles.
#[async_trait::async_trait]
pub trait PageActions: Send + Sync {
    /// Click an element by selector
    async fn click(&self, selector: &str) -> Result<()>;

    /// Replace the value of a form field by selector
    async fn fill_field(&self, selector: &str, value: &str) -> Result<()>;

    /// Scroll an element into the viewport
    async fn scroll_into_view(&self, selector: &str) -> Result<()>;

    /// Remove an element from the DOM; a missing element is not an error
    async fn remove_element(&self, selector: &str) -> Result<()>;

    /// Reload the current page and wait for the load event
    async fn reload(&self) -> Result<()>;
}

/// Host of a request or frame URL, used as the domain key in scan reports.
///
/// URLs without a host (`data:`, `about:blank`, `blob:`) are rejected.
pub fn extract_domain(url: &str) -> Result<String> {
    let parsed = url::Url::parse(url)
        .map_err(|e| BrowserError::NavigationError(format!("{url}: {e}")))?;
    match parsed.host_str() {
        Some(host) if !host.is_empty() => Ok(host.to_ascii_lowercase()),
        _ => Err(BrowserError::NavigationError(format!("{url}: no host"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://www.hel.fi/fi/asuminen").unwrap(),
            "www.hel.fi"
        );
        assert_eq!(
            extract_domain("http://kartta.hel.fi:8080/?setlanguage=fi").unwrap(),
            "kartta.hel.fi"
        );
    }

    #[test]
    fn test_extract_domain_without_host() {
        assert!(extract_domain("not-a-url").is_err());
        assert!(extract_domain("data:text/html,hello").is_err());
        assert!(extract_domain("about:blank").is_err());
    }
}
