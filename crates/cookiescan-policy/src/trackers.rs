//! Known tracking domains from a public blocklist.

use reqwest::Client;
use tracing::{info, warn};

/// Blocklist used when the configuration names none.
pub const DEFAULT_BLOCKLIST_URL: &str =
    "https://blocklistproject.github.io/Lists/alt-version/tracking-nl.txt";

/// One domain per line; `#` lines are comments.
#[must_use]
pub fn parse_blocklist(text: &str) -> Vec<String> {
    text.split('\n')
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::trim)
        .filter(|line| line.len() > 1)
        .map(str::to_string)
        .collect()
}

async fn download(client: &Client, url: &str) -> reqwest::Result<String> {
    client.get(url).send().await?.error_for_status()?.text().await
}

/// Download the blocklist. Any failure yields an empty list.
pub async fn fetch_tracking_domains(client: &Client, url: &str) -> Vec<String> {
    let text = download(client, url).await;

    match text {
        Ok(text) => {
            let domains = parse_blocklist(&text);
            info!(count = domains.len(), "fetched tracking domains");
            domains
        }
        Err(e) => {
            warn!(url, error = %e, "error fetching tracking domains");
            Vec::new()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_parse_blocklist() {
        let text = "# Title: Tracking\n#\n\n0.0.0.0\ntrack.example.com\n  ads.example.net \nx\n";
        assert_eq!(
            parse_blocklist(text),
            vec!["0.0.0.0", "track.example.com", "ads.example.net"]
        );
    }

    #[test]
    fn test_parse_blocklist_crlf() {
        assert_eq!(parse_blocklist("a.com\r\nb.com\r\n"), vec!["a.com", "b.com"]);
    }

    #[tokio::test]
    async fn test_fetch_tracking_domains() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("# list\nmatomo.example\n"))
            .mount(&server)
            .await;

        let domains = fetch_tracking_domains(&Client::new(), &server.uri()).await;
        assert_eq!(domains, vec!["matomo.example"]);
    }

    #[tokio::test]
    async fn test_fetch_failure_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        assert!(fetch_tracking_domains(&Client::new(), &server.uri())
            .await
            .is_empty());
    }
}
