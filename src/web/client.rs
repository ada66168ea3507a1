use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use url::Url;
use uuid::Uuid;

use super::http::{send_with_retry, RetryPolicy};
use super::types::{
    PageContent, PageLink, ReadUrlRequest, ReadUrlResponse, SearchRequest, SearchResponse,
    SearchResult,
};
use super::WebSource;
use crate::config::HttpConfig;
use crate::error::{ToolError, ToolResult};

const READ_URL_ENDPOINT: &str = "api/read-url";
const SEARCH_ENDPOINT: &str = "api/duckduckgo-search";

const USER_AGENT: &str = concat!("toolsmith/", env!("CARGO_PKG_VERSION"));

/// Client for the hosting collaborator's fetch and search endpoints.
pub struct HostWebClient {
    client: Client,
    base_url: String,
    read_policy: RetryPolicy,
    search_policy: RetryPolicy,
}

impl HostWebClient {
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Url::parse(&config.host_url)
            .with_context(|| format!("Invalid host URL: {}", config.host_url))?;

        Ok(Self {
            client,
            base_url: config.host_url.clone(),
            read_policy: RetryPolicy::new(config.read_url_attempts),
            search_policy: RetryPolicy::new(config.search_attempts),
        })
    }

    /// Override the first retry delay (tests use milliseconds).
    #[cfg(test)]
    pub fn with_base_delay(mut self, delay: std::time::Duration) -> Self {
        self.read_policy.base_delay = delay;
        self.search_policy.base_delay = delay;
        self
    }

    fn build_url(base_url: &str, endpoint: &str) -> ToolResult<Url> {
        let base = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };
        let base = Url::parse(&base)
            .map_err(|e| ToolError::BadRequest(format!("Invalid base URL {}: {}", base_url, e)))?;
        base.join(endpoint).map_err(|e| {
            ToolError::BadRequest(format!("Failed to build URL for {}: {}", endpoint, e))
        })
    }

    async fn post_json<B, R>(
        &self,
        endpoint: &str,
        body: &B,
        policy: RetryPolicy,
        cancel: &CancellationToken,
    ) -> ToolResult<R>
    where
        B: Serialize,
        R: DeserializeOwned,
    {
        let url = Self::build_url(&self.base_url, endpoint)?;
        let request_id = Uuid::new_v4().to_string();
        debug!(url = %url, request_id = %request_id, "host request");

        let response = send_with_retry(
            || {
                self.client
                    .post(url.clone())
                    .header("Content-Type", "application/json")
                    .header("User-Agent", USER_AGENT)
                    .header("x-request-id", &request_id)
                    .json(body)
            },
            policy,
            cancel,
        )
        .await?;

        let text = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ToolError::Timeout("Request cancelled".to_string())),
            text = response.text() => text,
        }
        .map_err(|e| ToolError::Transient(format!("Failed to read response from {}: {}", url, e)))?;

        serde_json::from_str(&text)
            .map_err(|e| ToolError::Transient(format!("Invalid response from {}: {}", url, e)))
    }
}

#[async_trait]
impl WebSource for HostWebClient {
    async fn read_url(&self, url: &str, cancel: &CancellationToken) -> ToolResult<PageContent> {
        let parsed = Url::parse(url)
            .map_err(|e| ToolError::BadRequest(format!("Invalid URL '{}': {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ToolError::BadRequest(format!(
                "Only http(s) URLs can be read: {}",
                url
            )));
        }

        let response: ReadUrlResponse = self
            .post_json(READ_URL_ENDPOINT, &ReadUrlRequest { url }, self.read_policy, cancel)
            .await?;
        Ok(PageContent {
            url: url.to_string(),
            content: response.content,
            links: response.links.into_iter().map(PageLink::from).collect(),
        })
    }

    async fn search(&self, query: &str, cancel: &CancellationToken) -> ToolResult<Vec<SearchResult>> {
        if query.trim().is_empty() {
            return Err(ToolError::BadRequest("Search query must not be empty".to_string()));
        }
        let response: SearchResponse = self
            .post_json(
                SEARCH_ENDPOINT,
                &SearchRequest { query },
                self.search_policy,
                cancel,
            )
            .await?;
        Ok(response.results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ErrorKind;
    use std::time::Duration;

    #[test]
    fn test_build_url() {
        let url = HostWebClient::build_url("http://127.0.0.1:3000", READ_URL_ENDPOINT).unwrap();
        assert_eq!(url.as_str(), "http://127.0.0.1:3000/api/read-url");

        let url = HostWebClient::build_url("https://host.dev/proxy/", SEARCH_ENDPOINT).unwrap();
        assert_eq!(url.as_str(), "https://host.dev/proxy/api/duckduckgo-search");
    }

    fn client_for(host_url: String) -> HostWebClient {
        let mut config = Config::default().http;
        config.host_url = host_url;
        config.timeout = Duration::from_secs(2);
        HostWebClient::new(&config)
            .unwrap()
            .with_base_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transient() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let client = client_for(format!("http://127.0.0.1:{}", port));
        let err = client
            .search("rust", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Transient);
        assert!(err.message().contains("2 attempt(s)"));
    }

    #[tokio::test]
    async fn test_cancelled_before_send() {
        let client = client_for("http://127.0.0.1:9".to_string());
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = client.read_url("https://a.dev", &cancel).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_rejects_non_http_urls() {
        let client = client_for("http://127.0.0.1:9".to_string());
        let err = client
            .read_url("file:///etc/passwd", &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadRequest);
    }
}
