//! reqwest-backed implementation of [`PageSource`].

use crate::error::{ApiError, ApiResult};
use crate::types::{PageResponse, PageSource};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use std::time::Duration;
use tracing::{debug, error};
use url::Url;

/// Default per-request timeout. A timeout counts as a transient failure.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Connection settings for [`FieldApiClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub base_url: String,
    pub request_timeout: Duration,
}

impl ClientConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

/// REST client for the field-sales backend.
#[derive(Clone)]
pub struct FieldApiClient {
    http_client: reqwest::Client,
    base_url: Url,
}

impl FieldApiClient {
    pub fn new(config: ClientConfig) -> ApiResult<Self> {
        let mut base_url = Url::parse(&config.base_url)
            .map_err(|e| ApiError::Config(format!("invalid base URL '{}': {e}", config.base_url)))?;
        if base_url.cannot_be_a_base() {
            return Err(ApiError::Config(format!(
                "base URL '{}' cannot carry a path",
                config.base_url
            )));
        }
        // Without a trailing slash `join` would replace the last segment.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| ApiError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    fn collection_url(&self, collection: &str) -> ApiResult<Url> {
        self.base_url
            .join(collection.trim_start_matches('/'))
            .map_err(|e| ApiError::Config(format!("invalid collection '{collection}': {e}")))
    }

    /// Map a non-success response to [`ApiError::Status`].
    async fn check_response(&self, response: reqwest::Response) -> ApiResult<reqwest::Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status().as_u16();
        let retry_after = parse_retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        error!(status, %body, "Backend request failed");
        Err(ApiError::Status {
            status,
            message: body,
            retry_after,
        })
    }
}

/// `Retry-After` in delta-seconds form. HTTP-date values are ignored.
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}

#[async_trait]
impl PageSource for FieldApiClient {
    async fn fetch_page(
        &self,
        collection: &str,
        offset: u64,
        limit: u32,
        bearer: &str,
    ) -> ApiResult<PageResponse> {
        let url = self.collection_url(collection)?;
        debug!(collection, offset, limit, "Fetching page");

        let response = self
            .http_client
            .get(url)
            .query(&[("offset", offset.to_string()), ("limit", limit.to_string())])
            .bearer_auth(bearer)
            .send()
            .await?;
        let response = self.check_response(response).await?;

        let body = response.bytes().await?;
        let page: PageResponse = serde_json::from_slice(&body)?;
        debug!(collection, offset, items = page.items.len(), total = page.total, "Fetched page");
        Ok(page)
    }
}

impl std::fmt::Debug for FieldApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldApiClient")
            .field("base_url", &self.base_url.as_str())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_collection_url_keeps_base_path() {
        let client = FieldApiClient::new(ClientConfig::new("https://api.example.com/v2")).unwrap();
        assert_eq!(
            client.collection_url("leads").unwrap().as_str(),
            "https://api.example.com/v2/leads"
        );
        assert_eq!(
            client.collection_url("/customers").unwrap().as_str(),
            "https://api.example.com/v2/customers"
        );
    }

    #[test]
    fn test_invalid_base_url() {
        let err = FieldApiClient::new(ClientConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn test_parse_retry_after() {
        let mut headers = HeaderMap::new();
        assert_eq!(parse_retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("12"));
        assert_eq!(parse_retry_after(&headers), Some(Duration::from_secs(12)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2026 07:28:00 GMT"));
        assert_eq!(parse_retry_after(&headers), None);
    }
}
