//! Network gateway trait and the reqwest-backed implementation.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;

use super::{FetchError, Request, Response};

/// HTTP request timeout in seconds.
/// 30s allows for slow API responses while failing fast enough for good UX.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// The network seam. `Err` means the network itself failed (timeout, DNS,
/// connection refused); an HTTP error status comes back as `Ok` with the
/// status set, so callers decide what counts as success.
#[async_trait]
pub trait Gateway: Send + Sync {
    async fn send(&self, request: &Request) -> Result<Response, FetchError>;
}

/// reqwest-backed gateway.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    base_url: String,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Path-only URLs are resolved against the configured base; absolute
    /// URLs pass through untouched.
    fn resolve(&self, url: &str) -> String {
        if url.starts_with("http://") || url.starts_with("https://") {
            url.to_string()
        } else {
            format!("{}{}", self.base_url, url)
        }
    }
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn send(&self, request: &Request) -> Result<Response, FetchError> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| FetchError::InvalidRequest(format!("bad method: {}", request.method)))?;

        let mut builder = self.client.request(method, self.resolve(&request.url));
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = &request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.to_string(), v.to_string()))
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_joins_paths_against_base() {
        let gateway = HttpGateway::new("https://example.edu/").unwrap();
        assert_eq!(
            gateway.resolve("/api/sessions"),
            "https://example.edu/api/sessions"
        );
        assert_eq!(
            gateway.resolve("https://cdn.example.edu/icon.png"),
            "https://cdn.example.edu/icon.png"
        );
    }
}
