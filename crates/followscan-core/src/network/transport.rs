//! Transport abstraction for HTTP GETs.
//!
//! [`Transport`] is the seam between the pipeline and the outside world.
//! [`ReqwestTransport`] is the production implementation; tests plug in a
//! scripted transport instead.

use crate::config::NetworkConfig;
use crate::error::FetchError;
use crate::{FollowscanError, Result};
use async_trait::async_trait;
use reqwest::{header, Client};
use std::time::Duration;
use tracing::debug;

/// A raw HTTP response as seen by the fetcher.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed `Retry-After` header (delta-seconds form only).
    pub retry_after_secs: Option<u64>,
    pub body: String,
}

impl TransportResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after_secs: None,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after_secs: None,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Performs a single GET. No retries, no pacing.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn get(&self, url: &str, timeout: Duration) -> std::result::Result<TransportResponse, FetchError>;
}

/// `reqwest`-backed transport.
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        Self::with_user_agent(NetworkConfig::USER_AGENT)
    }

    pub fn with_user_agent(user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(NetworkConfig::REQUEST_TIMEOUT)
            .build()
            .map_err(|e| FollowscanError::Config {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn get(&self, url: &str, timeout: Duration) -> std::result::Result<TransportResponse, FetchError> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| map_reqwest_error(url, timeout, e))?;

        let status = response.status().as_u16();
        let retry_after_secs = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(parse_retry_after);

        let body = response
            .text()
            .await
            .map_err(|e| map_reqwest_error(url, timeout, e))?;

        debug!("GET {} -> {} ({} bytes)", url, status, body.len());

        Ok(TransportResponse {
            status,
            retry_after_secs,
            body,
        })
    }
}

fn map_reqwest_error(url: &str, timeout: Duration, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            url: url.to_string(),
            timeout,
        }
    } else {
        FetchError::Connection {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Parse a `Retry-After` value given in seconds.
///
/// HTTP-date values are ignored; the caller falls back to its own backoff.
pub fn parse_retry_after(value: &str) -> Option<u64> {
    value.trim().parse::<u64>().ok()
}

/// Extract the host from a URL, used as the pacing key.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .ok()
        .and_then(|u| {
            u.host_str().map(|host| match u.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            })
        })
        .unwrap_or_else(|| "unknown".to_string())
}
