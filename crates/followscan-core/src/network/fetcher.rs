//! Single-resource retrieval with timeout, retry, backoff and pacing.

use super::pacer::HostPacer;
use super::retry::{retry_async, RetryConfig, RetryDecision};
use super::transport::Transport;
use crate::config::NetworkConfig;
use crate::error::FetchError;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Per-call fetch options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Timeout for one attempt.
    pub timeout: Duration,
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            timeout: NetworkConfig::REQUEST_TIMEOUT,
            max_retries: NetworkConfig::MAX_RETRIES,
            base_delay: NetworkConfig::RETRY_BASE_DELAY,
            max_delay: NetworkConfig::RETRY_MAX_DELAY,
        }
    }
}

impl FetchOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    fn retry_config(&self) -> RetryConfig {
        RetryConfig::new()
            .with_max_attempts(self.max_retries.saturating_add(1))
            .with_base_delay(self.base_delay)
            .with_max_delay(self.max_delay)
    }
}

/// The only component that talks to the network.
#[derive(Clone)]
pub struct Fetcher {
    transport: Arc<dyn Transport>,
    pacer: HostPacer,
}

impl Fetcher {
    pub fn new(transport: Arc<dyn Transport>, pacer: HostPacer) -> Self {
        Self { transport, pacer }
    }

    pub fn pacer(&self) -> &HostPacer {
        &self.pacer
    }

    /// GET `url` and return its body.
    ///
    /// Transient failures (timeouts, connection errors, 408, 429, 5xx) are
    /// retried with exponential backoff; a 429 with `Retry-After` waits for
    /// the hinted time instead. Other 4xx fail immediately with
    /// [`FetchError::HttpStatus`]. When every attempt fails transiently the
    /// result is [`FetchError::ExhaustedRetries`].
    pub async fn fetch(&self, url: &str, options: &FetchOptions) -> Result<String, FetchError> {
        let config = options.retry_config();

        let (result, stats) = retry_async(
            &config,
            || self.attempt(url, options.timeout),
            classify,
        )
        .await;

        match result {
            Ok(body) => Ok(body),
            Err(err) if stats.exhausted => Err(FetchError::ExhaustedRetries {
                url: url.to_string(),
                attempts: stats.attempts,
                last_error: Box::new(err),
            }),
            Err(err) => Err(err),
        }
    }

    async fn attempt(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        self.pacer.wait(url).await;
        debug!("GET {}", url);

        let response = tokio::time::timeout(timeout, self.transport.get(url, timeout))
            .await
            .map_err(|_| FetchError::Timeout {
                url: url.to_string(),
                timeout,
            })??;

        if response.is_success() {
            Ok(response.body)
        } else {
            Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: response.status,
                retry_after_secs: response.retry_after_secs,
            })
        }
    }
}

fn classify(err: &FetchError) -> RetryDecision {
    if !err.is_retryable() {
        return RetryDecision::Stop;
    }
    match err.retry_after() {
        Some(wait) => RetryDecision::RetryAfter(wait),
        None => RetryDecision::Retry,
    }
}
