//! Per-host request pacing.
//!
//! Every outgoing request waits on the pacer first, so no host ever sees more
//! than one request per `min_interval`, regardless of how many callers share
//! the fetcher.

use super::transport::extract_domain;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use std::sync::Arc;
use std::time::Duration;
use tracing::trace;

#[derive(Clone)]
pub struct HostPacer {
    limiter: Option<Arc<DefaultKeyedRateLimiter<String>>>,
    min_interval: Duration,
}

impl HostPacer {
    /// A zero interval disables pacing.
    pub fn new(min_interval: Duration) -> Self {
        let limiter = Quota::with_period(min_interval).map(|quota| Arc::new(RateLimiter::keyed(quota)));
        Self {
            limiter,
            min_interval,
        }
    }

    pub fn disabled() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Wait until a request to `url`'s host is allowed.
    pub async fn wait(&self, url: &str) {
        let Some(limiter) = &self.limiter else {
            return;
        };
        let host = extract_domain(url);
        if limiter.check_key(&host).is_ok() {
            return;
        }
        trace!("Pacing request to {}", host);
        limiter.until_key_ready(&host).await;
    }
}

impl std::fmt::Debug for HostPacer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostPacer")
            .field("min_interval", &self.min_interval)
            .field("enabled", &self.limiter.is_some())
            .finish()
    }
}
