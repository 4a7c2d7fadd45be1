//! Network access for the pipeline.
//!
//! This module provides:
//! - A [`Transport`] seam with a `reqwest` implementation
//! - Retry logic with exponential backoff and `Retry-After` support
//! - Per-host pacing so no host is hit faster than the configured interval
//! - The [`Fetcher`], which combines the three

mod fetcher;
mod pacer;
mod retry;
mod transport;

pub use fetcher::{FetchOptions, Fetcher};
pub use pacer::HostPacer;
pub use retry::{retry_async, RetryConfig, RetryDecision, RetryStats};
pub use transport::{extract_domain, parse_retry_after, ReqwestTransport, Transport, TransportResponse};
