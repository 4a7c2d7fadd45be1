//! Error types for followscan.
//!
//! Three layers of failure exist in the pipeline:
//! - [`FetchError`]: a single network retrieval failed (transport level).
//! - [`ResolutionError`]: a whole stage endpoint was unreachable.
//! - Per-record "unresolved" outcomes, which are data and not errors
//!   (see [`crate::models::SocialStatus`]).

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Failure of one `Fetcher::fetch` call.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    #[error("Request to {url} timed out after {timeout:?}")]
    Timeout { url: String, timeout: Duration },

    #[error("Connection to {url} failed: {message}")]
    Connection { url: String, message: String },

    #[error("GET {url} returned HTTP {status}")]
    HttpStatus {
        url: String,
        status: u16,
        /// Seconds from a `Retry-After` header, if the server sent one.
        retry_after_secs: Option<u64>,
    },

    #[error("Gave up on {url} after {attempts} attempts: {last_error}")]
    ExhaustedRetries {
        url: String,
        attempts: u32,
        last_error: Box<FetchError>,
    },
}

impl FetchError {
    /// Stable machine-readable reason.
    pub fn reason(&self) -> &'static str {
        match self {
            FetchError::Timeout { .. } => "timeout",
            FetchError::Connection { .. } => "connection",
            FetchError::HttpStatus { .. } => "http_status",
            FetchError::ExhaustedRetries { .. } => "exhausted_retries",
        }
    }

    /// Whether another attempt may succeed.
    ///
    /// Timeouts, connection failures, 408, 429 and 5xx are transient. Every
    /// other 4xx is permanent.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Connection { .. } => true,
            FetchError::HttpStatus { status, .. } => {
                matches!(status, 408 | 429) || (500..600).contains(status)
            }
            FetchError::ExhaustedRetries { .. } => false,
        }
    }

    /// Server-provided wait hint for 429 responses.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            FetchError::HttpStatus {
                status: 429,
                retry_after_secs: Some(secs),
                ..
            } => Some(Duration::from_secs(*secs)),
            _ => None,
        }
    }
}

/// Failure of an entire resolution stage endpoint.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolutionError {
    #[error("listing source unavailable: {source}")]
    ListingUnavailable {
        url: String,
        #[source]
        source: FetchError,
    },

    #[error("profile unavailable for @{handle}: {source}")]
    ProfileUnavailable {
        handle: String,
        #[source]
        source: FetchError,
    },
}

impl ResolutionError {
    pub fn reason(&self) -> &'static str {
        match self {
            ResolutionError::ListingUnavailable { .. } => "listing_unavailable",
            ResolutionError::ProfileUnavailable { .. } => "profile_unavailable",
        }
    }
}

/// Main error type for the followscan library.
#[derive(Debug, Error)]
pub enum FollowscanError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Run cancelled")]
    Cancelled,

    #[error("A run is already in progress")]
    Busy,

    #[error("{0}")]
    Other(String),
}

/// Result type alias for followscan operations.
pub type Result<T> = std::result::Result<T, FollowscanError>;

impl From<std::io::Error> for FollowscanError {
    fn from(err: std::io::Error) -> Self {
        FollowscanError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for FollowscanError {
    fn from(err: serde_json::Error) -> Self {
        FollowscanError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl FollowscanError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        FollowscanError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        FollowscanError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// HTTP status code to report at the server boundary.
    pub fn status_code(&self) -> u16 {
        match self {
            FollowscanError::Validation { .. } | FollowscanError::Json { .. } => 400,
            FollowscanError::Resolution(_) | FollowscanError::Fetch(_) => 502,
            FollowscanError::Cancelled | FollowscanError::Busy => 409,
            _ => 500,
        }
    }
}
