//! Centralized configuration for followscan.
//!
//! Constant groups hold the defaults; [`PipelineConfig`] is the runtime
//! configuration assembled by callers (the server maps its CLI onto it).

use crate::network::FetchOptions;
use std::path::PathBuf;
use std::time::Duration;

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(15);
    pub const MAX_RETRIES: u32 = 3;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
    pub const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);
    pub const USER_AGENT: &'static str =
        "Mozilla/5.0 (X11; Linux x86_64) followscan/0.1 (+responsible-crawl)";
}

/// Pipeline defaults.
pub struct PipelineDefaults;

impl PipelineDefaults {
    pub const LISTING_URL: &'static str = "https://www.coingecko.com/";
    pub const LIMIT: usize = 150;
    pub const MAX_PAGES: u32 = 5;
    pub const PAGE_PARAM: &'static str = "page";
    /// Minimum spacing between two requests to the same host.
    pub const MIN_INTERVAL: Duration = Duration::from_millis(1500);
    pub const SOCIAL_DOMAINS: &'static [&'static str] = &["twitter.com", "x.com"];
    pub const PROFILE_URL_TEMPLATE: &'static str = "https://x.com/{handle}";
    pub const EXPORT_PREFIX: &'static str = "followscan_";
    /// Spacing of market-data-only refreshes.
    pub const MARKET_REFRESH_INTERVAL: Duration = Duration::from_secs(600);
}

/// Runtime configuration for one orchestrator.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub listing_url: String,
    pub limit: usize,
    /// Query parameter used to page through the listing; `None` disables paging.
    pub page_param: Option<String>,
    pub max_pages: u32,
    pub fetch: FetchOptions,
    pub min_interval: Duration,
    pub social_domains: Vec<String>,
    /// Profile URL used when the listing did not provide one. `{handle}` is substituted.
    pub profile_url_template: String,
    /// Directory for snapshot exports; `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            listing_url: PipelineDefaults::LISTING_URL.to_string(),
            limit: PipelineDefaults::LIMIT,
            page_param: Some(PipelineDefaults::PAGE_PARAM.to_string()),
            max_pages: PipelineDefaults::MAX_PAGES,
            fetch: FetchOptions::default(),
            min_interval: PipelineDefaults::MIN_INTERVAL,
            social_domains: PipelineDefaults::SOCIAL_DOMAINS
                .iter()
                .map(|d| d.to_string())
                .collect(),
            profile_url_template: PipelineDefaults::PROFILE_URL_TEMPLATE.to_string(),
            data_dir: None,
        }
    }
}

impl PipelineConfig {
    pub fn new(listing_url: impl Into<String>) -> Self {
        Self {
            listing_url: listing_url.into(),
            ..Self::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Query parameter used for listing pages after the first; `None` reads one page.
    pub fn with_page_param(mut self, param: Option<String>) -> Self {
        self.page_param = param;
        self
    }

    pub fn with_max_pages(mut self, pages: u32) -> Self {
        self.max_pages = pages;
        self
    }

    pub fn with_fetch_options(mut self, fetch: FetchOptions) -> Self {
        self.fetch = fetch;
        self
    }

    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    pub fn with_social_domains(mut self, domains: Vec<String>) -> Self {
        self.social_domains = domains;
        self
    }

    /// Profile URL with a `{handle}` placeholder.
    pub fn with_profile_url_template(mut self, template: impl Into<String>) -> Self {
        self.profile_url_template = template.into();
        self
    }

    /// Directory that receives snapshot exports.
    pub fn with_data_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.data_dir = dir;
        self
    }

    /// Build the profile URL for a handle from the template.
    pub fn profile_url_for(&self, handle: &str) -> String {
        self.profile_url_template.replace("{handle}", handle)
    }

    /// Reject configurations the pipeline cannot run with.
    pub fn validate(&self) -> crate::Result<()> {
        if url::Url::parse(&self.listing_url).is_err() {
            return Err(crate::FollowscanError::Config {
                message: format!("invalid listing URL: {}", self.listing_url),
            });
        }
        if self.limit == 0 {
            return Err(crate::FollowscanError::Config {
                message: "limit must be at least 1".to_string(),
            });
        }
        if self.social_domains.is_empty() {
            return Err(crate::FollowscanError::Config {
                message: "at least one social domain is required".to_string(),
            });
        }
        if !self.profile_url_template.contains("{handle}") {
            return Err(crate::FollowscanError::Config {
                message: "profile URL template must contain {handle}".to_string(),
            });
        }
        Ok(())
    }
}
