//! Followscan Core - headless listing discovery and follower resolution.
//!
//! Discovers ranked projects and their social handles from a listing source,
//! resolves each handle to a follower count, merges both datasets and keeps
//! the latest merged snapshot. The HTTP surface lives in `followscan-server`.
//!
//! # Example
//!
//! ```rust,ignore
//! use followscan_core::{Orchestrator, PipelineConfig};
//!
//! #[tokio::main]
//! async fn main() -> followscan_core::Result<()> {
//!     let config = PipelineConfig::new("https://www.coingecko.com/").with_limit(20);
//!     let orchestrator = Orchestrator::with_reqwest(config)?;
//!
//!     let status = orchestrator.run_to_completion().await?;
//!     println!("{}: {}", status.state, status.message);
//!
//!     let snapshot = orchestrator.store().get().await;
//!     println!("{} records", snapshot.len());
//!     Ok(())
//! }
//! ```

pub mod cancel;
pub mod config;
pub mod error;
pub mod models;
pub mod network;
pub mod pipeline;
pub mod resolver;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use cancel::CancellationToken;
pub use config::{NetworkConfig, PipelineConfig, PipelineDefaults};
pub use error::{FetchError, FollowscanError, ResolutionError, Result};
pub use models::{
    CoverageStats, FollowerCount, FollowerRecord, ListingRecord, MarketQuote, MergedRecord,
    RunProgress, RunState, RunStatus, SocialStatus, Snapshot, SnapshotOrigin,
};
pub use network::{FetchOptions, Fetcher, ReqwestTransport, Transport, TransportResponse};
pub use pipeline::{Orchestrator, TriggerOutcome};
pub use store::ResultStore;
