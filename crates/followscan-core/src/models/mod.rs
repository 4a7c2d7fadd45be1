//! Data types shared across the pipeline.

mod follower;
mod listing;
mod merged;
mod snapshot;
mod status;

pub use follower::{parse_follower_count, FollowerCount, FollowerRecord};
pub use listing::{ListingRecord, MarketQuote};
pub use merged::{CoverageStats, MergedRecord, MergedRecordWire, SocialStatus};
pub use snapshot::{Snapshot, SnapshotOrigin};
pub use status::{RunProgress, RunState, RunStatus};
