//! Run sequencing: listing, carry-over, resolution, merge, commit.

pub mod merge;
mod orchestrator;

pub use orchestrator::{Orchestrator, TriggerOutcome};
