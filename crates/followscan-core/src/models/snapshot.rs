use super::merged::{CoverageStats, MergedRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SnapshotOrigin {
    Seed,
    Run,
    Ingested,
}

/// A complete merged dataset, ordered by rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub data: Vec<MergedRecord>,
    pub completed_at: DateTime<Utc>,
    pub origin: SnapshotOrigin,
}

impl Snapshot {
    pub fn new(mut data: Vec<MergedRecord>, origin: SnapshotOrigin) -> Self {
        data.sort_by_key(|r| r.rank);
        Self {
            data,
            completed_at: Utc::now(),
            origin,
        }
    }

    pub fn coverage(&self) -> CoverageStats {
        CoverageStats::from_records(&self.data)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn find_by_source_id(&self, source_id: &str) -> Option<&MergedRecord> {
        self.data.iter().find(|r| r.source_id == source_id)
    }
}
