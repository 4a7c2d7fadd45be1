//! Atomic JSON export of committed snapshots.
//!
//! Writes go to a temp file in the target directory, are synced, then renamed
//! over the final name, so a reader never sees a half-written export.

use crate::config::PipelineDefaults;
use crate::models::Snapshot;
use crate::{FollowscanError, Result};
use chrono::{DateTime, Utc};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process;
use tracing::{debug, info};

/// Writes `followscan_<date>.json` files into a data directory.
#[derive(Debug, Clone)]
pub struct SnapshotExporter {
    dir: PathBuf,
}

impl SnapshotExporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Export path for a snapshot completed at `at`. One file per day; later
    /// runs on the same day replace earlier ones.
    pub fn path_for(&self, at: DateTime<Utc>) -> PathBuf {
        self.dir.join(format!(
            "{}{}.json",
            PipelineDefaults::EXPORT_PREFIX,
            at.format("%Y-%m-%d")
        ))
    }

    pub fn write(&self, snapshot: &Snapshot) -> Result<PathBuf> {
        let path = self.path_for(snapshot.completed_at);
        atomic_write_json(&path, snapshot)?;
        info!("Exported {} records to {}", snapshot.len(), path.display());
        Ok(path)
    }

    /// Load the newest export, if any.
    pub fn load_latest(&self) -> Result<Option<Snapshot>> {
        let Some(path) = self.latest_path()? else {
            return Ok(None);
        };
        debug!("Loading previous export {}", path.display());
        let contents =
            fs::read_to_string(&path).map_err(|e| FollowscanError::io_with_path(e, &path))?;
        let snapshot = serde_json::from_str(&contents).map_err(|e| FollowscanError::Json {
            message: format!("Failed to parse {}: {}", path.display(), e),
            source: Some(e),
        })?;
        Ok(Some(snapshot))
    }

    fn latest_path(&self) -> Result<Option<PathBuf>> {
        if !self.dir.exists() {
            return Ok(None);
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| FollowscanError::io_with_path(e, &self.dir))?;

        // Date-stamped names sort chronologically
        let latest = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| {
                        n.starts_with(PipelineDefaults::EXPORT_PREFIX) && n.ends_with(".json")
                    })
            })
            .max();
        Ok(latest)
    }
}

/// Serialize `data` and atomically replace `path` with it.
pub fn atomic_write_json<T: serde::Serialize>(path: &Path, data: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| FollowscanError::io_with_path(e, parent))?;
    }

    let serialized = serde_json::to_string_pretty(data)?;
    let temp_path = path.with_extension(format!("json.{}.tmp", process::id()));

    {
        let mut file =
            File::create(&temp_path).map_err(|e| FollowscanError::io_with_path(e, &temp_path))?;
        file.write_all(serialized.as_bytes())
            .map_err(|e| FollowscanError::io_with_path(e, &temp_path))?;
        file.sync_all()
            .map_err(|e| FollowscanError::io_with_path(e, &temp_path))?;
    }

    if let Err(e) = fs::rename(&temp_path, path) {
        let _ = fs::remove_file(&temp_path);
        return Err(FollowscanError::io_with_path(e, path));
    }
    Ok(())
}
