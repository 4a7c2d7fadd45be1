//! Result Store: the most recent merged dataset.
//!
//! Snapshots are immutable once built and shared behind an `Arc`. A commit
//! builds the whole new snapshot first and then swaps the pointer under a
//! short write lock, so readers see either the previous or the new snapshot.

mod export;
mod seed;

pub use export::{atomic_write_json, SnapshotExporter};
pub use seed::seed_snapshot;

use crate::models::{MarketQuote, MergedRecord, Snapshot, SnapshotOrigin};
use crate::{FollowscanError, Result};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

pub struct ResultStore {
    current: RwLock<Arc<Snapshot>>,
    exporter: Option<SnapshotExporter>,
    /// Serializes exports so the newest snapshot is always written last.
    export_gate: Mutex<()>,
}

impl ResultStore {
    /// In-memory store starting from the seed snapshot.
    pub fn new() -> Self {
        Self {
            current: RwLock::new(Arc::new(seed_snapshot())),
            exporter: None,
            export_gate: Mutex::new(()),
        }
    }

    /// Store that exports every commit into `data_dir` and starts from the
    /// newest export found there.
    ///
    /// An unreadable export is logged and the seed is used instead.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        let exporter = SnapshotExporter::new(data_dir);
        let initial = match exporter.load_latest() {
            Ok(Some(mut snapshot)) => {
                info!(
                    "Loaded {} records from previous export in {}",
                    snapshot.len(),
                    exporter.dir().display()
                );
                snapshot.origin = SnapshotOrigin::Run;
                snapshot
            }
            Ok(None) => seed_snapshot(),
            Err(e) => {
                warn!("Ignoring previous export: {}", e);
                seed_snapshot()
            }
        };
        Self {
            current: RwLock::new(Arc::new(initial)),
            exporter: Some(exporter),
            export_gate: Mutex::new(()),
        }
    }

    /// Current snapshot. Returns the seed until something was committed.
    pub async fn get(&self) -> Arc<Snapshot> {
        self.current.read().await.clone()
    }

    /// Replace the current snapshot with `records`.
    ///
    /// The records are validated first; an invalid set leaves the store
    /// unchanged. Export failures are logged and do not undo the commit.
    pub async fn commit(
        &self,
        records: Vec<MergedRecord>,
        origin: SnapshotOrigin,
    ) -> Result<Arc<Snapshot>> {
        Self::validate(&records)?;
        let snapshot = Arc::new(Snapshot::new(records, origin));

        *self.current.write().await = snapshot.clone();
        info!(
            "Committed {} records ({:?}): {}",
            snapshot.len(),
            origin,
            snapshot.coverage().summary()
        );

        self.export().await;
        Ok(snapshot)
    }

    /// Update price and market cap of the current records from `quotes`,
    /// matched by `source_id`. Returns how many records changed.
    ///
    /// Social data, ranks and origin are kept. A quote that reads as zero
    /// keeps the previous value. The read and the swap happen under one
    /// write lock, so a concurrent commit is never reverted.
    pub async fn apply_market_quotes(&self, quotes: &[MarketQuote]) -> Result<usize> {
        let by_id: HashMap<&str, &MarketQuote> = quotes
            .iter()
            .map(|quote| (quote.source_id.as_str(), quote))
            .collect();

        let (snapshot, changed) = {
            let mut current = self.current.write().await;
            let mut data = current.data.clone();
            let mut changed = 0;
            for record in &mut data {
                let Some(quote) = by_id.get(record.source_id.as_str()) else {
                    continue;
                };
                let price = quoted_or(quote.price, record.price);
                let market_cap = quoted_or(quote.market_cap, record.market_cap);
                if price != record.price || market_cap != record.market_cap {
                    debug!(
                        "{}: price {} -> {}, market cap {} -> {}",
                        record.name, record.price, price, record.market_cap, market_cap
                    );
                    record.price = price;
                    record.market_cap = market_cap;
                    changed += 1;
                }
            }
            if changed == 0 {
                return Ok(0);
            }

            Self::validate(&data)?;
            let snapshot = Arc::new(Snapshot::new(data, current.origin));
            *current = snapshot.clone();
            (snapshot, changed)
        };

        info!(
            "Refreshed market data for {} of {} records",
            changed,
            snapshot.len()
        );
        self.export().await;
        Ok(changed)
    }

    /// Validate and commit an externally supplied set. Returns the record count.
    pub async fn ingest(&self, records: Vec<MergedRecord>) -> Result<usize> {
        let snapshot = self.commit(records, SnapshotOrigin::Ingested).await?;
        Ok(snapshot.len())
    }

    /// Well-formedness check: at least one record, ranks ≥ 1 and unique,
    /// non-empty names, finite non-negative market cap and price.
    pub fn validate(records: &[MergedRecord]) -> Result<()> {
        if records.is_empty() {
            return Err(FollowscanError::validation(
                "data",
                "must contain at least one record",
            ));
        }

        let mut ranks = HashSet::with_capacity(records.len());
        for record in records {
            if record.rank == 0 {
                return Err(FollowscanError::validation("rank", "ranks start at 1"));
            }
            if !ranks.insert(record.rank) {
                return Err(FollowscanError::validation(
                    "rank",
                    format!("duplicate rank {}", record.rank),
                ));
            }
            if record.name.trim().is_empty() {
                return Err(FollowscanError::validation(
                    "name",
                    format!("rank {} has an empty name", record.rank),
                ));
            }
            for (field, value) in [("market_cap", record.market_cap), ("price", record.price)] {
                if !value.is_finite() || value < 0.0 {
                    return Err(FollowscanError::validation(
                        field,
                        format!("rank {} has invalid {} {}", record.rank, field, value),
                    ));
                }
            }
        }
        Ok(())
    }

    /// Write the current snapshot to the data directory, if one is set.
    /// Failures are logged; the in-memory snapshot stands.
    async fn export(&self) {
        let Some(exporter) = &self.exporter else {
            return;
        };
        let _gate = self.export_gate.lock().await;
        let exporter = exporter.clone();
        let latest = self.get().await;
        let written = tokio::task::spawn_blocking(move || exporter.write(&latest)).await;
        match written {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => error!("Snapshot export failed: {}", e),
            Err(e) => error!("Snapshot export task failed: {}", e),
        }
    }
}

fn quoted_or(quoted: f64, previous: f64) -> f64 {
    if quoted.is_finite() && quoted > 0.0 {
        quoted
    } else {
        previous
    }
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ListingRecord;
    use chrono::Utc;
    use tempfile::TempDir;

    fn record(rank: u32, name: &str) -> MergedRecord {
        MergedRecord::without_handle(
            ListingRecord {
                rank,
                name: name.to_string(),
                symbol: name.to_uppercase(),
                source_id: name.to_lowercase(),
                detail_url: None,
                handle: None,
                profile_url: None,
                market_cap: 100.0,
                price: 1.0,
            },
            Utc::now(),
        )
    }

    #[tokio::test]
    async fn test_empty_store_serves_seed() {
        let store = ResultStore::new();
        let snapshot = store.get().await;
        assert_eq!(snapshot.origin, SnapshotOrigin::Seed);
        assert_eq!(*snapshot, seed_snapshot());
    }

    #[tokio::test]
    async fn test_commit_replaces_and_orders_by_rank() {
        let store = ResultStore::new();
        let before = store.get().await;

        store
            .commit(vec![record(2, "Beta"), record(1, "Alpha")], SnapshotOrigin::Run)
            .await
            .unwrap();

        let after = store.get().await;
        assert_eq!(after.origin, SnapshotOrigin::Run);
        let names: Vec<_> = after.data.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Beta"]);

        // Readers holding the old Arc keep a complete old snapshot
        assert_eq!(before.origin, SnapshotOrigin::Seed);
        assert_eq!(*before, seed_snapshot());
    }

    #[tokio::test]
    async fn test_invalid_ingest_leaves_snapshot_unchanged() {
        let store = ResultStore::new();
        let err = store
            .ingest(vec![record(1, "Alpha"), record(1, "Again")])
            .await
            .unwrap_err();
        assert_eq!(err.status_code(), 400);
        assert_eq!(store.get().await.origin, SnapshotOrigin::Seed);
    }

    #[test]
    fn test_validate_rules() {
        assert!(ResultStore::validate(&[record(1, "A")]).is_ok());
        assert!(ResultStore::validate(&[]).is_err());
        assert!(ResultStore::validate(&[record(0, "A")]).is_err());
        assert!(ResultStore::validate(&[record(1, "  ")]).is_err());

        let mut negative = record(1, "A");
        negative.price = -1.0;
        assert!(ResultStore::validate(&[negative]).is_err());

        let mut nan = record(1, "A");
        nan.market_cap = f64::NAN;
        assert!(ResultStore::validate(&[nan]).is_err());
    }

    fn quote(source_id: &str, price: f64, market_cap: f64) -> MarketQuote {
        MarketQuote {
            source_id: source_id.to_string(),
            price,
            market_cap,
        }
    }

    #[tokio::test]
    async fn test_market_quotes_update_prices_and_keep_social_data() {
        let store = ResultStore::new();
        let before = store.get().await;
        let bitcoin = before.find_by_source_id("bitcoin").unwrap().clone();
        let ethereum = before.find_by_source_id("ethereum").unwrap().clone();

        let changed = store
            .apply_market_quotes(&[
                quote("bitcoin", 70_000.0, 1.4e12),
                // Unreadable price keeps the previous one
                quote("ethereum", 0.0, 4.2e11),
                quote("not-in-snapshot", 1.0, 1.0),
            ])
            .await
            .unwrap();
        assert_eq!(changed, 2);

        let after = store.get().await;
        assert_eq!(after.origin, SnapshotOrigin::Seed);
        assert_eq!(after.len(), before.len());

        let refreshed = after.find_by_source_id("bitcoin").unwrap();
        assert_eq!(refreshed.price, 70_000.0);
        assert_eq!(refreshed.market_cap, 1.4e12);
        assert_eq!(refreshed.rank, bitcoin.rank);
        assert_eq!(refreshed.handle, bitcoin.handle);
        assert_eq!(refreshed.social, bitcoin.social);

        let refreshed = after.find_by_source_id("ethereum").unwrap();
        assert_eq!(refreshed.price, ethereum.price);
        assert_eq!(refreshed.market_cap, 4.2e11);
    }

    #[tokio::test]
    async fn test_unchanged_market_quotes_commit_nothing() {
        let store = ResultStore::new();
        let before = store.get().await;
        let bitcoin = before.find_by_source_id("bitcoin").unwrap();

        let changed = store
            .apply_market_quotes(&[quote("bitcoin", bitcoin.price, bitcoin.market_cap)])
            .await
            .unwrap();
        assert_eq!(changed, 0);
        assert!(Arc::ptr_eq(&before, &store.get().await));
    }

    #[tokio::test]
    async fn test_market_refresh_is_exported() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::with_data_dir(dir.path());
        store.ingest(vec![record(1, "Alpha")]).await.unwrap();

        store
            .apply_market_quotes(&[quote("alpha", 3.0, 300.0)])
            .await
            .unwrap();

        let reopened = ResultStore::with_data_dir(dir.path());
        let snapshot = reopened.get().await;
        assert_eq!(snapshot.data[0].price, 3.0);
        assert_eq!(snapshot.data[0].market_cap, 300.0);
    }

    #[tokio::test]
    async fn test_commit_exports_and_reloads() {
        let dir = TempDir::new().unwrap();
        let store = ResultStore::with_data_dir(dir.path());
        assert_eq!(store.get().await.origin, SnapshotOrigin::Seed);

        let count = store.ingest(vec![record(1, "Alpha")]).await.unwrap();
        assert_eq!(count, 1);

        let reopened = ResultStore::with_data_dir(dir.path());
        let snapshot = reopened.get().await;
        assert_eq!(snapshot.origin, SnapshotOrigin::Run);
        assert_eq!(snapshot.data[0].name, "Alpha");
    }
}
