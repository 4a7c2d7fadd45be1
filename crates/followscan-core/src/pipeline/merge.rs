//! Helpers that prepare listing records for the resolution stage.

use crate::config::PipelineConfig;
use crate::models::{ListingRecord, Snapshot, SnapshotOrigin};
use tracing::debug;

/// Fill in handles the detail pages did not yield from the previous snapshot,
/// matched by `source_id`. Seed data is never used as a source.
pub fn apply_known_handles(records: Vec<ListingRecord>, previous: &Snapshot) -> Vec<ListingRecord> {
    if previous.origin == SnapshotOrigin::Seed {
        return records;
    }

    records
        .into_iter()
        .map(|record| {
            if record.has_handle() {
                return record;
            }
            match previous
                .find_by_source_id(&record.source_id)
                .and_then(|known| known.handle.clone().map(|h| (h, known.profile_url.clone())))
            {
                Some((handle, profile_url)) => {
                    debug!("{}: reusing known handle @{}", record.name, handle);
                    record.with_handle(handle, profile_url)
                }
                None => record,
            }
        })
        .collect()
}

/// Point a record's profile URL at the configured profile endpoint.
pub fn canonical_profile(record: ListingRecord, config: &PipelineConfig) -> ListingRecord {
    match record.handle.clone() {
        Some(handle) => {
            let url = config.profile_url_for(&handle);
            record.with_handle(handle, Some(url))
        }
        None => record,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MergedRecord;
    use chrono::Utc;

    fn listing(rank: u32, id: &str, handle: Option<&str>) -> ListingRecord {
        ListingRecord {
            rank,
            name: id.to_uppercase(),
            symbol: id.to_uppercase(),
            source_id: id.to_string(),
            detail_url: None,
            handle: handle.map(str::to_string),
            profile_url: handle.map(|h| format!("https://twitter.com/{h}")),
            market_cap: 1.0,
            price: 1.0,
        }
    }

    fn previous(origin: SnapshotOrigin) -> Snapshot {
        Snapshot::new(
            vec![MergedRecord::unresolved(
                listing(5, "beta", Some("beta_io")),
                "timeout",
                Utc::now(),
            )],
            origin,
        )
    }

    #[test]
    fn test_known_handle_is_carried_over_by_source_id() {
        let records = apply_known_handles(
            vec![listing(1, "alpha", Some("alpha")), listing(2, "beta", None)],
            &previous(SnapshotOrigin::Run),
        );
        assert_eq!(records[0].handle.as_deref(), Some("alpha"));
        assert_eq!(records[1].handle.as_deref(), Some("beta_io"));
        // Rank comes from the current listing, not the old snapshot
        assert_eq!(records[1].rank, 2);
    }

    #[test]
    fn test_seed_snapshot_is_not_a_handle_source() {
        let records =
            apply_known_handles(vec![listing(1, "beta", None)], &previous(SnapshotOrigin::Seed));
        assert_eq!(records[0].handle, None);
    }

    #[test]
    fn test_canonical_profile_uses_template() {
        let config = PipelineConfig::default().with_profile_url_template("http://profiles.test/{handle}");
        let record = canonical_profile(listing(1, "alpha", Some("alpha")), &config);
        assert_eq!(record.profile_url.as_deref(), Some("http://profiles.test/alpha"));

        let bare = canonical_profile(listing(2, "beta", None), &config);
        assert_eq!(bare.profile_url, None);
    }
}
