//! Fixed dataset served before any run has committed.

use crate::models::{
    FollowerCount, FollowerRecord, ListingRecord, MergedRecord, Snapshot, SnapshotOrigin,
};
use chrono::{DateTime, Utc};

// (rank, name, symbol, source_id, handle, followers, market_cap, price)
type SeedRow = (
    u32,
    &'static str,
    &'static str,
    &'static str,
    Option<&'static str>,
    Option<u64>,
    f64,
    f64,
);

const SEED_ROWS: &[SeedRow] = &[
    (1, "Bitcoin", "BTC", "bitcoin", Some("bitcoin"), Some(6_900_000), 1_350_000_000_000.0, 68_000.0),
    (2, "Ethereum", "ETH", "ethereum", Some("ethereum"), Some(3_900_000), 420_000_000_000.0, 3_500.0),
    (3, "Tether", "USDT", "tether", Some("Tether_to"), Some(480_000), 110_000_000_000.0, 1.0),
    (4, "BNB", "BNB", "binancecoin", Some("BNBCHAIN"), Some(3_600_000), 85_000_000_000.0, 580.0),
    (5, "Solana", "SOL", "solana", Some("solana"), Some(2_900_000), 70_000_000_000.0, 150.0),
    (6, "Wrapped Bitcoin", "WBTC", "wrapped-bitcoin", None, None, 10_000_000_000.0, 68_000.0),
];

// 2025-01-01T00:00:00Z
const SEED_TIMESTAMP: i64 = 1_735_689_600;

/// The seed snapshot. Its timestamps are fixed so repeated calls compare equal.
pub fn seed_snapshot() -> Snapshot {
    let at: DateTime<Utc> = DateTime::from_timestamp(SEED_TIMESTAMP, 0).unwrap_or_default();

    let data = SEED_ROWS
        .iter()
        .map(|&(rank, name, symbol, source_id, handle, followers, market_cap, price)| {
            let listing = ListingRecord {
                rank,
                name: name.to_string(),
                symbol: symbol.to_string(),
                source_id: source_id.to_string(),
                detail_url: Some(format!("https://www.coingecko.com/en/coins/{source_id}")),
                handle: handle.map(str::to_string),
                profile_url: handle.map(|h| format!("https://x.com/{h}")),
                market_cap,
                price,
            };
            match (handle, followers) {
                (Some(handle), Some(followers)) => MergedRecord::with_followers(
                    listing,
                    FollowerRecord {
                        handle: handle.to_string(),
                        followers: FollowerCount::Resolved { followers },
                        raw: None,
                        resolved_at: at,
                    },
                ),
                _ => MergedRecord::without_handle(listing, at),
            }
        })
        .collect();

    Snapshot {
        data,
        completed_at: at,
        origin: SnapshotOrigin::Seed,
    }
}
