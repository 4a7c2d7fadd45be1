//! Merged listing + follower records and their wire format.

use super::follower::{FollowerCount, FollowerRecord};
use super::listing::ListingRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Social coverage of a merged record.
///
/// The three states are kept apart on purpose: coverage statistics count
/// "no handle" and "handle but unresolved" separately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SocialStatus {
    NoHandle,
    Unresolved { reason: String },
    Resolved { followers: u64 },
}

impl SocialStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SocialStatus::NoHandle => "no_handle",
            SocialStatus::Unresolved { .. } => "unresolved",
            SocialStatus::Resolved { .. } => "resolved",
        }
    }

    pub fn followers(&self) -> Option<u64> {
        match self {
            SocialStatus::Resolved { followers } => Some(*followers),
            _ => None,
        }
    }
}

impl From<FollowerCount> for SocialStatus {
    fn from(count: FollowerCount) -> Self {
        match count {
            FollowerCount::Resolved { followers } => SocialStatus::Resolved { followers },
            FollowerCount::Unresolved { reason } => SocialStatus::Unresolved { reason },
        }
    }
}

/// A listing record joined with the outcome of its follower resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MergedRecordWire", into = "MergedRecordWire")]
pub struct MergedRecord {
    pub rank: u32,
    pub name: String,
    pub symbol: String,
    pub source_id: String,
    pub detail_url: Option<String>,
    pub handle: Option<String>,
    pub profile_url: Option<String>,
    pub social: SocialStatus,
    pub market_cap: f64,
    pub price: f64,
    pub last_updated: DateTime<Utc>,
}

impl MergedRecord {
    /// Merge a listing record that has no social handle.
    pub fn without_handle(listing: ListingRecord, at: DateTime<Utc>) -> Self {
        Self::from_parts(listing, SocialStatus::NoHandle, at)
    }

    /// Merge a listing record with its resolver outcome.
    pub fn with_followers(listing: ListingRecord, record: FollowerRecord) -> Self {
        let at = record.resolved_at;
        Self::from_parts(listing, record.followers.into(), at)
    }

    /// Merge a listing record whose profile could not be fetched at all.
    pub fn unresolved(listing: ListingRecord, reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self::from_parts(
            listing,
            SocialStatus::Unresolved {
                reason: reason.into(),
            },
            at,
        )
    }

    fn from_parts(listing: ListingRecord, social: SocialStatus, at: DateTime<Utc>) -> Self {
        // A record without a handle can only ever be NoHandle
        let social = if listing.handle.is_none() {
            SocialStatus::NoHandle
        } else {
            social
        };
        Self {
            rank: listing.rank,
            name: listing.name,
            symbol: listing.symbol,
            source_id: listing.source_id,
            detail_url: listing.detail_url,
            handle: listing.handle,
            profile_url: listing.profile_url,
            social,
            market_cap: listing.market_cap,
            price: listing.price,
            last_updated: at,
        }
    }

    pub fn followers(&self) -> Option<u64> {
        self.social.followers()
    }
}

/// JSON shape of a merged record at the HTTP boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergedRecordWire {
    pub rank: u32,
    pub name: String,
    pub symbol: String,
    #[serde(default)]
    pub source_id: String,
    #[serde(default)]
    pub detail_url: Option<String>,
    pub handle: Option<String>,
    #[serde(default)]
    pub profile_url: Option<String>,
    pub followers: Option<u64>,
    /// `resolved`, `unresolved` or `no_handle`; inferred when absent.
    #[serde(default)]
    pub social_status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unresolved_reason: Option<String>,
    pub market_cap: f64,
    pub price: f64,
    pub last_updated: DateTime<Utc>,
}

impl From<MergedRecord> for MergedRecordWire {
    fn from(record: MergedRecord) -> Self {
        let social_status = Some(record.social.as_str().to_string());
        let followers = record.social.followers();
        let unresolved_reason = match record.social {
            SocialStatus::Unresolved { reason } => Some(reason),
            _ => None,
        };
        Self {
            rank: record.rank,
            name: record.name,
            symbol: record.symbol,
            source_id: record.source_id,
            detail_url: record.detail_url,
            handle: record.handle,
            profile_url: record.profile_url,
            followers,
            social_status,
            unresolved_reason,
            market_cap: record.market_cap,
            price: record.price,
            last_updated: record.last_updated,
        }
    }
}

impl TryFrom<MergedRecordWire> for MergedRecord {
    type Error = String;

    fn try_from(wire: MergedRecordWire) -> Result<Self, Self::Error> {
        let has_handle = wire.handle.as_deref().is_some_and(|h| !h.is_empty());
        let inferred = match (has_handle, wire.followers) {
            (false, _) => "no_handle",
            (true, Some(_)) => "resolved",
            (true, None) => "unresolved",
        };
        let status = wire.social_status.as_deref().unwrap_or(inferred);

        let social = match (status, has_handle, wire.followers) {
            ("no_handle", false, None) => SocialStatus::NoHandle,
            ("resolved", true, Some(followers)) => SocialStatus::Resolved { followers },
            ("unresolved", true, None) => SocialStatus::Unresolved {
                reason: wire
                    .unresolved_reason
                    .unwrap_or_else(|| "unresolved".to_string()),
            },
            ("no_handle" | "resolved" | "unresolved", _, _) => {
                return Err(format!(
                    "rank {}: social_status {:?} is inconsistent with handle {:?} and followers {:?}",
                    wire.rank, status, wire.handle, wire.followers
                ));
            }
            (other, _, _) => {
                return Err(format!("rank {}: unknown social_status {:?}", wire.rank, other));
            }
        };

        Ok(Self {
            rank: wire.rank,
            name: wire.name,
            symbol: wire.symbol,
            source_id: wire.source_id,
            detail_url: wire.detail_url,
            handle: if has_handle { wire.handle } else { None },
            profile_url: wire.profile_url,
            social,
            market_cap: wire.market_cap,
            price: wire.price,
            last_updated: wire.last_updated,
        })
    }
}

/// Per-state counts over a merged set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageStats {
    pub total: usize,
    pub with_handle: usize,
    pub resolved: usize,
    pub unresolved: usize,
    pub no_handle: usize,
}

impl CoverageStats {
    pub fn from_records(records: &[MergedRecord]) -> Self {
        let mut stats = Self::default();
        for record in records {
            stats.record(&record.social);
        }
        stats
    }

    pub fn record(&mut self, social: &SocialStatus) {
        self.total += 1;
        match social {
            SocialStatus::NoHandle => self.no_handle += 1,
            SocialStatus::Unresolved { .. } => {
                self.with_handle += 1;
                self.unresolved += 1;
            }
            SocialStatus::Resolved { .. } => {
                self.with_handle += 1;
                self.resolved += 1;
            }
        }
    }

    /// Human-readable summary, e.g. "8 of 10 handles resolved (2 without handle)".
    pub fn summary(&self) -> String {
        format!(
            "{} of {} handles resolved ({} without handle)",
            self.resolved, self.with_handle, self.no_handle
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn listing(rank: u32, handle: Option<&str>) -> ListingRecord {
        ListingRecord {
            rank,
            name: format!("Coin {rank}"),
            symbol: format!("C{rank}"),
            source_id: format!("coin-{rank}"),
            detail_url: None,
            handle: handle.map(str::to_string),
            profile_url: handle.map(|h| format!("https://x.com/{h}")),
            market_cap: 1_000.0,
            price: 1.0,
        }
    }

    #[test]
    fn test_three_states_stay_distinct() {
        let now = Utc::now();
        let none = MergedRecord::without_handle(listing(1, None), now);
        let failed = MergedRecord::unresolved(listing(2, Some("beta")), "timeout", now);
        let resolved = MergedRecord::with_followers(
            listing(3, Some("gamma")),
            FollowerRecord::from_display("gamma", "850K"),
        );

        assert_eq!(none.social, SocialStatus::NoHandle);
        assert_eq!(failed.social.as_str(), "unresolved");
        assert_eq!(resolved.followers(), Some(850_000));

        let stats = CoverageStats::from_records(&[none, failed, resolved]);
        assert_eq!(stats.total, 3);
        assert_eq!(stats.with_handle, 2);
        assert_eq!(stats.resolved, 1);
        assert_eq!(stats.unresolved, 1);
        assert_eq!(stats.no_handle, 1);
        assert_eq!(stats.summary(), "1 of 2 handles resolved (1 without handle)");
    }

    #[test]
    fn test_handleless_record_cannot_be_resolved() {
        let merged = MergedRecord::with_followers(
            listing(1, None),
            FollowerRecord::from_display("ghost", "10"),
        );
        assert_eq!(merged.social, SocialStatus::NoHandle);
    }

    #[test]
    fn test_wire_format_fields() {
        let merged = MergedRecord::with_followers(
            listing(1, Some("alpha")),
            FollowerRecord::from_display("alpha", "2.5M"),
        );
        let value = serde_json::to_value(&merged).unwrap();
        assert_eq!(value["rank"], 1);
        assert_eq!(value["handle"], "alpha");
        assert_eq!(value["followers"], 2_500_000);
        assert_eq!(value["social_status"], "resolved");
        assert!(value.get("unresolved_reason").is_none());

        let none = MergedRecord::without_handle(listing(2, None), Utc::now());
        let value = serde_json::to_value(&none).unwrap();
        assert!(value["handle"].is_null());
        assert!(value["followers"].is_null());
        assert_eq!(value["social_status"], "no_handle");
    }

    #[test]
    fn test_wire_infers_status_when_absent() {
        let record: MergedRecord = serde_json::from_value(json!({
            "rank": 4, "name": "Delta", "symbol": "DLT",
            "handle": "delta", "followers": null,
            "market_cap": 10.0, "price": 0.5,
            "last_updated": "2026-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(matches!(record.social, SocialStatus::Unresolved { .. }));
    }

    #[test]
    fn test_wire_rejects_inconsistent_status() {
        let result: Result<MergedRecord, _> = serde_json::from_value(json!({
            "rank": 1, "name": "A", "symbol": "A",
            "handle": null, "followers": 10,
            "social_status": "resolved",
            "market_cap": 1.0, "price": 1.0,
            "last_updated": "2026-01-01T00:00:00Z"
        }));
        assert!(result.is_err());
    }
}
