//! Follower counts and their display-text parsing.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static DISPLAY_COUNT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9]+)(?:\.([0-9]+))?([KkMmBb])?$").expect("display count regex must compile")
});

/// Outcome of reading a follower count from a profile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FollowerCount {
    Resolved { followers: u64 },
    Unresolved { reason: String },
}

impl FollowerCount {
    pub fn value(&self) -> Option<u64> {
        match self {
            FollowerCount::Resolved { followers } => Some(*followers),
            FollowerCount::Unresolved { .. } => None,
        }
    }

    pub fn unresolved(reason: impl Into<String>) -> Self {
        FollowerCount::Unresolved {
            reason: reason.into(),
        }
    }
}

/// Result of one Handle Resolver attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowerRecord {
    pub handle: String,
    pub followers: FollowerCount,
    /// The displayed text the count was read from, when one was found.
    pub raw: Option<String>,
    pub resolved_at: DateTime<Utc>,
}

impl FollowerRecord {
    /// Build a record from displayed text, marking it unresolved if the text
    /// does not parse.
    pub fn from_display(handle: impl Into<String>, text: &str) -> Self {
        let followers = match parse_follower_count(text) {
            Some(followers) => FollowerCount::Resolved { followers },
            None => FollowerCount::unresolved(format!("unparseable follower count: {:?}", text)),
        };
        Self {
            handle: handle.into(),
            followers,
            raw: Some(text.to_string()),
            resolved_at: Utc::now(),
        }
    }

    pub fn unresolved(handle: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
            followers: FollowerCount::unresolved(reason),
            raw: None,
            resolved_at: Utc::now(),
        }
    }
}

/// Parse a displayed follower count into an integer.
///
/// Accepts plain integers (`"987"`), comma-grouped integers (`"12,345"`) and
/// `K`/`M`/`B` scaled values with optional decimals (`"1.2M"`, `"850k"`).
/// Fractions below one unit are truncated. Anything else yields `None`.
pub fn parse_follower_count(text: &str) -> Option<u64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| *c != ',' && !c.is_whitespace())
        .collect();

    let caps = DISPLAY_COUNT_RE.captures(&cleaned)?;
    let whole: u64 = caps[1].parse().ok()?;
    let fraction = caps.get(2).map(|m| m.as_str());

    let scale: u64 = match caps.get(3).map(|m| m.as_str().to_ascii_uppercase()) {
        None => {
            // "12.5" without a suffix is not a count
            return fraction.is_none().then_some(whole);
        }
        Some(suffix) => match suffix.as_str() {
            "K" => 1_000,
            "M" => 1_000_000,
            "B" => 1_000_000_000,
            _ => return None,
        },
    };

    let mut total = whole.checked_mul(scale)?;
    if let Some(digits) = fraction {
        // Integer math keeps "1.2M" exact; digits finer than one unit drop off
        let mut unit = scale;
        for digit in digits.bytes().map(|b| u64::from(b - b'0')) {
            unit /= 10;
            if unit == 0 {
                break;
            }
            total = total.checked_add(digit * unit)?;
        }
    }
    Some(total)
}
