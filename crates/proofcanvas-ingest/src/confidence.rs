//! Base confidence per source
//!
//! Two independent signals, each bucketed to a 0-100 score:
//! - the declared freshness label (substring match, highest priority first)
//! - days since the last edit
//!
//! blended as `round(freshness * 0.58 + age * 0.42)`.

use chrono::{DateTime, NaiveDate, Utc};

pub const FRESHNESS_WEIGHT: f64 = 0.58;
pub const AGE_WEIGHT: f64 = 0.42;

/// Age score used when the last-edit timestamp cannot be parsed.
pub const UNPARSABLE_AGE_SCORE: u8 = 55;

/// Score a freshness label.
pub fn freshness_score(freshness: &str) -> u8 {
    let value = freshness.to_lowercase();
    if value.contains("verified") {
        90
    } else if value.contains("aktivní") || value.contains("active") {
        82
    } else if value.contains("expired") || value.contains("stale") {
        46
    } else {
        64
    }
}

/// Parse an ISO-8601 timestamp (full RFC 3339, or a bare date at midnight UTC).
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Some(ts.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Fractional days between `then` and `now`; future timestamps count as zero.
pub fn age_days(then: DateTime<Utc>, now: DateTime<Utc>) -> f64 {
    let millis = (now - then).num_milliseconds().max(0);
    millis as f64 / 86_400_000.0
}

/// Score the recency of the last edit.
pub fn age_score(last_edited: Option<&str>, now: DateTime<Utc>) -> u8 {
    let Some(ts) = last_edited.and_then(parse_timestamp) else {
        return UNPARSABLE_AGE_SCORE;
    };

    let days = age_days(ts, now);
    if days <= 7.0 {
        92
    } else if days <= 30.0 {
        82
    } else if days <= 90.0 {
        70
    } else if days <= 180.0 {
        58
    } else {
        46
    }
}

/// Blend freshness and age into the base confidence (0-100).
pub fn base_confidence(freshness: &str, last_edited: Option<&str>, now: DateTime<Utc>) -> u8 {
    let blended = f64::from(freshness_score(freshness)) * FRESHNESS_WEIGHT
        + f64::from(age_score(last_edited, now)) * AGE_WEIGHT;
    blended.round().clamp(0.0, 100.0) as u8
}
