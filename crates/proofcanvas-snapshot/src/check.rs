//! Read-only re-validation of written artifacts.
//!
//! Schema violations are errors; staleness and a missing checksum are only
//! warnings.

use chrono::{DateTime, Utc};
use proofcanvas_ingest::parse_timestamp;
use serde_json::Value;
use std::fmt;

use crate::artifacts::{read_json, ArtifactPaths};
use crate::validate::validate_snapshot;
use crate::{SnapshotError, SNAPSHOT_STALE_DAYS};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckWarning {
    /// `age_days` is `None` when `generatedAt` could not be parsed.
    Stale {
        age_days: Option<i64>,
        threshold: u32,
    },
    MissingChecksum,
}

impl fmt::Display for CheckWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckWarning::Stale { threshold, .. } => {
                write!(f, "Snapshot is stale (older than {threshold} days).")
            }
            CheckWarning::MissingChecksum => write!(f, "Meta checksum is missing."),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub source_count: usize,
    /// Whole days since generation; `None` reads as infinitely old.
    pub age_days: Option<i64>,
    pub stale_after_days: u32,
    pub warnings: Vec<CheckWarning>,
}

impl CheckReport {
    pub fn is_stale(&self) -> bool {
        self.warnings
            .iter()
            .any(|w| matches!(w, CheckWarning::Stale { .. }))
    }
}

/// Whole days (floor) between `generated_at` and `now`.
pub fn snapshot_age_days(generated_at: &str, now: DateTime<Utc>) -> Option<i64> {
    let ts = parse_timestamp(generated_at)?;
    Some((now - ts).num_milliseconds().div_euclid(86_400_000))
}

fn stale_threshold(snapshot: &Value) -> u32 {
    snapshot
        .get("snapshotDaysValid")
        .and_then(Value::as_f64)
        .filter(|days| days.is_finite() && *days > 0.0)
        .map(|days| days as u32)
        .unwrap_or(SNAPSHOT_STALE_DAYS)
}

/// Re-validate the written snapshot against the ids in its sources manifest.
pub fn check_artifacts(paths: &ArtifactPaths, now: DateTime<Utc>) -> Result<CheckReport, SnapshotError> {
    let snapshot = read_json(&paths.snapshot())?;
    let sources = read_json(&paths.sources())?;
    let meta = read_json(&paths.meta())?;

    let source_ids: Vec<String> = sources
        .get("sources")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(|s| s.get("id").and_then(Value::as_str))
        .map(str::to_string)
        .collect();

    let validation = validate_snapshot(&snapshot, &source_ids);
    if !validation.is_valid() {
        return Err(SnapshotError::Validation(validation.errors));
    }

    let age_days = snapshot
        .get("generatedAt")
        .and_then(Value::as_str)
        .and_then(|ts| snapshot_age_days(ts, now));
    let stale_after_days = stale_threshold(&snapshot);

    let mut warnings = Vec::new();
    if age_days.map_or(true, |age| age > i64::from(stale_after_days)) {
        warnings.push(CheckWarning::Stale {
            age_days,
            threshold: stale_after_days,
        });
    }
    let has_checksum = meta
        .get("checksum")
        .and_then(Value::as_str)
        .is_some_and(|c| !c.trim().is_empty());
    if !has_checksum {
        warnings.push(CheckWarning::MissingChecksum);
    }

    Ok(CheckReport {
        source_count: source_ids.len(),
        age_days,
        stale_after_days,
        warnings,
    })
}
