//! Shared coercion helpers for untrusted model JSON.
//!
//! Nothing in here fails: every helper maps arbitrary input onto the contract's
//! domain, falling back to a caller-chosen default.

use serde_json::Value;

use crate::schema::{LedgerStatus, PercentageRow, Tone, TriggerStatus};

/// Read a JSON value as a finite number.
///
/// Numbers pass through, numeric strings are parsed after trimming (an empty
/// string reads as 0), booleans read as 1/0. Anything else is `None`.
pub fn number_of(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                0.0
            } else {
                s.parse::<f64>().ok()?
            }
        }
        Value::Bool(b) => f64::from(u8::from(*b)),
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Clamp into `[min, max]`; non-numeric or missing input yields `fallback`.
pub fn clamp_number(value: Option<&Value>, min: f64, max: f64, fallback: f64) -> f64 {
    match value.and_then(number_of) {
        Some(n) if n < min => min,
        Some(n) if n > max => max,
        Some(n) => n,
        None => fallback,
    }
}

/// Clamp into 0..=100 and round to an integer score.
pub fn clamp_score(value: Option<&Value>, fallback: u8) -> u8 {
    clamp_number(value, 0.0, 100.0, f64::from(fallback)).round() as u8
}

/// Trimmed text of a scalar; empty for null, missing, arrays and objects.
pub fn text_of(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

// ============================================================================
// Percentages
// ============================================================================

/// Rescale non-negative weights into integer percentages summing to exactly 100.
///
/// All-zero weights are split equally with the remainder on the last row. After
/// rounding, the deviation from 100 is absorbed by the first row (spilling onto
/// later rows only if the first would go negative).
pub fn normalize_percentage_rows(rows: &[(String, f64)]) -> Vec<PercentageRow> {
    if rows.is_empty() {
        return Vec::new();
    }

    let weights: Vec<f64> = rows
        .iter()
        .map(|(_, w)| if w.is_finite() { w.max(0.0) } else { 0.0 })
        .collect();
    let sum: f64 = weights.iter().sum();
    let n = rows.len();

    let values: Vec<i64> = if sum <= 0.0 {
        let equal = 100 / n as i64;
        (0..n)
            .map(|i| {
                if i == n - 1 {
                    100 - equal * (n as i64 - 1)
                } else {
                    equal
                }
            })
            .collect()
    } else {
        let mut values: Vec<i64> = weights
            .iter()
            .map(|w| (w / sum * 100.0).round() as i64)
            .collect();
        let mut delta = 100 - values.iter().sum::<i64>();
        for value in values.iter_mut() {
            if delta == 0 {
                break;
            }
            let adjusted = (*value + delta).max(0);
            delta -= adjusted - *value;
            *value = adjusted;
        }
        values
    };

    rows.iter()
        .zip(values)
        .map(|((label, _), value)| PercentageRow {
            label: label.clone(),
            value: value.max(0) as u32,
        })
        .collect()
}

// ============================================================================
// Enums
// ============================================================================

/// Map free text onto a ledger status; the first matching rule wins.
pub fn normalize_ledger_status(status: &str) -> LedgerStatus {
    let s = status.trim().to_lowercase();
    if s.contains("valid") {
        LedgerStatus::Validated
    } else if s.contains("risk") {
        LedgerStatus::Risky
    } else if s.contains("plan") {
        LedgerStatus::Planned
    } else if s.contains("progress") {
        LedgerStatus::InValidation
    } else {
        LedgerStatus::Planned
    }
}

pub fn normalize_trigger_status(status: &str) -> TriggerStatus {
    let s = status.trim().to_lowercase();
    if s.contains("ready") || s.contains("done") {
        TriggerStatus::Ready
    } else if s.contains("block") {
        TriggerStatus::Blocked
    } else {
        TriggerStatus::Tracking
    }
}

pub fn normalize_tone(tone: &str) -> Tone {
    let s = tone.trim().to_lowercase();
    if s.contains("neg") {
        Tone::Negative
    } else if s.contains("neu") {
        Tone::Neutral
    } else {
        Tone::Positive
    }
}
