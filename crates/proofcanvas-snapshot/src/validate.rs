//! Schema validation of snapshot JSON.
//!
//! Works on raw JSON rather than the typed [`crate::Snapshot`] so the same rules
//! gate both freshly generated output and files read back from disk. Every
//! violation is collected; nothing stops at the first error.

use proofcanvas_ingest::parse_timestamp;
use serde_json::{Map, Value};
use std::collections::HashSet;

use crate::schema::{LedgerStatus, Tone, TriggerStatus};

const REQUIRED_TOP_LEVEL: [&str; 14] = [
    "versionTag",
    "generatedAt",
    "snapshotDaysValid",
    "companyProfile",
    "proofScore",
    "evidenceGapIndex",
    "riskDecomposition",
    "hypothesisLedger",
    "validation72h",
    "aiLeverAnalysis",
    "expansionTriggers",
    "portfolioDashboard",
    "vcMemo",
    "apiProjection",
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationReport {
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}

fn non_empty_string(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_str)
        .is_some_and(|s| !s.trim().is_empty())
}

fn is_number(value: Option<&Value>) -> bool {
    value.and_then(Value::as_f64).is_some_and(f64::is_finite)
}

fn is_percent(value: Option<&Value>) -> bool {
    value
        .and_then(Value::as_f64)
        .is_some_and(|n| (0.0..=100.0).contains(&n))
}

fn allowed(values: &[&str]) -> String {
    values.join(", ")
}

struct Validator<'a> {
    known: HashSet<&'a str>,
    errors: Vec<String>,
}

impl<'a> Validator<'a> {
    fn error(&mut self, message: String) {
        self.errors.push(message);
    }

    /// A non-empty array, or an error naming `path`.
    fn rows<'v>(&mut self, value: Option<&'v Value>, path: &str) -> &'v [Value] {
        match value.and_then(Value::as_array) {
            Some(rows) if !rows.is_empty() => rows.as_slice(),
            _ => {
                self.error(format!("{path} must be a non-empty array."));
                &[]
            }
        }
    }

    fn require_string(&mut self, row: &Value, path: &str, field: &str) {
        if !non_empty_string(row.get(field)) {
            self.error(format!("{path}.{field} must be a string."));
        }
    }

    fn require_text(&mut self, row: &Value, path: &str, field: &str) {
        if !row.get(field).is_some_and(Value::is_string) {
            self.error(format!("{path}.{field} must be text."));
        }
    }

    fn require_number(&mut self, row: &Value, path: &str, field: &str) {
        if !is_number(row.get(field)) {
            self.error(format!("{path}.{field} must be a number."));
        }
    }

    fn require_confidence(&mut self, row: &Value, path: &str) {
        if !is_percent(row.get("confidence")) {
            self.error(format!("{path}.confidence must be a number between 0 and 100."));
        }
    }

    fn require_one_of(&mut self, row: &Value, path: &str, field: &str, values: &[&str]) {
        let ok = row
            .get(field)
            .and_then(Value::as_str)
            .is_some_and(|s| values.contains(&s));
        if !ok {
            self.error(format!("{path}.{field} must be one of: {}", allowed(values)));
        }
    }

    /// Non-empty citations that all name known sources (when sources are known).
    fn citations(&mut self, holder: Option<&Value>, path: &str) {
        let citations = holder
            .and_then(|h| h.get("citations"))
            .and_then(Value::as_array)
            .filter(|c| !c.is_empty());
        let Some(citations) = citations else {
            self.error(format!("{path}.citations must be a non-empty array."));
            return;
        };
        if self.known.is_empty() {
            return;
        }
        for id in citations {
            let known = id.as_str().is_some_and(|id| self.known.contains(id));
            if !known {
                let shown = id.as_str().map(str::to_string).unwrap_or_else(|| id.to_string());
                self.error(format!("{path}.citations contains unknown source id: {shown}"));
            }
        }
    }

    fn top_level(&mut self, snapshot: &Map<String, Value>) {
        for key in REQUIRED_TOP_LEVEL {
            if !snapshot.contains_key(key) {
                self.error(format!("Missing required top-level field: {key}"));
            }
        }

        if !non_empty_string(snapshot.get("versionTag")) {
            self.error("versionTag must be a non-empty string.".to_string());
        }
        let generated_ok = snapshot
            .get("generatedAt")
            .and_then(Value::as_str)
            .and_then(parse_timestamp)
            .is_some();
        if !generated_ok {
            self.error("generatedAt must be a valid ISO date string.".to_string());
        }
        if !is_number(snapshot.get("snapshotDaysValid")) {
            self.error("snapshotDaysValid must be a number.".to_string());
        }
        if !snapshot.get("companyProfile").is_some_and(Value::is_object) {
            self.error("companyProfile must be an object.".to_string());
        }
    }

    fn scored(&mut self, value: Option<&Value>, path: &str, score_field: &str) {
        let Some(obj) = value.filter(|v| v.is_object()) else {
            self.error(format!("{path}.{score_field} must be a number."));
            self.citations(None, path);
            return;
        };
        self.require_number(obj, path, score_field);
        self.require_confidence(obj, path);
        self.citations(Some(obj), path);
    }

    fn risk_decomposition(&mut self, value: Option<&Value>) {
        for (idx, row) in self.rows(value, "riskDecomposition").iter().enumerate() {
            let path = format!("riskDecomposition[{idx}]");
            self.require_string(row, &path, "category");
            self.require_number(row, &path, "score");
            self.require_confidence(row, &path);
            self.citations(Some(row), &path);
        }
    }

    fn hypothesis_ledger(&mut self, value: Option<&Value>) {
        let statuses = LedgerStatus::ALL.map(LedgerStatus::as_str);
        for (idx, row) in self.rows(value, "hypothesisLedger").iter().enumerate() {
            let path = format!("hypothesisLedger[{idx}]");
            for field in ["claim", "test", "signal", "owner"] {
                self.require_string(row, &path, field);
            }
            self.require_one_of(row, &path, "status", &statuses);
            self.require_confidence(row, &path);
            self.citations(Some(row), &path);
        }
    }

    fn validation_72h(&mut self, value: Option<&Value>) {
        for (idx, row) in self.rows(value, "validation72h").iter().enumerate() {
            let path = format!("validation72h[{idx}]");
            self.require_text(row, &path, "title");
            self.require_text(row, &path, "detail");
            self.require_confidence(row, &path);
            self.citations(Some(row), &path);
        }
    }

    fn ai_lever_analysis(&mut self, value: Option<&Value>) {
        let tones = Tone::ALL.map(Tone::as_str);
        for (idx, row) in self.rows(value, "aiLeverAnalysis").iter().enumerate() {
            let path = format!("aiLeverAnalysis[{idx}]");
            self.require_text(row, &path, "label");
            self.require_text(row, &path, "value");
            self.require_one_of(row, &path, "tone", &tones);
            self.require_confidence(row, &path);
            self.citations(Some(row), &path);
        }
    }

    fn expansion_triggers(&mut self, value: Option<&Value>) {
        let statuses = TriggerStatus::ALL.map(TriggerStatus::as_str);
        for (idx, row) in self.rows(value, "expansionTriggers").iter().enumerate() {
            let path = format!("expansionTriggers[{idx}]");
            self.require_text(row, &path, "trigger");
            self.require_one_of(row, &path, "status", &statuses);
            self.require_confidence(row, &path);
            self.citations(Some(row), &path);
        }
    }

    fn portfolio_dashboard(&mut self, value: Option<&Value>) {
        let Some(dashboard) = value.filter(|v| v.is_object()) else {
            self.error("portfolioDashboard must be an object.".to_string());
            return;
        };

        let distribution = self.rows(
            dashboard.get("riskDistribution"),
            "portfolioDashboard.riskDistribution",
        );
        if !distribution.is_empty() {
            let mut total = 0.0;
            for (idx, row) in distribution.iter().enumerate() {
                let path = format!("portfolioDashboard.riskDistribution[{idx}]");
                self.require_text(row, &path, "label");
                match row.get("value").and_then(Value::as_f64) {
                    Some(v) if v.is_finite() => total += v,
                    _ => self.error(format!("{path}.value must be a number.")),
                }
            }
            if (total - 100.0).abs() > f64::EPSILON {
                self.error(format!(
                    "portfolioDashboard.riskDistribution must sum to 100 (got {total})."
                ));
            }
        }

        let comparison = self.rows(
            dashboard.get("historicalComparison"),
            "portfolioDashboard.historicalComparison",
        );
        for (idx, row) in comparison.iter().enumerate() {
            let path = format!("portfolioDashboard.historicalComparison[{idx}]");
            self.require_text(row, &path, "deal");
            self.require_number(row, &path, "proofScore");
            self.require_number(row, &path, "evidenceGap");
            self.require_confidence(row, &path);
            self.citations(Some(row), &path);
        }
    }

    fn vc_memo(&mut self, value: Option<&Value>) {
        let memo = value.filter(|v| v.is_object());
        if !memo.is_some_and(|m| non_empty_string(m.get("title"))) {
            self.error("vcMemo.title must be a non-empty string.".to_string());
        }
        if let Some(memo) = memo {
            self.require_confidence(memo, "vcMemo");
        }
        self.citations(memo, "vcMemo");
    }

    fn source_summary(&mut self, value: Option<&Value>) {
        let Some(summary) = value else {
            return;
        };
        if !summary.is_object() {
            self.error("sourceSummary must be an object.".to_string());
            return;
        }
        for field in ["totalSources", "staleSources", "averageBaseConfidence"] {
            self.require_number(summary, "sourceSummary", field);
        }
    }
}

/// Check snapshot JSON against the contract.
///
/// Citation ids are checked against `source_ids` only when that list is
/// non-empty; emptiness of citation arrays is always checked.
pub fn validate_snapshot(snapshot: &Value, source_ids: &[String]) -> ValidationReport {
    let Some(obj) = snapshot.as_object() else {
        return ValidationReport {
            errors: vec!["Snapshot must be an object.".to_string()],
        };
    };

    let mut v = Validator {
        known: source_ids.iter().map(String::as_str).collect(),
        errors: Vec::new(),
    };

    v.top_level(obj);
    v.scored(obj.get("proofScore"), "proofScore", "score");
    v.scored(obj.get("evidenceGapIndex"), "evidenceGapIndex", "percent");
    v.risk_decomposition(obj.get("riskDecomposition"));
    v.hypothesis_ledger(obj.get("hypothesisLedger"));
    v.validation_72h(obj.get("validation72h"));
    v.ai_lever_analysis(obj.get("aiLeverAnalysis"));
    v.expansion_triggers(obj.get("expansionTriggers"));
    v.portfolio_dashboard(obj.get("portfolioDashboard"));
    v.vc_memo(obj.get("vcMemo"));
    if !obj.get("apiProjection").is_some_and(Value::is_object) {
        v.error("apiProjection must be an object.".to_string());
    }
    v.source_summary(obj.get("sourceSummary"));

    ValidationReport { errors: v.errors }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ids() -> Vec<String> {
        vec!["strategy".to_string(), "pilot".to_string()]
    }

    fn valid_snapshot() -> Value {
        let cite = json!(["strategy"]);
        json!({
            "versionTag": "v0.9 Preview",
            "generatedAt": "2026-10-16T09:30:00.000Z",
            "snapshotDaysValid": 14,
            "sourceMode": "notion-live",
            "companyProfile": {"name": "Komfi", "thesis": "", "strategicGoal": ""},
            "proofScore": {"score": 70, "confidence": 91, "summary": "", "citations": cite},
            "evidenceGapIndex": {"percent": 40, "confidence": 91, "summary": "", "citations": cite},
            "riskDecomposition": [
                {"category": "Demand Risk", "score": 50, "confidence": 91, "note": "n", "citations": cite}
            ],
            "hypothesisLedger": [{
                "claim": "c", "test": "t", "signal": "s", "owner": "o",
                "status": "Planned", "confidence": 91, "citations": cite
            }],
            "validation72h": [{"title": "Asset", "detail": "", "confidence": 91, "citations": cite}],
            "aiLeverAnalysis": [{"label": "l", "value": "v", "tone": "neutral", "confidence": 91, "citations": cite}],
            "expansionTriggers": [{"trigger": "t", "status": "tracking", "confidence": 91, "citations": cite}],
            "portfolioDashboard": {
                "riskDistribution": [{"label": "Demand", "value": 60}, {"label": "Execution", "value": 40}],
                "historicalComparison": [{
                    "deal": "d", "proofScore": 50, "evidenceGap": 50, "recommendation": "r",
                    "confidence": 91, "citations": cite
                }]
            },
            "vcMemo": {"title": "Memo", "recommendation": "", "bullets": [], "confidence": 91, "citations": cite},
            "apiProjection": {"deal_id": "komfi_preview_001"},
            "sourceSummary": {"totalSources": 2, "staleSources": 1, "averageBaseConfidence": 69}
        })
    }

    #[test]
    fn valid_snapshot_passes() {
        let report = validate_snapshot(&valid_snapshot(), &ids());
        assert!(report.is_valid(), "{:?}", report.errors);
    }

    #[test]
    fn non_object_is_rejected() {
        let report = validate_snapshot(&json!([1, 2]), &ids());
        assert_eq!(report.errors, vec!["Snapshot must be an object."]);
    }

    #[test]
    fn unknown_citation_names_the_field() {
        let mut snapshot = valid_snapshot();
        snapshot["riskDecomposition"][0]["citations"] = json!(["nonexistent-id"]);
        let report = validate_snapshot(&snapshot, &ids());
        assert_eq!(
            report.errors,
            vec!["riskDecomposition[0].citations contains unknown source id: nonexistent-id"]
        );
    }

    #[test]
    fn unknown_ids_are_ignored_without_a_source_set() {
        let mut snapshot = valid_snapshot();
        snapshot["vcMemo"]["citations"] = json!(["anything"]);
        assert!(validate_snapshot(&snapshot, &[]).is_valid());

        snapshot["vcMemo"]["citations"] = json!([]);
        let report = validate_snapshot(&snapshot, &[]);
        assert_eq!(report.errors, vec!["vcMemo.citations must be a non-empty array."]);
    }

    #[test]
    fn collects_every_violation() {
        let mut snapshot = valid_snapshot();
        let obj = snapshot.as_object_mut().unwrap();
        obj.remove("apiProjection");
        obj.insert("riskDecomposition".into(), json!([]));
        obj.insert("versionTag".into(), json!("  "));
        snapshot["hypothesisLedger"][0]["status"] = json!("Maybe");
        snapshot["aiLeverAnalysis"][0]["tone"] = json!("upbeat");
        snapshot["expansionTriggers"][0]["confidence"] = json!(140);
        snapshot["portfolioDashboard"]["riskDistribution"][0]["value"] = json!(10);

        let errors = validate_snapshot(&snapshot, &ids()).errors;
        for expected in [
            "Missing required top-level field: apiProjection",
            "versionTag must be a non-empty string.",
            "riskDecomposition must be a non-empty array.",
            "hypothesisLedger[0].status must be one of: In validation, Risky, Planned, Validated",
            "aiLeverAnalysis[0].tone must be one of: positive, neutral, negative",
            "expansionTriggers[0].confidence must be a number between 0 and 100.",
            "portfolioDashboard.riskDistribution must sum to 100 (got 50).",
            "apiProjection must be an object.",
        ] {
            assert!(errors.iter().any(|e| e == expected), "missing {expected:?} in {errors:?}");
        }
        assert_eq!(errors.len(), 8);
    }

    #[test]
    fn bad_generated_at_is_reported() {
        let mut snapshot = valid_snapshot();
        snapshot["generatedAt"] = json!("yesterday");
        let errors = validate_snapshot(&snapshot, &ids()).errors;
        assert_eq!(errors, vec!["generatedAt must be a valid ISO date string."]);
    }

    #[test]
    fn source_summary_is_optional_but_typed() {
        let mut snapshot = valid_snapshot();
        snapshot.as_object_mut().unwrap().remove("sourceSummary");
        assert!(validate_snapshot(&snapshot, &ids()).is_valid());

        snapshot["sourceSummary"] = json!({"totalSources": "two", "staleSources": 0, "averageBaseConfidence": 60});
        let errors = validate_snapshot(&snapshot, &ids()).errors;
        assert_eq!(errors, vec!["sourceSummary.totalSources must be a number."]);
    }
}
