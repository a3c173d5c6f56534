//! Normalization of the raw model reply into the snapshot contract.
//!
//! Missing or malformed values are repaired
//! (clamped, defaulted, coerced, or replaced by fallback rows) and each repair is
//! recorded in a [`NormalizationReport`]. The result always has the contract's
//! shape; whether it is *acceptable* is decided by the validator.

use proofcanvas_ingest::SourceDocument;
use serde_json::Value;
use std::collections::HashMap;
use tracing::{debug, info};

use crate::coerce::{
    clamp_score, number_of, normalize_ledger_status, normalize_percentage_rows,
    normalize_tone, normalize_trigger_status, text_of,
};
use crate::schema::*;
use crate::SnapshotError;

pub const MAX_CITATIONS: usize = 3;
/// Confidence of a row whose citations resolve to no known source.
pub const NEUTRAL_CONFIDENCE: u8 = 62;
pub const DEFAULT_SCORE: u8 = 50;

pub const MAX_RISK_ROWS: usize = 6;
pub const MAX_LEDGER_ROWS: usize = 6;
pub const MAX_VALIDATION_STEPS: usize = 4;
pub const MAX_LEVER_ROWS: usize = 6;
pub const MAX_TRIGGER_ROWS: usize = 6;
pub const MAX_COMPARISON_ROWS: usize = 6;
pub const MAX_MEMO_BULLETS: usize = 8;

pub const DEFAULT_COMPANY_NAME: &str = "Komfi";
pub const DEFAULT_DEAL_ID: &str = "komfi_preview_001";
pub const DEFAULT_OWNER: &str = "Komfi team";
const DEFAULT_RISK_NOTE: &str = "No detail provided.";
const DEFAULT_RECOMMENDATION: &str = "No recommendation provided.";
const FALLBACK_RISK_NOTE: &str = "Fallback row generated because AI output was incomplete.";

/// The six risk categories, in report order.
pub use proofcanvas_llm::RISK_CATEGORIES;

// ============================================================================
// Source index
// ============================================================================

/// The run's known sources, keyed for citation lookup.
#[derive(Debug, Clone)]
pub struct SourceIndex {
    ids: Vec<String>,
    confidence: HashMap<String, u8>,
    summary: SourceSummary,
}

impl SourceIndex {
    /// Fails only when there is no source to fall back on.
    pub fn new(sources: &[SourceDocument]) -> Result<Self, SnapshotError> {
        if sources.is_empty() {
            return Err(SnapshotError::NoSources);
        }

        let ids = sources.iter().map(|s| s.id.clone()).collect();
        let confidence = sources
            .iter()
            .map(|s| (s.id.clone(), s.base_confidence))
            .collect();
        let total: u32 = sources.iter().map(|s| u32::from(s.base_confidence)).sum();
        let summary = SourceSummary {
            total_sources: sources.len(),
            stale_sources: sources.iter().filter(|s| s.is_stale()).count(),
            average_base_confidence: (f64::from(total) / sources.len() as f64).round() as u8,
        };

        Ok(Self {
            ids,
            confidence,
            summary,
        })
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// The citation substituted when a row cites nothing usable.
    pub fn fallback_id(&self) -> &str {
        &self.ids[0]
    }

    pub fn summary(&self) -> &SourceSummary {
        &self.summary
    }

    /// Keep known ids (trimmed, deduplicated, at most three); never empty.
    pub fn normalize_citations(&self, citations: Option<&Value>) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for id in citations.and_then(Value::as_array).into_iter().flatten() {
            let Some(id) = id.as_str().map(str::trim) else {
                continue;
            };
            if self.confidence.contains_key(id) && !out.iter().any(|seen| seen == id) {
                out.push(id.to_string());
            }
        }
        if out.is_empty() {
            out.push(self.fallback_id().to_string());
        }
        out.truncate(MAX_CITATIONS);
        out
    }

    /// Rounded mean base confidence of the cited sources.
    pub fn citations_confidence(&self, citations: &[String]) -> u8 {
        let values: Vec<f64> = citations
            .iter()
            .filter_map(|id| self.confidence.get(id))
            .map(|c| f64::from(*c))
            .collect();
        if values.is_empty() {
            return NEUTRAL_CONFIDENCE;
        }
        (values.iter().sum::<f64>() / values.len() as f64).round() as u8
    }
}

// ============================================================================
// Repair report
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairKind {
    /// A numeric value was out of range.
    Clamped,
    /// A value was missing or unusable and a default was used.
    Defaulted,
    /// Unknown, duplicate or surplus citations were dropped, or the fallback was used.
    CitationsRepaired,
    /// Free text was mapped onto a closed set.
    EnumCoerced,
    /// A list was cut to its maximum length.
    Truncated,
    /// An empty collection was replaced by placeholder rows.
    FallbackRows,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repair {
    /// Contract path, e.g. `riskDecomposition[2].score`.
    pub field: String,
    pub kind: RepairKind,
}

#[derive(Debug, Clone, Default)]
pub struct NormalizationReport {
    pub repairs: Vec<Repair>,
}

impl NormalizationReport {
    fn push(&mut self, field: impl Into<String>, kind: RepairKind) {
        self.repairs.push(Repair {
            field: field.into(),
            kind,
        });
    }

    pub fn is_empty(&self) -> bool {
        self.repairs.is_empty()
    }

    pub fn count(&self, kind: RepairKind) -> usize {
        self.repairs.iter().filter(|r| r.kind == kind).count()
    }

    pub fn touched(&self, field: &str) -> bool {
        self.repairs.iter().any(|r| r.field == field)
    }

    fn log(&self) {
        info!(
            repairs = self.repairs.len(),
            fallback_rows = self.count(RepairKind::FallbackRows),
            citations = self.count(RepairKind::CitationsRepaired),
            "normalized model output"
        );
        for repair in &self.repairs {
            debug!(field = %repair.field, kind = ?repair.kind, "repaired field");
        }
    }
}

// ============================================================================
// Normalizer
// ============================================================================

/// Run-level values stamped onto the snapshot.
#[derive(Debug, Clone)]
pub struct SnapshotContext {
    pub version_tag: String,
    pub generated_at: String,
    pub snapshot_days_valid: u32,
    pub source_mode: String,
}

struct Normalizer<'a> {
    index: &'a SourceIndex,
    report: NormalizationReport,
}

impl<'a> Normalizer<'a> {
    fn score(&mut self, field: &str, value: Option<&Value>, fallback: u8) -> u8 {
        match value.and_then(number_of) {
            None => self.report.push(field, RepairKind::Defaulted),
            Some(n) if !(0.0..=100.0).contains(&n) => self.report.push(field, RepairKind::Clamped),
            Some(_) => {}
        }
        clamp_score(value, fallback)
    }

    fn text_or(&mut self, field: &str, value: Option<&Value>, default: &str) -> String {
        let text = text_of(value);
        if text.is_empty() {
            self.report.push(field, RepairKind::Defaulted);
            return default.to_string();
        }
        text
    }

    /// Normalized citations plus the confidence they imply.
    fn cite(&mut self, path: &str, value: Option<&Value>) -> (Vec<String>, u8) {
        let citations = self.index.normalize_citations(value);
        let raw: Vec<&str> = value
            .and_then(Value::as_array)
            .map(|a| a.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();
        let unchanged =
            raw.len() == citations.len() && raw.iter().zip(&citations).all(|(r, c)| r == c);
        if !unchanged {
            self.report
                .push(format!("{path}.citations"), RepairKind::CitationsRepaired);
        }
        let confidence = self.index.citations_confidence(&citations);
        (citations, confidence)
    }

    fn fallback_cite(&self) -> (Vec<String>, u8) {
        let citations = vec![self.index.fallback_id().to_string()];
        let confidence = self.index.citations_confidence(&citations);
        (citations, confidence)
    }

    fn enum_coerced(&mut self, field: &str, raw: &str, canonical: &str) {
        if raw != canonical {
            self.report.push(field, RepairKind::EnumCoerced);
        }
    }

    /// The array at `value`, cut to `cap` rows.
    fn rows<'v>(&mut self, field: &str, value: Option<&'v Value>, cap: usize) -> &'v [Value] {
        let rows = value.and_then(Value::as_array).map(Vec::as_slice).unwrap_or(&[]);
        if rows.len() > cap {
            self.report.push(field, RepairKind::Truncated);
            return &rows[..cap];
        }
        rows
    }

    fn risk_decomposition(&mut self, raw: &Value) -> Vec<RiskRow> {
        let rows = self.rows("riskDecomposition", raw.get("riskDecomposition"), MAX_RISK_ROWS);
        let mut out: Vec<RiskRow> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let path = format!("riskDecomposition[{i}]");
                let (citations, confidence) = self.cite(&path, row.get("citations"));
                RiskRow {
                    category: text_of(row.get("category")),
                    score: self.score(&format!("{path}.score"), row.get("score"), DEFAULT_SCORE),
                    confidence,
                    note: self.text_or(&format!("{path}.note"), row.get("note"), DEFAULT_RISK_NOTE),
                    citations,
                }
            })
            .collect();

        if out.is_empty() {
            self.report.push("riskDecomposition", RepairKind::FallbackRows);
            let (citations, confidence) = self.fallback_cite();
            out = RISK_CATEGORIES
                .iter()
                .map(|category| RiskRow {
                    category: category.to_string(),
                    score: DEFAULT_SCORE,
                    confidence,
                    note: FALLBACK_RISK_NOTE.to_string(),
                    citations: citations.clone(),
                })
                .collect();
        }
        out
    }

    fn hypothesis_ledger(&mut self, raw: &Value) -> Vec<HypothesisRow> {
        let rows = self.rows("hypothesisLedger", raw.get("hypothesisLedger"), MAX_LEDGER_ROWS);
        let mut out: Vec<HypothesisRow> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let path = format!("hypothesisLedger[{i}]");
                let (citations, confidence) = self.cite(&path, row.get("citations"));
                let raw_status = text_of(row.get("status"));
                let status = normalize_ledger_status(&raw_status);
                self.enum_coerced(&format!("{path}.status"), &raw_status, status.as_str());
                HypothesisRow {
                    claim: text_of(row.get("claim")),
                    test: text_of(row.get("test")),
                    signal: text_of(row.get("signal")),
                    owner: self.text_or(&format!("{path}.owner"), row.get("owner"), DEFAULT_OWNER),
                    status,
                    confidence,
                    citations,
                }
            })
            .collect();

        if out.is_empty() {
            self.report.push("hypothesisLedger", RepairKind::FallbackRows);
            let (citations, confidence) = self.fallback_cite();
            out.push(HypothesisRow {
                claim: "Core growth assumptions are not yet fully evidenced.".to_string(),
                test: "Run pilot-level validation loops with explicit conversion checkpoints."
                    .to_string(),
                signal: "Sustained conversion and retention in two consecutive cohorts."
                    .to_string(),
                owner: DEFAULT_OWNER.to_string(),
                status: LedgerStatus::Planned,
                confidence,
                citations,
            });
        }
        out
    }

    fn validation_72h(&mut self, raw: &Value) -> Vec<ValidationStep> {
        let rows = self.rows("validation72h", raw.get("validation72h"), MAX_VALIDATION_STEPS);
        let mut out: Vec<ValidationStep> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let (citations, confidence) =
                    self.cite(&format!("validation72h[{i}]"), row.get("citations"));
                ValidationStep {
                    title: text_of(row.get("title")),
                    detail: text_of(row.get("detail")),
                    confidence,
                    citations,
                }
            })
            .collect();

        if out.is_empty() {
            self.report.push("validation72h", RepairKind::FallbackRows);
            let (citations, confidence) = self.fallback_cite();
            out = [
                ("Asset", "Pilot readiness brief with quantified assumptions."),
                ("Traffic", "Targeted outreach to highest-priority prospects."),
                ("Threshold", "Minimum qualified response benchmark to continue."),
                ("Decision", "Scale or iterate based on measured signal quality."),
            ]
            .into_iter()
            .map(|(title, detail)| ValidationStep {
                title: title.to_string(),
                detail: detail.to_string(),
                confidence,
                citations: citations.clone(),
            })
            .collect();
        }
        out
    }

    fn ai_lever_analysis(&mut self, raw: &Value) -> Vec<AiLeverRow> {
        let rows = self.rows("aiLeverAnalysis", raw.get("aiLeverAnalysis"), MAX_LEVER_ROWS);
        let mut out: Vec<AiLeverRow> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let path = format!("aiLeverAnalysis[{i}]");
                let (citations, confidence) = self.cite(&path, row.get("citations"));
                let raw_tone = text_of(row.get("tone"));
                let tone = normalize_tone(&raw_tone);
                self.enum_coerced(&format!("{path}.tone"), &raw_tone, tone.as_str());
                AiLeverRow {
                    label: text_of(row.get("label")),
                    value: text_of(row.get("value")),
                    tone,
                    confidence,
                    citations,
                }
            })
            .collect();

        if out.is_empty() {
            self.report.push("aiLeverAnalysis", RepairKind::FallbackRows);
            let (citations, confidence) = self.fallback_cite();
            out.push(AiLeverRow {
                label: "AI leverage".to_string(),
                value: "Potential efficiency gain identified; validation required.".to_string(),
                tone: Tone::Neutral,
                confidence,
                citations,
            });
        }
        out
    }

    fn expansion_triggers(&mut self, raw: &Value) -> Vec<ExpansionTrigger> {
        let rows = self.rows("expansionTriggers", raw.get("expansionTriggers"), MAX_TRIGGER_ROWS);
        let mut out: Vec<ExpansionTrigger> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let path = format!("expansionTriggers[{i}]");
                let (citations, confidence) = self.cite(&path, row.get("citations"));
                let raw_status = text_of(row.get("status"));
                let status = normalize_trigger_status(&raw_status);
                self.enum_coerced(&format!("{path}.status"), &raw_status, status.as_str());
                ExpansionTrigger {
                    trigger: text_of(row.get("trigger")),
                    status,
                    confidence,
                    citations,
                }
            })
            .collect();

        if out.is_empty() {
            self.report.push("expansionTriggers", RepairKind::FallbackRows);
            let (citations, confidence) = self.fallback_cite();
            out.push(ExpansionTrigger {
                trigger: "Primary growth trigger under monitoring".to_string(),
                status: TriggerStatus::Tracking,
                confidence,
                citations,
            });
        }
        out
    }

    fn portfolio_dashboard(&mut self, raw: &Value, risks: &[RiskRow]) -> PortfolioDashboard {
        let dashboard = raw.get("portfolioDashboard");

        let weights: Vec<(String, f64)> = dashboard
            .and_then(|d| d.get("riskDistribution"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|row| {
                let weight = row.get("value").and_then(number_of).unwrap_or(0.0);
                (text_of(row.get("label")), weight)
            })
            .collect();
        let mut risk_distribution = normalize_percentage_rows(&weights);
        let rescaled = risk_distribution
            .iter()
            .zip(&weights)
            .any(|(row, (_, w))| f64::from(row.value) != *w);
        if rescaled {
            self.report
                .push("portfolioDashboard.riskDistribution", RepairKind::Clamped);
        }
        if risk_distribution.is_empty() {
            self.report
                .push("portfolioDashboard.riskDistribution", RepairKind::FallbackRows);
            let equal: Vec<(String, f64)> = risks
                .iter()
                .map(|risk| (risk.category.replacen(" Risk", "", 1), 1.0))
                .collect();
            risk_distribution = normalize_percentage_rows(&equal);
        }

        let rows = self.rows(
            "portfolioDashboard.historicalComparison",
            dashboard.and_then(|d| d.get("historicalComparison")),
            MAX_COMPARISON_ROWS,
        );
        let mut historical_comparison: Vec<ComparisonRow> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                let path = format!("portfolioDashboard.historicalComparison[{i}]");
                let (citations, confidence) = self.cite(&path, row.get("citations"));
                ComparisonRow {
                    deal: text_of(row.get("deal")),
                    proof_score: self.score(
                        &format!("{path}.proofScore"),
                        row.get("proofScore"),
                        DEFAULT_SCORE,
                    ),
                    evidence_gap: self.score(
                        &format!("{path}.evidenceGap"),
                        row.get("evidenceGap"),
                        DEFAULT_SCORE,
                    ),
                    recommendation: self.text_or(
                        &format!("{path}.recommendation"),
                        row.get("recommendation"),
                        DEFAULT_RECOMMENDATION,
                    ),
                    confidence,
                    citations,
                }
            })
            .collect();

        if historical_comparison.is_empty() {
            self.report
                .push("portfolioDashboard.historicalComparison", RepairKind::FallbackRows);
            let (citations, confidence) = self.fallback_cite();
            historical_comparison.push(ComparisonRow {
                deal: "Komfi / current snapshot".to_string(),
                proof_score: DEFAULT_SCORE,
                evidence_gap: DEFAULT_SCORE,
                recommendation: "Collect more evidence before scaling this stream.".to_string(),
                confidence,
                citations,
            });
        }

        PortfolioDashboard {
            risk_distribution,
            historical_comparison,
        }
    }

    fn vc_memo(&mut self, raw: &Value) -> VcMemo {
        let memo = raw.get("vcMemo");
        let (citations, confidence) = self.cite("vcMemo", memo.and_then(|m| m.get("citations")));
        let mut bullets: Vec<String> = memo
            .and_then(|m| m.get("bullets"))
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .map(|b| text_of(Some(b)))
            .filter(|b| !b.is_empty())
            .collect();
        if bullets.len() > MAX_MEMO_BULLETS {
            self.report.push("vcMemo.bullets", RepairKind::Truncated);
            bullets.truncate(MAX_MEMO_BULLETS);
        }

        VcMemo {
            title: text_of(memo.and_then(|m| m.get("title"))),
            recommendation: text_of(memo.and_then(|m| m.get("recommendation"))),
            bullets,
            confidence,
            citations,
        }
    }

    fn api_projection(&mut self, raw: &Value) -> ApiProjection {
        let projection = raw.get("apiProjection");
        let field = |name: &str| projection.and_then(|p| p.get(name));
        let ledger = field("risk_ledger");
        let ledger_field = |name: &str| ledger.and_then(|l| l.get(name));
        let block = field("validation_72h");
        let block_field = |name: &str| block.and_then(|b| b.get(name));

        ApiProjection {
            deal_id: self.text_or("apiProjection.deal_id", field("deal_id"), DEFAULT_DEAL_ID),
            proofscore: self.score("apiProjection.proofscore", field("proofscore"), DEFAULT_SCORE),
            evidence_gap_index: self.score(
                "apiProjection.evidence_gap_index",
                field("evidence_gap_index"),
                DEFAULT_SCORE,
            ),
            risk_ledger: RiskLedger {
                demand: self.score("apiProjection.risk_ledger.demand", ledger_field("demand"), 0),
                monetization: self.score(
                    "apiProjection.risk_ledger.monetization",
                    ledger_field("monetization"),
                    0,
                ),
                distribution: self.score(
                    "apiProjection.risk_ledger.distribution",
                    ledger_field("distribution"),
                    0,
                ),
            },
            validation_72h: ValidationBlock {
                asset: text_of(block_field("asset")),
                threshold: text_of(block_field("threshold")),
                decision: text_of(block_field("decision")),
            },
        }
    }
}

/// Build a contract-shaped snapshot from whatever the model returned.
///
/// Never fails: a non-object reply simply takes every fallback.
pub fn normalize_snapshot(
    raw: &Value,
    index: &SourceIndex,
    context: &SnapshotContext,
) -> (Snapshot, NormalizationReport) {
    let mut n = Normalizer {
        index,
        report: NormalizationReport::default(),
    };

    let profile = raw.get("companyProfile");
    let profile_field = |name: &str| profile.and_then(|p| p.get(name));
    let company_profile = CompanyProfile {
        name: n.text_or("companyProfile.name", profile_field("name"), DEFAULT_COMPANY_NAME),
        thesis: text_of(profile_field("thesis")),
        strategic_goal: text_of(profile_field("strategicGoal")),
    };

    let proof = raw.get("proofScore");
    let (proof_citations, proof_confidence) =
        n.cite("proofScore", proof.and_then(|p| p.get("citations")));
    let proof_score = ProofScore {
        score: n.score("proofScore.score", proof.and_then(|p| p.get("score")), DEFAULT_SCORE),
        confidence: proof_confidence,
        summary: text_of(proof.and_then(|p| p.get("summary"))),
        citations: proof_citations,
    };

    let gap = raw.get("evidenceGapIndex");
    let (gap_citations, gap_confidence) =
        n.cite("evidenceGapIndex", gap.and_then(|g| g.get("citations")));
    let evidence_gap_index = EvidenceGapIndex {
        percent: n.score(
            "evidenceGapIndex.percent",
            gap.and_then(|g| g.get("percent")),
            DEFAULT_SCORE,
        ),
        confidence: gap_confidence,
        summary: text_of(gap.and_then(|g| g.get("summary"))),
        citations: gap_citations,
    };

    let risk_decomposition = n.risk_decomposition(raw);
    let hypothesis_ledger = n.hypothesis_ledger(raw);
    let validation_72h = n.validation_72h(raw);
    let ai_lever_analysis = n.ai_lever_analysis(raw);
    let expansion_triggers = n.expansion_triggers(raw);
    let portfolio_dashboard = n.portfolio_dashboard(raw, &risk_decomposition);
    let vc_memo = n.vc_memo(raw);
    let api_projection = n.api_projection(raw);

    let snapshot = Snapshot {
        version_tag: context.version_tag.clone(),
        generated_at: context.generated_at.clone(),
        snapshot_days_valid: context.snapshot_days_valid,
        source_mode: context.source_mode.clone(),
        company_profile,
        proof_score,
        evidence_gap_index,
        risk_decomposition,
        hypothesis_ledger,
        validation_72h,
        ai_lever_analysis,
        expansion_triggers,
        portfolio_dashboard,
        vc_memo,
        api_projection,
        source_summary: index.summary().clone(),
    };

    n.report.log();
    (snapshot, n.report)
}
