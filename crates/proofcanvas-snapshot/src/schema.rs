//! The snapshot contract consumed by the dashboard.
//!
//! Field names are the dashboard's (camelCase), except `apiProjection`, whose
//! sub-fields are snake_case for downstream machine consumers.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub version_tag: String,
    pub generated_at: String,
    pub snapshot_days_valid: u32,
    pub source_mode: String,
    pub company_profile: CompanyProfile,
    pub proof_score: ProofScore,
    pub evidence_gap_index: EvidenceGapIndex,
    pub risk_decomposition: Vec<RiskRow>,
    pub hypothesis_ledger: Vec<HypothesisRow>,
    #[serde(rename = "validation72h")]
    pub validation_72h: Vec<ValidationStep>,
    pub ai_lever_analysis: Vec<AiLeverRow>,
    pub expansion_triggers: Vec<ExpansionTrigger>,
    pub portfolio_dashboard: PortfolioDashboard,
    pub vc_memo: VcMemo,
    pub api_projection: ApiProjection,
    pub source_summary: SourceSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompanyProfile {
    pub name: String,
    pub thesis: String,
    pub strategic_goal: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProofScore {
    pub score: u8,
    pub confidence: u8,
    pub summary: String,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EvidenceGapIndex {
    pub percent: u8,
    pub confidence: u8,
    pub summary: String,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskRow {
    pub category: String,
    pub score: u8,
    pub confidence: u8,
    pub note: String,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LedgerStatus {
    #[serde(rename = "In validation")]
    InValidation,
    Risky,
    Planned,
    Validated,
}

impl LedgerStatus {
    pub const ALL: [LedgerStatus; 4] = [
        LedgerStatus::InValidation,
        LedgerStatus::Risky,
        LedgerStatus::Planned,
        LedgerStatus::Validated,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LedgerStatus::InValidation => "In validation",
            LedgerStatus::Risky => "Risky",
            LedgerStatus::Planned => "Planned",
            LedgerStatus::Validated => "Validated",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HypothesisRow {
    pub claim: String,
    pub test: String,
    pub signal: String,
    pub owner: String,
    pub status: LedgerStatus,
    pub confidence: u8,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationStep {
    pub title: String,
    pub detail: String,
    pub confidence: u8,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Neutral,
    Negative,
}

impl Tone {
    pub const ALL: [Tone; 3] = [Tone::Positive, Tone::Neutral, Tone::Negative];

    pub fn as_str(self) -> &'static str {
        match self {
            Tone::Positive => "positive",
            Tone::Neutral => "neutral",
            Tone::Negative => "negative",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AiLeverRow {
    pub label: String,
    pub value: String,
    pub tone: Tone,
    pub confidence: u8,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TriggerStatus {
    Tracking,
    Ready,
    Blocked,
}

impl TriggerStatus {
    pub const ALL: [TriggerStatus; 3] = [
        TriggerStatus::Tracking,
        TriggerStatus::Ready,
        TriggerStatus::Blocked,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            TriggerStatus::Tracking => "tracking",
            TriggerStatus::Ready => "ready",
            TriggerStatus::Blocked => "blocked",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpansionTrigger {
    pub trigger: String,
    pub status: TriggerStatus,
    pub confidence: u8,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioDashboard {
    pub risk_distribution: Vec<PercentageRow>,
    pub historical_comparison: Vec<ComparisonRow>,
}

/// A labelled share of a whole; a set of rows sums to 100.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PercentageRow {
    pub label: String,
    pub value: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonRow {
    pub deal: String,
    pub proof_score: u8,
    pub evidence_gap: u8,
    pub recommendation: String,
    pub confidence: u8,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VcMemo {
    pub title: String,
    pub recommendation: String,
    pub bullets: Vec<String>,
    pub confidence: u8,
    pub citations: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApiProjection {
    pub deal_id: String,
    pub proofscore: u8,
    pub evidence_gap_index: u8,
    pub risk_ledger: RiskLedger,
    pub validation_72h: ValidationBlock,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RiskLedger {
    pub demand: u8,
    pub monetization: u8,
    pub distribution: u8,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ValidationBlock {
    pub asset: String,
    pub threshold: String,
    pub decision: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceSummary {
    pub total_sources: usize,
    pub stale_sources: usize,
    pub average_base_confidence: u8,
}
