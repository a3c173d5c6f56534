//! Integration tests for the complete ProofCanvas pipeline
//!
//! These tests verify end-to-end behaviour across crates:
//! - Paginated, nested workspace pages → source documents → candidate facts
//! - Synthesis prompt → model reply → normalized snapshot
//! - Written artifacts → companion checker
//!
//! Run with: cargo test --test integration_tests

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use proofcanvas_ingest::{Block, BlockList, DocumentStore, IngestError, Page, SourcesConfig};
use proofcanvas_llm::{CompletionRequest, CompletionResponse, FinishReason, LlmError, LlmProvider, Usage};
use proofcanvas_snapshot::{
    check_artifacts, compute_checksum, read_json, run_pipeline, validate_snapshot, ArtifactPaths,
    CheckWarning, LedgerStatus, PipelineConfig, Snapshot, SnapshotError, SourcesManifest, TriggerStatus,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tempfile::tempdir;

// ============================================================================
// Test doubles
// ============================================================================

/// Serves children one block per page so every listing goes through the cursor.
struct PagedStore {
    pages: HashMap<String, Page>,
    children: HashMap<String, Vec<Block>>,
    listings: Mutex<Vec<(String, Option<String>)>>,
}

#[async_trait]
impl DocumentStore for PagedStore {
    async fn retrieve_page(&self, page_id: &str) -> Result<Page, IngestError> {
        self.pages.get(page_id).cloned().ok_or_else(|| IngestError::Api {
            resource: format!("pages/{page_id}"),
            status: 404,
            body: "object_not_found".to_string(),
        })
    }

    async fn list_children(&self, block_id: &str, cursor: Option<&str>) -> Result<BlockList, IngestError> {
        self.listings
            .lock()
            .unwrap()
            .push((block_id.to_string(), cursor.map(str::to_string)));

        let all = self.children.get(block_id).cloned().unwrap_or_default();
        let start: usize = cursor.map(|c| c.parse().unwrap()).unwrap_or(0);
        let has_more = start + 1 < all.len();
        Ok(BlockList {
            results: all.into_iter().skip(start).take(1).collect(),
            has_more,
            next_cursor: has_more.then(|| (start + 1).to_string()),
        })
    }
}

/// Returns a fixed reply and keeps the prompt it was sent.
struct RecordingModel {
    reply: String,
    prompts: Mutex<Vec<String>>,
}

impl RecordingModel {
    fn new(reply: impl Into<String>) -> Self {
        Self {
            reply: reply.into(),
            prompts: Mutex::new(Vec::new()),
        }
    }

    fn last_prompt(&self) -> String {
        self.prompts.lock().unwrap().last().cloned().unwrap_or_default()
    }
}

#[async_trait]
impl LlmProvider for RecordingModel {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
        let prompt = request
            .messages
            .iter()
            .map(|m| m.content.clone())
            .collect::<Vec<_>>()
            .join("\n");
        self.prompts.lock().unwrap().push(prompt);
        Ok(CompletionResponse {
            content: self.reply.clone(),
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
            model: "recording".to_string(),
        })
    }

    fn model_name(&self) -> String {
        "recording".to_string()
    }
}

// ============================================================================
// Fixtures
// ============================================================================

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 10, 16, 9, 30, 0).unwrap()
}

fn block(id: &str, kind: &str, text: &str, has_children: bool) -> Block {
    serde_json::from_value(json!({
        "id": id,
        "type": kind,
        "has_children": has_children,
        kind: {"rich_text": [{"plain_text": text}]}
    }))
    .unwrap()
}

fn page(id: &str, title: &str, freshness: &str, edited: DateTime<Utc>) -> Page {
    serde_json::from_value(json!({
        "id": id,
        "last_edited_time": edited.to_rfc3339(),
        "properties": {
            "Name": {"type": "title", "title": [{"plain_text": title}]},
            "Freshness": {"type": "select", "select": {"name": freshness}}
        }
    }))
    .unwrap()
}

fn store() -> PagedStore {
    let mut pages = HashMap::new();
    pages.insert("p-goals".to_string(), page("p-goals", "Goals 2027", "Verified", now()));
    pages.insert(
        "p-pilot".to_string(),
        page("p-pilot", "Pilot review", "Verified", now() - Duration::days(10)),
    );

    let mut children = HashMap::new();
    children.insert(
        "p-goals".to_string(),
        vec![
            block("g1", "heading_2", "Targets", false),
            block("g2", "bulleted_list_item", "Target: 500 paying members by Q2 2027", true),
            block("g3", "paragraph", "Expanze do Brna a Ostravy po ověření pilotu.", false),
        ],
    );
    children.insert(
        "g2".to_string(),
        vec![block("g2a", "paragraph", "Membership price set at 1 490 CZK per month.", false)],
    );
    children.insert(
        "p-pilot".to_string(),
        vec![block("p1", "quote", "Pilot retention held at 71 percent after one quarter.", false)],
    );

    PagedStore {
        pages,
        children,
        listings: Mutex::new(Vec::new()),
    }
}

fn sources_config() -> SourcesConfig {
    SourcesConfig::from_json(
        &json!({
            "mode": "notion-live",
            "freshnessProperty": "Freshness",
            "sources": [
                {"id": "goals", "pageId": "p-goals", "title": "Goals", "url": "https://notion.so/goals"},
                {"id": "pilot", "pageId": "p-pilot", "title": "Pilot", "url": "https://notion.so/pilot"}
            ]
        })
        .to_string(),
    )
    .unwrap()
}

/// A complete reply with the usual model sloppiness: stringly numbers, loose
/// enum labels, unknown and padded citations, out-of-range scores.
fn full_reply() -> Value {
    json!({
        "companyProfile": {"name": "Komfi", "thesis": "Companionship for seniors", "strategicGoal": "Three regions"},
        "proofScore": {"score": "72", "summary": "Pilot retention is real", "citations": [" pilot ", "goals"]},
        "evidenceGapIndex": {"percent": 140, "summary": "Pricing untested", "citations": ["goals"]},
        "riskDecomposition": [
            {"category": "Demand Risk", "score": 35, "note": "Waitlist exists", "citations": ["pilot"]},
            {"category": "Monetization Risk", "score": 61, "note": "Price not validated", "citations": ["made-up"]}
        ],
        "hypothesisLedger": [
            {"claim": "Seniors renew", "test": "Quarterly cohort", "signal": "Retention > 65%", "owner": "Ops", "status": "being validated", "citations": ["pilot"]},
            {"claim": "Families pay", "test": "Price page", "signal": "Conversions", "owner": "", "status": "RISKY", "citations": ["goals"]}
        ],
        "validation72h": [
            {"title": "Asset", "detail": "Landing page", "citations": ["goals"]}
        ],
        "aiLeverAnalysis": [
            {"label": "Matching", "value": "Faster pairing", "tone": "Neutral-ish", "citations": ["goals"]}
        ],
        "expansionTriggers": [
            {"trigger": "Retention above 70%", "status": "Done", "citations": ["pilot"]},
            {"trigger": "Brno partner signed", "status": "blocked by legal", "citations": ["goals"]}
        ],
        "portfolioDashboard": {
            "riskDistribution": [{"label": "Demand", "value": 1}, {"label": "Monetization", "value": 2}],
            "historicalComparison": []
        },
        "vcMemo": {"title": "Komfi preview", "recommendation": "Track", "bullets": ["Retention 71%"], "citations": ["pilot"]},
        "apiProjection": {
            "deal_id": "komfi_preview_001",
            "proofscore": 72,
            "evidence_gap_index": 40,
            "risk_ledger": {"demand": 35.4, "monetization": -3, "distribution": "50"},
            "validation_72h": {"asset": "Landing page", "threshold": "30 signups", "decision": "Go"}
        }
    })
}

fn config_in(dir: &std::path::Path) -> PipelineConfig {
    PipelineConfig::new(sources_config(), ArtifactPaths::in_dir(dir))
}

// ============================================================================
// Collection → synthesis prompt
// ============================================================================

#[tokio::test]
async fn test_paged_nested_pages_reach_the_prompt() {
    let dir = tempdir().unwrap();
    let store = store();
    let model = RecordingModel::new(full_reply().to_string());

    run_pipeline(&store, &model, &config_in(dir.path()), now()).await.unwrap();

    // Every page of children is listed before descending into g2; lines stay in document order.
    let listings = store.listings.lock().unwrap().clone();
    let goals: Vec<_> = listings
        .iter()
        .filter(|(id, _)| id == "p-goals" || id == "g2")
        .map(|(id, cursor)| (id.as_str(), cursor.as_deref()))
        .collect();
    assert_eq!(
        goals,
        vec![("p-goals", None), ("p-goals", Some("1")), ("p-goals", Some("2")), ("g2", None)]
    );

    let prompt = model.last_prompt();
    assert!(prompt.contains("Demand Risk, Monetization Risk, Distribution Risk"));
    assert!(prompt.contains("## Targets"));
    assert!(prompt.contains("- Target: 500 paying members by Q2 2027"));
    assert!(prompt.contains("Membership price set at 1 490 CZK per month."));
    assert!(prompt.contains("> Pilot retention held at 71 percent"));
    assert!(prompt.contains("2026-10-16T09:30:00.000Z"));

    let manifest = read_json(&ArtifactPaths::in_dir(dir.path()).sources()).unwrap();
    let claims: Vec<&str> = manifest["facts"]
        .as_array()
        .unwrap()
        .iter()
        .filter(|f| f["sourceId"] == "goals")
        .filter_map(|f| f["claim"].as_str())
        .collect();
    assert_eq!(
        claims,
        vec![
            "- Target: 500 paying members by Q2 2027",
            "Membership price set at 1 490 CZK per month.",
            "Expanze do Brna a Ostravy po ověření pilotu.",
        ]
    );
}

// ============================================================================
// Model reply → normalized snapshot
// ============================================================================

#[tokio::test]
async fn test_sloppy_reply_is_repaired_into_a_valid_snapshot() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    let model = RecordingModel::new(format!("Here you go:\n{}\nThanks!", full_reply()));

    let outcome = run_pipeline(&store(), &model, &config, now()).await.unwrap();
    let snapshot = &outcome.artifacts.snapshot;

    assert_eq!(snapshot.proof_score.score, 72);
    assert_eq!(snapshot.proof_score.citations, vec!["pilot", "goals"]);
    assert_eq!(snapshot.evidence_gap_index.percent, 100);

    // The unknown id is dropped and replaced by the first known source.
    assert_eq!(snapshot.risk_decomposition[1].citations, vec!["goals"]);
    assert_eq!(snapshot.risk_decomposition.len(), 2);

    assert_eq!(snapshot.hypothesis_ledger[0].status, LedgerStatus::Validated);
    assert_eq!(snapshot.hypothesis_ledger[1].status, LedgerStatus::Risky);
    assert_eq!(snapshot.hypothesis_ledger[1].owner, "Komfi team");
    assert_eq!(snapshot.expansion_triggers[0].status, TriggerStatus::Ready);
    assert_eq!(snapshot.expansion_triggers[1].status, TriggerStatus::Blocked);

    let distribution: Vec<u32> = snapshot
        .portfolio_dashboard
        .risk_distribution
        .iter()
        .map(|r| r.value)
        .collect();
    assert_eq!(distribution.iter().sum::<u32>(), 100);
    assert_eq!(distribution, vec![33, 67]);

    assert_eq!(snapshot.portfolio_dashboard.historical_comparison.len(), 1);
    assert_eq!(snapshot.api_projection.risk_ledger.demand, 35);
    assert_eq!(snapshot.api_projection.risk_ledger.monetization, 0);
    assert_eq!(snapshot.api_projection.risk_ledger.distribution, 50);
    assert!(!outcome.report.is_empty());

    let written = read_json(&config.paths.snapshot()).unwrap();
    assert!(validate_snapshot(&written, &["goals".to_string(), "pilot".to_string()]).is_valid());
}

// ============================================================================
// Artifacts → checker
// ============================================================================

#[tokio::test]
async fn test_checker_round_trip_and_tampering() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    let outcome = run_pipeline(&store(), &RecordingModel::new(full_reply().to_string()), &config, now())
        .await
        .unwrap();

    let snapshot: Snapshot = serde_json::from_value(read_json(&config.paths.snapshot()).unwrap()).unwrap();
    let sources: SourcesManifest = serde_json::from_value(read_json(&config.paths.sources()).unwrap()).unwrap();
    let recomputed = compute_checksum(
        &serde_json::to_string(&snapshot).unwrap(),
        &serde_json::to_string(&sources).unwrap(),
    );
    assert_eq!(recomputed, outcome.artifacts.meta.checksum);

    let report = check_artifacts(&config.paths, now() + Duration::days(1)).unwrap();
    assert_eq!(report.source_count, 2);
    assert!(report.warnings.is_empty());

    // Dropping the checksum is a warning, not a failure.
    let mut meta = read_json(&config.paths.meta()).unwrap();
    meta["checksum"] = json!("");
    std::fs::write(config.paths.meta(), meta.to_string()).unwrap();
    let report = check_artifacts(&config.paths, now()).unwrap();
    assert_eq!(report.warnings, vec![CheckWarning::MissingChecksum]);

    // A citation the manifest does not know about is fatal.
    let mut snapshot = read_json(&config.paths.snapshot()).unwrap();
    snapshot["riskDecomposition"][0]["citations"] = json!(["nonexistent-id"]);
    std::fs::write(config.paths.snapshot(), snapshot.to_string()).unwrap();
    let err = check_artifacts(&config.paths, now()).unwrap_err();
    assert!(matches!(err, SnapshotError::Validation(_)));
    assert!(err
        .violations()
        .iter()
        .any(|v| v == "riskDecomposition[0].citations contains unknown source id: nonexistent-id"));
}

#[tokio::test]
async fn test_failed_run_keeps_previous_artifacts() {
    let dir = tempdir().unwrap();
    let config = config_in(dir.path());
    run_pipeline(&store(), &RecordingModel::new(full_reply().to_string()), &config, now())
        .await
        .unwrap();
    let before = std::fs::read_to_string(config.paths.snapshot()).unwrap();

    let mut broken = full_reply();
    broken["vcMemo"]["title"] = json!("   ");
    let later = now() + Duration::days(2);
    let err = run_pipeline(&store(), &RecordingModel::new(broken.to_string()), &config, later)
        .await
        .unwrap_err();
    assert!(matches!(err, SnapshotError::Validation(_)));

    assert_eq!(std::fs::read_to_string(config.paths.snapshot()).unwrap(), before);
    let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 3);
}

#[test]
fn test_missing_output_dir_is_an_io_error() {
    let dir = tempdir().unwrap();
    let paths = ArtifactPaths::in_dir(dir.path().join("never-written"));
    let err = check_artifacts(&paths, now()).unwrap_err();
    assert!(matches!(err, SnapshotError::Io { .. }));
}
