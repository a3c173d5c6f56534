//! Report synthesis: payload, prompt, and the single model call.

use proofcanvas_ingest::{CandidateFact, SourceDocument};
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::json_extract::parse_model_json;
use crate::{CompletionRequest, FinishReason, LlmError, LlmProvider, Message};

/// Characters of source content embedded in the synthesis payload.
pub const PAYLOAD_EXCERPT_CHARS: usize = 7_000;
/// Facts per source re-surfaced to the model.
pub const PAYLOAD_FACTS_PER_SOURCE: usize = 10;

pub const SYNTHESIS_MAX_TOKENS: usize = 4_200;
pub const SYNTHESIS_TEMPERATURE: f32 = 0.2;

/// The six risk categories the report must decompose into.
pub const RISK_CATEGORIES: [&str; 6] = [
    "Demand Risk",
    "Monetization Risk",
    "Distribution Risk",
    "Execution Risk",
    "AI Fragility Risk",
    "Regulatory Risk",
];

#[derive(Debug, thiserror::Error)]
pub enum SynthesisError {
    #[error("LLM call failed: {0}")]
    Llm(#[from] LlmError),
    #[error("AI response is empty")]
    EmptyReply,
    #[error("unable to parse AI response as JSON ({0})")]
    Unparsable(String),
    #[error("failed to serialize synthesis payload: {0}")]
    Payload(#[from] serde_json::Error),
}

// ============================================================================
// Payload
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadSource {
    pub id: String,
    pub title: String,
    pub url: String,
    pub freshness: String,
    pub last_edited: Option<String>,
    pub base_confidence: u8,
    pub content_excerpt: String,
    pub top_facts: Vec<String>,
}

/// Everything the model is allowed to reason over.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SynthesisPayload {
    pub generated_at: String,
    pub source_mode: String,
    pub source_count: usize,
    pub sources: Vec<PayloadSource>,
}

impl SynthesisPayload {
    pub fn build(
        sources: &[SourceDocument],
        facts: &[CandidateFact],
        generated_at: &str,
        source_mode: &str,
    ) -> Self {
        let sources = sources
            .iter()
            .map(|source| PayloadSource {
                id: source.id.clone(),
                title: source.title.clone(),
                url: source.url.clone(),
                freshness: source.freshness.clone(),
                last_edited: source.last_edited.clone(),
                base_confidence: source.base_confidence,
                content_excerpt: source.excerpt(PAYLOAD_EXCERPT_CHARS),
                top_facts: facts
                    .iter()
                    .filter(|fact| fact.source_id == source.id)
                    .take(PAYLOAD_FACTS_PER_SOURCE)
                    .map(|fact| fact.claim.clone())
                    .collect(),
            })
            .collect::<Vec<_>>();

        Self {
            generated_at: generated_at.to_string(),
            source_mode: source_mode.to_string(),
            source_count: sources.len(),
            sources,
        }
    }
}

// ============================================================================
// Prompt
// ============================================================================

const TARGET_SHAPE: &str = r#"{
  "companyProfile": {"name":"Komfi","thesis":"...","strategicGoal":"..."},
  "proofScore": {"score": 0, "summary":"...", "citations":["source-id"]},
  "evidenceGapIndex": {"percent": 0, "summary":"...", "citations":["source-id"]},
  "riskDecomposition": [{"category":"Demand Risk","score":0,"note":"...","citations":["source-id"]}],
  "hypothesisLedger": [{"claim":"...","test":"...","signal":"...","owner":"...","status":"In validation|Risky|Planned|Validated","citations":["source-id"]}],
  "validation72h": [{"title":"Asset|Traffic|Threshold|Decision","detail":"...","citations":["source-id"]}],
  "aiLeverAnalysis": [{"label":"...","value":"...","tone":"positive|neutral|negative","citations":["source-id"]}],
  "expansionTriggers": [{"trigger":"...","status":"tracking|ready|blocked","citations":["source-id"]}],
  "portfolioDashboard": {
    "riskDistribution": [{"label":"Demand","value":0}],
    "historicalComparison": [{"deal":"...","proofScore":0,"evidenceGap":0,"recommendation":"...","citations":["source-id"]}]
  },
  "vcMemo": {"title":"...","recommendation":"...","bullets":["..."],"citations":["source-id"]},
  "apiProjection": {
    "deal_id":"komfi_preview_001",
    "proofscore":0,
    "evidence_gap_index":0,
    "risk_ledger":{"demand":0,"monetization":0,"distribution":0},
    "validation_72h":{"asset":"...","threshold":"...","decision":"..."}
  }
}"#;

/// The single user prompt: extraction rules, target shape, then the payload.
pub fn build_prompt(payload: &SynthesisPayload) -> Result<String, SynthesisError> {
    let payload_json = serde_json::to_string(payload)?;
    Ok(format!(
        r#"Analyze Komfi startup documents and produce a venture-style intelligence snapshot.

Rules:
- Use ONLY the provided Notion-derived payload.
- Do not invent external data.
- Every claim row must include citations with existing source IDs.
- Return strict JSON only (no markdown).
- Scores are 0-100 integers.
- Risk categories MUST be exactly: {categories}.

Target JSON shape:
{TARGET_SHAPE}

Input payload JSON:
{payload_json}"#,
        categories = RISK_CATEGORIES.join(", "),
    ))
}

// ============================================================================
// Synthesizer
// ============================================================================

pub struct ReportSynthesizer<'a> {
    provider: &'a dyn LlmProvider,
}

impl<'a> ReportSynthesizer<'a> {
    pub fn new(provider: &'a dyn LlmProvider) -> Self {
        Self { provider }
    }

    /// One non-streaming call; the reply must recover to JSON or the run fails.
    pub async fn synthesize(&self, payload: &SynthesisPayload) -> Result<Value, SynthesisError> {
        let prompt = build_prompt(payload)?;
        let request = CompletionRequest {
            messages: vec![Message::user(prompt.clone())],
            max_tokens: SYNTHESIS_MAX_TOKENS,
            temperature: Some(SYNTHESIS_TEMPERATURE),
        };

        info!(
            model = %self.provider.model_name(),
            prompt_chars = prompt.chars().count(),
            sources = payload.source_count,
            "requesting snapshot synthesis"
        );
        let response = self.provider.complete(request).await?;
        if response.finish_reason == FinishReason::Length {
            warn!("model reply hit the output token budget; JSON may be truncated");
        }

        let (value, strategy) = parse_model_json(&response.content)?;
        info!(
            model = %response.model,
            reply_chars = response.content.chars().count(),
            completion_tokens = response.usage.completion_tokens,
            strategy = strategy.name(),
            "parsed synthesis reply"
        );
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source(id: &str, content: &str) -> SourceDocument {
        SourceDocument {
            id: id.to_string(),
            page_id: format!("page-{id}"),
            title: id.to_uppercase(),
            url: format!("https://notion.so/{id}"),
            freshness: "verified".to_string(),
            last_edited: Some("2026-10-16T00:00:00.000Z".to_string()),
            content: content.to_string(),
            base_confidence: 91,
        }
    }

    fn fact(source_id: &str, n: usize) -> CandidateFact {
        CandidateFact {
            id: format!("{source_id}-f{n}"),
            source_id: source_id.to_string(),
            claim: format!("claim {n}"),
            has_numeric_signal: true,
        }
    }

    #[test]
    fn payload_caps_excerpt_and_facts_per_source() {
        let sources = vec![source("a", &"y".repeat(9_000)), source("b", "short")];
        let mut facts: Vec<_> = (1..=15).map(|n| fact("a", n)).collect();
        facts.push(fact("b", 1));

        let payload = SynthesisPayload::build(&sources, &facts, "2026-10-16T00:00:00.000Z", "live");
        assert_eq!(payload.source_count, 2);
        assert_eq!(payload.sources[0].content_excerpt.chars().count(), PAYLOAD_EXCERPT_CHARS);
        assert_eq!(payload.sources[0].top_facts.len(), PAYLOAD_FACTS_PER_SOURCE);
        assert_eq!(payload.sources[0].top_facts[0], "claim 1");
        assert_eq!(payload.sources[1].top_facts, vec!["claim 1".to_string()]);
    }

    #[test]
    fn payload_serializes_camel_case() {
        let payload = SynthesisPayload::build(&[source("a", "x")], &[], "t", "live");
        let value = serde_json::to_value(&payload).unwrap();
        assert_eq!(value["sourceCount"], 1);
        assert_eq!(value["sources"][0]["baseConfidence"], 91);
        assert!(value["sources"][0]["contentExcerpt"].is_string());
        assert!(value["sources"][0]["topFacts"].is_array());
    }

    #[test]
    fn prompt_embeds_rules_shape_and_payload() {
        let payload = SynthesisPayload::build(&[source("strategy", "x")], &[], "t", "live");
        let prompt = build_prompt(&payload).unwrap();
        assert!(prompt.contains("Return strict JSON only"));
        assert!(prompt.contains("Demand Risk, Monetization Risk, Distribution Risk, Execution Risk, AI Fragility Risk, Regulatory Risk"));
        assert!(prompt.contains("\"riskDecomposition\""));
        assert!(prompt.ends_with(&serde_json::to_string(&payload).unwrap()));
    }
}
