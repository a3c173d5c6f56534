//! End-to-end snapshot generation.
//!
//! collect → facts → synthesize → normalize → validate → write. Every stage
//! before the write is in memory; nothing touches disk unless validation passes.

use chrono::{DateTime, SecondsFormat, Utc};
use proofcanvas_ingest::{collect_sources, extract_all_facts, DocumentStore, SourcesConfig};
use proofcanvas_llm::{LlmProvider, ReportSynthesizer, SynthesisPayload};
use tracing::info;

use crate::artifacts::{ArtifactPaths, Artifacts, SourcesManifest};
use crate::normalize::{normalize_snapshot, NormalizationReport, SnapshotContext, SourceIndex};
use crate::validate::validate_snapshot;
use crate::{SnapshotError, SNAPSHOT_STALE_DAYS, VERSION_TAG};

/// Everything a run needs, passed in by the caller.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub sources: SourcesConfig,
    pub stale_after_days: u32,
    pub version_tag: String,
    pub paths: ArtifactPaths,
}

impl PipelineConfig {
    pub fn new(sources: SourcesConfig, paths: ArtifactPaths) -> Self {
        Self {
            sources,
            stale_after_days: SNAPSHOT_STALE_DAYS,
            version_tag: VERSION_TAG.to_string(),
            paths,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub artifacts: Artifacts,
    pub report: NormalizationReport,
}

/// `2026-10-16T09:30:00.000Z`
pub fn generated_at(now: DateTime<Utc>) -> String {
    now.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Build and validate the artifacts without writing them.
pub async fn generate_snapshot(
    store: &dyn DocumentStore,
    provider: &dyn LlmProvider,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<PipelineOutcome, SnapshotError> {
    let generated_at = generated_at(now);
    let mode = config.sources.mode.as_str();

    let sources = collect_sources(store, &config.sources, now).await?;
    let index = SourceIndex::new(&sources)?;
    let facts = extract_all_facts(&sources);
    info!(sources = sources.len(), facts = facts.len(), "collected sources");

    let payload = SynthesisPayload::build(&sources, &facts, &generated_at, mode);
    let raw = ReportSynthesizer::new(provider).synthesize(&payload).await?;

    let context = SnapshotContext {
        version_tag: config.version_tag.clone(),
        generated_at: generated_at.clone(),
        snapshot_days_valid: config.stale_after_days,
        source_mode: mode.to_string(),
    };
    let (snapshot, report) = normalize_snapshot(&raw, &index, &context);

    let validation = validate_snapshot(&serde_json::to_value(&snapshot)?, index.ids());
    if !validation.is_valid() {
        return Err(SnapshotError::Validation(validation.errors));
    }

    let manifest = SourcesManifest::build(&generated_at, mode, &sources, &facts);
    let artifacts = Artifacts::new(snapshot, manifest)?;
    Ok(PipelineOutcome { artifacts, report })
}

/// Generate, validate, and write the three artifacts.
pub async fn run_pipeline(
    store: &dyn DocumentStore,
    provider: &dyn LlmProvider,
    config: &PipelineConfig,
    now: DateTime<Utc>,
) -> Result<PipelineOutcome, SnapshotError> {
    let outcome = generate_snapshot(store, provider, config, now).await?;
    outcome.artifacts.write(&config.paths)?;
    Ok(outcome)
}
