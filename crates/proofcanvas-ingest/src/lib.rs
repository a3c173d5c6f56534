//! Source ingestion for ProofCanvas snapshots
//!
//! Pulls the configured documents out of a workspace store (Notion), flattens their
//! block trees into plain text, and derives the per-source signals the synthesizer
//! needs:
//! - a base confidence score (freshness label blended with edit recency)
//! - a bounded list of candidate facts (numeric or keyword-bearing lines)
//!
//! Output:
//! - `SourceDocument` records, immutable once their confidence is assigned
//! - `CandidateFact` records tagged to their source
//!
//! **Untrusted boundary**: everything read here comes from a shared workspace; the
//! only thing this crate promises is shape (bounded lengths, lower-cased labels).

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

pub mod blocks;
pub mod collector;
pub mod confidence;
pub mod fact_extraction;
pub mod notion;
pub mod store;

pub use blocks::*;
pub use collector::*;
pub use confidence::*;
pub use fact_extraction::*;
pub use notion::{NotionClient, NotionConfig};
pub use store::*;

/// Maximum characters of flattened content kept per source.
pub const MAX_CONTENT_CHARS: usize = 18_000;

/// Freshness label used when the page carries no usable classification.
pub const UNKNOWN_FRESHNESS: &str = "unknown";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("configuration error: {0}")]
    Config(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("network error talking to the document store: {0}")]
    Http(String),
    #[error("document store returned {status} for {resource}: {body}")]
    Api {
        resource: String,
        status: u16,
        body: String,
    },
    #[error("could not decode {resource}: {message}")]
    Decode { resource: String, message: String },
}

// ============================================================================
// Configuration
// ============================================================================

/// One configured document to collect.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourceDefinition {
    /// Short stable key used for citations.
    pub id: String,
    pub page_id: String,
    /// Display-title fallback when the page has no title of its own.
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

/// The document list plus the run-wide labels that travel with it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SourcesConfig {
    /// Passed through verbatim into every artifact.
    #[serde(default)]
    pub mode: String,
    /// Name of the page property holding the freshness classification.
    #[serde(default)]
    pub freshness_property: String,
    #[serde(default)]
    pub sources: Vec<SourceDefinition>,
}

impl SourcesConfig {
    /// Parse and validate a sources configuration from JSON text.
    pub fn from_json(text: &str) -> Result<Self, IngestError> {
        let config: Self = serde_json::from_str(text)
            .map_err(|e| IngestError::Config(format!("malformed sources config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a sources configuration file.
    pub fn load(path: &Path) -> Result<Self, IngestError> {
        let text = std::fs::read_to_string(path).map_err(|source| IngestError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    pub fn validate(&self) -> Result<(), IngestError> {
        if self.sources.is_empty() {
            return Err(IngestError::Config("no sources configured".to_string()));
        }

        let mut seen = HashSet::new();
        for (idx, source) in self.sources.iter().enumerate() {
            if source.id.trim().is_empty() {
                return Err(IngestError::Config(format!("sources[{idx}].id is empty")));
            }
            if source.page_id.trim().is_empty() {
                return Err(IngestError::Config(format!(
                    "sources[{idx}] ({}) has an empty pageId",
                    source.id
                )));
            }
            if !seen.insert(source.id.as_str()) {
                return Err(IngestError::Config(format!(
                    "duplicate source id: {}",
                    source.id
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Collected records
// ============================================================================

/// One ingested document with its derived confidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourceDocument {
    pub id: String,
    pub page_id: String,
    pub title: String,
    pub url: String,
    /// Lower-cased classification label, or `unknown`.
    pub freshness: String,
    pub last_edited: Option<String>,
    /// Flattened body, capped at [`MAX_CONTENT_CHARS`].
    pub content: String,
    pub base_confidence: u8,
}

impl SourceDocument {
    /// Freshness labels that mark the source as outdated.
    pub fn is_stale(&self) -> bool {
        self.freshness.contains("expired") || self.freshness.contains("stale")
    }

    /// Leading `max_chars` characters of the body.
    pub fn excerpt(&self, max_chars: usize) -> String {
        truncate_chars(&self.content, max_chars)
    }
}

/// A heuristically selected line of a source, surfaced as supporting evidence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CandidateFact {
    pub id: String,
    pub source_id: String,
    pub claim: String,
    pub has_numeric_signal: bool,
}

/// Keep at most `max_chars` characters (never splits a character).
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_idx, _)) => text[..byte_idx].to_string(),
        None => text.to_string(),
    }
}
