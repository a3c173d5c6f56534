//! ProofCanvas snapshot contract
//!
//! Turns a raw model reply into the dashboard snapshot and persists it:
//!
//! ```text
//! raw JSON ──► normalize ──► validate ──► artifacts (+ checksum)
//!                 │              │
//!                 ▼              ▼
//!          NormalizationReport  every violation, or nothing is written
//! ```
//!
//! ## Guarantees
//!
//! - **Repair, then gate**: normalization never fails; the schema validator is
//!   the only thing that can reject a snapshot, and it reports every violation.
//! - **Closed citations**: every citation names a source collected in the same run.
//! - **All or nothing**: the three artifacts are staged first and only then
//!   renamed into place.

use std::path::Path;

pub mod artifacts;
pub mod check;
pub mod coerce;
pub mod normalize;
pub mod pipeline;
pub mod schema;
pub mod validate;

pub use artifacts::*;
pub use check::*;
pub use coerce::*;
pub use normalize::*;
pub use pipeline::*;
pub use schema::*;
pub use validate::*;

use proofcanvas_ingest::IngestError;
use proofcanvas_llm::SynthesisError;

/// Days after which a snapshot is considered stale.
pub const SNAPSHOT_STALE_DAYS: u32 = 14;

/// Version label stamped on every generated snapshot.
pub const VERSION_TAG: &str = "v0.9 Preview";

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    #[error("no sources were collected; citations need at least one source")]
    NoSources,
    #[error("snapshot schema validation failed ({} error(s))", .0.len())]
    Validation(Vec<String>),
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON in {path}: {source}")]
    Malformed {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize artifact: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error(transparent)]
    Ingest(#[from] IngestError),
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}

impl SnapshotError {
    pub(crate) fn io(path: &Path, source: std::io::Error) -> Self {
        SnapshotError::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// Individual violations when this is a validation failure.
    pub fn violations(&self) -> &[String] {
        match self {
            SnapshotError::Validation(errors) => errors,
            _ => &[],
        }
    }
}
