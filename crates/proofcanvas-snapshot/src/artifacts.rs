//! Persisted artifacts: snapshot, sources manifest, meta with checksum.
//!
//! All three files are staged as temporaries in the output directory and only
//! renamed into place once every one of them has been written.

use proofcanvas_ingest::{truncate_chars, CandidateFact, SourceDocument};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::info;

use crate::schema::Snapshot;
use crate::SnapshotError;

/// Characters of source content kept in the manifest.
pub const MANIFEST_EXCERPT_CHARS: usize = 450;
/// Facts persisted in the manifest, across all sources.
pub const MAX_MANIFEST_FACTS: usize = 120;

pub const DEFAULT_OUTPUT_DIR: &str = "src/data";
pub const SNAPSHOT_FILE: &str = "komfiSnapshot.generated.json";
pub const SOURCES_FILE: &str = "komfiSnapshot.sources.json";
pub const META_FILE: &str = "komfiSnapshot.meta.json";

// ============================================================================
// Paths
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub dir: PathBuf,
}

impl Default for ArtifactPaths {
    fn default() -> Self {
        Self::in_dir(DEFAULT_OUTPUT_DIR)
    }
}

impl ArtifactPaths {
    pub fn in_dir(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn snapshot(&self) -> PathBuf {
        self.dir.join(SNAPSHOT_FILE)
    }

    pub fn sources(&self) -> PathBuf {
        self.dir.join(SOURCES_FILE)
    }

    pub fn meta(&self) -> PathBuf {
        self.dir.join(META_FILE)
    }
}

// ============================================================================
// Manifest + meta
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestSource {
    pub id: String,
    pub page_id: String,
    pub title: String,
    pub url: String,
    pub freshness: String,
    pub last_edited: Option<String>,
    pub base_confidence: u8,
    pub excerpt: String,
}

impl From<&SourceDocument> for ManifestSource {
    fn from(source: &SourceDocument) -> Self {
        Self {
            id: source.id.clone(),
            page_id: source.page_id.clone(),
            title: source.title.clone(),
            url: source.url.clone(),
            freshness: source.freshness.clone(),
            last_edited: source.last_edited.clone(),
            base_confidence: source.base_confidence,
            excerpt: truncate_chars(&source.content, MANIFEST_EXCERPT_CHARS),
        }
    }
}

/// What the snapshot was built from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SourcesManifest {
    pub generated_at: String,
    pub source_mode: String,
    pub sources: Vec<ManifestSource>,
    pub facts: Vec<CandidateFact>,
}

impl SourcesManifest {
    pub fn build(
        generated_at: &str,
        source_mode: &str,
        sources: &[SourceDocument],
        facts: &[CandidateFact],
    ) -> Self {
        Self {
            generated_at: generated_at.to_string(),
            source_mode: source_mode.to_string(),
            sources: sources.iter().map(ManifestSource::from).collect(),
            facts: facts.iter().take(MAX_MANIFEST_FACTS).cloned().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMeta {
    pub generated_at: String,
    pub version_tag: String,
    pub source_mode: String,
    pub source_count: usize,
    pub stale_after_days: u32,
    pub checksum: String,
}

/// Hex SHA-256 over the compact snapshot JSON followed by the compact manifest JSON.
pub fn compute_checksum(snapshot_json: &str, sources_json: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(snapshot_json.as_bytes());
    hasher.update(sources_json.as_bytes());
    let digest = hasher.finalize();

    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest.iter() {
        let _ = write!(out, "{b:02x}");
    }
    out
}

/// The three artifacts of one run, ready to be written.
#[derive(Debug, Clone)]
pub struct Artifacts {
    pub snapshot: Snapshot,
    pub sources: SourcesManifest,
    pub meta: SnapshotMeta,
}

impl Artifacts {
    pub fn new(snapshot: Snapshot, sources: SourcesManifest) -> Result<Self, SnapshotError> {
        let checksum = compute_checksum(
            &serde_json::to_string(&snapshot)?,
            &serde_json::to_string(&sources)?,
        );
        let meta = SnapshotMeta {
            generated_at: snapshot.generated_at.clone(),
            version_tag: snapshot.version_tag.clone(),
            source_mode: snapshot.source_mode.clone(),
            source_count: sources.sources.len(),
            stale_after_days: snapshot.snapshot_days_valid,
            checksum,
        };
        Ok(Self {
            snapshot,
            sources,
            meta,
        })
    }

    /// Stage all three files, then rename them into place.
    pub fn write(&self, paths: &ArtifactPaths) -> Result<(), SnapshotError> {
        std::fs::create_dir_all(&paths.dir).map_err(|e| SnapshotError::io(&paths.dir, e))?;

        let staged = [
            (stage(&paths.dir, &self.snapshot)?, paths.snapshot()),
            (stage(&paths.dir, &self.sources)?, paths.sources()),
            (stage(&paths.dir, &self.meta)?, paths.meta()),
        ];
        for (file, target) in staged {
            file.persist(&target)
                .map_err(|e| SnapshotError::io(&target, e.error))?;
        }

        info!(
            dir = %paths.dir.display(),
            checksum = %self.meta.checksum,
            "wrote snapshot artifacts"
        );
        Ok(())
    }
}

/// Pretty JSON with a trailing newline, written to a temporary next to its target.
fn stage<T: Serialize>(dir: &Path, value: &T) -> Result<NamedTempFile, SnapshotError> {
    let mut text = serde_json::to_string_pretty(value)?;
    text.push('\n');

    let mut file = NamedTempFile::new_in(dir).map_err(|e| SnapshotError::io(dir, e))?;
    file.write_all(text.as_bytes())
        .and_then(|()| file.as_file().sync_all())
        .map_err(|e| SnapshotError::io(file.path(), e))?;
    Ok(file)
}

/// Read and parse one JSON artifact.
pub fn read_json(path: &Path) -> Result<serde_json::Value, SnapshotError> {
    let text = std::fs::read_to_string(path).map_err(|e| SnapshotError::io(path, e))?;
    serde_json::from_str(&text).map_err(|source| SnapshotError::Malformed {
        path: path.display().to_string(),
        source,
    })
}
