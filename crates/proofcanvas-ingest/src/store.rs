//! Document store interface and the wire shapes it returns.
//!
//! The shapes mirror the Notion REST objects closely enough to deserialize them
//! directly, but only keep what collection needs: page title/freshness properties,
//! the last-edited timestamp, and per-block rich text.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::IngestError;

/// Access to a hierarchical workspace store.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Retrieve page metadata (properties, last edit).
    async fn retrieve_page(&self, page_id: &str) -> Result<Page, IngestError>;

    /// List one page of a block's children, continuing from `cursor`.
    async fn list_children(
        &self,
        block_id: &str,
        cursor: Option<&str>,
    ) -> Result<BlockList, IngestError>;
}

// ============================================================================
// Pages
// ============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub last_edited_time: Option<String>,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

/// A typed page property. Kinds collection does not read collapse into `Other`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PropertyValue {
    Title {
        #[serde(default)]
        title: Vec<RichText>,
    },
    Select {
        #[serde(default)]
        select: Option<SelectOption>,
    },
    Status {
        #[serde(default)]
        status: Option<SelectOption>,
    },
    RichText {
        #[serde(default)]
        rich_text: Vec<RichText>,
    },
    Formula {
        #[serde(default)]
        formula: Option<FormulaValue>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SelectOption {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FormulaValue {
    String {
        #[serde(default)]
        string: Option<String>,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RichText {
    #[serde(default)]
    pub plain_text: String,
}

/// Concatenate the plain text of a rich-text run.
pub fn plain_text(parts: &[RichText]) -> String {
    parts.iter().map(|p| p.plain_text.as_str()).collect()
}

// ============================================================================
// Blocks
// ============================================================================

/// A content block. The payload lives under a key named after the block type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub has_children: bool,
    #[serde(flatten)]
    pub payload: BTreeMap<String, Value>,
}

/// The fields of a block payload that rendering reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BlockPayload {
    #[serde(default)]
    pub rich_text: Vec<RichText>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub cells: Vec<Vec<RichText>>,
}

impl Block {
    /// Decode the type-keyed payload; unreadable payloads render as empty.
    pub fn data(&self) -> BlockPayload {
        self.payload
            .get(&self.kind)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockList {
    #[serde(default)]
    pub results: Vec<Block>,
    #[serde(default)]
    pub has_more: bool,
    #[serde(default)]
    pub next_cursor: Option<String>,
}
