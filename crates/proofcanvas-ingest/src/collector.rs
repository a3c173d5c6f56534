//! Source collection: one `SourceDocument` per configured page.

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::blocks::{flatten_blocks, MAX_BLOCK_DEPTH};
use crate::confidence::base_confidence;
use crate::store::{plain_text, DocumentStore, FormulaValue, Page, PropertyValue};
use crate::{
    truncate_chars, IngestError, SourceDefinition, SourceDocument, SourcesConfig,
    MAX_CONTENT_CHARS, UNKNOWN_FRESHNESS,
};

/// First non-empty title property on the page, else `fallback`.
pub fn extract_title(page: &Page, fallback: &str) -> String {
    page.properties
        .values()
        .find_map(|prop| match prop {
            PropertyValue::Title { title } => {
                let text = plain_text(title).trim().to_string();
                (!text.is_empty()).then_some(text)
            }
            _ => None,
        })
        .unwrap_or_else(|| fallback.to_string())
}

/// Lower-cased freshness label read from `property_name`, or `unknown`.
pub fn extract_freshness(page: &Page, property_name: &str) -> String {
    let label = match page.properties.get(property_name) {
        Some(PropertyValue::Select { select }) | Some(PropertyValue::Status { status: select }) => {
            select.as_ref().and_then(|s| s.name.clone())
        }
        Some(PropertyValue::RichText { rich_text }) => Some(plain_text(rich_text)),
        Some(PropertyValue::Formula {
            formula: Some(FormulaValue::String { string }),
        }) => string.clone(),
        _ => None,
    };

    match label.map(|l| l.to_lowercase()) {
        Some(l) if !l.is_empty() => l,
        _ => UNKNOWN_FRESHNESS.to_string(),
    }
}

/// Collect one configured document: metadata, flattened body, confidence.
pub async fn collect_source(
    store: &dyn DocumentStore,
    definition: &SourceDefinition,
    freshness_property: &str,
    now: DateTime<Utc>,
) -> Result<SourceDocument, IngestError> {
    let page = store.retrieve_page(&definition.page_id).await?;
    let content = flatten_blocks(store, &definition.page_id, MAX_BLOCK_DEPTH).await?;

    let fallback_title = if definition.title.trim().is_empty() {
        definition.id.as_str()
    } else {
        definition.title.as_str()
    };
    let title = extract_title(&page, fallback_title);
    let freshness = extract_freshness(&page, freshness_property);
    let last_edited = page.last_edited_time.clone();
    let confidence = base_confidence(&freshness, last_edited.as_deref(), now);

    debug!(
        source = %definition.id,
        raw_chars = content.chars().count(),
        "flattened source content"
    );

    Ok(SourceDocument {
        id: definition.id.clone(),
        page_id: definition.page_id.clone(),
        title,
        url: definition.url.clone(),
        freshness,
        last_edited,
        content: truncate_chars(&content, MAX_CONTENT_CHARS),
        base_confidence: confidence,
    })
}

/// Collect every configured source, in order. Any failure aborts the whole set.
pub async fn collect_sources(
    store: &dyn DocumentStore,
    config: &SourcesConfig,
    now: DateTime<Utc>,
) -> Result<Vec<SourceDocument>, IngestError> {
    config.validate()?;

    let mut sources = Vec::with_capacity(config.sources.len());
    for definition in &config.sources {
        let source = collect_source(store, definition, &config.freshness_property, now).await?;
        info!(
            source = %source.id,
            freshness = %source.freshness,
            base_confidence = source.base_confidence,
            content_chars = source.content.chars().count(),
            "collected source"
        );
        sources.push(source);
    }

    Ok(sources)
}
