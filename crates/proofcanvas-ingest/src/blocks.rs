//! Block-tree flattening
//!
//! Renders each block to one line with a prefix that keeps its role visible to the
//! model (headings, list items, quotes, callouts, code, table rows), then walks the
//! tree depth-first up to [`MAX_BLOCK_DEPTH`] levels below the page.

use crate::store::{plain_text, Block, DocumentStore};
use crate::IngestError;

/// Nesting levels followed below the page root.
pub const MAX_BLOCK_DEPTH: usize = 6;

/// Render a single block to its text line; empty when the block carries no text.
pub fn block_line(block: &Block) -> String {
    let data = block.data();

    if block.kind == "table_row" {
        let cells: Vec<String> = data
            .cells
            .iter()
            .map(|cell| plain_text(cell).trim().to_string())
            .filter(|cell| !cell.is_empty())
            .collect();
        let text = cells.join(" | ");
        return if text.is_empty() {
            String::new()
        } else {
            format!("- {text}")
        };
    }

    let text = plain_text(&data.rich_text).trim().to_string();
    if text.is_empty() {
        return match (block.kind.as_str(), data.title.as_deref()) {
            ("child_page" | "child_database", Some(title)) if !title.is_empty() => {
                format!("# {title}")
            }
            _ => String::new(),
        };
    }

    match block.kind.as_str() {
        "heading_1" => format!("# {text}"),
        "heading_2" => format!("## {text}"),
        "heading_3" => format!("### {text}"),
        "bulleted_list_item" => format!("- {text}"),
        "numbered_list_item" => format!("1. {text}"),
        "to_do" => format!("- [ ] {text}"),
        "quote" => format!("> {text}"),
        "callout" => format!("Callout: {text}"),
        "code" => format!("Code: {text}"),
        _ => text,
    }
}

/// Every child of `block_id`, following pagination to the end.
pub async fn list_all_children(
    store: &dyn DocumentStore,
    block_id: &str,
) -> Result<Vec<Block>, IngestError> {
    let mut blocks = Vec::new();
    let mut cursor: Option<String> = None;

    loop {
        let page = store.list_children(block_id, cursor.as_deref()).await?;
        blocks.extend(page.results);

        match (page.has_more, page.next_cursor) {
            (true, Some(next)) if !next.is_empty() => cursor = Some(next),
            _ => break,
        }
    }

    Ok(blocks)
}

struct Frame {
    blocks: std::vec::IntoIter<Block>,
    depth: usize,
}

/// Flatten the block tree under `root_id` into newline-joined text.
///
/// Children of each block are fully listed before any of them is descended into;
/// lines come out in document (pre-)order.
pub async fn flatten_blocks(
    store: &dyn DocumentStore,
    root_id: &str,
    max_depth: usize,
) -> Result<String, IngestError> {
    let mut lines = Vec::new();
    let mut stack = vec![Frame {
        blocks: list_all_children(store, root_id).await?.into_iter(),
        depth: 0,
    }];

    while let Some(frame) = stack.last_mut() {
        let depth = frame.depth;
        let Some(block) = frame.blocks.next() else {
            stack.pop();
            continue;
        };

        let line = block_line(&block);
        if !line.is_empty() {
            lines.push(line);
        }

        if block.has_children && depth < max_depth {
            let children = list_all_children(store, &block.id).await?;
            stack.push(Frame {
                blocks: children.into_iter(),
                depth: depth + 1,
            });
        }
    }

    Ok(lines.join("\n").trim().to_string())
}
