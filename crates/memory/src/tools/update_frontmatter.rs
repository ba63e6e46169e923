use obsidian_fs::{build_note_with_frontmatter, ensure_markdown_extension, parse_frontmatter, Frontmatter};
use rmcp::model::{CallToolResult, Content, ErrorData};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::collections::HashMap;

use super::common::resolve_note_uri;
use crate::graph::GraphIndex;
use crate::storage::{ContentHash, Storage, StorageError};

/// Response from UpdateFrontmatter tool.
#[derive(Serialize)]
pub struct UpdateFrontmatterResponse {
    /// The file path relative to vault
    pub path: String,
    /// New content hash after update - use this for subsequent writes
    pub content_hash: String,
}

/// Update frontmatter in a note file.
///
/// Reads the existing note, merges the frontmatter updates, and writes back.
/// Requires content_hash from a previous ReadNote call.
pub async fn execute<S: Storage>(
    storage: &S,
    graph: &GraphIndex,
    note: &str,
    updates: HashMap<String, JsonValue>,
    content_hash: &str,
) -> Result<CallToolResult, ErrorData> {
    // Resolve the note reference using the graph index
    let (uri, exists) = resolve_note_uri(storage, graph, note).await.map_err(|e| {
        ErrorData::internal_error(format!("Failed to resolve note: {}", e), None)
    })?;

    if !exists {
        return Err(ErrorData::invalid_params(
            format!("Note not found: {}", note),
            None,
        ));
    }

    // Read existing content via Storage trait
    let (raw_content, _metadata) = storage.read(&uri).await.map_err(|e| match e {
        StorageError::NotFound { uri } => {
            ErrorData::invalid_params(format!("Note not found: {}", uri), None)
        }
        _ => ErrorData::internal_error(format!("Failed to read note: {}", e), None),
    })?;

    // Validate content_hash matches current content
    let current_hash = ContentHash::from_content(&raw_content);
    if current_hash.as_str() != content_hash {
        return Err(ErrorData::invalid_params(
            format!(
                "Note modified since last read (expected hash: {}, actual: {}). \
                 Read note again to get current content and hash.",
                content_hash,
                current_hash.as_str()
            ),
            None,
        ));
    }

    // Parse existing frontmatter
    let parsed = parse_frontmatter(&raw_content);
    let existing_frontmatter = parsed.frontmatter.unwrap_or_default();
    let content = parsed.content;

    // Merge updates into existing frontmatter
    let mut merged: Frontmatter = existing_frontmatter;
    for (key, value) in updates {
        merged.insert(key, value);
    }

    // Rebuild file content with updated frontmatter
    let new_content = build_note_with_frontmatter(&merged, content)
        .map_err(|e| ErrorData::internal_error(e.to_string(), None))?;

    // Write back via Storage trait with optimistic locking
    storage.write(&uri, &new_content, Some(content_hash)).await.map_err(|e| match e {
        StorageError::HashMismatch { expected, actual, .. } => ErrorData::invalid_params(
            format!(
                "Note modified since last read (expected hash: {}, actual: {}). \
                 Read note again to get current content and hash.",
                expected, actual
            ),
            None,
        ),
        _ => ErrorData::internal_error(format!("Failed to write note: {}", e), None),
    })?;

    // Compute new content hash for response
    let new_hash = ContentHash::from_content(&new_content);

    let response = UpdateFrontmatterResponse {
        path: ensure_markdown_extension(&uri),
        content_hash: new_hash.as_str().to_string(),
    };

    let json = serde_json::to_string(&response)
        .map_err(|e| ErrorData::internal_error(format!("Failed to serialize response: {}", e), None))?;

    Ok(CallToolResult::success(vec![Content::text(json)]))
}
