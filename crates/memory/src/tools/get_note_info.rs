use obsidian_fs::{ensure_markdown_extension, generate_search_paths, normalize_note_reference, NoteRef};
use rmcp::model::{CallToolResult, Content, ErrorData};
use std::path::Path;

use crate::graph::GraphIndex;
use crate::tools::common::{
    format_frontmatter_summary, format_links_summary, read_frontmatter_keys, resolve_backlinks,
    resolve_forward_links,
};

/// Resolve a note reference to a file path, searching the vault if needed.
///
/// Returns (resolved_path_without_ext, exists)
async fn resolve_note_to_path(
    vault_path: &Path,
    note_ref: &NoteRef,
    graph: &GraphIndex,
) -> (String, bool) {
    // First, check if the note is in the graph index
    if let Some(graph_path) = graph.get_path(&note_ref.name) {
        // Found in graph - convert PathBuf to string without .md extension
        let path_str = graph_path.to_string_lossy();
        let path_without_ext = path_str.strip_suffix(".md").unwrap_or(&path_str);
        return (path_without_ext.to_string(), true);
    }

    // Not in graph - try to find file on disk
    // If the reference includes a path (e.g., "knowledge/Note"), try that first
    if note_ref.path.contains('/') {
        let file_path = vault_path.join(ensure_markdown_extension(&note_ref.path));
        if file_path.exists() {
            return (note_ref.path.clone(), true);
        }
    }

    // Generate search paths and try each one
    let search_paths = generate_search_paths(&note_ref.name, false);
    for search_path in &search_paths {
        let file_path = vault_path.join(ensure_markdown_extension(search_path));
        if file_path.exists() {
            return (search_path.clone(), true);
        }
    }

    // Not found anywhere - return the original path
    (note_ref.path.clone(), false)
}

/// Execute the GetNote tool
pub async fn execute(
    vault_path: &Path,
    vault_name: &str,
    graph: &GraphIndex,
    note: &str,
) -> Result<CallToolResult, ErrorData> {
    // Normalize the note reference
    let note_ref = normalize_note_reference(note);
    let note_name = note_ref.name.clone();

    // Resolve to actual path
    let (resolved_path, exists) = resolve_note_to_path(vault_path, &note_ref, graph).await;

    // Build URIs
    let file_path = vault_path
        .join(ensure_markdown_extension(&resolved_path))
        .to_string_lossy()
        .to_string();
    let memory_uri = format!("memory:{}", resolved_path);
    let obsidian_uri = format!(
        "obsidian://open?vault={}&file={}",
        urlencoding::encode(vault_name),
        urlencoding::encode(&resolved_path)
    );

    if !exists {
        // Note doesn't exist - return helpful message
        let text = format!(
            "Note not found: {}\n\n\
             This note doesn't exist yet. You can create it at:\n\
             - File path: {}\n\
             - Memory URI: {}\n\
             - Obsidian URI: {}\n\n\
             Use WriteNote tool to create this note.",
            note_name, file_path, memory_uri, obsidian_uri
        );
        return Ok(CallToolResult::success(vec![Content::text(text)]));
    }

    // Note exists - get links and frontmatter using shared helpers
    let path_with_ext = ensure_markdown_extension(&resolved_path);
    let forward_links = resolve_forward_links(graph, &path_with_ext);
    let backlinks = resolve_backlinks(graph, &note_name);
    let frontmatter_keys = read_frontmatter_keys(&file_path).await;

    // Build response text using shared formatters
    let (links_summary, backlinks_summary) = format_links_summary(&forward_links, &backlinks);
    let frontmatter_summary = format_frontmatter_summary(&frontmatter_keys);

    let text = format!(
        "Note: {}\n\
         Path: {}\n\
         File: {}\n\
         Memory URI: {}\n\
         Obsidian URI: {}{}{}{}\n\n\
         Use ReadNote tool to view content.",
        note_name,
        resolved_path,
        file_path,
        memory_uri,
        obsidian_uri,
        links_summary,
        backlinks_summary,
        frontmatter_summary
    );

    Ok(CallToolResult::success(vec![Content::text(text)]))
}
