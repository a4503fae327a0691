//! Embedding text and display headers for nodes.
//!
//! Raw code alone embeds poorly for conceptual queries, so the embedding text is
//! prefixed with the path, kind, name, language and leading imports.

use crate::types::CodeNode;

/// Maximum number of import specifiers included in the embedding text.
const MAX_IMPORTS: usize = 5;

/// Text optimized for embedding (not for display), capped at `max_chars` characters.
#[must_use]
pub fn contextualize(node: &CodeNode, max_chars: usize) -> String {
    let mut text = String::with_capacity(node.content.len().min(max_chars) + 256);

    text.push_str("# ");
    text.push_str(&node.filepath);
    text.push('\n');

    if !node.kind.is_whole_file() {
        text.push_str("# ");
        text.push_str(node.kind.as_str());
        text.push_str(": ");
        text.push_str(&node.name);
        text.push('\n');
    }

    if let Some(lang) = node.language() {
        text.push_str("# Language: ");
        text.push_str(lang);
        text.push('\n');
    }

    if let Some(route) = node.framework.as_ref().and_then(|f| f.route_path.as_deref()) {
        text.push_str("# Route: ");
        text.push_str(route);
        text.push('\n');
    }

    if !node.import_deps.is_empty() {
        let imports: Vec<&str> = node
            .import_deps
            .iter()
            .take(MAX_IMPORTS)
            .map(String::as_str)
            .collect();
        text.push_str("# Imports: ");
        text.push_str(&imports.join(", "));
        text.push('\n');
    }

    text.push_str(&node.content);
    truncate_chars(text, max_chars)
}

fn truncate_chars(mut text: String, max_chars: usize) -> String {
    if let Some((idx, _)) = text.char_indices().nth(max_chars) {
        text.truncate(idx);
    }
    text
}
