//! Structural map of an indexed repository (paths and symbol signatures only).
//!
//! The indexer accumulates one [`RepoMapBuilder`] per run and persists its payload and
//! entries; [`render_repo_map`] turns stored entries into a compact `<repo_map>` block
//! that fits a token budget.

use std::collections::BTreeMap;
use std::fmt::Write;

use serde::Serialize;

use crate::types::{EntryKind, RepoMapEntry};

/// Rough token count: four characters per token.
#[must_use]
pub fn estimate_tokens(text: &str) -> usize {
    text.chars().count() / 4
}

#[derive(Debug, Clone, Serialize)]
struct FileMeta {
    path: String,
    language: String,
    symbols: usize,
}

#[derive(Debug, Default, Serialize)]
struct DirMeta {
    files: Vec<FileMeta>,
}

/// Collects directory, file and symbol entries during a walk.
#[derive(Debug)]
pub struct RepoMapBuilder {
    repo_root: String,
    dirs: BTreeMap<String, DirMeta>,
    entries: Vec<RepoMapEntry>,
}

impl RepoMapBuilder {
    #[must_use]
    pub fn new(repo_root: impl Into<String>) -> Self {
        Self {
            repo_root: repo_root.into(),
            dirs: BTreeMap::new(),
            entries: Vec::new(),
        }
    }

    /// Record a directory (repo-relative, `""` for the root) holding `file_count` files.
    pub fn add_dir(&mut self, rel_dir: &str, file_count: usize) {
        self.dirs.entry(rel_dir.to_owned()).or_default();
        self.entries.push(RepoMapEntry {
            kind: EntryKind::Dir,
            path: format!("{rel_dir}/"),
            symbol_name: None,
            signature: None,
            start_line: None,
            end_line: None,
            importance: 1.0,
            summary: Some(format!("Directory with {file_count} files")),
        });
    }

    /// Record a file and the symbol entries extracted from (or remembered for) it.
    pub fn add_file(&mut self, rel_path: &str, language: &str, symbols: Vec<RepoMapEntry>) {
        let dir = rel_path
            .rsplit_once('/')
            .map_or(String::new(), |(d, _)| d.to_owned());
        self.dirs.entry(dir).or_default().files.push(FileMeta {
            path: rel_path.to_owned(),
            language: language.to_owned(),
            symbols: symbols.len(),
        });
        self.entries.push(RepoMapEntry {
            kind: EntryKind::File,
            path: rel_path.to_owned(),
            symbol_name: None,
            signature: None,
            start_line: None,
            end_line: None,
            importance: 1.0,
            summary: Some(format!("{language} source file")),
        });
        self.entries.extend(symbols);
    }

    /// Payload JSON and entry rows for run `run_id`.
    #[must_use]
    pub fn finish(self, run_id: i64) -> (serde_json::Value, Vec<RepoMapEntry>) {
        let payload = serde_json::json!({
            "repo_root": self.repo_root,
            "run_id": run_id,
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "dirs": self.dirs,
        });
        (payload, self.entries)
    }
}

fn short_kind(kind: &str) -> &str {
    match kind {
        "function" | "method" => "fn",
        "type_alias" => "type",
        "module" => "mod",
        "constant" => "const",
        "route_handler" => "route",
        other => other,
    }
}

/// Render entries as a `<repo_map>` block within `token_budget` tokens.
///
/// Files are ordered by symbol count (more symbols first), then path. Files that do not
/// fit are summarized in a trailing `... and N more files` line.
#[must_use]
pub fn render_repo_map(entries: &[RepoMapEntry], token_budget: usize) -> String {
    let mut files: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for entry in entries {
        match entry.kind {
            EntryKind::File => {
                files.entry(entry.path.as_str()).or_default();
            }
            EntryKind::Symbol => {
                let name = entry.symbol_name.as_deref().unwrap_or("?");
                let kind = short_kind(entry.summary.as_deref().unwrap_or("symbol"));
                files
                    .entry(entry.path.as_str())
                    .or_default()
                    .push(format!("{kind}:{name}"));
            }
            EntryKind::Dir => {}
        }
    }

    let mut ordered: Vec<(&str, Vec<String>)> = files.into_iter().collect();
    ordered.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then_with(|| a.0.cmp(b.0)));

    let header = "<repo_map>\n";
    let footer = "</repo_map>";
    let mut map = String::from(header);
    let mut used = estimate_tokens(header) + estimate_tokens(footer);

    for (idx, (path, symbols)) in ordered.iter().enumerate() {
        let line = if symbols.is_empty() {
            format!("  {path}\n")
        } else {
            format!("  {path} :: {}\n", symbols.join(", "))
        };
        let cost = estimate_tokens(&line);
        if used + cost > token_budget {
            let remaining = ordered.len() - idx;
            let _ = writeln!(map, "  ... and {remaining} more files");
            break;
        }
        map.push_str(&line);
        used += cost;
    }

    map.push_str(footer);
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbol(path: &str, name: &str, kind: &str) -> RepoMapEntry {
        RepoMapEntry {
            kind: EntryKind::Symbol,
            path: path.into(),
            symbol_name: Some(name.into()),
            signature: Some(format!("fn {name}()")),
            start_line: Some(1),
            end_line: Some(2),
            importance: 0.8,
            summary: Some(kind.into()),
        }
    }

    #[test]
    fn builder_groups_files_by_dir() {
        let mut b = RepoMapBuilder::new("/repo");
        b.add_dir("", 1);
        b.add_dir("src", 2);
        b.add_file("README.md", "markdown", Vec::new());
        b.add_file("src/lib.rs", "rust", vec![symbol("src/lib.rs", "run", "function")]);
        let (payload, entries) = b.finish(7);

        assert_eq!(payload["run_id"], 7);
        assert_eq!(payload["repo_root"], "/repo");
        assert_eq!(payload["dirs"]["src"]["files"][0]["path"], "src/lib.rs");
        assert_eq!(payload["dirs"][""]["files"][0]["language"], "markdown");

        let kinds: Vec<_> = entries.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EntryKind::Dir, EntryKind::Dir, EntryKind::File, EntryKind::File, EntryKind::Symbol]
        );
        assert_eq!(entries[0].path, "/");
        assert_eq!(entries[1].summary.as_deref(), Some("Directory with 2 files"));
    }

    #[test]
    fn render_orders_by_symbol_count() {
        let entries = vec![
            symbol("a.py", "one", "function"),
            symbol("b.py", "two", "class"),
            symbol("b.py", "three", "method"),
        ];
        let map = render_repo_map(&entries, 1000);
        assert!(map.starts_with("<repo_map>\n  b.py :: class:two, fn:three\n  a.py :: fn:one\n"));
        assert!(map.ends_with("</repo_map>"));
    }

    #[test]
    fn render_truncates_to_budget() {
        let entries: Vec<_> = (0..20)
            .map(|i| symbol(&format!("file_{i}.rs"), &format!("func_{i}"), "function"))
            .collect();
        let map = render_repo_map(&entries, 30);
        assert!(map.contains("... and"));
    }

    #[test]
    fn token_estimate_is_char_based() {
        assert_eq!(estimate_tokens("abcdefgh"), 2);
        assert_eq!(estimate_tokens("ééééé"), 1);
    }
}
