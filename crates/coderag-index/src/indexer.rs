//! Project indexing orchestrator: walk → hash → chunk → store → embed → ANN rebuild.
//!
//! Chunking runs on a bounded pool of blocking workers, each a pure function of
//! `(path, content)`. All store mutations happen on the coordinating task, so the store
//! only ever sees one writer.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::StreamExt;
use serde::{Deserialize, Serialize};

use coderag_llm::LlmProvider;

use crate::ann::AnnIndex;
use crate::chunker::{Extraction, FileInput, extract_file, symbol_entry};
use crate::context::contextualize;
use crate::error::{IndexError, Result};
use crate::ignore_rules::IgnoreMatcher;
use crate::repo_map::RepoMapBuilder;
use crate::store::GraphStore;
use crate::types::{CodeNode, RepoMapEntry, RunStatus};

/// Bytes inspected for NUL when deciding whether a file is binary.
const BINARY_SNIFF_LEN: usize = 8 * 1024;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexerConfig {
    pub repo_id: String,
    pub max_file_mb: f64,
    pub workers: usize,
    pub deny_globs: Vec<String>,
    pub embed_batch_size: usize,
    pub embed_max_chars: usize,
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            repo_id: "default".into(),
            max_file_mb: 1.0,
            workers: 4,
            deny_globs: Vec::new(),
            embed_batch_size: 64,
            embed_max_chars: 8000,
        }
    }
}

impl IndexerConfig {
    /// blake3 over the serialized configuration; recorded on each run.
    #[must_use]
    pub fn config_hash(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&bytes).to_hex().to_string()
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn max_file_bytes(&self) -> u64 {
        (self.max_file_mb.max(0.0) * 1024.0 * 1024.0) as u64
    }
}

/// Summary of an indexing run.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct IndexReport {
    pub run_id: i64,
    pub files_scanned: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub errors: usize,
    pub deleted: usize,
    pub nodes_written: usize,
    pub edges_written: usize,
    pub embedded: usize,
    pub elapsed_ms: u64,
}

enum FileOutcome {
    Changed {
        rel: String,
        hash: String,
        extraction: Extraction,
    },
    Unchanged {
        rel: String,
    },
    Binary {
        rel: String,
    },
    Failed {
        rel: String,
        error: IndexError,
    },
}

fn is_binary(bytes: &[u8]) -> bool {
    bytes[..bytes.len().min(BINARY_SNIFF_LEN)].contains(&0)
}

fn rel_string(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .to_string_lossy()
        .replace('\\', "/")
}

fn file_language(nodes: &[CodeNode]) -> String {
    nodes
        .first()
        .and_then(CodeNode::language)
        .unwrap_or("text")
        .to_owned()
}

/// Orchestrates indexing of a project tree into a [`GraphStore`].
pub struct CodeIndexer<P> {
    store: GraphStore,
    provider: Arc<P>,
    ann: Arc<AnnIndex>,
    config: IndexerConfig,
}

impl<P: LlmProvider> CodeIndexer<P> {
    #[must_use]
    pub fn new(store: GraphStore, provider: Arc<P>, ann: Arc<AnnIndex>, config: IndexerConfig) -> Self {
        Self {
            store,
            provider,
            ann,
            config,
        }
    }

    #[must_use]
    pub fn store(&self) -> &GraphStore {
        &self.store
    }

    #[must_use]
    pub fn ann(&self) -> &Arc<AnnIndex> {
        &self.ann
    }

    /// Full project indexing with incremental change detection.
    ///
    /// Unchanged files (same content hash) are skipped unless `force` is set. The run is
    /// recorded in the store and marked `success` or `failed`.
    ///
    /// # Errors
    ///
    /// Returns an error only for store-level faults; per-file and per-batch failures are
    /// counted and logged instead.
    pub async fn index_project(&self, root: &Path, force: bool) -> Result<IndexReport> {
        let repo_root = root.to_string_lossy().to_string();
        let run_id = self
            .store
            .create_index_run(&repo_root, &self.config.config_hash())
            .await?;

        match self.run(root, run_id, force).await {
            Ok(report) => {
                self.store.complete_index_run(run_id, RunStatus::Success).await?;
                tracing::info!(
                    run_id,
                    scanned = report.files_scanned,
                    indexed = report.indexed,
                    skipped = report.skipped,
                    errors = report.errors,
                    deleted = report.deleted,
                    embedded = report.embedded,
                    elapsed_ms = report.elapsed_ms,
                    "indexing finished"
                );
                Ok(report)
            }
            Err(e) => {
                tracing::error!(run_id, error = %e, "indexing failed");
                if let Err(mark) = self.store.complete_index_run(run_id, RunStatus::Failed).await {
                    tracing::warn!(run_id, error = %mark, "could not mark run failed");
                }
                Err(e)
            }
        }
    }

    async fn run(&self, root: &Path, run_id: i64, force: bool) -> Result<IndexReport> {
        let start = std::time::Instant::now();
        let mut report = IndexReport {
            run_id,
            ..IndexReport::default()
        };

        let matcher = IgnoreMatcher::new(root, &self.config.deny_globs)?;
        let stored = self.store.all_file_hashes().await?;
        let max_bytes = self.config.max_file_bytes();

        let mut dir_counts: BTreeMap<String, usize> = BTreeMap::new();
        let mut files: Vec<(PathBuf, String)> = Vec::new();
        for entry in matcher.walk() {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    tracing::warn!(error = %e, "walk error");
                    continue;
                }
            };
            let rel = rel_string(root, entry.path());
            let Some(ft) = entry.file_type() else {
                continue;
            };
            if ft.is_dir() {
                dir_counts.entry(rel).or_insert(0);
                continue;
            }
            if !ft.is_file() || matcher.is_ignored(Path::new(&rel), false) {
                continue;
            }
            let too_large = entry.metadata().map(|m| m.len() > max_bytes).unwrap_or(false);
            if too_large {
                tracing::debug!(file = %rel, "skipping: too large");
                report.skipped += 1;
                continue;
            }
            let dir = rel.rsplit_once('/').map_or(String::new(), |(d, _)| d.to_owned());
            *dir_counts.entry(dir).or_insert(0) += 1;
            files.push((entry.into_path(), rel));
        }

        report.files_scanned = files.len();
        tracing::info!(total = files.len(), root = %root.display(), "indexing started");

        let mut seen: HashSet<String> = HashSet::with_capacity(files.len());
        let mut per_file: BTreeMap<String, (String, Vec<RepoMapEntry>)> = BTreeMap::new();

        let workers = self.config.workers.max(1);
        let mut outcomes = futures::stream::iter(files)
            .map(|(abs, rel)| self.process_file(abs, rel, &stored, force))
            .buffer_unordered(workers);

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                FileOutcome::Changed {
                    rel,
                    hash,
                    extraction,
                } => {
                    self.store
                        .replace_file(&rel, &hash, &extraction.nodes, &extraction.edges)
                        .await?;
                    report.indexed += 1;
                    report.nodes_written += extraction.nodes.len();
                    report.edges_written += extraction.edges.len();
                    tracing::debug!(
                        file = %rel,
                        nodes = extraction.nodes.len(),
                        edges = extraction.edges.len(),
                        parsed = extraction.parsed,
                        "file indexed"
                    );
                    let lang = file_language(&extraction.nodes);
                    per_file.insert(rel.clone(), (lang, extraction.symbols));
                    seen.insert(rel);
                }
                FileOutcome::Unchanged { rel } => {
                    report.skipped += 1;
                    let nodes = self.store.nodes_by_filepath(&rel).await?;
                    let symbols = nodes
                        .iter()
                        .filter(|n| !n.kind.is_whole_file())
                        .map(symbol_entry)
                        .collect();
                    per_file.insert(rel.clone(), (file_language(&nodes), symbols));
                    seen.insert(rel);
                }
                FileOutcome::Binary { rel } => {
                    tracing::debug!(file = %rel, "skipping: binary");
                    report.skipped += 1;
                }
                FileOutcome::Failed { rel, error } => {
                    tracing::warn!(file = %rel, error = %error, "file failed");
                    report.errors += 1;
                    // Keep whatever was indexed before; a read error is not a deletion.
                    seen.insert(rel);
                }
            }
        }
        drop(outcomes);

        let mut gone: Vec<&String> = stored.keys().filter(|p| !seen.contains(*p)).collect();
        gone.sort();
        for path in gone {
            self.store.delete_file(path).await?;
            report.deleted += 1;
            tracing::debug!(file = %path, "removed deleted file");
        }

        let mut map = RepoMapBuilder::new(root.to_string_lossy());
        for (dir, count) in &dir_counts {
            map.add_dir(dir, *count);
        }
        for (rel, (lang, symbols)) in per_file {
            map.add_file(&rel, &lang, symbols);
        }
        let (payload, entries) = map.finish(run_id);
        self.store.store_repo_map(run_id, &payload, &entries).await?;

        report.embedded = self.embed_missing().await?;
        self.rebuild_ann().await?;

        report.elapsed_ms = start.elapsed().as_millis().try_into().unwrap_or(u64::MAX);
        Ok(report)
    }

    async fn process_file(
        &self,
        abs: PathBuf,
        rel: String,
        stored: &HashMap<String, String>,
        force: bool,
    ) -> FileOutcome {
        let bytes = match tokio::fs::read(&abs).await {
            Ok(bytes) => bytes,
            Err(e) => {
                return FileOutcome::Failed {
                    rel,
                    error: e.into(),
                };
            }
        };
        if is_binary(&bytes) {
            return FileOutcome::Binary { rel };
        }

        let hash = blake3::hash(&bytes).to_hex().to_string();
        if !force && stored.get(&rel) == Some(&hash) {
            return FileOutcome::Unchanged { rel };
        }

        let source = String::from_utf8_lossy(&bytes).into_owned();
        let repo_id = self.config.repo_id.clone();
        let (path, file_hash) = (rel.clone(), hash.clone());
        let extracted = tokio::task::spawn_blocking(move || {
            extract_file(&FileInput {
                filepath: &path,
                source: &source,
                file_hash: &file_hash,
                repo_id: &repo_id,
            })
        })
        .await;

        match extracted {
            Ok(extraction) => FileOutcome::Changed {
                rel,
                hash,
                extraction,
            },
            Err(e) => FileOutcome::Failed {
                rel,
                error: IndexError::Other(format!("chunking task failed: {e}")),
            },
        }
    }

    /// Re-index one file without a full walk. An ignored or vanished file is removed.
    ///
    /// Returns the number of nodes written.
    ///
    /// # Errors
    ///
    /// Returns an error for store-level faults or if the file cannot be read.
    pub async fn reindex_file(&self, root: &Path, path: &Path) -> Result<usize> {
        let abs = if path.is_absolute() {
            path.to_path_buf()
        } else {
            root.join(path)
        };
        let rel = rel_string(root, &abs);
        let matcher = IgnoreMatcher::new(root, &self.config.deny_globs)?;

        if !abs.is_file() || matcher.is_ignored(Path::new(&rel), false) {
            self.store.delete_file(&rel).await?;
            tracing::debug!(file = %rel, "reindex: file removed or ignored");
            return Ok(0);
        }

        let stored = HashMap::new();
        match self.process_file(abs, rel, &stored, true).await {
            FileOutcome::Changed {
                rel,
                hash,
                extraction,
            } => {
                self.store
                    .replace_file(&rel, &hash, &extraction.nodes, &extraction.edges)
                    .await?;
                self.embed_missing().await?;
                self.rebuild_ann().await?;
                Ok(extraction.nodes.len())
            }
            FileOutcome::Binary { rel } => {
                self.store.delete_file(&rel).await?;
                Ok(0)
            }
            FileOutcome::Unchanged { .. } => Ok(0),
            FileOutcome::Failed { error, .. } => Err(error),
        }
    }

    /// Embed every node that has no vector for the provider's model, in bounded batches.
    ///
    /// A failed batch is logged and left for the next run.
    ///
    /// # Errors
    ///
    /// Returns an error only for store-level faults.
    pub async fn embed_missing(&self) -> Result<usize> {
        if !self.provider.supports_embeddings() {
            return Ok(0);
        }
        let model = self.provider.embedding_model().to_owned();
        let missing = self.store.nodes_missing_embedding(&model).await?;
        if missing.is_empty() {
            return Ok(0);
        }

        let batch_size = self.config.embed_batch_size.max(1);
        let mut embedded = 0usize;
        for (batch_no, ids) in missing.chunks(batch_size).enumerate() {
            let nodes = self.store.get_nodes(ids).await?;
            let texts: Vec<String> = nodes
                .iter()
                .map(|n| contextualize(n, self.config.embed_max_chars))
                .collect();

            let vectors = match self.provider.embed(&texts).await {
                Ok(v) if v.len() == nodes.len() => v,
                Ok(v) => {
                    tracing::warn!(
                        batch = batch_no,
                        expected = nodes.len(),
                        got = v.len(),
                        "embedding batch size mismatch"
                    );
                    continue;
                }
                Err(e) => {
                    tracing::warn!(batch = batch_no, error = %e, "embedding batch failed");
                    continue;
                }
            };

            let items: Vec<(String, Vec<f32>)> = nodes.into_iter().map(|n| n.id).zip(vectors).collect();
            match self.store.batch_upsert_embeddings(&model, &items).await {
                Ok(()) => embedded += items.len(),
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => tracing::warn!(batch = batch_no, error = %e, "embedding batch rejected"),
            }
        }

        tracing::debug!(embedded, model = %model, "embedding sweep done");
        Ok(embedded)
    }

    /// Rebuild the ANN graph from every persisted vector of the provider's model.
    ///
    /// # Errors
    ///
    /// Returns an error only for store-level faults; ANN failures leave search on the
    /// exact path.
    pub async fn rebuild_ann(&self) -> Result<()> {
        if !self.ann.is_available() || !self.provider.supports_embeddings() {
            return Ok(());
        }
        let model = self.provider.embedding_model().to_owned();
        let vectors = self.store.all_embeddings(&model).await?;
        if vectors.is_empty() {
            self.ann.clear();
            return Ok(());
        }

        let ann = Arc::clone(&self.ann);
        match tokio::task::spawn_blocking(move || ann.build(&model, vectors)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "ann rebuild failed, falling back to exact search");
                self.ann.clear();
            }
            Err(e) => {
                tracing::warn!(error = %e, "ann rebuild task failed");
                self.ann.clear();
            }
        }
        Ok(())
    }
}
