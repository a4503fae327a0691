//! Hybrid retrieval: expansion, lexical + dense candidates, graph hops, RRF fusion,
//! reranking and MMR diversification.
//!
//! Retrieval never mutates the store. Every optional stage (expansion, dense search, graph
//! expansion, reranking) degrades to "no contribution" on failure, so a working full-text
//! index is enough to answer queries.

mod cache;
mod expansion;
mod fusion;
mod graph;
mod mmr;
mod rerank;

use std::collections::HashMap;
use std::fmt::Write;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;
use serde::{Deserialize, Serialize};

use coderag_llm::LlmProvider;

use crate::ann::AnnIndex;
use crate::error::{IndexError, Result};
use crate::repo_map::estimate_tokens;
use crate::store::{GraphStore, to_fts_query};
use crate::types::CodeNode;

pub use cache::{EmbeddingCache, Snapshot};
pub use expansion::parse_questions;
pub use fusion::{RRF_K, rrf_fuse};
pub use mmr::{mmr_select, mmr_select_scored};
pub use rerank::{apply_permutation, centrality_boost, parse_indices, term_boost};

/// Retrieval configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Results returned when the caller passes `k = 0`.
    pub k: usize,
    /// Each lexical/dense list fetches `k * candidate_multiplier` hits.
    pub candidate_multiplier: usize,
    pub rrf_k: f64,
    /// Top candidates expanded through the graph.
    pub seeds: usize,
    /// Hits taken from each of the original query's lists when picking seeds; also caps
    /// callers per seed.
    pub seed_pool: usize,
    pub damping_uses_type: f64,
    pub damping_callers: f64,
    /// Fused candidates kept for reranking.
    pub rerank_pool: usize,
    /// Candidates sent to the LLM reranker.
    pub llm_rerank_top: usize,
    pub centrality_weight: f64,
    /// MMR trade-off: 1.0 is pure relevance, 0.0 pure diversity.
    pub mmr_lambda: f32,
    /// Share of MMR relevance taken from the reranked position; the rest is cosine
    /// similarity to the query. 0.0 ignores the rerank order.
    pub mmr_rank_weight: f32,
    pub cache_ttl_secs: u64,
    /// Upper bound for one `retrieve` call; 0 disables the bound.
    pub timeout_secs: u64,
    pub enable_ann: bool,
    pub enable_expansion: bool,
    pub enable_llm_rerank: bool,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: 10,
            candidate_multiplier: 2,
            rrf_k: RRF_K,
            seeds: 3,
            seed_pool: 5,
            damping_uses_type: 0.4,
            damping_callers: 0.5,
            rerank_pool: 20,
            llm_rerank_top: 10,
            centrality_weight: 0.1,
            mmr_lambda: 0.7,
            mmr_rank_weight: 0.3,
            cache_ttl_secs: 60,
            timeout_secs: 30,
            enable_ann: true,
            enable_expansion: true,
            enable_llm_rerank: true,
        }
    }
}

/// A ranked chunk.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub node: CodeNode,
    pub score: f64,
}

#[derive(Default)]
struct DenseOutcome {
    lists: Vec<Vec<SearchResult>>,
    query_vector: Option<Vec<f32>>,
}

pub struct HybridRetriever<P> {
    store: GraphStore,
    provider: Arc<P>,
    ann: Arc<AnnIndex>,
    cache: EmbeddingCache,
    ann_load_tried: AtomicBool,
    config: RetrievalConfig,
}

impl<P: LlmProvider> HybridRetriever<P> {
    #[must_use]
    pub fn new(store: GraphStore, provider: Arc<P>, ann: Arc<AnnIndex>, config: RetrievalConfig) -> Self {
        Self {
            cache: EmbeddingCache::new(Duration::from_secs(config.cache_ttl_secs)),
            store,
            provider,
            ann,
            ann_load_tried: AtomicBool::new(false),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    /// Drop cached vectors and allow the ANN sidecar to be reloaded. Call after
    /// re-indexing in the same process.
    pub fn invalidate_caches(&self) {
        self.cache.invalidate();
        self.ann_load_tried.store(false, Ordering::SeqCst);
    }

    /// Retrieve up to `k` chunks for `query` (`k = 0` uses the configured default).
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Timeout`] when the call exceeds `timeout_secs`. Stage
    /// failures are logged and skipped, never returned.
    pub async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        let k = if k == 0 { self.config.k } else { k };
        if self.config.timeout_secs == 0 {
            return Ok(self.retrieve_inner(query, k).await);
        }
        let limit = Duration::from_secs(self.config.timeout_secs);
        tokio::time::timeout(limit, self.retrieve_inner(query, k))
            .await
            .map_err(|_| IndexError::Timeout(limit))
    }

    async fn retrieve_inner(&self, query: &str, k: usize) -> Vec<SearchResult> {
        let query = query.trim();
        if query.is_empty() || k == 0 {
            return Vec::new();
        }
        let started = std::time::Instant::now();
        let pool = k.saturating_mul(self.config.candidate_multiplier.max(1));

        let (sub_questions, hyde_doc) =
            if self.config.enable_expansion && self.provider.supports_generation() {
                tokio::join!(
                    expansion::decompose(self.provider.as_ref(), query),
                    expansion::hyde(self.provider.as_ref(), query)
                )
            } else {
                (Vec::new(), None)
            };

        let mut texts = Vec::with_capacity(1 + sub_questions.len());
        texts.push(query.to_owned());
        texts.extend(sub_questions);
        let mut dense_texts = texts.clone();
        dense_texts.extend(hyde_doc);

        let (lexical_lists, dense) = tokio::join!(
            join_all(texts.iter().map(|t| self.lexical(t, pool))),
            self.dense(&dense_texts, pool)
        );

        let mut seed_candidates: Vec<SearchResult> = Vec::new();
        for list in [lexical_lists.first(), dense.lists.first()].into_iter().flatten() {
            for hit in list.iter().take(self.config.seed_pool) {
                if seed_candidates.iter().all(|s| s.node.id != hit.node.id) {
                    seed_candidates.push(hit.clone());
                }
            }
        }
        let graph_list = match graph::expand(&self.store, &seed_candidates, &self.config).await {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(error = %e, "graph expansion failed");
                Vec::new()
            }
        };

        let mut nodes: HashMap<String, CodeNode> = HashMap::new();
        let mut id_lists: Vec<Vec<String>> = Vec::new();
        for list in lexical_lists.iter().chain(&dense.lists).chain(std::iter::once(&graph_list)) {
            id_lists.push(list.iter().map(|r| r.node.id.clone()).collect());
            for r in list {
                nodes.entry(r.node.id.clone()).or_insert_with(|| r.node.clone());
            }
        }
        let mut candidates: Vec<SearchResult> = rrf_fuse(&id_lists, self.config.rrf_k)
            .into_iter()
            .take(self.config.rerank_pool.max(k))
            .filter_map(|(id, score)| nodes.remove(&id).map(|node| SearchResult { node, score }))
            .collect();

        let names: Vec<String> = candidates
            .iter()
            .filter(|c| !c.node.kind.is_whole_file())
            .map(|c| c.node.name.clone())
            .collect();
        let in_degrees = match self.store.call_in_degrees(&names).await {
            Ok(d) => d,
            Err(e) => {
                tracing::warn!(error = %e, "centrality lookup failed");
                HashMap::new()
            }
        };
        rerank::apply_heuristics(query, &mut candidates, &in_degrees, self.config.centrality_weight);

        if self.config.enable_llm_rerank && self.provider.supports_generation() {
            candidates =
                rerank::llm_rerank(self.provider.as_ref(), query, candidates, self.config.llm_rerank_top)
                    .await;
        }

        let results = match &dense.query_vector {
            Some(qv) => self.diversify(qv, candidates, k).await,
            None => {
                candidates.truncate(k);
                candidates
            }
        };

        tracing::info!(
            query,
            sub_questions = texts.len() - 1,
            lexical_lists = lexical_lists.len(),
            dense_lists = dense.lists.len(),
            graph = graph_list.len(),
            results = results.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "retrieval done"
        );
        results
    }

    async fn lexical(&self, text: &str, limit: usize) -> Vec<SearchResult> {
        let fts = to_fts_query(text);
        if fts.is_empty() {
            return Vec::new();
        }
        match self.store.search_nodes(&fts, limit).await {
            Ok(hits) => hits
                .into_iter()
                .enumerate()
                .map(|(rank, (node, _))| {
                    #[allow(clippy::cast_precision_loss)]
                    let score = 1.0 / (rank as f64 + 1.0);
                    SearchResult { node, score }
                })
                .collect(),
            Err(e) => {
                tracing::warn!(error = %e, "lexical search failed");
                Vec::new()
            }
        }
    }

    async fn dense(&self, texts: &[String], limit: usize) -> DenseOutcome {
        if !self.provider.supports_embeddings() || texts.is_empty() {
            return DenseOutcome::default();
        }
        let vectors = match self.provider.embed(texts).await {
            Ok(v) if v.len() == texts.len() => v,
            Ok(v) => {
                tracing::warn!(expected = texts.len(), got = v.len(), "query embedding count mismatch");
                return DenseOutcome::default();
            }
            Err(e) => {
                tracing::warn!(error = %e, "query embedding failed, lexical only");
                return DenseOutcome::default();
            }
        };

        let model = self.provider.embedding_model();
        let lists = join_all(vectors.iter().map(|v| self.similar(model, v, limit))).await;
        DenseOutcome {
            lists,
            query_vector: vectors.into_iter().next(),
        }
    }

    /// Nearest stored nodes to `vector`: ANN when warm for `model`, otherwise exact search
    /// over the cached snapshot.
    async fn similar(&self, model: &str, vector: &[f32], limit: usize) -> Vec<SearchResult> {
        let hits = match self.ann_hits(model, vector, limit).await {
            Some(hits) => hits,
            None => match self.cache.get(&self.store, model).await {
                Ok(snapshot) => snapshot.search(vector, limit),
                Err(e) => {
                    tracing::warn!(error = %e, "embedding cache refresh failed");
                    return Vec::new();
                }
            },
        };
        if hits.is_empty() {
            return Vec::new();
        }

        let ids: Vec<String> = hits.iter().map(|(id, _)| id.clone()).collect();
        let mut by_id: HashMap<String, CodeNode> = match self.store.get_nodes(&ids).await {
            Ok(nodes) => nodes.into_iter().map(|n| (n.id.clone(), n)).collect(),
            Err(e) => {
                tracing::warn!(error = %e, "dense hit lookup failed");
                return Vec::new();
            }
        };
        hits.into_iter()
            .filter_map(|(id, sim)| {
                by_id.remove(&id).map(|node| SearchResult {
                    node,
                    score: f64::from(sim),
                })
            })
            .collect()
    }

    async fn ann_hits(&self, model: &str, vector: &[f32], limit: usize) -> Option<Vec<(String, f32)>> {
        if !self.config.enable_ann || !self.ann.is_available() {
            return None;
        }
        if !self.ann.is_ready() && !self.ann_load_tried.swap(true, Ordering::SeqCst) {
            let ann = Arc::clone(&self.ann);
            match tokio::task::spawn_blocking(move || ann.load()).await {
                Ok(Ok(())) => tracing::debug!(vectors = self.ann.len(), "ann index loaded from disk"),
                Ok(Err(e)) => tracing::debug!(error = %e, "ann index not loaded, using exact search"),
                Err(e) => tracing::warn!(error = %e, "ann load task failed"),
            }
        }
        if self.ann.model().as_deref() != Some(model) {
            return None;
        }
        self.ann.query(vector, limit)
    }

    /// MMR over candidates that have cached vectors. Candidates without one keep their
    /// reranked position; the MMR picks fill the remaining slots in selection order.
    async fn diversify(&self, query_vector: &[f32], candidates: Vec<SearchResult>, k: usize) -> Vec<SearchResult> {
        let snapshot = match self.cache.get(&self.store, self.provider.embedding_model()).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "mmr skipped, embedding cache unavailable");
                return candidates.into_iter().take(k).collect();
            }
        };
        let vectors: Vec<Option<&[f32]>> = candidates.iter().map(|c| snapshot.vector(&c.node.id)).collect();
        let positions: Vec<usize> = (0..vectors.len()).filter(|&i| vectors[i].is_some()).collect();
        if positions.is_empty() {
            return candidates.into_iter().take(k).collect();
        }

        let query = cache::unit(query_vector.to_vec());
        let weight = self.config.mmr_rank_weight.clamp(0.0, 1.0);
        #[allow(clippy::cast_precision_loss)]
        let pool = candidates.len() as f32;
        let dense: Vec<&[f32]> = positions.iter().filter_map(|&i| vectors[i]).collect();
        let relevance: Vec<f32> = positions
            .iter()
            .zip(&dense)
            .map(|(&i, v)| {
                #[allow(clippy::cast_precision_loss)]
                let prior = 1.0 - i as f32 / pool;
                (1.0 - weight) * cache::dot(&query, v) + weight * prior
            })
            .collect();
        let order = mmr::mmr_select_scored(&relevance, &dense, k, self.config.mmr_lambda);

        let has_vector: Vec<bool> = vectors.iter().map(Option::is_some).collect();
        let mut picks = order.into_iter().map(|j| positions[j]);
        let mut slots: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
        let mut out = Vec::with_capacity(k);
        for (i, has) in has_vector.into_iter().enumerate() {
            if out.len() == k {
                break;
            }
            let from = if has {
                match picks.next() {
                    Some(p) => p,
                    None => continue,
                }
            } else {
                i
            };
            if let Some(c) = slots[from].take() {
                out.push(c);
            }
        }
        out
    }
}

/// Format results as a `<code_context>` block, packing chunks in order until
/// `token_budget` is spent.
#[must_use]
pub fn format_as_context(results: &[SearchResult], token_budget: usize) -> String {
    if results.is_empty() {
        return String::new();
    }

    let mut out = String::from("<code_context>\n");
    let mut used = 0usize;

    for r in results {
        let cost = estimate_tokens(&r.node.content) + 20;
        if used + cost > token_budget {
            break;
        }
        used += cost;
        let _ = writeln!(
            out,
            "  <chunk file=\"{}\" lines=\"{}-{}\" name=\"{}\" score=\"{:.2}\">",
            r.node.filepath, r.node.start_line, r.node.end_line, r.node.name, r.score,
        );
        out.push_str(&r.node.content);
        out.push_str("\n  </chunk>\n");
    }

    out.push_str("</code_context>");
    out
}
