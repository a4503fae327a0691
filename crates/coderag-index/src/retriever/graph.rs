//! One-hop graph expansion from seed hits.
//!
//! Edges carry unresolved `symbol:<Name>` targets; they are resolved here, by name,
//! against the definitions currently in the store.

use std::collections::HashSet;

use crate::error::Result;
use crate::store::GraphStore;
use crate::types::{CodeNode, Relationship};

use super::{RetrievalConfig, SearchResult};

fn pick_definition(defs: Vec<CodeNode>) -> Option<CodeNode> {
    let mut fallback = None;
    for def in defs {
        if def.kind.defines_type() {
            return Some(def);
        }
        fallback.get_or_insert(def);
    }
    fallback
}

/// Expand the first `config.seeds` candidates into type definitions they reference and,
/// for callable seeds, nodes that call them. Nodes already among `candidates` are not repeated.
///
/// Returns one list ordered by damped score, best first.
pub(crate) async fn expand(
    store: &GraphStore,
    candidates: &[SearchResult],
    config: &RetrievalConfig,
) -> Result<Vec<SearchResult>> {
    let mut seen: HashSet<String> = candidates.iter().map(|c| c.node.id.clone()).collect();
    let mut expanded = Vec::new();

    for seed in candidates.iter().take(config.seeds) {
        for edge in store.edges_from(&seed.node.id, Some(Relationship::UsesType)).await? {
            let Some(type_name) = edge.target_id.strip_prefix("symbol:") else {
                continue;
            };
            let Some(def) = pick_definition(store.find_definitions(type_name).await?) else {
                continue;
            };
            if seen.insert(def.id.clone()) {
                expanded.push(SearchResult {
                    node: def,
                    score: seed.score * config.damping_uses_type,
                });
            }
        }

        if !seed.node.kind.is_callable() {
            continue;
        }
        for caller in store
            .callers_of(&seed.node.name)
            .await?
            .into_iter()
            .take(config.seed_pool)
        {
            if seen.insert(caller.id.clone()) {
                expanded.push(SearchResult {
                    node: caller,
                    score: seed.score * config.damping_callers,
                });
            }
        }
    }

    expanded.sort_by(|a, b| b.score.total_cmp(&a.score));
    tracing::debug!(seeds = config.seeds.min(candidates.len()), expanded = expanded.len(), "graph expansion");
    Ok(expanded)
}
