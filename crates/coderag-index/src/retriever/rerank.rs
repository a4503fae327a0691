//! Heuristic and LLM reranking of fused candidates.

use std::collections::{HashMap, HashSet};
use std::fmt::Write;

use coderag_llm::{GenerateRequest, LlmProvider};

use super::SearchResult;

const NAME_BOOST: f64 = 1.2;
const TEXT_BOOST: f64 = 1.1;
const PREVIEW_CHARS: usize = 300;

const RERANK_SYSTEM: &str = "You are a code retrieval expert. Rank the following code snippets by \
relevance to the user query.\nReturn a JSON object with a list 'indices' holding the snippet \
indices in order of relevance.\nExample: {\"indices\": [2, 0, 1]}";

/// `1 + weight * ln(1 + in_degree)`.
#[must_use]
pub fn centrality_boost(in_degree: usize, weight: f64) -> f64 {
    #[allow(clippy::cast_precision_loss)]
    let degree = in_degree as f64;
    1.0 + weight * degree.ln_1p()
}

fn query_terms(query: &str) -> Vec<String> {
    query
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.len() >= 2)
        .map(str::to_lowercase)
        .collect()
}

/// Multiplier for literal query matches: the name equals a query term or contains the
/// whole query, and separately the content or path contains the whole query.
#[must_use]
pub fn term_boost(query: &str, result: &SearchResult) -> f64 {
    let query_lower = query.trim().to_lowercase();
    if query_lower.is_empty() {
        return 1.0;
    }
    let name = result.node.name.to_lowercase();
    let mut boost = 1.0;
    if name.contains(&query_lower) || query_terms(query).iter().any(|t| *t == name) {
        boost *= NAME_BOOST;
    }
    if result.node.content.to_lowercase().contains(&query_lower)
        || result.node.filepath.to_lowercase().contains(&query_lower)
    {
        boost *= TEXT_BOOST;
    }
    boost
}

/// Apply centrality and term boosts in place, then re-sort by score (stable).
pub(crate) fn apply_heuristics(
    query: &str,
    candidates: &mut [SearchResult],
    in_degrees: &HashMap<String, usize>,
    centrality_weight: f64,
) {
    for c in candidates.iter_mut() {
        let degree = if c.node.kind.is_whole_file() {
            0
        } else {
            in_degrees.get(&c.node.name).copied().unwrap_or(0)
        };
        c.score *= centrality_boost(degree, centrality_weight) * term_boost(query, c);
    }
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));
}

fn rerank_prompt(query: &str, candidates: &[SearchResult]) -> String {
    let mut prompt = format!("Query: {query}\n\nSnippets:\n");
    for (i, c) in candidates.iter().enumerate() {
        let preview: String = c
            .node
            .content
            .chars()
            .take(PREVIEW_CHARS)
            .map(|ch| if ch == '\n' { ' ' } else { ch })
            .collect();
        let _ = writeln!(prompt, "[{i}] {}: {preview}", c.node.filepath);
    }
    prompt.push_str("\nRank them.");
    prompt
}

/// Valid, de-duplicated indices from an `{"indices": [...]}` response.
///
/// Returns `None` when the response holds no usable index.
#[must_use]
pub fn parse_indices(response: &str, len: usize) -> Option<Vec<usize>> {
    let value: serde_json::Value = serde_json::from_str(response).ok()?;
    let mut seen = HashSet::new();
    let indices: Vec<usize> = value
        .get("indices")?
        .as_array()?
        .iter()
        .filter_map(serde_json::Value::as_u64)
        .filter_map(|i| usize::try_from(i).ok())
        .filter(|&i| i < len && seen.insert(i))
        .collect();
    (!indices.is_empty()).then_some(indices)
}

/// Reorder `candidates` so the listed indices come first, in that order, followed by the
/// unlisted ones in their prior relative order.
#[must_use]
pub fn apply_permutation(candidates: Vec<SearchResult>, order: &[usize]) -> Vec<SearchResult> {
    let mut slots: Vec<Option<SearchResult>> = candidates.into_iter().map(Some).collect();
    let mut out = Vec::with_capacity(slots.len());
    for &i in order {
        if let Some(c) = slots.get_mut(i).and_then(Option::take) {
            out.push(c);
        }
    }
    out.extend(slots.into_iter().flatten());
    out
}

/// Ask the provider to order the first `top` candidates. Any failure keeps the current order.
pub(crate) async fn llm_rerank<P: LlmProvider>(
    provider: &P,
    query: &str,
    candidates: Vec<SearchResult>,
    top: usize,
) -> Vec<SearchResult> {
    let head = top.min(candidates.len());
    if head < 2 {
        return candidates;
    }
    let request = GenerateRequest::new(rerank_prompt(query, &candidates[..head]))
        .system(RERANK_SYSTEM)
        .temperature(0.0)
        .json();

    let response = match provider.generate(&request).await {
        Ok(r) => r,
        Err(e) => {
            tracing::warn!(error = %e, "llm rerank failed, keeping fused order");
            return candidates;
        }
    };
    match parse_indices(&response, head) {
        Some(order) => {
            tracing::debug!(ranked = order.len(), of = head, "llm rerank applied");
            apply_permutation(candidates, &order)
        }
        None => {
            tracing::warn!("llm rerank returned no usable indices");
            candidates
        }
    }
}
