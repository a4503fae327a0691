//! Maximal Marginal Relevance selection.

use super::cache::dot;

/// Pick up to `k` candidates, returning their indices in selection order.
///
/// Vectors must be unit length. Each step takes the candidate maximizing
/// `lambda * sim(query, c) - (1 - lambda) * max(sim(c, selected))`; ties go to the lower
/// index. `lambda = 1` is plain query-similarity ordering.
#[must_use]
pub fn mmr_select(query: &[f32], candidates: &[&[f32]], k: usize, lambda: f32) -> Vec<usize> {
    let relevance: Vec<f32> = candidates.iter().map(|c| dot(query, c)).collect();
    mmr_select_scored(&relevance, candidates, k, lambda)
}

/// [`mmr_select`] with caller-supplied relevance, one score per candidate.
#[must_use]
pub fn mmr_select_scored(relevance: &[f32], candidates: &[&[f32]], k: usize, lambda: f32) -> Vec<usize> {
    let lambda = lambda.clamp(0.0, 1.0);
    let n = candidates.len().min(relevance.len());
    let mut redundancy = vec![f32::NEG_INFINITY; n];
    let mut taken = vec![false; n];
    let mut selected = Vec::with_capacity(k.min(n));

    while selected.len() < k.min(n) {
        let mut best: Option<(usize, f32)> = None;
        for (i, rel) in relevance.iter().take(n).enumerate() {
            if taken[i] {
                continue;
            }
            let penalty = if redundancy[i].is_finite() { redundancy[i] } else { 0.0 };
            let score = lambda * rel - (1.0 - lambda) * penalty;
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((i, score));
            }
        }
        let Some((pick, _)) = best else { break };
        taken[pick] = true;
        selected.push(pick);
        for (i, c) in candidates.iter().take(n).enumerate() {
            if !taken[i] {
                redundancy[i] = redundancy[i].max(dot(c, candidates[pick]));
            }
        }
    }
    selected
}
