//! Reciprocal Rank Fusion.

use std::collections::HashMap;

/// Default RRF constant.
pub const RRF_K: f64 = 60.0;

/// Fuse ranked id lists: each list adds `1 / (k + rank + 1)` to every id it contains.
///
/// The result is sorted by fused score, highest first. Ties keep first-seen order.
/// An id repeated within one list only counts at its best rank there.
#[must_use]
pub fn rrf_fuse<S: AsRef<str>>(lists: &[Vec<S>], k: f64) -> Vec<(String, f64)> {
    let mut scores: HashMap<&str, (usize, f64)> = HashMap::new();
    let mut order = 0usize;

    for list in lists {
        let mut counted: Vec<&str> = Vec::with_capacity(list.len());
        for (rank, id) in list.iter().enumerate() {
            let id = id.as_ref();
            if counted.contains(&id) {
                continue;
            }
            counted.push(id);
            #[allow(clippy::cast_precision_loss)]
            let contribution = 1.0 / (k + rank as f64 + 1.0);
            let slot = scores.entry(id).or_insert_with(|| {
                order += 1;
                (order, 0.0)
            });
            slot.1 += contribution;
        }
    }

    let mut fused: Vec<(usize, &str, f64)> = scores
        .into_iter()
        .map(|(id, (seen, score))| (seen, id, score))
        .collect();
    fused.sort_by(|a, b| b.2.total_cmp(&a.2).then(a.0.cmp(&b.0)));
    fused
        .into_iter()
        .map(|(_, id, score)| (id.to_owned(), score))
        .collect()
}
