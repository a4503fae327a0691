//! In-process snapshot of every persisted vector for one model, used for exact dense
//! search and for MMR. Snapshots are immutable and published with an atomic swap.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use arc_swap::ArcSwapOption;
use tokio::sync::Mutex;

use crate::error::Result;
use crate::store::GraphStore;

#[must_use]
pub(crate) fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// L2-normalized copy of `v`. Zero vectors stay zero.
#[must_use]
pub(crate) fn unit(mut v: Vec<f32>) -> Vec<f32> {
    let norm = dot(&v, &v).sqrt();
    if norm > f32::EPSILON {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[derive(Debug)]
pub struct Snapshot {
    model: String,
    loaded_at: Instant,
    ids: Vec<String>,
    vectors: Vec<Vec<f32>>,
    positions: HashMap<String, usize>,
}

impl Snapshot {
    fn build(model: &str, rows: Vec<(String, Vec<f32>)>) -> Self {
        let dim = rows.first().map_or(0, |(_, v)| v.len());
        let mut ids = Vec::with_capacity(rows.len());
        let mut vectors = Vec::with_capacity(rows.len());
        let mut positions = HashMap::with_capacity(rows.len());
        for (id, v) in rows {
            if v.len() != dim {
                tracing::warn!(node = %id, dim = v.len(), expected = dim, "skipping vector with foreign dimension");
                continue;
            }
            positions.insert(id.clone(), ids.len());
            ids.push(id);
            vectors.push(unit(v));
        }
        Self {
            model: model.to_owned(),
            loaded_at: Instant::now(),
            ids,
            vectors,
            positions,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Unit vector for `id`, if cached.
    #[must_use]
    pub fn vector(&self, id: &str) -> Option<&[f32]> {
        self.positions.get(id).map(|&i| self.vectors[i].as_slice())
    }

    /// Exact cosine search: up to `k` `(id, similarity)` pairs, best first.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        if k == 0 || self.vectors.first().is_none_or(|v| v.len() != query.len()) {
            return Vec::new();
        }
        let q = unit(query.to_vec());
        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, dot(&q, v)))
            .collect();
        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored
            .into_iter()
            .take(k)
            .map(|(i, s)| (self.ids[i].clone(), s))
            .collect()
    }
}

/// TTL-bounded cache of the vector snapshot for the active embedding model.
#[derive(Debug)]
pub struct EmbeddingCache {
    ttl: Duration,
    slot: ArcSwapOption<Snapshot>,
    refresh: Mutex<()>,
}

impl EmbeddingCache {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slot: ArcSwapOption::empty(),
            refresh: Mutex::new(()),
        }
    }

    fn fresh(&self, model: &str) -> Option<Arc<Snapshot>> {
        self.slot
            .load_full()
            .filter(|s| s.model == model && s.loaded_at.elapsed() < self.ttl)
    }

    /// Current snapshot for `model`, reloading from the store once it is older than the TTL.
    ///
    /// Concurrent callers share one reload. A caller cancelled mid-reload leaves the
    /// previous snapshot in place.
    ///
    /// # Errors
    ///
    /// Returns an error if reading embeddings from the store fails.
    pub async fn get(&self, store: &GraphStore, model: &str) -> Result<Arc<Snapshot>> {
        if let Some(snapshot) = self.fresh(model) {
            return Ok(snapshot);
        }
        let _guard = self.refresh.lock().await;
        if let Some(snapshot) = self.fresh(model) {
            return Ok(snapshot);
        }
        let rows = store.all_embeddings(model).await?;
        let snapshot = Arc::new(Snapshot::build(model, rows));
        tracing::debug!(model, vectors = snapshot.len(), "embedding cache refreshed");
        self.slot.store(Some(Arc::clone(&snapshot)));
        Ok(snapshot)
    }

    /// Whether a snapshot is currently held (fresh or not).
    #[must_use]
    pub fn is_warm(&self) -> bool {
        self.slot.load().is_some()
    }

    /// Drop the snapshot so the next read reloads.
    pub fn invalidate(&self) {
        self.slot.store(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::node;
    use crate::types::NodeKind;

    async fn store_with_vectors() -> GraphStore {
        let store = GraphStore::open_in_memory().await.unwrap();
        let a = node("a.py", 1, 2, NodeKind::Function, "a", "def a(): pass");
        let b = node("b.py", 1, 2, NodeKind::Function, "b", "def b(): pass");
        store.batch_upsert_nodes(&[a.clone(), b.clone()]).await.unwrap();
        store.upsert_embedding(&a.id, "m", &[2.0, 0.0]).await.unwrap();
        store.upsert_embedding(&b.id, "m", &[0.0, 1.0]).await.unwrap();
        store
    }

    #[test]
    fn unit_normalizes_and_keeps_zero() {
        let v = unit(vec![3.0, 4.0]);
        assert!((v[0] - 0.6).abs() < 1e-6);
        assert!((v[1] - 0.8).abs() < 1e-6);
        assert_eq!(unit(vec![0.0, 0.0]), vec![0.0, 0.0]);
    }

    #[tokio::test]
    async fn snapshot_search_is_exact_cosine() {
        let store = store_with_vectors().await;
        let cache = EmbeddingCache::new(Duration::from_secs(60));
        let snap = cache.get(&store, "m").await.unwrap();
        assert_eq!(snap.len(), 2);
        let hits = snap.search(&[1.0, 0.1], 2);
        assert_eq!(hits[0].0, "a.py:1-2");
        assert!(hits[0].1 > hits[1].1);
        assert!((snap.vector("a.py:1-2").unwrap()[0] - 1.0).abs() < 1e-6);
        assert!(snap.search(&[1.0, 0.0, 0.0], 2).is_empty());
    }

    #[tokio::test]
    async fn cache_is_reused_within_ttl_and_reloaded_after_invalidate() {
        let store = store_with_vectors().await;
        let cache = EmbeddingCache::new(Duration::from_secs(60));
        let first = cache.get(&store, "m").await.unwrap();

        store.upsert_embedding("a.py:1-2", "m", &[0.0, 5.0]).await.unwrap();
        let second = cache.get(&store, "m").await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        cache.invalidate();
        assert!(!cache.is_warm());
        let third = cache.get(&store, "m").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert!((third.vector("a.py:1-2").unwrap()[1] - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn expired_or_other_model_reloads() {
        let store = store_with_vectors().await;
        let cache = EmbeddingCache::new(Duration::ZERO);
        let first = cache.get(&store, "m").await.unwrap();
        let second = cache.get(&store, "m").await.unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        let other = cache.get(&store, "other").await.unwrap();
        assert!(other.is_empty());
    }
}
