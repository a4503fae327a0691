//! Approximate nearest-neighbour search over node embeddings.
//!
//! The live graph sits behind an [`ArcSwapOption`], so a rebuild is published in one
//! atomic store and readers never observe a half-built index. When the `ann` feature is
//! off the index reports itself unavailable and callers fall back to exact search.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwapOption;
#[cfg(feature = "ann")]
use instant_distance::{Builder, HnswMap, Search};
use serde::{Deserialize, Serialize};

use crate::error::{IndexError, Result};

pub const EF_CONSTRUCTION: usize = 200;
pub const EF_SEARCH: usize = 50;

/// Label → external id sidecar, written next to the graph file.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdMap {
    build_id: String,
    model: String,
    dim: usize,
    ids: Vec<String>,
}

/// Unit-length vector; distance is `1 - cosine`.
#[cfg_attr(not(feature = "ann"), allow(dead_code))]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UnitVector(Vec<f32>);

impl UnitVector {
    fn new(mut v: Vec<f32>) -> Self {
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > f32::EPSILON {
            for x in &mut v {
                *x /= norm;
            }
        }
        Self(v)
    }
}

#[cfg(feature = "ann")]
impl instant_distance::Point for UnitVector {
    fn distance(&self, other: &Self) -> f32 {
        1.0 - self.0.iter().zip(&other.0).map(|(a, b)| a * b).sum::<f32>()
    }
}

/// On-disk graph file. Values are labels into [`IdMap::ids`].
#[cfg(feature = "ann")]
#[derive(Serialize, Deserialize)]
struct GraphFile {
    build_id: String,
    dim: usize,
    graph: HnswMap<UnitVector, u32>,
}

struct Loaded {
    #[cfg(feature = "ann")]
    graph: GraphFile,
    map: IdMap,
}

impl std::fmt::Debug for Loaded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loaded")
            .field("build_id", &self.map.build_id)
            .field("model", &self.map.model)
            .field("vectors", &self.map.ids.len())
            .finish_non_exhaustive()
    }
}

/// Stable fingerprint of an id list; ties the graph file to its id map.
#[must_use]
pub fn build_id(ids: &[String]) -> String {
    let mut hasher = blake3::Hasher::new();
    for id in ids {
        hasher.update(id.as_bytes());
        hasher.update(b"\n");
    }
    hasher.finalize().to_hex().to_string()
}

/// Layer draws are seeded from the build id.
#[cfg(feature = "ann")]
fn seed_for(build_id: &str) -> u64 {
    build_id
        .get(..16)
        .and_then(|hex| u64::from_str_radix(hex, 16).ok())
        .unwrap_or_default()
}

#[cfg_attr(not(feature = "ann"), allow(dead_code))]
fn map_path(path: &Path) -> PathBuf {
    let mut p = path.as_os_str().to_owned();
    p.push(".map.json");
    PathBuf::from(p)
}

#[cfg_attr(not(feature = "ann"), allow(dead_code))]
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&tmp, bytes)?;
    std::fs::rename(&tmp, path)?;
    Ok(())
}

#[derive(Debug, Default)]
pub struct AnnIndex {
    path: Option<PathBuf>,
    live: ArcSwapOption<Loaded>,
}

impl AnnIndex {
    /// An index that persists to `path` (and `<path>.map.json`) when given.
    #[must_use]
    pub fn new(path: Option<PathBuf>) -> Self {
        Self {
            path,
            live: ArcSwapOption::empty(),
        }
    }

    /// Whether approximate search is compiled in.
    #[must_use]
    pub fn is_available(&self) -> bool {
        cfg!(feature = "ann")
    }

    /// Whether a graph is loaded and can answer queries.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.live.load().is_some()
    }

    /// Number of indexed vectors, 0 when not ready.
    #[must_use]
    pub fn len(&self) -> usize {
        self.live.load_full().map_or(0, |l| l.map.ids.len())
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Model whose vectors the loaded graph holds.
    #[must_use]
    pub fn model(&self) -> Option<String> {
        self.live.load_full().map(|l| l.map.model.clone())
    }

    /// Drop the in-memory graph. Files on disk are left alone.
    pub fn clear(&self) {
        self.live.store(None);
    }

    /// Build a graph over `items` for `model`, persist it if a path is configured, then
    /// publish it. Empty input is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Ann`] if the feature is disabled, vectors disagree on
    /// dimension, or persisting fails.
    pub fn build(&self, model: &str, items: Vec<(String, Vec<f32>)>) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        #[cfg(feature = "ann")]
        {
            let dim = items[0].1.len();
            if let Some((id, v)) = items.iter().find(|(_, v)| v.len() != dim) {
                return Err(IndexError::Ann(format!(
                    "vector for {id} has dimension {}, expected {dim}",
                    v.len()
                )));
            }
            let Ok(count) = u32::try_from(items.len()) else {
                return Err(IndexError::Ann("too many vectors for one graph".into()));
            };

            let started = std::time::Instant::now();
            let (ids, vectors): (Vec<String>, Vec<Vec<f32>>) = items.into_iter().unzip();
            let build_id = build_id(&ids);
            let points: Vec<UnitVector> = vectors.into_iter().map(UnitVector::new).collect();
            let graph = Builder::default()
                .ef_construction(EF_CONSTRUCTION)
                .ef_search(EF_SEARCH)
                .seed(seed_for(&build_id))
                .build(points, (0..count).collect());
            let loaded = Loaded {
                graph: GraphFile {
                    build_id: build_id.clone(),
                    dim,
                    graph,
                },
                map: IdMap {
                    build_id,
                    model: model.to_owned(),
                    dim,
                    ids,
                },
            };
            if let Some(path) = &self.path {
                save_to(path, &loaded)?;
            }
            tracing::info!(
                vectors = loaded.map.ids.len(),
                dim,
                elapsed_ms = started.elapsed().as_millis(),
                "ann index built"
            );
            self.live.store(Some(Arc::new(loaded)));
            Ok(())
        }
        #[cfg(not(feature = "ann"))]
        {
            let _ = model;
            Err(IndexError::Ann("ann support not compiled in".into()))
        }
    }

    /// Up to `k` `(id, similarity)` pairs, similarity being `1 - cosine distance`.
    ///
    /// Returns `None` when no graph is ready or `k` exceeds [`EF_SEARCH`], the caller
    /// should then search exactly.
    #[must_use]
    pub fn query(&self, vector: &[f32], k: usize) -> Option<Vec<(String, f32)>> {
        let loaded = self.live.load_full()?;
        #[cfg(feature = "ann")]
        {
            if vector.len() != loaded.map.dim || k > EF_SEARCH {
                return None;
            }
            let query = UnitVector::new(vector.to_vec());
            let mut search = Search::default();
            Some(
                loaded
                    .graph
                    .graph
                    .search(&query, &mut search)
                    .take(k)
                    .filter_map(|item| {
                        loaded
                            .map
                            .ids
                            .get(*item.value as usize)
                            .map(|id| (id.clone(), 1.0 - item.distance))
                    })
                    .collect(),
            )
        }
        #[cfg(not(feature = "ann"))]
        {
            let _ = (vector, k, loaded);
            None
        }
    }

    /// Persist the live graph to the configured path.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Ann`] if no path is configured or nothing is loaded, or an
    /// I/O error if writing fails.
    pub fn save(&self) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| IndexError::Ann("no index path configured".into()))?;
        let loaded = self
            .live
            .load_full()
            .ok_or_else(|| IndexError::Ann("no index loaded".into()))?;
        save_to(path, &loaded)
    }

    /// Load graph and id map from the configured path and publish them.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::Ann`] when either file is missing or corrupt, or when the two
    /// files come from different builds. The previously live graph stays in place.
    pub fn load(&self) -> Result<()> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| IndexError::Ann("no index path configured".into()))?;
        let loaded = load_from(path)?;
        tracing::debug!(vectors = loaded.map.ids.len(), path = %path.display(), "ann index loaded");
        self.live.store(Some(Arc::new(loaded)));
        Ok(())
    }
}

#[cfg(feature = "ann")]
fn save_to(path: &Path, loaded: &Loaded) -> Result<()> {
    let graph = bincode::serde::encode_to_vec(&loaded.graph, bincode::config::standard())
        .map_err(|e: bincode::error::EncodeError| IndexError::Ann(e.to_string()))?;
    let map = serde_json::to_vec(&loaded.map)?;
    write_atomic(path, &graph)?;
    write_atomic(&map_path(path), &map)?;
    Ok(())
}

#[cfg(not(feature = "ann"))]
fn save_to(_path: &Path, _loaded: &Loaded) -> Result<()> {
    Err(IndexError::Ann("ann support not compiled in".into()))
}

#[cfg(feature = "ann")]
fn load_from(path: &Path) -> Result<Loaded> {
    let read = |p: &Path| {
        std::fs::read(p).map_err(|e| IndexError::Ann(format!("cannot read {}: {e}", p.display())))
    };
    let graph_bytes = read(path)?;
    let map_bytes = read(&map_path(path))?;

    let (graph, _): (GraphFile, usize) =
        bincode::serde::decode_from_slice(&graph_bytes, bincode::config::standard())
            .map_err(|e: bincode::error::DecodeError| IndexError::Ann(format!("corrupt index: {e}")))?;
    let map: IdMap = serde_json::from_slice(&map_bytes)
        .map_err(|e| IndexError::Ann(format!("corrupt id map: {e}")))?;

    if graph.build_id != map.build_id || build_id(&map.ids) != map.build_id {
        return Err(IndexError::Ann("index and id map are from different builds".into()));
    }
    let labels_valid = graph
        .graph
        .values
        .iter()
        .all(|&label| (label as usize) < map.ids.len());
    if graph.graph.values.len() != map.ids.len() || graph.dim != map.dim || !labels_valid {
        return Err(IndexError::Ann("index structure does not match id map".into()));
    }
    Ok(Loaded { graph, map })
}

#[cfg(not(feature = "ann"))]
fn load_from(_path: &Path) -> Result<Loaded> {
    Err(IndexError::Ann("ann support not compiled in".into()))
}

#[cfg(all(test, feature = "ann"))]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn exact(vectors: &[Vec<f32>], query: &[f32], k: usize) -> Vec<String> {
        let q = UnitVector::new(query.to_vec());
        let mut scored: Vec<(f32, usize)> = vectors
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let v = UnitVector::new(v.clone());
                (instant_distance::Point::distance(&q, &v), i)
            })
            .collect();
        scored.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.cmp(&b.1)));
        scored.into_iter().take(k).map(|(_, i)| i.to_string()).collect()
    }

    fn items() -> Vec<(String, Vec<f32>)> {
        vec![
            ("a".into(), vec![1.0, 0.0, 0.0]),
            ("b".into(), vec![0.0, 1.0, 0.0]),
            ("c".into(), vec![0.7, 0.7, 0.0]),
        ]
    }

    #[test]
    fn empty_build_is_noop() {
        let ann = AnnIndex::new(None);
        ann.build("m", Vec::new()).unwrap();
        assert!(!ann.is_ready());
        assert!(ann.query(&[1.0, 0.0, 0.0], 3).is_none());
    }

    #[test]
    fn query_returns_similarity() {
        let ann = AnnIndex::new(None);
        ann.build("m", items()).unwrap();
        let hits = ann.query(&[1.0, 0.0, 0.0], 2).unwrap();
        assert_eq!(hits[0].0, "a");
        assert!((hits[0].1 - 1.0).abs() < 1e-5);
        assert_eq!(hits[1].0, "c");
        assert!(ann.query(&[1.0, 0.0], 2).is_none());
        assert_eq!(ann.model().as_deref(), Some("m"));
    }

    #[test]
    fn mixed_dimensions_are_rejected() {
        let ann = AnnIndex::new(None);
        let mut bad = items();
        bad.push(("d".into(), vec![1.0]));
        assert!(matches!(ann.build("m", bad), Err(IndexError::Ann(_))));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ann.bin");
        AnnIndex::new(Some(path.clone())).build("m", items()).unwrap();
        assert!(path.exists());
        assert!(map_path(&path).exists());

        let fresh = AnnIndex::new(Some(path));
        assert!(!fresh.is_ready());
        fresh.load().unwrap();
        assert_eq!(fresh.len(), 3);
        assert_eq!(fresh.query(&[0.0, 1.0, 0.0], 1).unwrap()[0].0, "b");
    }

    #[test]
    fn missing_or_mismatched_files_fail_cleanly() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ann.bin");
        let ann = AnnIndex::new(Some(path.clone()));
        assert!(matches!(ann.load(), Err(IndexError::Ann(_))));

        ann.build("m", items()).unwrap();
        let other = dir.path().join("other.bin");
        AnnIndex::new(Some(other.clone()))
            .build("m", vec![("z".into(), vec![1.0, 0.0, 0.0])])
            .unwrap();
        std::fs::copy(map_path(&other), map_path(&path)).unwrap();

        let reloaded = AnnIndex::new(Some(path.clone()));
        assert!(matches!(reloaded.load(), Err(IndexError::Ann(_))));

        std::fs::write(&path, b"not a graph").unwrap();
        assert!(matches!(reloaded.load(), Err(IndexError::Ann(_))));
        assert!(!reloaded.is_ready());
    }

    #[test]
    fn oversized_k_defers_to_exact_search() {
        let ann = AnnIndex::new(None);
        ann.build("m", items()).unwrap();
        assert!(ann.query(&[1.0, 0.0, 0.0], EF_SEARCH + 1).is_none());
        assert_eq!(ann.query(&[1.0, 0.0, 0.0], 10).unwrap().len(), 3);
    }

    #[test]
    fn rebuild_replaces_live_graph() {
        let ann = AnnIndex::new(None);
        ann.build("m", items()).unwrap();
        ann.build("other", vec![("z".into(), vec![0.0, 0.0, 1.0])]).unwrap();
        assert_eq!(ann.len(), 1);
        assert_eq!(ann.model().as_deref(), Some("other"));
        assert_eq!(ann.query(&[1.0, 0.0, 0.0], 3).unwrap()[0].0, "z");
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn recall_matches_exact_on_small_sets(
            vectors in proptest::collection::vec(proptest::collection::vec(-1.0f32..1.0, 8), 20..120),
            query in proptest::collection::vec(-1.0f32..1.0, 8),
        ) {
            prop_assume!(query.iter().any(|x| x.abs() > 0.01));
            let items: Vec<(String, Vec<f32>)> = vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (i.to_string(), v.clone()))
                .collect();
            let ann = AnnIndex::new(None);
            ann.build("m", items).unwrap();
            let truth = exact(&vectors, &query, 5);
            let got: Vec<String> = ann.query(&query, 5).unwrap().into_iter().map(|(id, _)| id).collect();
            let overlap = truth.iter().filter(|id| got.contains(id)).count();
            // ef_search = 50 on at most 120 points is close to exhaustive.
            prop_assert!(overlap >= 4, "truth {:?} got {:?}", truth, got);
        }
    }
}
