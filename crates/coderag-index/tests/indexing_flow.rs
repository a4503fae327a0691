use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use coderag_index::store::to_fts_query;
use coderag_index::{AnnIndex, CodeIndexer, GraphStore, IndexerConfig, NodeKind, Relationship};
use coderag_llm::LlmProvider;
use coderag_llm::mock::MockProvider;

// -- helpers --

fn write(root: &Path, rel: &str, content: &str) {
    let path = root.join(rel);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, content).unwrap();
}

async fn indexer_with(provider: MockProvider, ann: AnnIndex) -> CodeIndexer<MockProvider> {
    let store = GraphStore::open_in_memory().await.unwrap();
    CodeIndexer::new(store, Arc::new(provider), Arc::new(ann), IndexerConfig::default())
}

async fn indexer() -> CodeIndexer<MockProvider> {
    indexer_with(MockProvider::default(), AnnIndex::new(None)).await
}

async fn snapshot(store: &GraphStore) -> (BTreeSet<String>, BTreeSet<(String, String, String)>) {
    let nodes = store
        .all_nodes()
        .await
        .unwrap()
        .into_iter()
        .map(|n| format!("{}|{}|{}", n.id, n.kind, n.content))
        .collect();
    let edges = store
        .all_edges()
        .await
        .unwrap()
        .into_iter()
        .map(|e| (e.source_id, e.target_id, e.relationship.to_string()))
        .collect();
    (nodes, edges)
}

const HELLO: &str = "def hello():\n    print('world')\n";

// -- scenarios --

#[tokio::test]
async fn hello_file_indexes_and_reindexes_as_skipped() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "hello.py", HELLO);
    let idx = indexer().await;

    let first = idx.index_project(dir.path(), false).await.unwrap();
    assert_eq!(first.indexed, 1);
    assert_eq!(first.skipped, 0);

    let nodes = idx.store().nodes_by_filepath("hello.py").await.unwrap();
    assert!(nodes.len() >= 2);
    assert!(nodes.iter().any(|n| n.kind == NodeKind::File));
    assert!(
        nodes
            .iter()
            .any(|n| n.kind == NodeKind::Function && n.name == "hello")
    );

    let second = idx.index_project(dir.path(), false).await.unwrap();
    assert_eq!(second.indexed, 0);
    assert_eq!(second.skipped, 1);

    let hits = idx
        .store()
        .search_nodes(&to_fts_query("hello"), 10)
        .await
        .unwrap();
    assert_eq!(hits[0].0.kind, NodeKind::Function);
    assert_eq!(hits[0].0.name, "hello");
}

#[tokio::test]
async fn reindexing_unchanged_tree_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "app/main.py", "from util import helper\n\ndef main():\n    helper()\n");
    write(dir.path(), "app/util.py", "class Config:\n    pass\n\ndef helper(c: Config):\n    return c\n");
    write(dir.path(), "src/lib.rs", "pub fn add(a: i32, b: i32) -> i32 {\n    a + b\n}\n");
    let idx = indexer().await;

    let first = idx.index_project(dir.path(), false).await.unwrap();
    assert_eq!(first.indexed, 3);
    let before = snapshot(idx.store()).await;

    let second = idx.index_project(dir.path(), false).await.unwrap();
    assert_eq!(second.indexed, 0);
    assert_eq!(second.skipped, 3);
    assert_eq!(second.embedded, 0);
    assert_eq!(snapshot(idx.store()).await, before);

    let forced = idx.index_project(dir.path(), true).await.unwrap();
    assert_eq!(forced.indexed, 3);
    assert_eq!(snapshot(idx.store()).await, before);
}

#[tokio::test]
async fn editing_one_file_leaves_siblings_untouched() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.py", "def alpha():\n    return 1\n");
    write(dir.path(), "b.py", "def beta():\n    return 2\n");
    let idx = indexer().await;
    idx.index_project(dir.path(), false).await.unwrap();

    let store = idx.store();
    let a_hash = store.get_file_hash("a.py").await.unwrap();
    let b_hash = store.get_file_hash("b.py").await.unwrap();
    let b_nodes = store.nodes_by_filepath("b.py").await.unwrap();

    write(dir.path(), "a.py", "def alpha():\n    return 1\n\ndef gamma():\n    return 3\n");
    let report = idx.index_project(dir.path(), false).await.unwrap();
    assert_eq!(report.indexed, 1);
    assert_eq!(report.skipped, 1);

    assert_ne!(store.get_file_hash("a.py").await.unwrap(), a_hash);
    assert_eq!(store.get_file_hash("b.py").await.unwrap(), b_hash);
    assert_eq!(store.nodes_by_filepath("b.py").await.unwrap(), b_nodes);
    assert!(
        store
            .nodes_by_filepath("a.py")
            .await
            .unwrap()
            .iter()
            .any(|n| n.name == "gamma")
    );
}

#[tokio::test]
async fn deleted_file_cascades_everywhere() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "gone.py", "def vanishing():\n    return 1\n");
    write(dir.path(), "kept.py", "def stays():\n    vanishing()\n");
    let idx = indexer().await;
    idx.index_project(dir.path(), false).await.unwrap();

    let store = idx.store();
    let gone_ids: Vec<String> = store
        .nodes_by_filepath("gone.py")
        .await
        .unwrap()
        .into_iter()
        .map(|n| n.id)
        .collect();
    let kept = store.nodes_by_filepath("kept.py").await.unwrap();
    let stays = kept.iter().find(|n| n.name == "stays").unwrap();
    // A resolved edge pointing into the file that is about to disappear.
    store
        .upsert_edge(&coderag_index::Edge::new(&stays.id, &gone_ids[1], Relationship::Calls))
        .await
        .unwrap();

    std::fs::remove_file(dir.path().join("gone.py")).unwrap();
    let report = idx.index_project(dir.path(), false).await.unwrap();
    assert_eq!(report.deleted, 1);

    assert!(store.nodes_by_filepath("gone.py").await.unwrap().is_empty());
    assert!(store.get_file_hash("gone.py").await.unwrap().is_none());
    let hits = store.search_nodes(&to_fts_query("vanishing"), 10).await.unwrap();
    assert!(hits.iter().all(|(n, _)| n.filepath != "gone.py"));
    for id in &gone_ids {
        assert!(store.get_embedding(id, "mock-embed").await.unwrap().is_none());
        assert!(store.edges_from(id, None).await.unwrap().is_empty());
        assert!(store.edges_to(id, None).await.unwrap().is_empty());
    }
    assert!(!store.nodes_by_filepath("kept.py").await.unwrap().is_empty());
}

#[tokio::test]
async fn embedding_sweep_leaves_nothing_missing() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.py", "def a():\n    return 1\n\nclass B:\n    pass\n");
    let provider = MockProvider::default();
    let idx = indexer_with(provider.clone(), AnnIndex::new(None)).await;

    let report = idx.index_project(dir.path(), false).await.unwrap();
    let nodes = idx.store().node_count().await.unwrap();
    assert_eq!(report.embedded, nodes);
    assert!(
        idx.store()
            .nodes_missing_embedding(provider.embedding_model())
            .await
            .unwrap()
            .is_empty()
    );

    let v = idx.store().get_embedding("a.py:1-2", "mock-embed").await.unwrap().unwrap();
    assert_eq!(v.len(), provider.dimensions);
}

#[tokio::test]
async fn failed_embeddings_are_retried_next_run() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "a.py", "def a():\n    return 1\n");
    let store = GraphStore::open_in_memory().await.unwrap();

    let failing = CodeIndexer::new(
        store.clone(),
        Arc::new(MockProvider::failing()),
        Arc::new(AnnIndex::new(None)),
        IndexerConfig::default(),
    );
    let report = failing.index_project(dir.path(), false).await.unwrap();
    assert_eq!(report.embedded, 0);
    assert!(!store.nodes_missing_embedding("mock-embed").await.unwrap().is_empty());

    let working = CodeIndexer::new(
        store.clone(),
        Arc::new(MockProvider::default()),
        Arc::new(AnnIndex::new(None)),
        IndexerConfig::default(),
    );
    let report = working.index_project(dir.path(), false).await.unwrap();
    assert_eq!(report.indexed, 0);
    assert!(report.embedded > 0);
    assert!(store.nodes_missing_embedding("mock-embed").await.unwrap().is_empty());
}

#[tokio::test]
async fn repo_map_is_persisted_per_run() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "pkg/service.py", "def handle_request():\n    pass\n");
    write(dir.path(), "README.md", "# Project\n");
    let idx = indexer().await;
    let report = idx.index_project(dir.path(), false).await.unwrap();

    let root = dir.path().to_string_lossy().to_string();
    let payload = idx.store().latest_repo_map(&root).await.unwrap().unwrap();
    assert_eq!(payload["run_id"], report.run_id);
    assert_eq!(payload["dirs"]["pkg"]["files"][0]["path"], "pkg/service.py");

    let found = idx.store().search_repo_map(&root, "handle_request", 5).await.unwrap();
    assert!(found.iter().any(|e| e.symbol_name.as_deref() == Some("handle_request")));

    let entries = idx.store().repo_map_entries(report.run_id).await.unwrap();
    let rendered = coderag_index::repo_map::render_repo_map(&entries, 500);
    assert!(rendered.contains("pkg/service.py"));
}

#[tokio::test]
async fn ann_sidecar_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let data = tempfile::tempdir().unwrap();
    write(dir.path(), "a.py", "def alpha():\n    return 1\n");
    let db_path = data.path().join("index.db");
    let ann_path = data.path().join("vectors.bin");

    {
        let store = GraphStore::open(db_path.to_str().unwrap()).await.unwrap();
        let idx = CodeIndexer::new(
            store.clone(),
            Arc::new(MockProvider::default()),
            Arc::new(AnnIndex::new(Some(ann_path.clone()))),
            IndexerConfig::default(),
        );
        idx.index_project(dir.path(), false).await.unwrap();
        store.close().await;
    }

    let store = GraphStore::open(db_path.to_str().unwrap()).await.unwrap();
    let ann = AnnIndex::new(Some(ann_path));
    if ann.is_available() {
        ann.load().unwrap();
        assert_eq!(ann.len(), store.embedding_count("mock-embed").await.unwrap());
        assert_eq!(ann.model().as_deref(), Some("mock-embed"));
    }
    assert_eq!(store.node_count().await.unwrap(), 2);
}
