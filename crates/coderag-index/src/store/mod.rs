//! Durable graph store: nodes, edges, full-text shadow, embeddings, file hashes,
//! index runs and repo maps in one `SQLite` file.
//!
//! The store runs in WAL mode, so a single writer (the indexing coordinator) never
//! blocks concurrent readers (the retriever).

mod embeddings;
mod files;
mod nodes;
mod runs;

use std::str::FromStr;
use std::time::Duration;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};

use crate::error::Result;

pub use nodes::{sanitize_query, to_fts_query};

#[derive(Debug, Clone)]
pub struct GraphStore {
    pool: SqlitePool,
}

impl GraphStore {
    /// Open (or create) the database at `path` and apply pending migrations.
    ///
    /// `":memory:"` opens a private in-memory database on a single connection.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or a migration fails.
    pub async fn open(path: &str) -> Result<Self> {
        let in_memory = path == ":memory:";
        let url = if in_memory {
            "sqlite::memory:".to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let opts = SqliteConnectOptions::from_str(&url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(10))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(if in_memory { 1 } else { 5 })
            .connect_with(opts)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(path, "graph store opened");

        Ok(Self { pool })
    }

    /// # Errors
    ///
    /// Returns an error if the in-memory database cannot be created.
    pub async fn open_in_memory() -> Result<Self> {
        Self::open(":memory:").await
    }

    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Highest applied migration version, or 0 on a fresh database.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn schema_version(&self) -> Result<i64> {
        let version: Option<i64> =
            sqlx::query_scalar("SELECT MAX(version) FROM _sqlx_migrations WHERE success = 1")
                .fetch_one(&self.pool)
                .await?;
        Ok(version.unwrap_or(0))
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn node_count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(n)?)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn edge_count(&self) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM edges")
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(n)?)
    }

    /// Close the pool, flushing the WAL.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::types::{CodeNode, Edge, NodeKind, Relationship};
    use tempfile::NamedTempFile;

    pub(crate) fn node(filepath: &str, start: usize, end: usize, kind: NodeKind, name: &str, content: &str) -> CodeNode {
        let mut properties = serde_json::Map::new();
        properties.insert("language".into(), "python".into());
        CodeNode {
            id: CodeNode::make_id(filepath, start, end),
            kind,
            name: name.into(),
            filepath: filepath.into(),
            start_line: start,
            end_line: end,
            content: content.into(),
            properties,
            framework: None,
            import_deps: Vec::new(),
            file_hash: "h".into(),
            repo_id: "repo".into(),
        }
    }

    pub(crate) fn edge(source: &str, target: &str, rel: Relationship) -> Edge {
        Edge::new(source, target, rel)
    }

    #[tokio::test]
    async fn wal_journal_mode_enabled_on_file_db() {
        let file = NamedTempFile::new().expect("tempfile");
        let path = file.path().to_str().expect("valid path");

        let store = GraphStore::open(path).await.expect("open");

        let mode: String = sqlx::query_scalar("PRAGMA journal_mode")
            .fetch_one(store.pool())
            .await
            .expect("PRAGMA query");

        assert_eq!(mode, "wal", "expected WAL journal mode, got: {mode}");
    }

    #[tokio::test]
    async fn migrations_are_idempotent() {
        let file = NamedTempFile::new().expect("tempfile");
        let path = file.path().to_str().expect("valid path");

        let first = GraphStore::open(path).await.expect("first open");
        let version = first.schema_version().await.unwrap();
        assert_eq!(version, 2);
        first
            .upsert_node(&node("a.py", 1, 2, NodeKind::Function, "f", "def f(): pass"))
            .await
            .unwrap();
        first.close().await;

        let second = GraphStore::open(path).await.expect("reopen");
        assert_eq!(second.schema_version().await.unwrap(), version);
        assert_eq!(second.node_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn fresh_store_is_empty() {
        let store = GraphStore::open_in_memory().await.unwrap();
        assert_eq!(store.node_count().await.unwrap(), 0);
        assert_eq!(store.edge_count().await.unwrap(), 0);
    }
}
