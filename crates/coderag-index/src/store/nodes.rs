use std::collections::HashMap;

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::GraphStore;
use crate::error::Result;
use crate::types::{CodeNode, Edge, NodeKind, Relationship, symbol_ref};

const NODE_COLUMNS: &str = "n.id, n.kind, n.name, n.filepath, n.start_line, n.end_line, n.content, \
                            n.properties, n.framework, n.import_deps, n.file_hash, n.repo_id";

type NodeRow = (
    String,
    String,
    String,
    String,
    i64,
    i64,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
);

type ScoredNodeRow = (
    String,
    String,
    String,
    String,
    i64,
    i64,
    String,
    String,
    Option<String>,
    String,
    String,
    String,
    f64,
);

fn node_from_row(row: NodeRow) -> Result<CodeNode> {
    let (
        id,
        kind,
        name,
        filepath,
        start_line,
        end_line,
        content,
        properties,
        framework,
        import_deps,
        file_hash,
        repo_id,
    ) = row;
    Ok(CodeNode {
        id,
        kind: kind.parse::<NodeKind>()?,
        name,
        filepath,
        start_line: usize::try_from(start_line)?,
        end_line: usize::try_from(end_line)?,
        content,
        properties: serde_json::from_str(&properties).unwrap_or_default(),
        framework: framework
            .as_deref()
            .and_then(|f| serde_json::from_str(f).ok()),
        import_deps: serde_json::from_str(&import_deps).unwrap_or_default(),
        file_hash,
        repo_id,
    })
}

fn scored_from_row(row: ScoredNodeRow) -> Result<(CodeNode, f64)> {
    let (a, b, c, d, e, f, g, h, i, j, k, l, bm25) = row;
    // bm25() is lower-is-better; flip it so callers see higher-is-better.
    Ok((node_from_row((a, b, c, d, e, f, g, h, i, j, k, l))?, -bm25))
}

fn edge_from_row((source_id, target_id, relationship, properties): (String, String, String, String)) -> Result<Edge> {
    Ok(Edge {
        source_id,
        target_id,
        relationship: relationship.parse::<Relationship>()?,
        properties: serde_json::from_str(&properties).unwrap_or_default(),
    })
}

/// Keep only alphanumerics and whitespace; the fallback for a query FTS5 rejects.
#[must_use]
pub fn sanitize_query(query: &str) -> String {
    query
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Turn free text into an FTS5 OR-query of quoted terms.
///
/// `snake_case` identifiers stay whole; punctuation splits terms. Returns an empty string
/// when the text has no searchable terms.
#[must_use]
pub fn to_fts_query(text: &str) -> String {
    let mut seen = std::collections::HashSet::new();
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty())
        .filter(|t| seen.insert(t.to_lowercase()))
        .map(|t| format!("\"{}\"", t.replace('"', "\"\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

pub(super) async fn write_node(conn: &mut SqliteConnection, node: &CodeNode) -> Result<()> {
    let properties = serde_json::to_string(&node.properties)?;
    let framework = node
        .framework
        .as_ref()
        .map(serde_json::to_string)
        .transpose()?;
    let import_deps = serde_json::to_string(&node.import_deps)?;

    sqlx::query(
        "INSERT INTO nodes \
         (id, kind, name, filepath, start_line, end_line, content, properties, framework, \
          import_deps, file_hash, repo_id, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, datetime('now')) \
         ON CONFLICT(id) DO UPDATE SET \
           kind = excluded.kind, name = excluded.name, filepath = excluded.filepath, \
           start_line = excluded.start_line, end_line = excluded.end_line, \
           content = excluded.content, properties = excluded.properties, \
           framework = excluded.framework, import_deps = excluded.import_deps, \
           file_hash = excluded.file_hash, repo_id = excluded.repo_id, \
           updated_at = excluded.updated_at",
    )
    .bind(&node.id)
    .bind(node.kind.as_str())
    .bind(&node.name)
    .bind(&node.filepath)
    .bind(i64::try_from(node.start_line)?)
    .bind(i64::try_from(node.end_line)?)
    .bind(&node.content)
    .bind(properties)
    .bind(framework)
    .bind(import_deps)
    .bind(&node.file_hash)
    .bind(&node.repo_id)
    .execute(&mut *conn)
    .await?;

    sqlx::query("DELETE FROM nodes_fts WHERE id = ?")
        .bind(&node.id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("INSERT INTO nodes_fts (id, name, content, filepath) VALUES (?, ?, ?, ?)")
        .bind(&node.id)
        .bind(&node.name)
        .bind(&node.content)
        .bind(&node.filepath)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub(super) async fn write_edge(conn: &mut SqliteConnection, edge: &Edge) -> Result<()> {
    sqlx::query(
        "INSERT INTO edges (source_id, target_id, relationship, properties) VALUES (?, ?, ?, ?) \
         ON CONFLICT(source_id, target_id, relationship) DO UPDATE SET properties = excluded.properties",
    )
    .bind(&edge.source_id)
    .bind(&edge.target_id)
    .bind(edge.relationship.as_str())
    .bind(serde_json::to_string(&edge.properties)?)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

/// Remove every node of `filepath` plus its FTS rows, embeddings and incident edges.
pub(super) async fn cascade_filepath(conn: &mut SqliteConnection, filepath: &str) -> Result<u64> {
    sqlx::query(
        "DELETE FROM edges WHERE source_id IN (SELECT id FROM nodes WHERE filepath = ?1) \
            OR target_id IN (SELECT id FROM nodes WHERE filepath = ?1)",
    )
    .bind(filepath)
    .execute(&mut *conn)
    .await?;
    sqlx::query("DELETE FROM embeddings WHERE node_id IN (SELECT id FROM nodes WHERE filepath = ?1)")
        .bind(filepath)
        .execute(&mut *conn)
        .await?;
    sqlx::query("DELETE FROM nodes_fts WHERE id IN (SELECT id FROM nodes WHERE filepath = ?1)")
        .bind(filepath)
        .execute(&mut *conn)
        .await?;
    let deleted = sqlx::query("DELETE FROM nodes WHERE filepath = ?1")
        .bind(filepath)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(deleted)
}

impl GraphStore {
    /// Insert or update a node and mirror it into the full-text index.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn upsert_node(&self, node: &CodeNode) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        write_node(&mut tx, node).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Upsert many nodes in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed in that case.
    pub async fn batch_upsert_nodes(&self, nodes: &[CodeNode]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for node in nodes {
            write_node(&mut tx, node).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn upsert_edge(&self, edge: &Edge) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        write_edge(&mut conn, edge).await
    }

    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed in that case.
    pub async fn batch_upsert_edges(&self, edges: &[Edge]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        for edge in edges {
            write_edge(&mut tx, edge).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Atomically swap a file's node set: cascade away the old nodes, write the new
    /// nodes and edges, and record the content hash.
    ///
    /// # Errors
    ///
    /// Returns an error if any statement fails; the previous state is kept in that case.
    pub async fn replace_file(
        &self,
        filepath: &str,
        content_hash: &str,
        nodes: &[CodeNode],
        edges: &[Edge],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        cascade_filepath(&mut tx, filepath).await?;
        for node in nodes {
            write_node(&mut tx, node).await?;
        }
        for edge in edges {
            write_edge(&mut tx, edge).await?;
        }
        super::files::write_file_hash(&mut tx, filepath, content_hash).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Delete every node of `filepath` with its FTS rows, embeddings and incident edges.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_nodes_by_filepath(&self, filepath: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let deleted = cascade_filepath(&mut tx, filepath).await?;
        tx.commit().await?;
        Ok(deleted)
    }

    /// Forget a file entirely: its nodes (cascading) and its stored hash.
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_file(&self, filepath: &str) -> Result<u64> {
        let mut tx = self.pool.begin().await?;
        let deleted = cascade_filepath(&mut tx, filepath).await?;
        sqlx::query("DELETE FROM file_hashes WHERE filepath = ?")
            .bind(filepath)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(deleted)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_node(&self, id: &str) -> Result<Option<CodeNode>> {
        let row: Option<NodeRow> =
            sqlx::query_as(&format!("SELECT {NODE_COLUMNS} FROM nodes n WHERE n.id = ?"))
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        row.map(node_from_row).transpose()
    }

    /// Fetch nodes by id, preserving the order of `ids` and skipping unknown ids.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_nodes(&self, ids: &[String]) -> Result<Vec<CodeNode>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb: QueryBuilder<'_, Sqlite> =
            QueryBuilder::new(format!("SELECT {NODE_COLUMNS} FROM nodes n WHERE n.id IN ("));
        let mut sep = qb.separated(", ");
        for id in ids {
            sep.push_bind(id);
        }
        qb.push(")");

        let rows: Vec<NodeRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        let mut by_id: HashMap<String, CodeNode> = HashMap::with_capacity(rows.len());
        for row in rows {
            let node = node_from_row(row)?;
            by_id.insert(node.id.clone(), node);
        }
        Ok(ids.iter().filter_map(|id| by_id.remove(id)).collect())
    }

    /// Nodes of one file ordered by start line (the whole-file node first).
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn nodes_by_filepath(&self, filepath: &str) -> Result<Vec<CodeNode>> {
        let rows: Vec<NodeRow> = sqlx::query_as(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes n WHERE n.filepath = ? ORDER BY n.start_line, n.id"
        ))
        .bind(filepath)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(node_from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn all_nodes(&self) -> Result<Vec<CodeNode>> {
        let rows: Vec<NodeRow> = sqlx::query_as(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes n ORDER BY n.filepath, n.start_line, n.id"
        ))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(node_from_row).collect()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn all_edges(&self) -> Result<Vec<Edge>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT source_id, target_id, relationship, properties FROM edges \
             ORDER BY source_id, target_id, relationship",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(edge_from_row).collect()
    }

    /// Outgoing edges of `source_id`, optionally restricted to one relationship.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn edges_from(&self, source_id: &str, relationship: Option<Relationship>) -> Result<Vec<Edge>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT source_id, target_id, relationship, properties FROM edges \
             WHERE source_id = ?1 AND (?2 IS NULL OR relationship = ?2) ORDER BY target_id",
        )
        .bind(source_id)
        .bind(relationship.map(Relationship::as_str))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(edge_from_row).collect()
    }

    /// Incoming edges of `target_id`, optionally restricted to one relationship.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn edges_to(&self, target_id: &str, relationship: Option<Relationship>) -> Result<Vec<Edge>> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT source_id, target_id, relationship, properties FROM edges \
             WHERE target_id = ?1 AND (?2 IS NULL OR relationship = ?2) ORDER BY source_id",
        )
        .bind(target_id)
        .bind(relationship.map(Relationship::as_str))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(edge_from_row).collect()
    }

    /// Symbol nodes whose name is exactly `name`. Resolves `symbol:<name>` placeholders.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn find_definitions(&self, name: &str) -> Result<Vec<CodeNode>> {
        let rows: Vec<NodeRow> = sqlx::query_as(&format!(
            "SELECT {NODE_COLUMNS} FROM nodes n \
             WHERE n.name = ? AND n.kind NOT IN ('file', 'text') \
             ORDER BY n.filepath, n.start_line"
        ))
        .bind(name)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(node_from_row).collect()
    }

    /// Nodes holding a `calls` edge to `symbol:<name>`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn callers_of(&self, name: &str) -> Result<Vec<CodeNode>> {
        let rows: Vec<NodeRow> = sqlx::query_as(&format!(
            "SELECT {NODE_COLUMNS} FROM edges e JOIN nodes n ON n.id = e.source_id \
             WHERE e.target_id = ? AND e.relationship = 'calls' \
             ORDER BY n.filepath, n.start_line"
        ))
        .bind(symbol_ref(name))
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(node_from_row).collect()
    }

    /// Number of incoming `calls` edges per symbol name. Names with none are omitted.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn call_in_degrees(&self, names: &[String]) -> Result<HashMap<String, usize>> {
        if names.is_empty() {
            return Ok(HashMap::new());
        }
        let mut qb: QueryBuilder<'_, Sqlite> = QueryBuilder::new(
            "SELECT target_id, COUNT(*) FROM edges WHERE relationship = 'calls' AND target_id IN (",
        );
        let mut sep = qb.separated(", ");
        for name in names {
            sep.push_bind(symbol_ref(name));
        }
        qb.push(") GROUP BY target_id");

        let rows: Vec<(String, i64)> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter()
            .map(|(target, count)| {
                let name = target.strip_prefix("symbol:").unwrap_or(&target).to_owned();
                Ok((name, usize::try_from(count)?))
            })
            .collect()
    }

    /// Ranked full-text search over node name, content and path.
    ///
    /// `query` is an FTS5 expression. If FTS5 rejects it, the query is sanitized and retried
    /// once; if that also fails the result is empty. Scores are higher-is-better.
    ///
    /// # Errors
    ///
    /// Returns an error only for store faults unrelated to query syntax.
    pub async fn search_nodes(&self, query: &str, limit: usize) -> Result<Vec<(CodeNode, f64)>> {
        if query.trim().is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        match self.run_fts(query, limit).await {
            Ok(hits) => Ok(hits),
            Err(sqlx::Error::Database(e)) => {
                let sanitized = sanitize_query(query);
                tracing::debug!(query, sanitized, error = %e, "fts query rejected, retrying sanitized");
                if sanitized.is_empty() {
                    return Ok(Vec::new());
                }
                match self.run_fts(&sanitized, limit).await {
                    Ok(hits) => Ok(hits),
                    Err(sqlx::Error::Database(e)) => {
                        tracing::warn!(query, error = %e, "fts query failed after sanitizing");
                        Ok(Vec::new())
                    }
                    Err(e) => Err(e.into()),
                }
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn run_fts(&self, query: &str, limit: usize) -> std::result::Result<Vec<(CodeNode, f64)>, sqlx::Error> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows: Vec<ScoredNodeRow> = sqlx::query_as(&format!(
            "SELECT {NODE_COLUMNS}, bm25(nodes_fts, 0.0, 10.0, 1.0, 2.0) AS score \
             FROM nodes_fts JOIN nodes n ON n.id = nodes_fts.id \
             WHERE nodes_fts MATCH ? \
             ORDER BY score, CASE WHEN n.kind IN ('file', 'text') THEN 1 ELSE 0 END, n.id \
             LIMIT ?"
        ))
        .bind(query)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        // A corrupt row is skipped rather than failing the whole search.
        Ok(rows.into_iter().filter_map(|r| scored_from_row(r).ok()).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::{edge, node};

    async fn seeded() -> GraphStore {
        let store = GraphStore::open_in_memory().await.unwrap();
        let file = node("app.py", 0, 6, NodeKind::File, "app.py", "def load_config():\n    pass\n\ndef main():\n    load_config()\n");
        let load = node("app.py", 1, 2, NodeKind::Function, "load_config", "def load_config():\n    pass");
        let main = node("app.py", 4, 5, NodeKind::Function, "main", "def main():\n    load_config()");
        let util = node("util.py", 1, 2, NodeKind::Function, "helper", "def helper():\n    load_config()");
        store
            .replace_file(
                "app.py",
                "h1",
                &[file.clone(), load.clone(), main.clone()],
                &[
                    edge(&file.id, &load.id, Relationship::Contains),
                    edge(&file.id, &main.id, Relationship::Contains),
                    edge(&main.id, "symbol:load_config", Relationship::Calls),
                    edge(&util.id, &load.id, Relationship::Calls),
                ],
            )
            .await
            .unwrap();
        store
            .replace_file(
                "util.py",
                "h2",
                &[util.clone()],
                &[edge(&util.id, "symbol:load_config", Relationship::Calls)],
            )
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn upsert_is_keyed_by_id() {
        let store = GraphStore::open_in_memory().await.unwrap();
        let mut n = node("a.py", 1, 2, NodeKind::Function, "alpha", "def alpha(): pass");
        store.upsert_node(&n).await.unwrap();
        n.content = "def alpha(): return 1".into();
        store.upsert_node(&n).await.unwrap();

        assert_eq!(store.node_count().await.unwrap(), 1);
        let got = store.get_node(&n.id).await.unwrap().unwrap();
        assert_eq!(got, n);

        let hits = store.search_nodes("\"return\"", 5).await.unwrap();
        assert_eq!(hits.len(), 1);
        let fts_rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM nodes_fts")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(fts_rows, 1);
    }

    #[tokio::test]
    async fn edge_upsert_does_not_duplicate() {
        let store = GraphStore::open_in_memory().await.unwrap();
        let e = edge("a:1-2", "symbol:b", Relationship::Calls);
        store.upsert_edge(&e).await.unwrap();
        store.batch_upsert_edges(&[e.clone(), e.clone().with_property("line", 3)]).await.unwrap();
        let edges = store.all_edges().await.unwrap();
        assert_eq!(edges.len(), 1);
        assert_eq!(edges[0].properties.get("line"), Some(&serde_json::json!(3)));
    }

    #[tokio::test]
    async fn get_nodes_preserves_order_and_skips_missing() {
        let store = seeded().await;
        let ids = vec![
            "app.py:4-5".to_owned(),
            "missing:1-1".to_owned(),
            "app.py:1-2".to_owned(),
        ];
        let got: Vec<_> = store
            .get_nodes(&ids)
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(got, vec!["app.py:4-5", "app.py:1-2"]);
    }

    #[tokio::test]
    async fn search_ranks_name_matches_and_symbols_first() {
        let store = seeded().await;
        let hits = store.search_nodes("\"load_config\"", 10).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].0.name, "load_config");
        assert!(hits.windows(2).all(|w| w[0].1 >= w[1].1));
    }

    #[tokio::test]
    async fn malformed_query_is_sanitized_and_retried() {
        let store = seeded().await;
        let hits = store.search_nodes("main(\"", 10).await.unwrap();
        assert!(hits.iter().any(|(n, _)| n.name == "main"));

        let none = store.search_nodes("((\"", 10).await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn delete_cascades_everywhere() {
        let store = seeded().await;
        store
            .upsert_embedding("app.py:1-2", "m", &[1.0, 0.0])
            .await
            .unwrap();

        let deleted = store.delete_nodes_by_filepath("app.py").await.unwrap();
        assert_eq!(deleted, 3);

        assert!(store.search_nodes("\"load_config\"", 10).await.unwrap().iter().all(|(n, _)| n.filepath != "app.py"));
        assert!(store.get_embedding("app.py:1-2", "m").await.unwrap().is_none());
        // Both directions: util.py -> app.py:1-2 is gone too.
        assert!(store.edges_to("app.py:1-2", None).await.unwrap().is_empty());
        assert!(store.edges_from("app.py:4-5", None).await.unwrap().is_empty());
        assert_eq!(store.nodes_by_filepath("util.py").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn definitions_and_callers_resolve_by_name() {
        let store = seeded().await;
        let defs = store.find_definitions("load_config").await.unwrap();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].id, "app.py:1-2");

        let callers: Vec<_> = store
            .callers_of("load_config")
            .await
            .unwrap()
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(callers, vec!["main", "helper"]);

        let degrees = store
            .call_in_degrees(&["load_config".into(), "main".into()])
            .await
            .unwrap();
        assert_eq!(degrees.get("load_config"), Some(&2));
        assert!(!degrees.contains_key("main"));
    }

    #[test]
    fn fts_query_quotes_terms() {
        assert_eq!(to_fts_query("parse config_file!"), "\"parse\" OR \"config_file\"");
        assert_eq!(to_fts_query("Load load LOAD"), "\"Load\"");
        assert_eq!(to_fts_query("?? !!"), "");
    }

    #[test]
    fn sanitize_strips_operators() {
        assert_eq!(sanitize_query("main(\"  x*"), "main x");
        assert_eq!(sanitize_query("((\""), "");
    }
}
