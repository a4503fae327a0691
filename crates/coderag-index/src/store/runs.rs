use super::GraphStore;
use super::nodes::to_fts_query;
use crate::error::Result;
use crate::types::{IndexRun, RepoMapEntry, RunStatus};

type EntryRow = (
    String,
    String,
    Option<String>,
    Option<String>,
    Option<i64>,
    Option<i64>,
    f64,
    Option<String>,
);

const ENTRY_COLUMNS: &str = "e.kind, e.path, e.symbol_name, e.signature, e.start_line, e.end_line, \
                             e.importance, e.summary";

fn entry_from_row(row: EntryRow) -> Result<RepoMapEntry> {
    let (kind, path, symbol_name, signature, start_line, end_line, importance, summary) = row;
    #[allow(clippy::cast_possible_truncation)]
    let importance = importance as f32;
    Ok(RepoMapEntry {
        kind: kind.parse()?,
        path,
        symbol_name,
        signature,
        start_line: start_line.map(usize::try_from).transpose()?,
        end_line: end_line.map(usize::try_from).transpose()?,
        importance,
        summary,
    })
}

impl GraphStore {
    /// Record a new pending run and return its id.
    ///
    /// # Errors
    ///
    /// Returns an error if the insert fails.
    pub async fn create_index_run(&self, repo_root: &str, config_hash: &str) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            "INSERT INTO index_runs (repo_root, config_hash, created_at, status) \
             VALUES (?, ?, ?, 'pending') RETURNING id",
        )
        .bind(repo_root)
        .bind(config_hash)
        .bind(chrono::Utc::now().to_rfc3339())
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    /// # Errors
    ///
    /// Returns an error if the update fails.
    pub async fn complete_index_run(&self, run_id: i64, status: RunStatus) -> Result<()> {
        sqlx::query("UPDATE index_runs SET status = ? WHERE id = ?")
            .bind(status.as_str())
            .bind(run_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn latest_successful_run(&self, repo_root: &str) -> Result<Option<IndexRun>> {
        let row: Option<(i64, String, String, String, String)> = sqlx::query_as(
            "SELECT id, repo_root, config_hash, created_at, status FROM index_runs \
             WHERE repo_root = ? AND status = 'success' ORDER BY id DESC LIMIT 1",
        )
        .bind(repo_root)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|(id, repo_root, config_hash, created_at, status)| {
            Ok(IndexRun {
                id,
                repo_root,
                config_hash,
                created_at,
                status: status.parse()?,
            })
        })
        .transpose()
    }

    /// Persist a run's repo-map payload and its searchable entries, replacing any
    /// previous map for that run.
    ///
    /// # Errors
    ///
    /// Returns an error if any write fails; nothing is committed in that case.
    pub async fn store_repo_map(
        &self,
        run_id: i64,
        payload: &serde_json::Value,
        entries: &[RepoMapEntry],
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query(
            "INSERT INTO repo_maps (run_id, payload) VALUES (?, ?) \
             ON CONFLICT(run_id) DO UPDATE SET payload = excluded.payload",
        )
        .bind(run_id)
        .bind(serde_json::to_string(payload)?)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM repo_map_entries WHERE run_id = ?")
            .bind(run_id)
            .execute(&mut *tx)
            .await?;

        for entry in entries {
            sqlx::query(
                "INSERT INTO repo_map_entries \
                 (run_id, kind, path, symbol_name, signature, start_line, end_line, importance, summary) \
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(run_id)
            .bind(entry.kind.as_str())
            .bind(&entry.path)
            .bind(&entry.symbol_name)
            .bind(&entry.signature)
            .bind(entry.start_line.map(i64::try_from).transpose()?)
            .bind(entry.end_line.map(i64::try_from).transpose()?)
            .bind(f64::from(entry.importance))
            .bind(&entry.summary)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Payload of the most recent successful run for `repo_root`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or the stored payload is not valid JSON.
    pub async fn latest_repo_map(&self, repo_root: &str) -> Result<Option<serde_json::Value>> {
        let payload: Option<String> = sqlx::query_scalar(
            "SELECT m.payload FROM repo_maps m JOIN index_runs r ON r.id = m.run_id \
             WHERE r.repo_root = ? AND r.status = 'success' ORDER BY r.id DESC LIMIT 1",
        )
        .bind(repo_root)
        .fetch_optional(&self.pool)
        .await?;
        payload
            .map(|p| serde_json::from_str(&p).map_err(Into::into))
            .transpose()
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn repo_map_entries(&self, run_id: i64) -> Result<Vec<RepoMapEntry>> {
        let rows: Vec<EntryRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM repo_map_entries e WHERE e.run_id = ? ORDER BY e.id"
        ))
        .bind(run_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(entry_from_row).collect()
    }

    /// Full-text search over the entries of the latest successful run for `repo_root`.
    ///
    /// `text` is free text; it is turned into an OR-query of its terms.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn search_repo_map(&self, repo_root: &str, text: &str, limit: usize) -> Result<Vec<RepoMapEntry>> {
        let query = to_fts_query(text);
        if query.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let Some(run) = self.latest_successful_run(repo_root).await? else {
            return Ok(Vec::new());
        };
        let rows: Vec<EntryRow> = sqlx::query_as(&format!(
            "SELECT {ENTRY_COLUMNS} FROM repo_map_entries_fts \
             JOIN repo_map_entries e ON e.id = repo_map_entries_fts.rowid \
             WHERE repo_map_entries_fts MATCH ? AND e.run_id = ? \
             ORDER BY bm25(repo_map_entries_fts), e.importance DESC, e.id \
             LIMIT ?"
        ))
        .bind(query)
        .bind(run.id)
        .bind(i64::try_from(limit)?)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(entry_from_row).collect()
    }
}
