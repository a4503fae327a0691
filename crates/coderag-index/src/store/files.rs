use std::collections::HashMap;

use sqlx::SqliteConnection;

use super::GraphStore;
use crate::error::Result;

pub(super) async fn write_file_hash(conn: &mut SqliteConnection, filepath: &str, content_hash: &str) -> Result<()> {
    sqlx::query(
        "INSERT INTO file_hashes (filepath, content_hash, last_indexed_at) VALUES (?, ?, ?) \
         ON CONFLICT(filepath) DO UPDATE SET content_hash = excluded.content_hash, \
         last_indexed_at = excluded.last_indexed_at",
    )
    .bind(filepath)
    .bind(content_hash)
    .bind(chrono::Utc::now().to_rfc3339())
    .execute(&mut *conn)
    .await?;
    Ok(())
}

impl GraphStore {
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_file_hash(&self, filepath: &str) -> Result<Option<String>> {
        let hash: Option<String> =
            sqlx::query_scalar("SELECT content_hash FROM file_hashes WHERE filepath = ?")
                .bind(filepath)
                .fetch_optional(&self.pool)
                .await?;
        Ok(hash)
    }

    /// Map of repo-relative path to the content hash recorded at its last index.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn all_file_hashes(&self) -> Result<HashMap<String, String>> {
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT filepath, content_hash FROM file_hashes")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows.into_iter().collect())
    }

    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub async fn set_file_hash(&self, filepath: &str, content_hash: &str) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        write_file_hash(&mut conn, filepath, content_hash).await
    }

    /// # Errors
    ///
    /// Returns an error if the delete fails.
    pub async fn delete_file_hash(&self, filepath: &str) -> Result<()> {
        sqlx::query("DELETE FROM file_hashes WHERE filepath = ?")
            .bind(filepath)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
