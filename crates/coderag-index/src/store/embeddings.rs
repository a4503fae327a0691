use sqlx::SqliteConnection;

use super::GraphStore;
use crate::error::{IndexError, Result};

fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

fn decode_vector(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}

async fn model_dim(conn: &mut SqliteConnection, model: &str) -> Result<Option<usize>> {
    let dim: Option<i64> = sqlx::query_scalar("SELECT dim FROM embeddings WHERE model = ? LIMIT 1")
        .bind(model)
        .fetch_optional(&mut *conn)
        .await?;
    dim.map(usize::try_from).transpose().map_err(Into::into)
}

async fn write_embedding(conn: &mut SqliteConnection, node_id: &str, model: &str, vector: &[f32]) -> Result<()> {
    sqlx::query(
        "INSERT INTO embeddings (node_id, model, dim, vector) VALUES (?, ?, ?, ?) \
         ON CONFLICT(node_id, model) DO UPDATE SET dim = excluded.dim, vector = excluded.vector, \
         created_at = datetime('now')",
    )
    .bind(node_id)
    .bind(model)
    .bind(i64::try_from(vector.len())?)
    .bind(encode_vector(vector))
    .execute(&mut *conn)
    .await?;
    Ok(())
}

fn check_dim(model: &str, expected: Option<usize>, actual: usize) -> Result<()> {
    match expected {
        Some(expected) if expected != actual => Err(IndexError::DimensionMismatch {
            model: model.to_owned(),
            expected,
            actual,
        }),
        _ => Ok(()),
    }
}

impl GraphStore {
    /// Store the vector for `(node_id, model)`, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if the model already has vectors of a
    /// different length, or a store error if the write fails.
    pub async fn upsert_embedding(&self, node_id: &str, model: &str, vector: &[f32]) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        check_dim(model, model_dim(&mut tx, model).await?, vector.len())?;
        write_embedding(&mut tx, node_id, model, vector).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Store many vectors for one model in a single transaction.
    ///
    /// # Errors
    ///
    /// Returns [`IndexError::DimensionMismatch`] if the batch disagrees with itself or with
    /// stored vectors; nothing is committed in that case.
    pub async fn batch_upsert_embeddings(&self, model: &str, items: &[(String, Vec<f32>)]) -> Result<()> {
        let Some((_, first)) = items.first() else {
            return Ok(());
        };
        let mut tx = self.pool.begin().await?;
        let expected = model_dim(&mut tx, model).await?.unwrap_or(first.len());
        for (node_id, vector) in items {
            check_dim(model, Some(expected), vector.len())?;
            write_embedding(&mut tx, node_id, model, vector).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn get_embedding(&self, node_id: &str, model: &str) -> Result<Option<Vec<f32>>> {
        let blob: Option<Vec<u8>> =
            sqlx::query_scalar("SELECT vector FROM embeddings WHERE node_id = ? AND model = ?")
                .bind(node_id)
                .bind(model)
                .fetch_optional(&self.pool)
                .await?;
        Ok(blob.as_deref().map(decode_vector))
    }

    /// Every `(node_id, vector)` pair persisted for `model`, ordered by node id.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn all_embeddings(&self, model: &str) -> Result<Vec<(String, Vec<f32>)>> {
        let rows: Vec<(String, Vec<u8>)> = sqlx::query_as(
            "SELECT e.node_id, e.vector FROM embeddings e JOIN nodes n ON n.id = e.node_id \
             WHERE e.model = ? ORDER BY e.node_id",
        )
        .bind(model)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, blob)| (id, decode_vector(&blob)))
            .collect())
    }

    /// Ids of nodes that have no vector for `model`, in stable order.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn nodes_missing_embedding(&self, model: &str) -> Result<Vec<String>> {
        let ids: Vec<String> = sqlx::query_scalar(
            "SELECT n.id FROM nodes n \
             WHERE NOT EXISTS (SELECT 1 FROM embeddings e WHERE e.node_id = n.id AND e.model = ?) \
             ORDER BY n.filepath, n.start_line, n.id",
        )
        .bind(model)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    /// # Errors
    ///
    /// Returns an error if the query fails.
    pub async fn embedding_count(&self, model: &str) -> Result<usize> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM embeddings WHERE model = ?")
            .bind(model)
            .fetch_one(&self.pool)
            .await?;
        Ok(usize::try_from(n)?)
    }
}
