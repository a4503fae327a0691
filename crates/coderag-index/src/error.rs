#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("LLM error: {0}")]
    Llm(#[from] coderag_llm::LlmError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("parse failed: {0}")]
    Parse(String),

    #[error("unsupported language")]
    UnsupportedLanguage,

    #[error("ANN index error: {0}")]
    Ann(String),

    #[error("embedding dimension mismatch for {model}: expected {expected}, got {actual}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },

    #[error("operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("integer conversion: {0}")]
    IntConversion(#[from] std::num::TryFromIntError),

    #[error("{0}")]
    Other(String),
}

impl IndexError {
    /// Store and migration faults abort an indexing run; everything else degrades locally.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Sqlite(_) | Self::Migration(_))
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
