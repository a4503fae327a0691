use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use coderag_index::{IndexerConfig, RetrievalConfig};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub index: IndexConfig,
    pub retrieval: RetrievalConfig,
    pub llm: LlmConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    pub db_path: String,
    pub ann_path: String,
    #[serde(flatten)]
    pub indexer: IndexerConfig,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            db_path: ".coderag/index.db".into(),
            ann_path: ".coderag/vectors.bin".into(),
            indexer: IndexerConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    #[default]
    OpenAi,
    OpenRouter,
    Simulated,
}

impl std::str::FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(Self::OpenAi),
            "openrouter" => Ok(Self::OpenRouter),
            "simulated" => Ok(Self::Simulated),
            other => Err(format!("unknown provider: {other}")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_ms: 2_000,
            max_delay_ms: 60_000,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: ProviderKind,
    /// Overrides the provider's default endpoint.
    pub base_url: Option<String>,
    pub model: String,
    pub embedding_model: String,
    pub api_key: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: u32,
    pub prefer_json: bool,
    pub http_referer: Option<String>,
    pub app_title: Option<String>,
    pub retry: RetryConfig,
    /// Vector size of the simulated provider.
    pub embedding_dimensions: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::OpenAi,
            base_url: None,
            model: "gpt-4o-mini".into(),
            embedding_model: "text-embedding-3-small".into(),
            api_key: None,
            temperature: None,
            max_tokens: 1024,
            prefer_json: true,
            http_referer: None,
            app_title: Some("coderag".into()),
            retry: RetryConfig::default(),
            embedding_dimensions: 384,
        }
    }
}

impl LlmConfig {
    #[must_use]
    pub fn default_base_url(&self) -> &'static str {
        match self.provider {
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
            ProviderKind::OpenAi | ProviderKind::Simulated => "https://api.openai.com/v1",
        }
    }

    /// Non-empty API key, if any.
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref().filter(|k| !k.trim().is_empty())
    }
}

impl Config {
    /// Load configuration from a TOML file with env var overrides.
    ///
    /// Falls back to defaults when the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&content).context("failed to parse config file")?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    pub(crate) fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("CODERAG_DB_PATH") {
            self.index.db_path = v;
        }
        if let Ok(v) = std::env::var("CODERAG_ANN_PATH") {
            self.index.ann_path = v;
        }
        if let Ok(v) = std::env::var("CODERAG_REPO_ID") {
            self.index.indexer.repo_id = v;
        }
        if let Ok(v) = std::env::var("CODERAG_MAX_FILE_MB")
            && let Ok(mb) = v.parse::<f64>()
        {
            self.index.indexer.max_file_mb = mb;
        }
        if let Ok(v) = std::env::var("CODERAG_WORKERS")
            && let Ok(workers) = v.parse::<usize>()
        {
            self.index.indexer.workers = workers;
        }
        if let Ok(v) = std::env::var("CODERAG_RETRIEVAL_K")
            && let Ok(k) = v.parse::<usize>()
        {
            self.retrieval.k = k;
        }
        if let Ok(v) = std::env::var("CODERAG_MMR_LAMBDA")
            && let Ok(lambda) = v.parse::<f32>()
        {
            self.retrieval.mmr_lambda = lambda;
        }
        if let Ok(v) = std::env::var("CODERAG_LLM_PROVIDER") {
            match v.parse::<ProviderKind>() {
                Ok(kind) => self.llm.provider = kind,
                Err(e) => tracing::warn!("ignoring CODERAG_LLM_PROVIDER: {e}"),
            }
        }
        if let Ok(v) = std::env::var("CODERAG_LLM_MODEL") {
            self.llm.model = v;
        }
        if let Ok(v) = std::env::var("CODERAG_LLM_BASE_URL") {
            self.llm.base_url = Some(v);
        }
        if let Ok(v) = std::env::var("CODERAG_EMBEDDING_MODEL") {
            self.llm.embedding_model = v;
        }

        if let Ok(v) = std::env::var("CODERAG_API_KEY") {
            self.llm.api_key = Some(v);
        } else if self.llm.api_key().is_none() {
            let fallback = match self.llm.provider {
                ProviderKind::OpenAi => std::env::var("OPENAI_API_KEY").ok(),
                ProviderKind::OpenRouter => std::env::var("OPENROUTER_API_KEY").ok(),
                ProviderKind::Simulated => None,
            };
            if fallback.is_some() {
                self.llm.api_key = fallback;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use serial_test::serial;

    use super::*;

    const ENV_KEYS: [&str; 14] = [
        "CODERAG_DB_PATH",
        "CODERAG_ANN_PATH",
        "CODERAG_REPO_ID",
        "CODERAG_MAX_FILE_MB",
        "CODERAG_WORKERS",
        "CODERAG_RETRIEVAL_K",
        "CODERAG_MMR_LAMBDA",
        "CODERAG_LLM_PROVIDER",
        "CODERAG_LLM_MODEL",
        "CODERAG_LLM_BASE_URL",
        "CODERAG_EMBEDDING_MODEL",
        "CODERAG_API_KEY",
        "OPENAI_API_KEY",
        "OPENROUTER_API_KEY",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            unsafe { std::env::remove_var(key) };
        }
    }

    #[test]
    #[serial]
    fn defaults_when_file_missing() {
        clear_env();
        let config = Config::load(Path::new("/nonexistent/coderag.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.index.db_path, ".coderag/index.db");
        assert_eq!(config.index.indexer.workers, 4);
        assert_eq!(config.retrieval.k, 10);
        assert!((config.retrieval.rrf_k - 60.0).abs() < f64::EPSILON);
        assert_eq!(config.llm.provider, ProviderKind::OpenAi);
        assert!(config.llm.api_key().is_none());
    }

    #[test]
    #[serial]
    fn parses_all_sections() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[index]
db_path = "/tmp/x.db"
workers = 2
deny_globs = ["*.min.js"]
embed_batch_size = 16

[retrieval]
k = 5
mmr_lambda = 0.5
enable_llm_rerank = false

[llm]
provider = "openrouter"
model = "anthropic/claude-3.5-sonnet"
api_key = "sk-test"
http_referer = "https://example.com"

[llm.retry]
max_retries = 2
"#
        )
        .unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.index.db_path, "/tmp/x.db");
        assert_eq!(config.index.ann_path, ".coderag/vectors.bin");
        assert_eq!(config.index.indexer.workers, 2);
        assert_eq!(config.index.indexer.deny_globs, vec!["*.min.js"]);
        assert_eq!(config.index.indexer.embed_batch_size, 16);
        assert_eq!(config.retrieval.k, 5);
        assert!(!config.retrieval.enable_llm_rerank);
        assert!(config.retrieval.enable_expansion);
        assert_eq!(config.llm.provider, ProviderKind::OpenRouter);
        assert_eq!(config.llm.api_key(), Some("sk-test"));
        assert_eq!(config.llm.default_base_url(), "https://openrouter.ai/api/v1");
        assert_eq!(config.llm.retry.max_retries, 2);
        assert_eq!(config.llm.retry.base_delay_ms, 2_000);
    }

    #[test]
    #[serial]
    fn invalid_toml_is_an_error() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[index\nworkers = ").unwrap();
        assert!(Config::load(file.path()).is_err());
    }

    #[test]
    #[serial]
    fn env_overrides_win_over_file() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[index]\nworkers = 2\n[llm]\nmodel = \"from-file\"\n").unwrap();

        unsafe {
            std::env::set_var("CODERAG_WORKERS", "9");
            std::env::set_var("CODERAG_LLM_MODEL", "from-env");
            std::env::set_var("CODERAG_LLM_PROVIDER", "simulated");
            std::env::set_var("CODERAG_MMR_LAMBDA", "not-a-number");
            std::env::set_var("CODERAG_DB_PATH", "/data/db.sqlite");
        }
        let config = Config::load(file.path()).unwrap();
        clear_env();

        assert_eq!(config.index.indexer.workers, 9);
        assert_eq!(config.llm.model, "from-env");
        assert_eq!(config.llm.provider, ProviderKind::Simulated);
        assert!((config.retrieval.mmr_lambda - 0.7).abs() < f32::EPSILON);
        assert_eq!(config.index.db_path, "/data/db.sqlite");
    }

    #[test]
    #[serial]
    fn api_key_falls_back_to_provider_env() {
        clear_env();
        unsafe { std::env::set_var("OPENAI_API_KEY", "sk-openai") };
        let config = Config::load(Path::new("/nonexistent/coderag.toml")).unwrap();
        assert_eq!(config.llm.api_key(), Some("sk-openai"));

        unsafe {
            std::env::set_var("CODERAG_LLM_PROVIDER", "openrouter");
            std::env::set_var("OPENROUTER_API_KEY", "sk-router");
        }
        let config = Config::load(Path::new("/nonexistent/coderag.toml")).unwrap();
        assert_eq!(config.llm.api_key(), Some("sk-router"));

        unsafe { std::env::set_var("CODERAG_API_KEY", "sk-explicit") };
        let config = Config::load(Path::new("/nonexistent/coderag.toml")).unwrap();
        clear_env();
        assert_eq!(config.llm.api_key(), Some("sk-explicit"));
    }

    #[test]
    #[serial]
    fn invalid_provider_env_is_ignored() {
        clear_env();
        unsafe { std::env::set_var("CODERAG_LLM_PROVIDER", "bogus") };
        let config = Config::load(Path::new("/nonexistent/coderag.toml")).unwrap();
        clear_env();
        assert_eq!(config.llm.provider, ProviderKind::OpenAi);
    }
}
