use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;

/// A single text-generation call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system_prompt: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    /// When set, the returned text is guaranteed to be syntactically valid JSON.
    pub json_mode: bool,
}

impl GenerateRequest {
    #[must_use]
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn system(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }

    #[must_use]
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    #[must_use]
    pub fn json(mut self) -> Self {
        self.json_mode = true;
        self
    }
}

pub trait LlmProvider: Send + Sync {
    /// Generate text for a request.
    ///
    /// In JSON mode implementations return valid JSON even when the upstream model does not,
    /// and fall back to an error sentinel object instead of failing.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider fails to communicate or the response is invalid
    /// (text mode only).
    fn generate(
        &self,
        request: &GenerateRequest,
    ) -> impl Future<Output = Result<String, LlmError>> + Send;

    /// Embed a batch of texts, one vector per input, in input order.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider does not support embeddings or the request fails.
    fn embed(&self, texts: &[String])
    -> impl Future<Output = Result<Vec<Vec<f32>>, LlmError>> + Send;

    /// Whether this provider supports embedding generation.
    fn supports_embeddings(&self) -> bool;

    /// Whether generated text carries meaning. Simulated providers return `false`
    /// so callers can skip generation-backed stages.
    fn supports_generation(&self) -> bool {
        true
    }

    /// Model identifier used as the embedding key in persisted stores.
    fn embedding_model(&self) -> &str;

    /// Provider name for logging and identification.
    fn name(&self) -> &str;
}
