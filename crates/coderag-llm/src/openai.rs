use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::json::{coerce_json, error_sentinel};
use crate::provider::{GenerateRequest, LlmProvider};
use crate::retry::{RetryPolicy, error_for_status, with_retry};

const DEFAULT_EMBED_BATCH: usize = 64;

/// Provider for any OpenAI-compatible chat + embeddings endpoint (OpenAI, OpenRouter, ...).
#[derive(Clone)]
pub struct OpenAiProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: Option<f32>,
    embedding_model: Option<String>,
    prefer_json: bool,
    embed_batch_size: usize,
    extra_headers: Vec<(String, String)>,
    provider_name: String,
    retry: RetryPolicy,
}

impl fmt::Debug for OpenAiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiProvider")
            .field("client", &"<reqwest::Client>")
            .field("api_key", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("temperature", &self.temperature)
            .field("embedding_model", &self.embedding_model)
            .field("prefer_json", &self.prefer_json)
            .field("provider_name", &self.provider_name)
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

impl OpenAiProvider {
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be constructed.
    pub fn new(
        api_key: String,
        mut base_url: String,
        model: String,
        max_tokens: u32,
        embedding_model: Option<String>,
    ) -> Result<Self, LlmError> {
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Ok(Self {
            client: crate::http::default_client()?,
            api_key,
            base_url,
            model,
            max_tokens,
            temperature: None,
            embedding_model,
            prefer_json: true,
            embed_batch_size: DEFAULT_EMBED_BATCH,
            extra_headers: Vec::new(),
            provider_name: "openai".into(),
            retry: RetryPolicy::default(),
        })
    }

    #[must_use]
    pub fn with_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Temperature for requests that do not set one.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    #[must_use]
    pub fn with_prefer_json(mut self, prefer_json: bool) -> Self {
        self.prefer_json = prefer_json;
        self
    }

    #[must_use]
    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.max(1);
        self
    }

    /// Attach a header sent with every request (e.g. OpenRouter's `HTTP-Referer`).
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_headers.push((name.into(), value.into()));
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.provider_name = name.into();
        self
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(format!("{}/{path}", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        for (name, value) in &self.extra_headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    async fn send_chat(&self, request: &GenerateRequest, native_json: bool) -> Result<String, LlmError> {
        let mut messages = Vec::with_capacity(2);
        let system = match (&request.system_prompt, request.json_mode && !native_json) {
            (Some(system), true) => Some(format!("{system}\n\nRespond with a single JSON object only.")),
            (Some(system), false) => Some(system.clone()),
            (None, true) => Some("Respond with a single JSON object only.".to_owned()),
            (None, false) => None,
        };
        if let Some(system) = system.as_deref() {
            messages.push(ApiMessage {
                role: "system",
                content: system,
            });
        }
        messages.push(ApiMessage {
            role: "user",
            content: &request.prompt,
        });

        let body = ChatRequest {
            model: &self.model,
            messages,
            max_tokens: request.max_tokens.unwrap_or(self.max_tokens),
            temperature: request.temperature.or(self.temperature),
            response_format: native_json.then_some(ResponseFormat {
                r#type: "json_object",
            }),
        };

        let body = &body;
        with_retry(&self.provider_name, &self.retry, || async move {
            let response = self.post("chat/completions").json(body).send().await?;
            let response = error_for_status(response).await?;
            let resp: ChatResponse = response.json().await?;
            resp.choices
                .into_iter()
                .next()
                .and_then(|c| c.message.content)
                .filter(|c| !c.is_empty())
                .ok_or_else(|| LlmError::EmptyResponse {
                    provider: self.provider_name.clone(),
                })
        })
        .await
    }

    async fn generate_json(&self, request: &GenerateRequest) -> String {
        if self.prefer_json {
            match self.send_chat(request, true).await {
                Ok(text) => return coerce_json(&text),
                Err(LlmError::BadRequest { status, .. }) => {
                    tracing::debug!(
                        provider = %self.provider_name,
                        status,
                        "structured JSON mode rejected, falling back to prompt-only JSON"
                    );
                }
                Err(e) => {
                    tracing::warn!(provider = %self.provider_name, error = %e, "JSON generation failed");
                    return error_sentinel(&e.to_string());
                }
            }
        }
        match self.send_chat(request, false).await {
            Ok(text) => coerce_json(&text),
            Err(e) => {
                tracing::warn!(provider = %self.provider_name, error = %e, "JSON generation failed");
                error_sentinel(&e.to_string())
            }
        }
    }

    async fn embed_chunk(&self, model: &str, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let body = &EmbeddingRequest { input: texts, model };
        let mut data = with_retry(&self.provider_name, &self.retry, || async move {
            let response = self.post("embeddings").json(body).send().await?;
            let response = error_for_status(response).await?;
            let resp: EmbeddingResponse = response.json().await?;
            Ok(resp.data)
        })
        .await?;

        if data.len() != texts.len() {
            return Err(LlmError::Other(format!(
                "{} returned {} embeddings for {} inputs",
                self.provider_name,
                data.len(),
                texts.len()
            )));
        }
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

impl LlmProvider for OpenAiProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        if request.json_mode {
            return Ok(self.generate_json(request).await);
        }
        self.send_chat(request, false).await
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        let model = self
            .embedding_model
            .as_deref()
            .ok_or_else(|| LlmError::EmbedUnsupported {
                provider: self.provider_name.clone(),
            })?;

        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.embed_batch_size) {
            out.extend(self.embed_chunk(model, chunk).await?);
        }
        Ok(out)
    }

    fn supports_embeddings(&self) -> bool {
        self.embedding_model.is_some()
    }

    fn embedding_model(&self) -> &str {
        self.embedding_model.as_deref().unwrap_or_default()
    }

    fn name(&self) -> &str {
        &self.provider_name
    }
}

#[derive(Serialize)]
struct ApiMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ApiMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat<'a>>,
}

#[derive(Serialize)]
struct ResponseFormat<'a> {
    r#type: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    input: &'a [String],
    model: &'a str,
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}
