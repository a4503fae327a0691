//! Offline provider used when no credentials are configured.

use crate::error::LlmError;
use crate::provider::{GenerateRequest, LlmProvider};

pub const SIMULATED_RESPONSE: &str = "Simulated LLM response (no provider credentials configured)";
pub const DEFAULT_DIMENSIONS: usize = 384;

/// Deterministic hashed bag-of-words embedding, L2-normalized.
///
/// Texts sharing tokens get positive cosine similarity, so dense search stays
/// meaningful without a real model. Text without tokens maps to the zero vector.
#[must_use]
pub fn hashed_embedding(text: &str, dimensions: usize) -> Vec<f32> {
    let mut v = vec![0.0f32; dimensions.max(1)];
    let len = v.len() as u64;
    for token in text
        .split(|c: char| !c.is_alphanumeric() && c != '_')
        .filter(|t| !t.is_empty())
    {
        let hash = blake3::hash(token.to_lowercase().as_bytes());
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        let bucket = usize::try_from(u64::from_le_bytes(bytes) % len).unwrap_or(0);
        v[bucket] += 1.0;
    }
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

#[derive(Debug, Clone)]
pub struct SimulatedProvider {
    dimensions: usize,
    model: String,
}

impl Default for SimulatedProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

impl SimulatedProvider {
    #[must_use]
    pub fn new(dimensions: usize) -> Self {
        Self {
            dimensions: dimensions.max(1),
            model: format!("simulated-{}", dimensions.max(1)),
        }
    }
}

impl LlmProvider for SimulatedProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, LlmError> {
        if request.json_mode {
            Ok(serde_json::json!({ "response": SIMULATED_RESPONSE }).to_string())
        } else {
            Ok(SIMULATED_RESPONSE.to_owned())
        }
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(texts
            .iter()
            .map(|t| hashed_embedding(t, self.dimensions))
            .collect())
    }

    fn supports_embeddings(&self) -> bool {
        true
    }

    fn supports_generation(&self) -> bool {
        false
    }

    fn embedding_model(&self) -> &str {
        &self.model
    }

    #[allow(clippy::unnecessary_literal_bound)]
    fn name(&self) -> &str {
        "simulated"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn embedding_is_deterministic_and_normalized() {
        let a = hashed_embedding("fn parse_config(path)", 64);
        let b = hashed_embedding("fn parse_config(path)", 64);
        assert_eq!(a, b);
        assert!((dot(&a, &a) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn shared_tokens_are_closer() {
        let q = hashed_embedding("parse config", 256);
        let near = hashed_embedding("def parse config file", 256);
        let far = hashed_embedding("render button widget", 256);
        assert!(dot(&q, &near) > dot(&q, &far));
    }

    #[test]
    fn empty_text_is_zero_vector() {
        assert!(hashed_embedding("  ...  ", 8).iter().all(|x| *x == 0.0));
    }

    #[tokio::test]
    async fn json_mode_returns_valid_json() {
        let p = SimulatedProvider::default();
        let out = p.generate(&GenerateRequest::new("x").json()).await.unwrap();
        let v: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(v["response"], SIMULATED_RESPONSE);
        assert!(!p.supports_generation());
    }

    #[tokio::test]
    async fn embed_keeps_order_and_dimension() {
        let p = SimulatedProvider::new(16);
        let out = p.embed(&["a".into(), "b".into()]).await.unwrap();
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|v| v.len() == 16));
        assert_eq!(out[0], hashed_embedding("a", 16));
        assert_eq!(p.embedding_model(), "simulated-16");
    }
}
