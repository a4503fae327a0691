#[cfg(feature = "mock")]
use crate::mock::MockProvider;
use crate::openai::OpenAiProvider;
use crate::provider::{GenerateRequest, LlmProvider};
use crate::simulated::SimulatedProvider;

/// Generates a match over all `AnyProvider` variants, binding the inner provider
/// and evaluating the given closure for each arm.
macro_rules! delegate_provider {
    ($self:expr, |$p:ident| $expr:expr) => {
        match $self {
            AnyProvider::OpenAi($p) => $expr,
            AnyProvider::Simulated($p) => $expr,
            #[cfg(feature = "mock")]
            AnyProvider::Mock($p) => $expr,
        }
    };
}

#[derive(Debug, Clone)]
pub enum AnyProvider {
    OpenAi(OpenAiProvider),
    Simulated(SimulatedProvider),
    #[cfg(feature = "mock")]
    Mock(MockProvider),
}

impl AnyProvider {
    #[must_use]
    pub fn is_simulated(&self) -> bool {
        matches!(self, Self::Simulated(_))
    }
}

impl LlmProvider for AnyProvider {
    async fn generate(&self, request: &GenerateRequest) -> Result<String, crate::LlmError> {
        delegate_provider!(self, |p| p.generate(request).await)
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, crate::LlmError> {
        delegate_provider!(self, |p| p.embed(texts).await)
    }

    fn supports_embeddings(&self) -> bool {
        delegate_provider!(self, |p| p.supports_embeddings())
    }

    fn supports_generation(&self) -> bool {
        delegate_provider!(self, |p| p.supports_generation())
    }

    fn embedding_model(&self) -> &str {
        delegate_provider!(self, |p| p.embedding_model())
    }

    fn name(&self) -> &str {
        delegate_provider!(self, |p| p.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn simulated_variant_delegates() {
        let p = AnyProvider::Simulated(SimulatedProvider::new(8));
        assert!(p.is_simulated());
        assert_eq!(p.name(), "simulated");
        assert!(p.supports_embeddings());
        assert!(!p.supports_generation());
        let v = p.embed(&["hello".into()]).await.unwrap();
        assert_eq!(v[0].len(), 8);
    }

    #[test]
    fn openai_variant_reports_its_name() {
        let inner = OpenAiProvider::new("k".into(), "http://x".into(), "m".into(), 1, None)
            .unwrap()
            .with_name("openrouter");
        let p = AnyProvider::OpenAi(inner);
        assert!(!p.is_simulated());
        assert_eq!(p.name(), "openrouter");
        assert!(p.supports_generation());
    }
}
