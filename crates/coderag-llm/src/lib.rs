//! Text generation and embedding providers.

pub mod any;
pub mod error;
pub mod http;
pub mod json;
#[cfg(feature = "mock")]
pub mod mock;
pub mod openai;
pub mod provider;
pub mod retry;
pub mod simulated;

pub use any::AnyProvider;
pub use error::LlmError;
pub use provider::{GenerateRequest, LlmProvider};
pub use retry::RetryPolicy;
