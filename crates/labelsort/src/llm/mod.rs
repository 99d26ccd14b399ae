//! Language-model access for the similarity classifier.

pub mod error;
pub mod ollama;

pub use error::LlmError;
pub use ollama::OllamaClient;

use async_trait::async_trait;

pub type LlmResult<T> = Result<T, LlmError>;

/// A text-completion backend.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Sends `prompt` to `model` and returns the raw response text.
    async fn generate(&self, prompt: &str, model: &str) -> LlmResult<String>;
}
