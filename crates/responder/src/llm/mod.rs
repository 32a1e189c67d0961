//! Language model clients.

pub mod gemini;

use async_trait::async_trait;

use crate::error::ModelError;

pub use gemini::{GeminiClient, GeminiConfig};

/// A model that turns a prompt into text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Name of the model, for logs.
    fn name(&self) -> &str;

    /// Whether credentials are present. Unconfigured models are never called.
    fn is_configured(&self) -> bool;

    /// Generate a completion for `prompt`.
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}
