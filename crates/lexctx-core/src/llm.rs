//! Language-model seam used by query expansion and context compression.

use anyhow::Result;
use async_trait::async_trait;

/// Single-turn text completion.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Model identifier, for logging.
    fn model_name(&self) -> &str;

    /// Complete `prompt` and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
