use async_trait::async_trait;

use crate::error::VerseResult;

/// Trait for embedding generation providers
///
/// Implementations can use different embedding APIs (OpenAI, local models).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Name of the provider, for logs
    fn name(&self) -> &'static str;

    /// Generate an embedding for a single text
    async fn embed(&self, text: &str) -> VerseResult<Vec<f32>>;
}
