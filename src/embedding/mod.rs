//! Embedding generation for semantic retrieval.

mod openai;

pub use openai::OpenAIEmbedder;

use crate::error::RemoteError;
use async_trait::async_trait;

/// Trait for embedding generation.
///
/// Implementations make a single attempt per call; retrying is the
/// caller's job (see [`crate::retry::RetryPolicy`]).
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate one embedding per input text, in input order.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, RemoteError>;

    /// Generate an embedding for a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, RemoteError> {
        self.embed_batch(&[text.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| RemoteError::MalformedResponse("Empty embedding response".to_string()))
    }

    /// Get the embedding dimensions.
    fn dimensions(&self) -> usize;
}
