use async_trait::async_trait;

use crate::error::{Error, Result};

/// Maps text to fixed-length vectors.
///
/// Implementations must return exactly one vector per input, in input order,
/// each of length `dim()`. Service or network failures are reported as
/// `Error::EmbeddingUnavailable`.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `ollama:nomic-embed-text:d768`).
    fn id(&self) -> &str;
    /// Embedding dimensionality.
    fn dim(&self) -> usize;

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text.to_string()])
            .await?
            .pop()
            .ok_or_else(|| Error::EmbeddingUnavailable(format!("{} returned no vector", self.id())))
    }
}

/// Produces text from a fully assembled prompt.
///
/// Failures are reported as `Error::GenerationUnavailable`.
#[async_trait]
pub trait Generator: Send + Sync {
    fn name(&self) -> &str;
    async fn generate(&self, prompt: &str) -> Result<String>;
}
