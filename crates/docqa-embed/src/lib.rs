//! Embedder implementations and the batch driver used by ingestion.

mod device;
pub mod batch;
pub mod fake;
pub mod local;
pub mod ollama;
mod pool;
mod tokenize;

use std::sync::Arc;

use docqa_core::config::{EmbeddingProvider, EmbeddingSettings};
use docqa_core::traits::Embedder;
use docqa_core::Result;

pub use batch::{embed_all, BatchOutcome};
pub use fake::HashEmbedder;
pub use local::LocalEmbedder;
pub use ollama::OllamaEmbedder;
pub use pool::masked_mean_l2;

/// Build the embedder selected by configuration.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` overrides the configured provider with the
/// hashing embedder so tests and offline runs never touch a model.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    if use_fake || settings.provider == EmbeddingProvider::Fake {
        tracing::info!("using hashing embedder (dim {})", settings.dimension);
        return Ok(Arc::new(HashEmbedder::new(settings.dimension)));
    }
    match settings.provider {
        EmbeddingProvider::Ollama => {
            tracing::info!("using ollama embedder {} at {}", settings.model, settings.base_url);
            Ok(Arc::new(OllamaEmbedder::new(settings)?))
        }
        EmbeddingProvider::Local => Ok(Arc::new(LocalEmbedder::new(settings)?)),
        EmbeddingProvider::Fake => Ok(Arc::new(HashEmbedder::new(settings.dimension))),
    }
}
