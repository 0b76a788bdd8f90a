use std::sync::Arc;

use docqa_core::traits::Embedder;
use docqa_core::types::RetrievalResult;
use docqa_core::{Error, Result};
use docqa_index::VectorIndex;

pub const DEFAULT_K: usize = 3;

/// Embeds a question and looks up its nearest passages. Read-only.
pub struct Retriever {
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    default_k: usize,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self { embedder, index, default_k: DEFAULT_K }
    }

    pub fn with_default_k(mut self, k: usize) -> Self {
        self.default_k = k;
        self
    }

    pub fn default_k(&self) -> usize {
        self.default_k
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    /// Top-`k` passages for `question`, best first. `k` must be positive.
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievalResult>> {
        if k == 0 {
            return Err(Error::InvalidInput("k must be greater than 0".into()));
        }
        let question = question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("question must not be empty".into()));
        }
        if self.index.is_empty() {
            return Ok(Vec::new());
        }
        let vector = self.embedder.embed(question).await?;
        let hits = self.index.query(&vector, k)?;
        tracing::debug!("retrieved {} passages for k={}", hits.len(), k);
        Ok(hits
            .into_iter()
            .map(|(entry, score)| RetrievalResult {
                chunk: entry.chunk(),
                provenance: entry.provenance,
                similarity_score: score,
            })
            .collect())
    }
}
