//! Bounded-concurrency batch embedding for ingestion.

use futures::stream::{self, StreamExt};
use std::ops::Range;

use docqa_core::traits::Embedder;
use docqa_core::{Error, Result};

/// Result of one batch: the input positions it covers and either one vector
/// per position or the error that exhausted the embedder's retries.
#[derive(Debug)]
pub struct BatchOutcome {
    pub range: Range<usize>,
    pub result: Result<Vec<Vec<f32>>>,
}

/// Embed `texts` in batches of `batch_size`, keeping at most `concurrency`
/// requests in flight. Outcomes come back in input order; a failed batch
/// does not stop the others.
pub async fn embed_all(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
    concurrency: usize,
) -> Vec<BatchOutcome> {
    let batch_size = batch_size.max(1);
    let ranges: Vec<Range<usize>> = (0..texts.len())
        .step_by(batch_size)
        .map(|start| start..(start + batch_size).min(texts.len()))
        .collect();
    tracing::debug!("embedding {} texts in {} batches", texts.len(), ranges.len());

    stream::iter(ranges)
        .map(|range| async move {
            let result = embed_checked(embedder, &texts[range.clone()]).await;
            if let Err(e) = &result {
                tracing::warn!("batch {:?} failed: {}", range, e);
            }
            BatchOutcome { range, result }
        })
        .buffered(concurrency.max(1))
        .collect()
        .await
}

async fn embed_checked(embedder: &dyn Embedder, texts: &[String]) -> Result<Vec<Vec<f32>>> {
    let vectors = embedder.embed_batch(texts).await?;
    if vectors.len() != texts.len() {
        return Err(Error::EmbeddingUnavailable(format!(
            "{} returned {} vectors for {} inputs",
            embedder.id(),
            vectors.len(),
            texts.len()
        )));
    }
    if let Some(v) = vectors.iter().find(|v| v.len() != embedder.dim()) {
        return Err(Error::Configuration(format!(
            "{} returned a {}-dimensional vector, expected {}",
            embedder.id(),
            v.len(),
            embedder.dim()
        )));
    }
    Ok(vectors)
}
