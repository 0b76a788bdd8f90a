//! HTTP embedder for an Ollama-compatible `/api/embed` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use docqa_core::config::EmbeddingSettings;
use docqa_core::retry::RetryPolicy;
use docqa_core::traits::Embedder;
use docqa_core::{Error, Result};

pub struct OllamaEmbedder {
    client: Client,
    url: String,
    model: String,
    dim: usize,
    id: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .pool_max_idle_per_host(settings.concurrency)
            .build()
            .map_err(|e| Error::Configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/api/embed", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            dim: settings.dimension,
            id: format!("ollama:{}:d{}", settings.model, settings.dimension),
            retry: settings.retry_policy(),
        })
    }

    async fn request(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let response = self
            .client
            .post(&self.url)
            .json(&EmbedRequest { model: &self.model, input: texts })
            .send()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("request to {} failed: {e}", self.url)))?;
        if !response.status().is_success() {
            return Err(Error::EmbeddingUnavailable(format!("HTTP {} from {}", response.status(), self.url)));
        }
        let body: EmbedResponse = response
            .json()
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("malformed embedding response: {e}")))?;
        Ok(body.embeddings)
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn id(&self) -> &str {
        &self.id
    }

    fn dim(&self) -> usize {
        self.dim
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let vectors = self.retry.run("embedding request", || self.request(texts)).await?;
        if vectors.len() != texts.len() {
            return Err(Error::EmbeddingUnavailable(format!(
                "expected {} embeddings, service returned {}",
                texts.len(),
                vectors.len()
            )));
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != self.dim) {
            return Err(Error::Configuration(format!(
                "model {} produces {}-dimensional vectors but embedding.dimension is {}",
                self.model,
                bad.len(),
                self.dim
            )));
        }
        Ok(vectors)
    }
}
