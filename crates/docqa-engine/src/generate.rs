//! HTTP generator for an Ollama-compatible `/api/generate` endpoint.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use docqa_core::config::GenerationSettings;
use docqa_core::retry::RetryPolicy;
use docqa_core::traits::Generator;
use docqa_core::{Error, Result};

pub struct OllamaGenerator {
    client: Client,
    url: String,
    model: String,
    temperature: f32,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

impl OllamaGenerator {
    pub fn new(settings: &GenerationSettings) -> Result<Self> {
        let client = Client::builder()
            .timeout(settings.timeout())
            .build()
            .map_err(|e| Error::Configuration(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            url: format!("{}/api/generate", settings.base_url.trim_end_matches('/')),
            model: settings.model.clone(),
            temperature: settings.temperature,
            retry: settings.retry_policy(),
        })
    }

    async fn request(&self, prompt: &str) -> Result<String> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature: self.temperature },
        };
        let response = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::GenerationUnavailable(format!("request to {} failed: {e}", self.url)))?;
        if !response.status().is_success() {
            return Err(Error::GenerationUnavailable(format!("HTTP {} from {}", response.status(), self.url)));
        }
        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| Error::GenerationUnavailable(format!("malformed generation response: {e}")))?;
        Ok(parsed.response)
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    fn name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str) -> Result<String> {
        self.retry.run("generation request", || self.request(prompt)).await
    }
}
