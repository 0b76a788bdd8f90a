//! In-process XLM-RoBERTa (BGE family) embedder on candle.

use async_trait::async_trait;
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::xlm_roberta::{Config as XLMRobertaConfig, XLMRobertaModel};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokenizers::Tokenizer;

use docqa_core::config::{expand_path, EmbeddingSettings};
use docqa_core::traits::Embedder;
use docqa_core::{Error, Result};

use crate::device::select_device;
use crate::pool::masked_mean_l2;
use crate::tokenize::{model_err, tokenize_batch};

const MAX_TOKENS: usize = 256;

struct Model {
    model: XLMRobertaModel,
    tokenizer: Tokenizer,
    device: Device,
}

pub struct LocalEmbedder {
    inner: Arc<Model>,
    dim: usize,
    id: String,
}

impl LocalEmbedder {
    /// Load tokenizer, config and weights from `embedding.model_dir`
    /// (or `APP_MODEL_DIR`).
    pub fn new(settings: &EmbeddingSettings) -> Result<Self> {
        let model_dir = resolve_model_dir(settings)?;
        tracing::info!("loading local embedding model from {}", model_dir.display());
        let device = select_device();

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path).map_err(|e| {
            Error::Configuration(format!("failed to load tokenizer from {}: {e}", tokenizer_path.display()))
        })?;
        let config_path = model_dir.join("config.json");
        let config: XLMRobertaConfig = serde_json::from_str(&std::fs::read_to_string(&config_path)?)
            .map_err(|e| Error::Configuration(format!("invalid model config {}: {e}", config_path.display())))?;
        if config.hidden_size != settings.dimension {
            return Err(Error::Configuration(format!(
                "local model produces {}-dimensional vectors but embedding.dimension is {}",
                config.hidden_size, settings.dimension
            )));
        }

        let weights_path = model_dir.join("pytorch_model.bin");
        let weights: HashMap<String, Tensor> = candle_core::pickle::read_all(&weights_path)
            .map_err(|e| Error::Configuration(format!("failed to read weights {}: {e}", weights_path.display())))?
            .into_iter()
            .collect();
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = XLMRobertaModel::new(&config, vb)
            .map_err(|e| Error::Configuration(format!("failed to build model: {e}")))?;
        tracing::info!("local embedding model ready");

        Ok(Self {
            inner: Arc::new(Model { model, tokenizer, device }),
            dim: settings.dimension,
            id: format!("local:{}:d{}", settings.model, settings.dimension),
        })
    }
}

impl Model {
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize_batch(&self.tokenizer, texts, MAX_TOKENS, &self.device)?;
        let token_type_ids = input_ids.zeros_like().map_err(model_err)?;
        let hidden = self
            .model
            .forward(&input_ids, &attention_mask, &token_type_ids, None, None, None)
            .map_err(model_err)?;
        let pooled = masked_mean_l2(&hidden, &attention_mask).map_err(model_err)?;
        pooled.to_device(&Device::Cpu).and_then(|t| t.to_vec2::<f32>()).map_err(model_err)
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
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
        let model = Arc::clone(&self.inner);
        let texts = texts.to_vec();
        tokio::task::spawn_blocking(move || model.embed(&texts))
            .await
            .map_err(|e| Error::EmbeddingUnavailable(format!("embedding task failed: {e}")))?
    }
}

fn resolve_model_dir(settings: &EmbeddingSettings) -> Result<PathBuf> {
    let candidates = settings
        .model_dir
        .clone()
        .into_iter()
        .chain(std::env::var("APP_MODEL_DIR").ok());
    for dir in candidates {
        let p = expand_path(&dir);
        if p.exists() {
            return Ok(p);
        }
        tracing::warn!("model directory {} does not exist", p.display());
    }
    Err(Error::Configuration("embedding.provider = local requires embedding.model_dir".into()))
}
