//! Query-side wiring. Clients are built once here and shared by reference;
//! dropping the engine releases them.

use std::sync::Arc;

use docqa_core::config::Settings;
use docqa_core::traits::{Embedder, Generator};
use docqa_core::types::Answer;
use docqa_core::{Error, Result};
use docqa_embed::get_default_embedder;
use docqa_index::{IndexInfo, VectorIndex};

use crate::answer::Answerer;
use crate::context::ContextAssembler;
use crate::generate::OllamaGenerator;
use crate::payload::{ErrorPayload, QueryRequest, QueryResponse};
use crate::retriever::Retriever;

pub struct QueryEngine {
    answerer: Answerer,
}

impl QueryEngine {
    /// Open the persisted index and build the configured providers.
    /// Fails with `IndexNotBuilt` before any ingestion has run.
    pub async fn open(settings: &Settings) -> Result<Self> {
        let embedder = get_default_embedder(&settings.embedding)?;
        let index = VectorIndex::open_existing(&settings.data.index_dir(), &settings.data.table, embedder.dim()).await?;
        if !index.embedder_id().is_empty() && index.embedder_id() != embedder.id() {
            return Err(Error::Configuration(format!(
                "index was built with embedder '{}' but queries would use '{}'; re-run ingestion",
                index.embedder_id(),
                embedder.id()
            )));
        }
        let generator = Arc::new(OllamaGenerator::new(&settings.generation)?);
        Ok(Self::with_parts(settings, embedder, Arc::new(index), generator))
    }

    pub fn with_parts(
        settings: &Settings,
        embedder: Arc<dyn Embedder>,
        index: Arc<VectorIndex>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let retriever = Retriever::new(embedder, index).with_default_k(settings.retrieval.k);
        let assembler = ContextAssembler::new(settings.context.max_chars);
        Self { answerer: Answerer::new(retriever, assembler, generator, settings.generation.timeout()) }
    }

    pub fn info(&self) -> IndexInfo {
        self.answerer.retriever().index().info()
    }

    pub async fn answer(&self, question: &str) -> Result<Answer> {
        self.answerer.answer(question).await
    }

    /// The query entry point: a validated request in, an answer or a
    /// categorised error out.
    pub async fn ask(&self, request: &QueryRequest) -> std::result::Result<QueryResponse, ErrorPayload> {
        let (question, k) = request.validate(self.answerer.retriever().default_k())?;
        match self.answerer.answer_with_k(question, k).await {
            Ok(answer) => Ok(answer.into()),
            Err(e) => {
                tracing::warn!("query failed: {}", e);
                Err(ErrorPayload::from(&e))
            }
        }
    }
}
