use std::sync::Arc;
use std::time::Duration;

use docqa_core::traits::Generator;
use docqa_core::types::Answer;
use docqa_core::{Error, Result};

use crate::context::ContextAssembler;
use crate::prompt::{build_prompt, REFUSAL};
use crate::retriever::Retriever;

/// Retrieval-augmented answering with an explicit refusal path.
pub struct Answerer {
    retriever: Retriever,
    assembler: ContextAssembler,
    generator: Arc<dyn Generator>,
    timeout: Duration,
}

impl Answerer {
    pub fn new(retriever: Retriever, assembler: ContextAssembler, generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        Self { retriever, assembler, generator, timeout }
    }

    pub fn retriever(&self) -> &Retriever {
        &self.retriever
    }

    pub async fn answer(&self, question: &str) -> Result<Answer> {
        self.answer_with_k(question, self.retriever.default_k()).await
    }

    /// Retrieve `k` passages and generate an answer grounded in them.
    ///
    /// No passages (retrieved or fitting the context budget) means no
    /// generation call: the refusal is returned directly.
    /// Citations list every passage placed in the context, in rank order.
    pub async fn answer_with_k(&self, question: &str, k: usize) -> Result<Answer> {
        let results = self.retriever.retrieve(question, k).await?;
        if results.is_empty() {
            tracing::info!("no passages retrieved; refusing without generation");
            return Ok(refusal());
        }
        let context = self.assembler.assemble(&results);
        if context.citations.is_empty() {
            tracing::warn!("context budget {} chars holds no passage; refusing", self.assembler.max_chars());
            return Ok(refusal());
        }
        let prompt = build_prompt(question.trim(), &context.text);

        let generated = tokio::time::timeout(self.timeout, self.generator.generate(&prompt))
            .await
            .map_err(|_| {
                Error::GenerationUnavailable(format!(
                    "{} did not answer within {:?}",
                    self.generator.name(),
                    self.timeout
                ))
            })??;

        let text = generated.trim();
        let text = if text.is_empty() { REFUSAL } else { text };
        let mut cited_sources = Vec::with_capacity(context.citations.len());
        for citation in context.citations {
            if !cited_sources.contains(&citation) {
                cited_sources.push(citation);
            }
        }
        Ok(Answer { text: text.to_string(), cited_sources })
    }
}

fn refusal() -> Answer {
    Answer { text: REFUSAL.to_string(), cited_sources: Vec::new() }
}
