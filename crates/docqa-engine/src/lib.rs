//! docqa-engine
//!
//! Offline ingestion (load, chunk, embed, index) and the online query path
//! (retrieve, assemble context, generate a grounded answer).

pub mod answer;
pub mod context;
pub mod engine;
pub mod generate;
pub mod ingest;
pub mod payload;
pub mod prompt;
pub mod retriever;

pub use answer::Answerer;
pub use context::{AssembledContext, ContextAssembler};
pub use engine::QueryEngine;
pub use generate::OllamaGenerator;
pub use ingest::{IngestReport, Ingestor};
pub use payload::{ErrorPayload, QueryRequest, QueryResponse, SourceRef};
pub use prompt::{build_prompt, REFUSAL};
pub use retriever::Retriever;
