//! Request, response and error bodies of the query entry point.

use serde::{Deserialize, Serialize};

use docqa_core::types::{Answer, Citation};
use docqa_core::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub question: String,
    /// Passages to retrieve; the configured default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub k: Option<i64>,
}

impl QueryRequest {
    pub fn new(question: impl Into<String>) -> Self {
        Self { question: question.into(), k: None }
    }

    /// Validated `(question, k)`.
    pub fn validate(&self, default_k: usize) -> Result<(&str, usize)> {
        let question = self.question.trim();
        if question.is_empty() {
            return Err(Error::InvalidInput("no question provided".into()));
        }
        let k = match self.k {
            None => default_k,
            Some(k) if k <= 0 => return Err(Error::InvalidInput(format!("k must be positive, got {k}"))),
            Some(k) => k as usize,
        };
        Ok((question, k))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub source_path: String,
    pub locator: String,
}

impl From<Citation> for SourceRef {
    fn from(c: Citation) -> Self {
        Self { source_path: c.source_path, locator: c.locator }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    pub sources: Vec<SourceRef>,
}

impl From<Answer> for QueryResponse {
    fn from(a: Answer) -> Self {
        Self { answer: a.text, sources: a.cited_sources.into_iter().map(SourceRef::from).collect() }
    }
}

/// Error body with an HTTP-style status and a stable category string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub status: u16,
    pub category: String,
    pub message: String,
}

impl ErrorPayload {
    pub fn retryable(&self) -> bool {
        self.status == 503
    }
}

impl From<&Error> for ErrorPayload {
    fn from(e: &Error) -> Self {
        let (status, category) = match e {
            Error::InvalidInput(_) => (400, "invalid_input"),
            Error::IndexNotBuilt(_) => (503, "engine_unavailable"),
            Error::EmbeddingUnavailable(_) => (503, "embedding_unavailable"),
            Error::GenerationUnavailable(_) => (503, "generation_unavailable"),
            _ => (500, "internal"),
        };
        Self { status, category: category.to_string(), message: e.to_string() }
    }
}

impl From<Error> for ErrorPayload {
    fn from(e: Error) -> Self {
        Self::from(&e)
    }
}
