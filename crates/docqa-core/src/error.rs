use std::path::PathBuf;
use thiserror::Error;

/// Failure kinds shared by every docqa crate.
///
/// An empty corpus is not represented here: queries against an empty index
/// return an empty result and the answerer turns that into a refusal.
#[derive(Debug, Error)]
pub enum Error {
    /// A single source file could not be read or parsed. Never fatal for a batch.
    #[error("failed to load {path}: {reason}")]
    LoadFailure { path: PathBuf, reason: String },

    #[error("unsupported file format: {0}")]
    UnsupportedFormat(PathBuf),

    #[error("embedding service unavailable: {0}")]
    EmbeddingUnavailable(String),

    #[error("generation service unavailable: {0}")]
    GenerationUnavailable(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("index has not been built at {0}")]
    IndexNotBuilt(PathBuf),

    #[error("storage error: {0}")]
    Storage(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn load(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        Self::LoadFailure { path: path.into(), reason: reason.to_string() }
    }

    pub fn storage(reason: impl ToString) -> Self {
        Self::Storage(reason.to_string())
    }

    /// Transient upstream failures the caller may retry.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::EmbeddingUnavailable(_) | Self::GenerationUnavailable(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
