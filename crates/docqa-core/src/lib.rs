//! docqa-core
//!
//! Domain types, capability traits, error taxonomy, configuration, and the
//! ingestion front half (document loading and chunking).

pub mod chunker;
pub mod config;
pub mod error;
pub mod loader;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
