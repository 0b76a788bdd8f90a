//! Vector index: in-memory snapshot with exact cosine ranking, persisted to
//! LanceDB.

pub mod index;
pub mod schema;
pub mod store;
pub mod table;

pub use index::{cosine_similarity, IndexInfo, VectorIndex};
