//! The query-facing vector index.
//!
//! Entries live in an immutable `BTreeMap` snapshot behind an `Arc`. Readers
//! clone the `Arc` and scan without holding any lock; writers are serialized
//! by an async mutex, persist first, then publish a modified copy of the map.

use parking_lot::RwLock;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

use docqa_core::types::{ChunkId, IndexEntry};
use docqa_core::{Error, Result};

use crate::store::LanceStore;

type Snapshot = BTreeMap<ChunkId, IndexEntry>;

pub struct VectorIndex {
    snapshot: RwLock<Arc<Snapshot>>,
    /// Writer lock; `None` for an index that lives only in memory.
    writer: Mutex<Option<LanceStore>>,
    dim: usize,
    embedder_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexInfo {
    pub entries: usize,
    pub documents: usize,
    pub sources: usize,
    pub dimension: usize,
    pub embedder_id: String,
}

impl VectorIndex {
    pub fn in_memory(dim: usize, embedder_id: impl Into<String>) -> Self {
        Self::from_parts(Vec::new(), None, dim, embedder_id.into())
    }

    /// Open the persisted index in `dir`, creating it if absent. Used by
    /// ingestion.
    pub async fn open_or_create(dir: &Path, table: &str, dim: usize, embedder_id: &str) -> Result<Self> {
        let store = LanceStore::open_or_create(dir, table, dim, embedder_id).await?;
        let entries = store.load_all().await?;
        tracing::info!("opened index {} with {} entries", dir.display(), entries.len());
        Ok(Self::from_parts(entries, Some(store), dim, embedder_id.to_string()))
    }

    /// Open a persisted index for querying. A missing index is
    /// `Error::IndexNotBuilt`; a dimensionality mismatch is a configuration
    /// error.
    pub async fn open_existing(dir: &Path, table: &str, dim: usize) -> Result<Self> {
        let store = LanceStore::open_existing(dir, table, dim).await?;
        let embedder_id = store.embedder_id().await?.unwrap_or_default();
        let entries = store.load_all().await?;
        tracing::info!("loaded index {} with {} entries", dir.display(), entries.len());
        Ok(Self::from_parts(entries, Some(store), dim, embedder_id))
    }

    fn from_parts(entries: Vec<IndexEntry>, store: Option<LanceStore>, dim: usize, embedder_id: String) -> Self {
        let map: Snapshot = entries.into_iter().map(|e| (e.chunk_id.clone(), e)).collect();
        Self { snapshot: RwLock::new(Arc::new(map)), writer: Mutex::new(store), dim, embedder_id }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    /// Current consistent view; unaffected by writes that happen afterwards.
    pub fn snapshot(&self) -> Arc<BTreeMap<ChunkId, IndexEntry>> {
        Arc::clone(&*self.snapshot.read())
    }

    pub fn len(&self) -> usize {
        self.snapshot().len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot().is_empty()
    }

    pub fn info(&self) -> IndexInfo {
        let snap = self.snapshot();
        let documents: BTreeSet<&str> = snap.values().map(|e| e.document_id.as_str()).collect();
        let sources: BTreeSet<&str> = snap.values().map(|e| e.provenance.source_path.as_str()).collect();
        IndexInfo {
            entries: snap.len(),
            documents: documents.len(),
            sources: sources.len(),
            dimension: self.dim,
            embedder_id: self.embedder_id.clone(),
        }
    }

    /// `chunk_id -> content_hash` for every stored entry of `source_path`.
    pub fn content_hashes(&self, source_path: &str) -> HashMap<ChunkId, String> {
        self.snapshot()
            .values()
            .filter(|e| e.provenance.source_path == source_path)
            .map(|e| (e.chunk_id.clone(), e.content_hash.clone()))
            .collect()
    }

    /// Top-`k` entries by cosine similarity, ties broken by ascending
    /// `chunk_id`. An empty index yields an empty result.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<(IndexEntry, f32)>> {
        if vector.len() != self.dim {
            return Err(Error::InvalidInput(format!(
                "query vector has {} dimensions, index expects {}",
                vector.len(),
                self.dim
            )));
        }
        let snap = self.snapshot();
        if k == 0 || snap.is_empty() {
            return Ok(Vec::new());
        }
        let mut scored: Vec<(&IndexEntry, f32)> =
            snap.values().map(|e| (e, cosine_similarity(vector, &e.vector))).collect();
        // BTreeMap iteration is already chunk_id order, so a stable sort keeps ties deterministic
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));
        Ok(scored.into_iter().take(k).map(|(e, s)| (e.clone(), s)).collect())
    }

    /// Insert or replace entries by `chunk_id`. Returns the number written.
    pub async fn upsert(&self, entries: Vec<IndexEntry>) -> Result<usize> {
        for e in &entries {
            if e.vector.len() != self.dim {
                return Err(Error::InvalidInput(format!(
                    "entry {} has {} dimensions, index expects {}",
                    e.chunk_id,
                    e.vector.len(),
                    self.dim
                )));
            }
            if e.provenance.source_path.is_empty() {
                return Err(Error::InvalidInput(format!("entry {} has no source path", e.chunk_id)));
            }
        }
        // last write wins for duplicate ids inside one call
        let batch: BTreeMap<ChunkId, IndexEntry> = entries.into_iter().map(|e| (e.chunk_id.clone(), e)).collect();
        if batch.is_empty() {
            return Ok(0);
        }
        let writer = self.writer.lock().await;
        if let Some(store) = writer.as_ref() {
            let rows: Vec<IndexEntry> = batch.values().cloned().collect();
            store.upsert(&rows).await?;
        }
        let written = batch.len();
        self.publish(|map| map.extend(batch));
        tracing::debug!("upserted {} entries", written);
        Ok(written)
    }

    /// Remove every entry of one document. Returns the number removed.
    pub async fn delete(&self, document_id: &str) -> Result<usize> {
        let ids = self.ids_where(|e| e.document_id == document_id);
        self.delete_ids(&ids).await
    }

    /// Remove every entry that came from `source_path` (all its pages/sheets).
    pub async fn delete_source(&self, source_path: &str) -> Result<usize> {
        let ids = self.ids_where(|e| e.provenance.source_path == source_path);
        self.delete_ids(&ids).await
    }

    pub async fn delete_ids(&self, chunk_ids: &[ChunkId]) -> Result<usize> {
        if chunk_ids.is_empty() {
            return Ok(0);
        }
        let writer = self.writer.lock().await;
        if let Some(store) = writer.as_ref() {
            store.delete_ids(chunk_ids).await?;
        }
        let mut removed = 0;
        self.publish(|map| {
            for id in chunk_ids {
                if map.remove(id).is_some() {
                    removed += 1;
                }
            }
        });
        tracing::debug!("deleted {} entries", removed);
        Ok(removed)
    }

    fn ids_where(&self, pred: impl Fn(&IndexEntry) -> bool) -> Vec<ChunkId> {
        self.snapshot().values().filter(|e| pred(e)).map(|e| e.chunk_id.clone()).collect()
    }

    /// Copy the current map, apply `change`, swap it in. Callers hold the
    /// writer lock.
    fn publish(&self, change: impl FnOnce(&mut Snapshot)) {
        let mut next = (*self.snapshot()).clone();
        change(&mut next);
        *self.snapshot.write() = Arc::new(next);
    }
}

/// Cosine similarity; zero vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let (mut dot, mut na, mut nb) = (0f32, 0f32, 0f32);
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na.sqrt() * nb.sqrt())
}
