//! Offline ingestion: load, chunk, embed, upsert.
//!
//! Per-file and per-batch failures are recorded in the report and never abort
//! the run. Chunks already stored with the same content hash are reused, so a
//! re-run only embeds what failed or changed.

use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use docqa_core::chunker::Chunker;
use docqa_core::config::Settings;
use docqa_core::loader::{DocumentLoader, FileFailure};
use docqa_core::traits::Embedder;
use docqa_core::types::{Chunk, ChunkId, Document, DocumentMetadata, IndexEntry};
use docqa_core::{Error, Result};
use docqa_embed::{embed_all, get_default_embedder};
use docqa_index::VectorIndex;

pub const REPORT_FILE: &str = "ingest_report.json";

#[derive(Debug, Clone, Serialize)]
pub struct ChunkFailure {
    pub chunk_id: ChunkId,
    pub source_path: String,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source_dir: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub files_loaded: usize,
    pub documents_loaded: usize,
    pub skipped: Vec<PathBuf>,
    pub file_failures: Vec<FileFailure>,
    pub chunks_created: usize,
    pub chunks_embedded: usize,
    pub chunks_reused: usize,
    pub chunks_removed: usize,
    pub chunk_failures: Vec<ChunkFailure>,
}

impl IngestReport {
    /// True when any file or chunk failed; the CLI exits nonzero.
    pub fn has_failures(&self) -> bool {
        !self.file_failures.is_empty() || !self.chunk_failures.is_empty()
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).map_err(|e| Error::storage(format!("report: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// A chunk waiting for its vector.
struct Pending {
    chunk: Chunk,
    metadata: DocumentMetadata,
    content_hash: String,
}

pub struct Ingestor {
    loader: DocumentLoader,
    chunker: Chunker,
    embedder: Arc<dyn Embedder>,
    index: Arc<VectorIndex>,
    batch_size: usize,
    concurrency: usize,
    progress: bool,
}

impl Ingestor {
    pub fn new(chunker: Chunker, embedder: Arc<dyn Embedder>, index: Arc<VectorIndex>) -> Self {
        Self {
            loader: DocumentLoader::new(),
            chunker,
            embedder,
            index,
            batch_size: 32,
            concurrency: 4,
            progress: false,
        }
    }

    /// Build the embedder and open (or create) the persisted index.
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = get_default_embedder(&settings.embedding)?;
        let index = VectorIndex::open_or_create(
            &settings.data.index_dir(),
            &settings.data.table,
            embedder.dim(),
            embedder.id(),
        )
        .await?;
        Ok(Self::new(Chunker::from_settings(&settings.chunking)?, embedder, Arc::new(index))
            .with_batching(settings.embedding.batch_size, settings.embedding.concurrency))
    }

    pub fn with_batching(mut self, batch_size: usize, concurrency: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.progress = show;
        self
    }

    pub fn index(&self) -> &Arc<VectorIndex> {
        &self.index
    }

    pub async fn ingest_dir(&self, source_dir: &Path) -> Result<IngestReport> {
        let started_at = Utc::now();
        let loaded = self.loader.load_dir(source_dir)?;
        let mut report = IngestReport {
            source_dir: source_dir.to_path_buf(),
            started_at,
            finished_at: started_at,
            files_loaded: loaded.files_loaded,
            documents_loaded: loaded.documents.len(),
            skipped: loaded.skipped,
            file_failures: loaded.failures,
            chunks_created: 0,
            chunks_embedded: 0,
            chunks_reused: 0,
            chunks_removed: 0,
            chunk_failures: Vec::new(),
        };

        // stored hashes only prove freshness for vectors from the same model
        let same_model = self.index.embedder_id() == self.embedder.id();
        if !same_model {
            tracing::warn!(
                "index holds vectors from '{}', embedding with '{}'; re-embedding every chunk",
                self.index.embedder_id(),
                self.embedder.id()
            );
        }

        let mut pending = Vec::new();
        for (source_path, documents) in group_by_source(loaded.documents) {
            let chunks: Vec<(Chunk, &DocumentMetadata)> = documents
                .iter()
                .flat_map(|doc| self.chunker.split(doc).into_iter().map(move |c| (c, &doc.metadata)))
                .collect();
            report.chunks_created += chunks.len();

            let stored = self.index.content_hashes(&source_path);
            let fresh: HashSet<&str> = chunks.iter().map(|(c, _)| c.id.as_str()).collect();
            let stale: Vec<ChunkId> = stored.keys().filter(|id| !fresh.contains(id.as_str())).cloned().collect();
            if !stale.is_empty() {
                report.chunks_removed += self.index.delete_ids(&stale).await?;
            }

            for (chunk, metadata) in chunks {
                let content_hash = blake3::hash(chunk.text.as_bytes()).to_hex().to_string();
                if same_model && stored.get(&chunk.id) == Some(&content_hash) {
                    report.chunks_reused += 1;
                    continue;
                }
                pending.push(Pending { chunk, metadata: metadata.clone(), content_hash });
            }
        }
        tracing::info!(
            "{} chunks created, {} reused, {} to embed",
            report.chunks_created,
            report.chunks_reused,
            pending.len()
        );

        self.embed_and_store(pending, &mut report).await?;
        report.finished_at = Utc::now();
        tracing::info!(
            "ingestion finished: {} embedded, {} failed, {} removed",
            report.chunks_embedded,
            report.chunk_failures.len(),
            report.chunks_removed
        );
        Ok(report)
    }

    /// Embed pending chunks window by window and upsert each window's
    /// successes right away, so an interrupted run keeps its progress.
    async fn embed_and_store(&self, pending: Vec<Pending>, report: &mut IngestReport) -> Result<()> {
        let pb = self.progress_bar(pending.len());
        let window = self.batch_size * self.concurrency;
        for group in pending.chunks(window) {
            let texts: Vec<String> = group.iter().map(|p| p.chunk.text.clone()).collect();
            let outcomes = embed_all(self.embedder.as_ref(), &texts, self.batch_size, self.concurrency).await;
            let mut entries = Vec::with_capacity(group.len());
            for outcome in outcomes {
                let items = &group[outcome.range.clone()];
                match outcome.result {
                    Ok(vectors) => {
                        for (p, vector) in items.iter().zip(vectors) {
                            entries.push(IndexEntry::new(&p.chunk, &p.metadata, p.content_hash.clone(), vector));
                        }
                    }
                    Err(e @ Error::Configuration(_)) => return Err(e),
                    Err(e) => {
                        let reason = e.to_string();
                        report.chunk_failures.extend(items.iter().map(|p| ChunkFailure {
                            chunk_id: p.chunk.id.clone(),
                            source_path: p.metadata.source_path.clone(),
                            reason: reason.clone(),
                        }));
                    }
                }
                pb.inc(items.len() as u64);
            }
            report.chunks_embedded += self.index.upsert(entries).await?;
        }
        pb.finish_and_clear();
        Ok(())
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new(len as u64);
        if let Ok(style) = ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}",
        ) {
            pb.set_style(style.progress_chars("#>-"));
        }
        pb
    }
}

fn group_by_source(documents: Vec<Document>) -> BTreeMap<String, Vec<Document>> {
    let mut by_source: BTreeMap<String, Vec<Document>> = BTreeMap::new();
    for doc in documents {
        by_source.entry(doc.source_path.clone()).or_default().push(doc);
    }
    by_source
}
