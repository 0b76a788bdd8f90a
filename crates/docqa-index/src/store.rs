//! Durable side of the index: one LanceDB chunk table plus its meta table.

use arrow_array::cast::AsArray;
use arrow_array::types::Float32Type;
use arrow_array::{Array, FixedSizeListArray, Int32Array, Int64Array, RecordBatch, RecordBatchIterator, StringArray};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, Table};
use std::path::Path;
use std::sync::Arc;

use docqa_core::types::{ChunkProvenance, IndexEntry};
use docqa_core::{Error, Result};

use crate::schema::{build_chunk_schema, vector_dim};
use crate::table::{ensure_table, escape, get_meta, open_db, set_meta, storage, table_exists};

pub const META_DIMENSION: &str = "dimension";
pub const META_EMBEDDER: &str = "embedder_id";

/// Keeps delete predicates to a manageable size.
const DELETE_BATCH: usize = 256;

pub struct LanceStore {
    conn: Connection,
    table: Table,
    meta_table: String,
    dim: usize,
}

impl LanceStore {
    /// Open the store, creating the tables and recording `dim`/`embedder_id`
    /// when the index does not exist yet.
    pub async fn open_or_create(dir: &Path, table: &str, dim: usize, embedder_id: &str) -> Result<Self> {
        std::fs::create_dir_all(dir)?;
        let conn = open_db(&dir.to_string_lossy()).await?;
        let meta_table = format!("{table}_meta");
        if !table_exists(&conn, table).await? {
            tracing::info!("creating index table '{}' (dim {}) in {}", table, dim, dir.display());
            ensure_table(&conn, table, build_chunk_schema(dim)).await?;
            set_meta(&conn, &meta_table, META_DIMENSION, &dim.to_string()).await?;
            set_meta(&conn, &meta_table, META_EMBEDDER, embedder_id).await?;
        }
        let store = Self::open_table(conn, table, meta_table, dim).await?;
        store.claim_for(embedder_id).await?;
        Ok(store)
    }

    /// Open an index that must already exist.
    pub async fn open_existing(dir: &Path, table: &str, dim: usize) -> Result<Self> {
        if !dir.is_dir() {
            return Err(Error::IndexNotBuilt(dir.to_path_buf()));
        }
        let conn = open_db(&dir.to_string_lossy()).await?;
        if !table_exists(&conn, table).await? {
            return Err(Error::IndexNotBuilt(dir.to_path_buf()));
        }
        Self::open_table(conn, table, format!("{table}_meta"), dim).await
    }

    async fn open_table(conn: Connection, table: &str, meta_table: String, dim: usize) -> Result<Self> {
        let t = conn.open_table(table).execute().await.map_err(storage)?;
        let schema = t.schema().await.map_err(storage)?;
        let stored = match get_meta(&conn, &meta_table, META_DIMENSION).await? {
            Some(v) => v.parse::<usize>().ok(),
            None => vector_dim(&schema),
        };
        match stored {
            Some(stored) if stored == dim => {}
            Some(stored) => {
                return Err(Error::Configuration(format!(
                    "index '{table}' stores {stored}-dimensional vectors but the embedder produces {dim}; \
                     rebuild the index or switch back to the original embedding model"
                )))
            }
            None => return Err(Error::storage(format!("index '{table}' does not record its dimensionality"))),
        }
        Ok(Self { conn, table: t, meta_table, dim })
    }

    /// Vectors from another model are not comparable even at the same
    /// dimensionality: drop them and record the new embedder so every chunk
    /// is embedded again.
    async fn claim_for(&self, embedder_id: &str) -> Result<()> {
        match self.embedder_id().await? {
            Some(stored) if stored == embedder_id => return Ok(()),
            Some(stored) => {
                tracing::warn!(
                    "index was built with embedder '{}', now using '{}'; discarding stored vectors",
                    stored,
                    embedder_id
                );
                self.clear().await?;
            }
            None => {}
        }
        set_meta(&self.conn, &self.meta_table, META_EMBEDDER, embedder_id).await
    }

    /// Remove every stored chunk; the meta table is kept.
    pub async fn clear(&self) -> Result<()> {
        self.table.delete("chunk_id IS NOT NULL").await.map_err(storage)?;
        Ok(())
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub async fn embedder_id(&self) -> Result<Option<String>> {
        get_meta(&self.conn, &self.meta_table, META_EMBEDDER).await
    }

    /// Read every stored entry.
    pub async fn load_all(&self) -> Result<Vec<IndexEntry>> {
        let rows = self.table.count_rows(None).await.map_err(storage)?;
        if rows == 0 {
            return Ok(Vec::new());
        }
        let mut stream = self.table.query().limit(rows).execute().await.map_err(storage)?;
        let mut entries = Vec::with_capacity(rows);
        while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await.map_err(storage)? {
            entries.extend(batch_to_entries(&batch)?);
        }
        Ok(entries)
    }

    /// Insert or replace entries keyed by `chunk_id`.
    pub async fn upsert(&self, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let rb = entries_to_batch(entries, self.dim)?;
        let schema = rb.schema();
        let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
        let mut mi = self.table.merge_insert(&["chunk_id"]);
        mi.when_matched_update_all(None).when_not_matched_insert_all();
        let _ = mi.execute(reader).await.map_err(storage)?;
        Ok(())
    }

    pub async fn delete_ids(&self, chunk_ids: &[String]) -> Result<()> {
        for group in chunk_ids.chunks(DELETE_BATCH) {
            let list = group.iter().map(|id| format!("'{}'", escape(id))).collect::<Vec<_>>().join(",");
            self.table.delete(&format!("chunk_id IN ({list})")).await.map_err(storage)?;
        }
        Ok(())
    }
}

fn entries_to_batch(entries: &[IndexEntry], dim: usize) -> Result<RecordBatch> {
    let vectors = entries.iter().map(|e| Some(e.vector.iter().copied().map(Some).collect::<Vec<_>>()));
    RecordBatch::try_new(
        build_chunk_schema(dim),
        vec![
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.chunk_id.as_str()))),
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.document_id.as_str()))),
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.provenance.source_path.as_str()))),
            Arc::new(Int32Array::from(entries.iter().map(|e| e.provenance.page.map(|p| p as i32)).collect::<Vec<_>>())),
            Arc::new(StringArray::from(entries.iter().map(|e| e.provenance.sheet.clone()).collect::<Vec<_>>())),
            Arc::new(Int32Array::from(entries.iter().map(|e| e.sequence_index as i32).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(entries.iter().map(|e| e.provenance.char_offset_start as i64).collect::<Vec<_>>())),
            Arc::new(Int64Array::from(entries.iter().map(|e| e.provenance.char_offset_end as i64).collect::<Vec<_>>())),
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.text.as_str()))),
            Arc::new(StringArray::from_iter_values(entries.iter().map(|e| e.content_hash.as_str()))),
            Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim as i32)),
        ],
    )
    .map_err(storage)
}

fn batch_to_entries(batch: &RecordBatch) -> Result<Vec<IndexEntry>> {
    let chunk_ids = string_col(batch, "chunk_id")?;
    let document_ids = string_col(batch, "document_id")?;
    let sources = string_col(batch, "source_path")?;
    let sheets = string_col(batch, "sheet")?;
    let texts = string_col(batch, "text")?;
    let hashes = string_col(batch, "content_hash")?;
    let pages = typed_col::<Int32Array>(batch, "page")?;
    let seqs = typed_col::<Int32Array>(batch, "sequence_index")?;
    let starts = typed_col::<Int64Array>(batch, "char_start")?;
    let ends = typed_col::<Int64Array>(batch, "char_end")?;
    let vectors = typed_col::<FixedSizeListArray>(batch, "vector")?;

    let mut out = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        if vectors.is_null(i) {
            tracing::warn!("skipping stored chunk {} without a vector", chunk_ids.value(i));
            continue;
        }
        let vector = vectors.value(i).as_primitive::<Float32Type>().values().to_vec();
        out.push(IndexEntry {
            chunk_id: chunk_ids.value(i).to_string(),
            document_id: document_ids.value(i).to_string(),
            sequence_index: seqs.value(i) as usize,
            text: texts.value(i).to_string(),
            content_hash: hashes.value(i).to_string(),
            vector,
            provenance: ChunkProvenance {
                source_path: sources.value(i).to_string(),
                page: (!pages.is_null(i)).then(|| pages.value(i) as u32),
                sheet: (!sheets.is_null(i)).then(|| sheets.value(i).to_string()),
                char_offset_start: starts.value(i) as usize,
                char_offset_end: ends.value(i) as usize,
            },
        });
    }
    Ok(out)
}

fn string_col<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
    typed_col::<StringArray>(batch, name)
}

fn typed_col<'a, A: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a A> {
    batch
        .column_by_name(name)
        .and_then(|c| c.as_any().downcast_ref::<A>())
        .ok_or_else(|| Error::storage(format!("column '{name}' missing or mistyped")))
}
