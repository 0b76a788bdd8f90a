//! Domain types shared by the loader, chunker, index and answerer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

pub type DocumentId = String;
pub type ChunkId = String;

/// Source formats the loader understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Markdown,
    Pdf,
    Docx,
    Spreadsheet,
}

impl DocumentFormat {
    /// Detect the format from a file extension (case-insensitive).
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" => Some(Self::Text),
            "md" | "markdown" => Some(Self::Markdown),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" | "xls" | "xlsm" | "ods" => Some(Self::Spreadsheet),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Markdown => "markdown",
            Self::Pdf => "pdf",
            Self::Docx => "docx",
            Self::Spreadsheet => "spreadsheet",
        }
    }
}

/// Provenance attached to a document at load time.
///
/// `page` is 1-based and only set for paginated formats; `sheet` only for
/// spreadsheets.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source_path: String,
    pub page: Option<u32>,
    pub sheet: Option<String>,
    pub title: Option<String>,
}

/// Raw text of one loadable unit of a source file (a whole file, a PDF page,
/// or a spreadsheet sheet).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    pub id: DocumentId,
    pub source_path: String,
    pub format: DocumentFormat,
    pub raw_text: String,
    pub metadata: DocumentMetadata,
}

impl Document {
    pub fn new(format: DocumentFormat, raw_text: String, metadata: DocumentMetadata) -> Self {
        let id = document_id(&metadata);
        Self { id, source_path: metadata.source_path.clone(), format, raw_text, metadata }
    }
}

/// Stable identity of a document: its source path, qualified by page or sheet
/// when a file yields more than one document.
pub fn document_id(metadata: &DocumentMetadata) -> DocumentId {
    match (&metadata.page, &metadata.sheet) {
        (Some(page), _) => format!("{}#page={}", metadata.source_path, page),
        (None, Some(sheet)) => format!("{}#sheet={}", metadata.source_path, sheet),
        (None, None) => metadata.source_path.clone(),
    }
}

/// A bounded contiguous slice of a document. Offsets are character (not byte)
/// positions into `Document::raw_text`, end exclusive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub document_id: DocumentId,
    pub sequence_index: usize,
    pub text: String,
    pub char_offset_start: usize,
    pub char_offset_end: usize,
}

impl Chunk {
    pub fn char_len(&self) -> usize {
        self.char_offset_end - self.char_offset_start
    }
}

pub fn chunk_id(document_id: &str, sequence_index: usize) -> ChunkId {
    format!("{document_id}:{sequence_index}")
}

/// The vector computed for one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub chunk_id: ChunkId,
    pub vector: Vec<f32>,
}

/// Where a stored chunk came from; everything a citation needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkProvenance {
    pub source_path: String,
    pub page: Option<u32>,
    pub sheet: Option<String>,
    pub char_offset_start: usize,
    pub char_offset_end: usize,
}

impl ChunkProvenance {
    pub fn new(chunk: &Chunk, metadata: &DocumentMetadata) -> Self {
        Self {
            source_path: metadata.source_path.clone(),
            page: metadata.page,
            sheet: metadata.sheet.clone(),
            char_offset_start: chunk.char_offset_start,
            char_offset_end: chunk.char_offset_end,
        }
    }

    /// Human-readable position inside the source file.
    pub fn locator(&self) -> String {
        match (&self.page, &self.sheet) {
            (Some(page), _) => format!("page {page}"),
            (None, Some(sheet)) => format!("sheet {sheet}"),
            (None, None) => format!("chars {}-{}", self.char_offset_start, self.char_offset_end),
        }
    }

    pub fn citation(&self) -> Citation {
        Citation { source_path: self.source_path.clone(), locator: self.locator() }
    }
}

/// The persisted unit of the vector index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub chunk_id: ChunkId,
    pub document_id: DocumentId,
    pub sequence_index: usize,
    pub text: String,
    /// Hash of `text`; lets a re-run skip chunks that are already embedded.
    pub content_hash: String,
    pub vector: Vec<f32>,
    pub provenance: ChunkProvenance,
}

impl IndexEntry {
    pub fn new(chunk: &Chunk, metadata: &DocumentMetadata, content_hash: String, vector: Vec<f32>) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            document_id: chunk.document_id.clone(),
            sequence_index: chunk.sequence_index,
            text: chunk.text.clone(),
            content_hash,
            vector,
            provenance: ChunkProvenance::new(chunk, metadata),
        }
    }

    /// Rebuild the chunk this entry was created from.
    pub fn chunk(&self) -> Chunk {
        Chunk {
            id: self.chunk_id.clone(),
            document_id: self.document_id.clone(),
            sequence_index: self.sequence_index,
            text: self.text.clone(),
            char_offset_start: self.provenance.char_offset_start,
            char_offset_end: self.provenance.char_offset_end,
        }
    }
}

/// One ranked hit for a query. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub chunk: Chunk,
    pub provenance: ChunkProvenance,
    pub similarity_score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    pub source_path: String,
    pub locator: String,
}

impl fmt::Display for Citation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.source_path, self.locator)
    }
}

/// A generated (or refused) answer with the sources that were put in context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Answer {
    pub text: String,
    pub cited_sources: Vec<Citation>,
}
