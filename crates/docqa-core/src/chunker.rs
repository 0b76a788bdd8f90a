//! Overlapping, boundary-aware character chunking.
//!
//! A chunk ends at the latest natural boundary inside its window, trying in
//! order: blank line, line break, sentence end, whitespace. Only when none
//! exists in the back half of the window is the text cut hard at `max_size`.
//! The next chunk starts `overlap` characters before the previous end.

use crate::config::ChunkingSettings;
use crate::error::{Error, Result};
use crate::types::{chunk_id, Chunk, Document};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    max_size: usize,
    overlap: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Boundary {
    Paragraph,
    Line,
    Sentence,
    Word,
}

const BOUNDARY_PRIORITY: [Boundary; 4] = [Boundary::Paragraph, Boundary::Line, Boundary::Sentence, Boundary::Word];

impl Boundary {
    /// Whether a chunk may end right before `chars[end]`.
    fn matches(self, chars: &[char], end: usize) -> bool {
        let prev = chars[end - 1];
        match self {
            Self::Paragraph => end >= 2 && prev == '\n' && chars[end - 2] == '\n',
            Self::Line => prev == '\n',
            Self::Sentence => end >= 2 && prev.is_whitespace() && matches!(chars[end - 2], '.' | '!' | '?'),
            Self::Word => prev.is_whitespace(),
        }
    }
}

impl Chunker {
    pub fn new(max_size: usize, overlap: usize) -> Result<Self> {
        if max_size == 0 {
            return Err(Error::InvalidInput("max_size must be greater than 0".into()));
        }
        if overlap >= max_size {
            return Err(Error::InvalidInput(format!(
                "overlap ({overlap}) must be smaller than max_size ({max_size})"
            )));
        }
        Ok(Self { max_size, overlap })
    }

    pub fn from_settings(settings: &ChunkingSettings) -> Result<Self> {
        Self::new(settings.max_size, settings.overlap)
    }

    pub fn max_size(&self) -> usize {
        self.max_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split a document into ordered chunks. Blank documents yield none.
    pub fn split(&self, document: &Document) -> Vec<Chunk> {
        let text = document.raw_text.as_str();
        if text.trim().is_empty() {
            return Vec::new();
        }
        let chars: Vec<char> = text.chars().collect();
        // byte offset of every char position, plus the end of the string
        let byte_at: Vec<usize> = text.char_indices().map(|(b, _)| b).chain(std::iter::once(text.len())).collect();
        let total = chars.len();

        let mut chunks = Vec::new();
        let mut start = 0usize;
        loop {
            let end = if total - start <= self.max_size { total } else { self.find_end(&chars, start) };
            let sequence_index = chunks.len();
            chunks.push(Chunk {
                id: chunk_id(&document.id, sequence_index),
                document_id: document.id.clone(),
                sequence_index,
                text: text[byte_at[start]..byte_at[end]].to_string(),
                char_offset_start: start,
                char_offset_end: end,
            });
            if end == total {
                break;
            }
            start = end - self.overlap;
        }
        chunks
    }

    /// Pick the end of a chunk starting at `start` when the rest does not fit.
    fn find_end(&self, chars: &[char], start: usize) -> usize {
        let window_end = start + self.max_size;
        // never below overlap + 1, so every step advances
        let min_end = start + (self.max_size / 2).max(self.overlap + 1);
        for boundary in BOUNDARY_PRIORITY {
            if let Some(end) = (min_end..=window_end).rev().find(|&end| boundary.matches(chars, end)) {
                return end;
            }
        }
        window_end
    }
}

/// Convenience wrapper: validate parameters and split in one call.
pub fn split(document: &Document, max_size: usize, overlap: usize) -> Result<Vec<Chunk>> {
    Ok(Chunker::new(max_size, overlap)?.split(document))
}
