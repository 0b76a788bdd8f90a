//! Bounded context assembly.
//!
//! Passages are rendered in rank order. When the block would exceed the
//! character budget, the lowest-ranked passages are dropped first; if even the
//! top passage alone is too long, its text is truncated to fit.

use docqa_core::types::{Citation, RetrievalResult};

#[derive(Debug, Clone, Copy)]
pub struct ContextAssembler {
    max_chars: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledContext {
    pub text: String,
    /// Citations of the passages that made it into `text`, in rank order.
    pub citations: Vec<Citation>,
    pub dropped: usize,
    pub truncated: bool,
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    pub fn max_chars(&self) -> usize {
        self.max_chars
    }

    pub fn assemble(&self, results: &[RetrievalResult]) -> AssembledContext {
        let mut text = String::new();
        let mut used = 0usize;
        let mut citations = Vec::new();
        let mut truncated = false;

        for (rank, result) in results.iter().enumerate() {
            let citation = result.provenance.citation();
            let separator = if rank == 0 { "" } else { "\n\n" };
            let header = format!("{separator}[{}] Source: {}\n", rank + 1, citation);
            let header_len = header.chars().count();
            let body_len = result.chunk.text.chars().count();

            if used + header_len + body_len <= self.max_chars {
                text.push_str(&header);
                text.push_str(&result.chunk.text);
                used += header_len + body_len;
                citations.push(citation);
                continue;
            }
            if rank == 0 && header_len < self.max_chars {
                let room = self.max_chars - header_len;
                text.push_str(&header);
                text.extend(result.chunk.text.chars().take(room));
                citations.push(citation);
                truncated = true;
            }
            break;
        }

        let dropped = results.len() - citations.len();
        if dropped > 0 {
            tracing::debug!("context budget {} chars: dropped {} lowest-ranked passages", self.max_chars, dropped);
        }
        AssembledContext { text, citations, dropped, truncated }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docqa_core::types::{Chunk, ChunkProvenance};

    fn result(id: &str, text: &str, score: f32) -> RetrievalResult {
        RetrievalResult {
            chunk: Chunk {
                id: format!("{id}:0"),
                document_id: id.into(),
                sequence_index: 0,
                text: text.into(),
                char_offset_start: 0,
                char_offset_end: text.chars().count(),
            },
            provenance: ChunkProvenance {
                source_path: id.into(),
                page: None,
                sheet: None,
                char_offset_start: 0,
                char_offset_end: text.chars().count(),
            },
            similarity_score: score,
        }
    }

    #[test]
    fn keeps_everything_that_fits() {
        let ctx = ContextAssembler::new(1000).assemble(&[result("a.txt", "alpha", 0.9), result("b.txt", "bravo", 0.8)]);
        assert_eq!(ctx.text, "[1] Source: a.txt, chars 0-5\nalpha\n\n[2] Source: b.txt, chars 0-5\nbravo");
        assert_eq!(ctx.citations.len(), 2);
        assert_eq!(ctx.dropped, 0);
        assert!(!ctx.truncated);
    }

    #[test]
    fn drops_lowest_ranked_first() {
        let big = "x".repeat(100);
        let results = [result("a.txt", &big, 0.9), result("b.txt", &big, 0.8), result("c.txt", "tiny", 0.7)];
        let ctx = ContextAssembler::new(280).assemble(&results);
        assert_eq!(ctx.citations.iter().map(|c| c.source_path.as_str()).collect::<Vec<_>>(), vec!["a.txt", "b.txt"]);
        assert_eq!(ctx.dropped, 1);
        assert!(ctx.text.chars().count() <= 280);
    }

    #[test]
    fn truncates_single_oversized_passage() {
        let ctx = ContextAssembler::new(60).assemble(&[result("a.txt", &"é".repeat(500), 0.9)]);
        assert!(ctx.truncated);
        assert_eq!(ctx.text.chars().count(), 60);
        assert_eq!(ctx.citations.len(), 1);
    }
}
