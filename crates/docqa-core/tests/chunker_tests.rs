use docqa_core::chunker::{split, Chunker};
use docqa_core::types::{Document, DocumentFormat, DocumentMetadata};

fn doc(text: &str) -> Document {
    let meta = DocumentMetadata { source_path: "corpus/notes.txt".into(), ..Default::default() };
    Document::new(DocumentFormat::Text, text.to_string(), meta)
}

fn prose(sentences: usize) -> String {
    (0..sentences)
        .map(|i| format!("Sentence number {i} talks about soil moisture and irrigation."))
        .collect::<Vec<_>>()
        .join(" ")
}

#[test]
fn unbroken_text_is_cut_hard_at_max_size() {
    let text = "x".repeat(2500);
    let chunks = split(&doc(&text), 1000, 200).unwrap();
    let spans: Vec<(usize, usize)> = chunks.iter().map(|c| (c.char_offset_start, c.char_offset_end)).collect();
    assert_eq!(spans, vec![(0, 1000), (800, 1800), (1600, 2500)]);
    assert_eq!(chunks[2].sequence_index, 2);
    assert_eq!(chunks[1].id, "corpus/notes.txt:1");
}

#[test]
fn short_document_is_one_chunk_and_blank_is_none() {
    let chunks = split(&doc("Short text"), 1000, 200).unwrap();
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].text, "Short text");
    assert_eq!((chunks[0].char_offset_start, chunks[0].char_offset_end), (0, 10));

    assert!(split(&doc(""), 1000, 200).unwrap().is_empty());
    assert!(split(&doc("  \n\n\t "), 1000, 200).unwrap().is_empty());
}

#[test]
fn splitting_is_deterministic() {
    let d = doc(&prose(120));
    let chunker = Chunker::new(300, 50).unwrap();
    assert_eq!(chunker.split(&d), chunker.split(&d));
}

#[test]
fn chunks_respect_size_and_overlap() {
    let text = prose(200);
    let d = doc(&text);
    let chunks = split(&d, 400, 80).unwrap();
    assert!(chunks.len() > 1);
    for c in &chunks {
        assert!(c.char_len() <= 400, "chunk {} is {} chars", c.id, c.char_len());
        assert_eq!(c.text.chars().count(), c.char_len());
    }
    for pair in chunks.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        assert_eq!(next.char_offset_start, prev.char_offset_end - 80);
        let tail: String = prev.text.chars().skip(prev.char_len() - 80).collect();
        assert!(next.text.starts_with(&tail));
    }
    assert_eq!(chunks.last().unwrap().char_offset_end, text.chars().count());
}

#[test]
fn prefers_paragraph_break_over_hard_cut() {
    let text = format!("{}\n\n{}", "a".repeat(600), "b".repeat(600));
    let chunks = split(&doc(&text), 1000, 100).unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].char_offset_end, 602);
    assert!(chunks[0].text.ends_with("\n\n"));
    assert_eq!(chunks[1].char_offset_start, 502);
}

#[test]
fn prefers_sentence_end_over_word_break() {
    let text = prose(40);
    let chunks = split(&doc(&text), 250, 40).unwrap();
    for c in &chunks[..chunks.len() - 1] {
        assert!(c.text.trim_end().ends_with('.'), "chunk ended mid-sentence: {:?}", c.text);
    }
}

#[test]
fn multibyte_text_is_split_on_char_positions() {
    let text = "é".repeat(1500);
    let chunks = split(&doc(&text), 1000, 200).unwrap();
    assert_eq!(chunks.len(), 2);
    assert_eq!(chunks[0].text.chars().count(), 1000);
    assert_eq!(chunks[1].char_offset_start, 800);
}

#[test]
fn invalid_parameters_are_rejected() {
    assert!(split(&doc("abc"), 100, 100).is_err());
    assert!(split(&doc("abc"), 0, 0).is_err());
}
