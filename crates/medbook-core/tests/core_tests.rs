use std::fs;

use tempfile::TempDir;

use medbook_core::chunker::Chunker;
use medbook_core::config::RagConfig;
use medbook_core::error::Error;
use medbook_core::loader::DocumentLoader;
use medbook_core::normalize::TextNormalizer;
use medbook_core::types::{Document, Meta, SOURCE_KEY};

fn doc(content: &str) -> Document {
    let mut metadata = Meta::new();
    metadata.insert(SOURCE_KEY.to_string(), "medical_book.txt".to_string());
    Document::new(content, metadata)
}

fn normalize_one(content: &str) -> String {
    let normalizer = TextNormalizer::new();
    let mut out = normalizer.normalize(vec![doc(content)]);
    out.remove(0).content
}

#[test]
fn normalize_repairs_linewrap_hyphenation() {
    assert_eq!(normalize_one("insu-\nlin resistance"), "insulin resistance");
}

#[test]
fn normalize_repairs_chained_hyphenation() {
    assert_eq!(normalize_one("medi-\nca-\ntion"), "medication");
}

#[test]
fn normalize_collapses_horizontal_whitespace_only() {
    assert_eq!(normalize_one("a   b\t\tc"), "a b c");
    // Newlines are untouched by the horizontal rule
    assert_eq!(normalize_one("a  \n  b"), "a \n b");
}

#[test]
fn normalize_collapses_blank_line_runs() {
    assert_eq!(normalize_one("one\n\n\n\ntwo"), "one\n\ntwo");
    // A single blank line stays as-is
    assert_eq!(normalize_one("one\n\ntwo"), "one\n\ntwo");
}

#[test]
fn normalize_trims_and_handles_empty() {
    assert_eq!(normalize_one("  \n\n  "), "");
    assert_eq!(normalize_one(""), "");
}

#[test]
fn normalize_is_idempotent() {
    let samples = [
        "insu-\nlin resistance",
        "a   b\t\tc\n\n\n\nnext",
        "medi-\nca-\ntion  list\n\n\n\n\nend",
        "",
        "already clean text\n\nwith one blank line",
    ];
    let normalizer = TextNormalizer::new();
    for sample in samples {
        let once = normalizer.normalize(vec![doc(sample)]);
        let twice = normalizer.normalize(once.clone());
        assert_eq!(once[0].content, twice[0].content, "sample: {sample:?}");
    }
}

#[test]
fn normalize_passes_metadata_through() {
    let mut metadata = Meta::new();
    metadata.insert(SOURCE_KEY.to_string(), "book.txt".to_string());
    metadata.insert("page".to_string(), "12".to_string());
    let input = Document::new("some   text", metadata.clone());

    let out = TextNormalizer::new().normalize(vec![input]);
    assert_eq!(out[0].metadata, metadata);
}

#[test]
fn chunker_rejects_overlap_not_below_size() {
    assert!(matches!(Chunker::new(100, 100), Err(Error::InvalidConfig(_))));
    assert!(matches!(Chunker::new(0, 0), Err(Error::InvalidConfig(_))));
    assert!(Chunker::new(100, 0).is_ok());
}

#[test]
fn chunker_is_deterministic() {
    let text = sample_text();
    let chunker = Chunker::new(120, 30).expect("chunker");
    let first = chunker.split_text(&text);
    let second = chunker.split_text(&text);
    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[test]
fn chunker_respects_size_bound() {
    let text = sample_text();
    let chunker = Chunker::new(600, 120).expect("chunker");
    for chunk in chunker.split_text(&text) {
        assert!(
            chunk.chars().count() <= 600,
            "chunk of {} chars exceeds bound",
            chunk.chars().count()
        );
    }
}

#[test]
fn chunker_hard_cuts_unbreakable_runs() {
    // No paragraph, line, or space boundaries at all
    let text = "x".repeat(1500);
    let chunker = Chunker::new(600, 120).expect("chunker");
    let chunks = chunker.split_text(&text);
    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.chars().count() <= 600);
    }
}

#[test]
fn chunker_overlaps_consecutive_chunks() {
    // Distinct words make the shared window observable
    let text = (0..400)
        .map(|i| format!("term{i:03}"))
        .collect::<Vec<_>>()
        .join(" ");
    let chunker = Chunker::new(100, 30).expect("chunker");
    let chunks = chunker.split_text(&text);
    assert!(chunks.len() > 1);
    for pair in chunks.windows(2) {
        let first_word = pair[1].split_whitespace().next().expect("non-empty chunk");
        assert!(
            pair[0].split_whitespace().any(|word| word == first_word),
            "chunk starting with {first_word:?} shares no context with its predecessor"
        );
    }
}

#[test]
fn chunker_prefers_paragraph_boundaries() {
    let text = "first paragraph here.\n\nsecond paragraph here.";
    let chunker = Chunker::new(30, 5).expect("chunker");
    let chunks = chunker.split_text(text);
    assert_eq!(chunks, vec!["first paragraph here.", "second paragraph here."]);
}

#[test]
fn chunks_inherit_metadata_and_order() {
    let mut metadata = Meta::new();
    metadata.insert(SOURCE_KEY.to_string(), "medical_book.txt".to_string());
    metadata.insert("page".to_string(), "3".to_string());
    let document = Document::new(sample_text(), metadata.clone());

    let chunker = Chunker::new(120, 30).expect("chunker");
    let chunks = chunker.split(std::slice::from_ref(&document));

    assert!(!chunks.is_empty());
    let total = chunks.len();
    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.metadata, metadata, "metadata is inherited unmodified");
        assert_eq!(chunk.chunk_index, i);
        assert_eq!(chunk.total_chunks, total);
        assert_eq!(chunk.id, format!("medical_book:{i}"));
    }
}

#[test]
fn loader_tags_source_with_basename() {
    let tmp = TempDir::new().expect("tempdir");
    fs::write(tmp.path().join("b.txt"), "beta content").expect("write");
    fs::write(tmp.path().join("a.txt"), "alpha content").expect("write");
    fs::write(tmp.path().join("ignored.bin"), [0u8, 159, 146]).expect("write");

    let documents = DocumentLoader::new(tmp.path()).load().expect("load");
    assert_eq!(documents.len(), 2);
    // Sorted walk: a.txt before b.txt
    assert_eq!(documents[0].source(), "a.txt");
    assert_eq!(documents[1].source(), "b.txt");
    assert_eq!(documents[0].content, "alpha content");
}

#[test]
fn loader_fails_on_empty_corpus() {
    let tmp = TempDir::new().expect("tempdir");
    let result = DocumentLoader::new(tmp.path()).load();
    assert!(matches!(result, Err(Error::Load(_))));
}

#[test]
fn config_defaults_match_shipped_profile() {
    let config = RagConfig::default();
    assert_eq!(config.collection_name, "medical_book");
    assert_eq!(config.embedding_model, "BAAI/bge-small-en-v1.5");
    assert_eq!(config.chunk_size, 600);
    assert_eq!(config.chunk_overlap, 120);
    assert_eq!(config.top_k, 2);
    assert_eq!(config.max_context_chars, 3000);
    assert!(config.validate().is_ok());
}

#[test]
fn config_validation_rejects_bad_chunking() {
    let config = RagConfig { chunk_overlap: 600, ..RagConfig::default() };
    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

    let config = RagConfig { top_k: 0, ..RagConfig::default() };
    assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
}

fn sample_text() -> String {
    let mut text = String::new();
    for section in 0..6 {
        for sentence in 0..8 {
            text.push_str(&format!(
                "Section {section} sentence {sentence} covers dosage, interactions, and monitoring guidance. "
            ));
        }
        text.push_str("\n\n");
    }
    text.trim().to_string()
}
