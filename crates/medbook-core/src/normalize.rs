//! Cleans PDF-extracted text before chunking.
//!
//! Repairs line-wrap hyphenation, collapses horizontal whitespace runs and
//! excess blank lines, and trims the result. Normalization is idempotent.

use regex::Regex;
use std::sync::LazyLock;

use crate::types::Document;

static HYPHEN_WRAP: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\w)-\n(\w)").expect("hyphen-wrap pattern compiles"));
static HORIZONTAL_WS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+").expect("horizontal-whitespace pattern compiles"));
static BLANK_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n{3,}").expect("blank-run pattern compiles"));

#[derive(Debug, Default)]
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    /// Order-preserving, same cardinality in and out. Metadata passes
    /// through untouched.
    pub fn normalize(&self, documents: Vec<Document>) -> Vec<Document> {
        documents.into_iter().map(|d| self.normalize_one(d)).collect()
    }

    fn normalize_one(&self, document: Document) -> Document {
        let Document { content, metadata } = document;

        // Replacement consumes the joined character, so chained wraps
        // ("medi-\nca-\ntion") need another pass; run to a fixed point.
        let mut text = content;
        loop {
            let repaired = HYPHEN_WRAP.replace_all(&text, "$1$2");
            if repaired == text {
                break;
            }
            text = repaired.into_owned();
        }

        let text = HORIZONTAL_WS.replace_all(&text, " ");
        let text = BLANK_RUNS.replace_all(&text, "\n\n");

        Document { content: text.trim().to_string(), metadata }
    }
}
