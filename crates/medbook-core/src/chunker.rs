//! Recursive character chunker.
//!
//! Splits normalized documents into bounded segments, preferring to break on
//! paragraph boundaries, then line breaks, then spaces, before falling back
//! to a hard cut between characters. Consecutive chunks from the same
//! document share roughly `overlap` trailing characters. Output is fully
//! deterministic for a given input and parameter pair.

use std::collections::VecDeque;
use std::path::Path;

use crate::error::{Error, Result};
use crate::types::{Document, DocumentChunk};

/// Boundary preference, widest first. The empty separator means a hard cut
/// between characters and always applies.
const SEPARATORS: [&str; 4] = ["\n\n", "\n", " ", ""];

#[derive(Debug, Clone)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if chunk_size == 0 || overlap >= chunk_size {
            return Err(Error::InvalidConfig(format!(
                "chunk_size ({chunk_size}) must be greater than chunk_overlap ({overlap})"
            )));
        }
        Ok(Self { chunk_size, overlap })
    }

    /// Splits every document into chunks. Each chunk inherits its source
    /// document's metadata unmodified and keeps in-document order.
    pub fn split(&self, documents: &[Document]) -> Vec<DocumentChunk> {
        let mut chunks = Vec::new();
        for document in documents {
            let stem = source_stem(document.source());
            let pieces = self.split_text(&document.content);
            let total_chunks = pieces.len();
            for (chunk_index, content) in pieces.into_iter().enumerate() {
                chunks.push(DocumentChunk {
                    id: format!("{stem}:{chunk_index}"),
                    content,
                    metadata: document.metadata.clone(),
                    chunk_index,
                    total_chunks,
                });
            }
        }
        chunks
    }

    /// Splits a single text into segments of at most `chunk_size` characters
    /// (measured in `char`s), except where a single unbreakable run exceeds
    /// the target.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        if text.is_empty() {
            return Vec::new();
        }
        self.split_recursive(text, &SEPARATORS)
    }

    fn split_recursive(&self, text: &str, separators: &[&str]) -> Vec<String> {
        // First separator that occurs in the text wins; the hard cut at the
        // end of the list matches anything.
        let mut separator = "";
        let mut narrower: &[&str] = &[];
        for (i, &candidate) in separators.iter().enumerate() {
            if candidate.is_empty() || text.contains(candidate) {
                separator = candidate;
                narrower = &separators[i + 1..];
                break;
            }
        }

        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split(separator).map(str::to_string).collect()
        };

        let mut segments = Vec::new();
        let mut fitting: Vec<String> = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                fitting.push(piece);
                continue;
            }
            if !fitting.is_empty() {
                segments.extend(self.merge_pieces(&fitting, separator));
                fitting.clear();
            }
            if narrower.is_empty() {
                segments.push(piece);
            } else {
                segments.extend(self.split_recursive(&piece, narrower));
            }
        }
        if !fitting.is_empty() {
            segments.extend(self.merge_pieces(&fitting, separator));
        }
        segments
    }

    /// Greedily packs pieces toward `chunk_size`, then slides a window so the
    /// next segment starts with at most `overlap` trailing characters of the
    /// previous one.
    fn merge_pieces(&self, pieces: &[String], separator: &str) -> Vec<String> {
        let separator_len = char_len(separator);
        let mut merged = Vec::new();
        let mut window: VecDeque<&String> = VecDeque::new();
        let mut total = 0usize;

        for piece in pieces {
            let piece_len = char_len(piece);
            let lead = if window.is_empty() { 0 } else { separator_len };
            if total + piece_len + lead > self.chunk_size && !window.is_empty() {
                if let Some(segment) = join_window(&window, separator) {
                    merged.push(segment);
                }
                loop {
                    let lead = if window.is_empty() { 0 } else { separator_len };
                    let keeps_overlap = total > self.overlap;
                    let would_overflow =
                        total + piece_len + lead > self.chunk_size && total > 0;
                    if !keeps_overlap && !would_overflow {
                        break;
                    }
                    match window.pop_front() {
                        Some(front) => {
                            let joiner = if window.is_empty() { 0 } else { separator_len };
                            total -= char_len(front) + joiner;
                        }
                        None => break,
                    }
                }
            }
            let joiner = if window.is_empty() { 0 } else { separator_len };
            window.push_back(piece);
            total += piece_len + joiner;
        }

        if let Some(segment) = join_window(&window, separator) {
            merged.push(segment);
        }
        merged
    }
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

fn join_window(window: &VecDeque<&String>, separator: &str) -> Option<String> {
    let joined = window
        .iter()
        .map(|piece| piece.as_str())
        .collect::<Vec<_>>()
        .join(separator);
    let trimmed = joined.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn source_stem(source: &str) -> String {
    Path::new(source)
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| source.to_string())
}
