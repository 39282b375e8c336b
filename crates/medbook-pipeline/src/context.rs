//! Assembles retrieved chunks into a character-bounded context block.

use medbook_core::types::RetrievedChunk;

/// Formats a prefix of the retrieved set under a cumulative character
/// budget, preserving retrieval rank order.
///
/// Truncation is a hard prefix cut: the first block whose length would push
/// the running total past the budget ends assembly, and later blocks are
/// never considered. In particular a first block that alone exceeds the
/// budget is excluded outright, leaving the context empty; the prompt
/// contract then makes the model admit it cannot answer.
#[derive(Debug, Clone)]
pub struct ContextAssembler {
    max_chars: usize,
}

impl ContextAssembler {
    pub fn new(max_chars: usize) -> Self {
        Self { max_chars }
    }

    /// Blocks are labeled `[1]`, `[2]`, ... over the chunks actually
    /// emitted; empty-content chunks are skipped and consume no label.
    /// Lengths are measured in `char`s, including the label.
    pub fn format(&self, retrieved: &[RetrievedChunk]) -> String {
        let mut blocks: Vec<String> = Vec::new();
        let mut total = 0usize;
        let mut rank = 0usize;
        for chunk in retrieved {
            let text = chunk.content.trim();
            if text.is_empty() {
                continue;
            }
            rank += 1;
            let block = format!("[{rank}] {text}");
            total += block.chars().count();
            if total > self.max_chars {
                break;
            }
            blocks.push(block);
        }
        blocks.join("\n\n")
    }
}
