use crate::types::RetrievedChunk;
use async_trait::async_trait;

/// Text-to-vector collaborator. Must be deterministic for identical text and
/// model version; vectors are L2-normalized so cosine distance applies.
pub trait Embedder: Send + Sync {
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// What a language-model backend hands back: chat backends wrap the text in
/// a message payload, completion backends return bare text. Normalized to a
/// string at the pipeline boundary via [`LlmResponse::into_text`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LlmResponse {
    Message(String),
    Raw(String),
}

impl LlmResponse {
    pub fn into_text(self) -> String {
        match self {
            Self::Message(text) | Self::Raw(text) => text,
        }
    }
}

/// Opaque prompt-to-answer collaborator. No retry or timeout policy lives
/// behind this trait; failures must surface to the caller.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn invoke(&self, prompt: &str) -> anyhow::Result<LlmResponse>;
}

/// Similarity-query capability exposed by a built index: up to `k` chunks
/// for a query string, ranked by the index's own relevance order.
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn retrieve(&self, query: &str, k: usize) -> anyhow::Result<Vec<RetrievedChunk>>;
}
