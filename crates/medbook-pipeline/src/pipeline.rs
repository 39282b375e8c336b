use tracing::{debug, info};

use medbook_core::error::{Error, Result};
use medbook_core::traits::{LlmClient, Retriever};
use medbook_core::types::RetrievedChunk;
use medbook_index::VectorIndex;
use medbook_llm::HfChatClient;

use crate::context::ContextAssembler;
use crate::prompt;

pub const DEFAULT_TOP_K: usize = 2;
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 3000;

/// An answer paired with the unfiltered retrieved set that informed it.
/// Chunks the context budget cut are still listed so callers can cite and
/// inspect them.
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<RetrievedChunk>,
}

/// Orchestrates one question: retrieve top-K, assemble the bounded context,
/// fill the instruction template, invoke the model, normalize the reply.
///
/// Stateless between calls; construct once at startup and share by
/// reference. Conversation history, if any, belongs to the caller.
pub struct AnswerPipeline<R> {
    retriever: R,
    llm: Box<dyn LlmClient>,
    top_k: usize,
    assembler: ContextAssembler,
}

impl<R: Retriever> AnswerPipeline<R> {
    pub fn new(retriever: R, llm: Box<dyn LlmClient>) -> Self {
        Self::with_limits(retriever, llm, DEFAULT_TOP_K, DEFAULT_MAX_CONTEXT_CHARS)
    }

    pub fn with_limits(
        retriever: R,
        llm: Box<dyn LlmClient>,
        top_k: usize,
        max_context_chars: usize,
    ) -> Self {
        Self {
            retriever,
            llm,
            top_k,
            assembler: ContextAssembler::new(max_context_chars),
        }
    }

    pub async fn answer(&self, question: &str) -> Result<Answer> {
        let retrieved = self
            .retriever
            .retrieve(question, self.top_k)
            .await
            .map_err(|e| Error::Retrieval(e.to_string()))?;
        debug!(hits = retrieved.len(), "retrieved candidate chunks");

        let context = self.assembler.format(&retrieved);
        let filled = prompt::fill(&context, question);

        let response = self
            .llm
            .invoke(&filled)
            .await
            .map_err(|e| Error::Generation(e.to_string()))?;
        let text = response.into_text().trim().to_string();
        info!(
            answer_chars = text.len(),
            sources = retrieved.len(),
            "question answered"
        );

        Ok(Answer { text, sources: retrieved })
    }
}

/// Production wiring: LanceDB retrieval plus the hosted chat model, with
/// the credential resolved from the environment.
pub fn hf_pipeline(
    index: VectorIndex,
    repo_id: &str,
    top_k: usize,
    max_context_chars: usize,
) -> Result<AnswerPipeline<VectorIndex>> {
    let llm = HfChatClient::new(repo_id).map_err(|e| Error::InvalidConfig(e.to_string()))?;
    Ok(AnswerPipeline::with_limits(
        index,
        Box::new(llm),
        top_k,
        max_context_chars,
    ))
}
