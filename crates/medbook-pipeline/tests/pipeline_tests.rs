use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use async_trait::async_trait;

use medbook_core::error::Error;
use medbook_core::traits::{LlmClient, LlmResponse, Retriever};
use medbook_core::types::{Meta, RetrievedChunk};
use medbook_pipeline::AnswerPipeline;

struct ScriptedRetriever {
    chunks: Vec<RetrievedChunk>,
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    async fn retrieve(&self, _query: &str, k: usize) -> anyhow::Result<Vec<RetrievedChunk>> {
        Ok(self.chunks.iter().take(k).cloned().collect())
    }
}

struct FailingRetriever;

#[async_trait]
impl Retriever for FailingRetriever {
    async fn retrieve(&self, _query: &str, _k: usize) -> anyhow::Result<Vec<RetrievedChunk>> {
        Err(anyhow!("index unreachable"))
    }
}

struct ScriptedLlm {
    response: LlmResponse,
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn invoke(&self, _prompt: &str) -> anyhow::Result<LlmResponse> {
        Ok(self.response.clone())
    }
}

struct FailingLlm;

#[async_trait]
impl LlmClient for FailingLlm {
    async fn invoke(&self, _prompt: &str) -> anyhow::Result<LlmResponse> {
        Err(anyhow!("401 unauthorized"))
    }
}

/// Records the prompt it was handed so tests can assert its shape.
struct CapturingLlm {
    seen: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl LlmClient for CapturingLlm {
    async fn invoke(&self, prompt: &str) -> anyhow::Result<LlmResponse> {
        self.seen
            .lock()
            .expect("prompt log")
            .push(prompt.to_string());
        Ok(LlmResponse::Message("scripted answer".to_string()))
    }
}

fn retrieved(content: &str, score: f32) -> RetrievedChunk {
    let mut metadata = Meta::new();
    metadata.insert("source".to_string(), "diabetes.txt".to_string());
    RetrievedChunk { content: content.to_string(), metadata, score }
}

fn corpus() -> Vec<RetrievedChunk> {
    vec![
        retrieved(
            "Metformin commonly causes gastrointestinal upset such as nausea.",
            0.92,
        ),
        retrieved("Insulin therapy requires regular glucose monitoring.", 0.71),
    ]
}

#[tokio::test]
async fn answer_returns_trimmed_text_and_unfiltered_sources() {
    let pipeline = AnswerPipeline::new(
        ScriptedRetriever { chunks: corpus() },
        Box::new(ScriptedLlm {
            response: LlmResponse::Message(
                "  Metformin often causes stomach upset.  \n".to_string(),
            ),
        }),
    );

    let answer = pipeline.answer("What are metformin's side effects?").await.expect("answer");
    assert_eq!(answer.text, "Metformin often causes stomach upset.");
    assert_eq!(answer.sources.len(), 2);
}

#[tokio::test]
async fn sources_include_chunks_the_context_budget_cut() {
    // Budget admits only the first block, yet both chunks must come back.
    let pipeline = AnswerPipeline::with_limits(
        ScriptedRetriever { chunks: corpus() },
        Box::new(ScriptedLlm { response: LlmResponse::Message("ok".to_string()) }),
        2,
        70,
    );

    let answer = pipeline.answer("metformin?").await.expect("answer");
    assert_eq!(answer.sources.len(), 2, "unfiltered retrieved set is returned");
}

#[tokio::test]
async fn raw_string_responses_normalize_too() {
    let pipeline = AnswerPipeline::new(
        ScriptedRetriever { chunks: corpus() },
        Box::new(ScriptedLlm {
            response: LlmResponse::Raw("plain completion text".to_string()),
        }),
    );

    let answer = pipeline.answer("anything").await.expect("answer");
    assert_eq!(answer.text, "plain completion text");
}

#[tokio::test]
async fn prompt_carries_context_question_and_contract() {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let pipeline = AnswerPipeline::new(
        ScriptedRetriever { chunks: corpus() },
        Box::new(CapturingLlm { seen: seen.clone() }),
    );

    let answer = pipeline
        .answer("What are common side effects of metformin?")
        .await
        .expect("answer");
    assert_eq!(answer.text, "scripted answer");

    let prompts = seen.lock().expect("prompt log");
    assert_eq!(prompts.len(), 1);
    let prompt = &prompts[0];
    assert!(prompt.contains("[1] Metformin commonly causes gastrointestinal upset"));
    assert!(prompt.contains("[2] Insulin therapy"));
    assert!(prompt.contains("What are common side effects of metformin?"));
    assert!(prompt.contains("say you don't know"));
    assert!(prompt.contains("max 3 sentences"));
}

#[tokio::test]
async fn retrieval_failure_surfaces_as_retrieval_error() {
    let pipeline = AnswerPipeline::new(
        FailingRetriever,
        Box::new(ScriptedLlm { response: LlmResponse::Message("unused".to_string()) }),
    );

    let result = pipeline.answer("anything").await;
    match result {
        Err(Error::Retrieval(message)) => assert!(message.contains("index unreachable")),
        other => panic!("expected retrieval error, got {other:?}"),
    }
}

#[tokio::test]
async fn generation_failure_surfaces_as_generation_error() {
    let pipeline = AnswerPipeline::new(
        ScriptedRetriever { chunks: corpus() },
        Box::new(FailingLlm),
    );

    let result = pipeline.answer("anything").await;
    match result {
        Err(Error::Generation(message)) => assert!(message.contains("401")),
        other => panic!("expected generation error, got {other:?}"),
    }
}

#[tokio::test]
async fn dont_know_answers_pass_through_unchanged() {
    // The admit-ignorance wording is the model's obligation under the prompt
    // contract; the pipeline only relays it.
    let pipeline = AnswerPipeline::new(
        ScriptedRetriever { chunks: Vec::new() },
        Box::new(ScriptedLlm {
            response: LlmResponse::Message(
                "I don't know based on the provided context.".to_string(),
            ),
        }),
    );

    let answer = pipeline.answer("What is the dosage of a drug not in the corpus?").await.expect("answer");
    assert_eq!(answer.text, "I don't know based on the provided context.");
    assert!(answer.sources.is_empty());
}
