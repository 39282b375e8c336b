//! Hosted chat-model client.
//!
//! Talks to a Hugging Face OpenAI-compatible `chat/completions` endpoint.
//! The pipeline treats this as an opaque prompt-to-answer collaborator: no
//! retries, no masking. A failed call surfaces, distinguishable from a
//! model that answered it does not know.

use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use medbook_core::traits::{LlmClient, LlmResponse};

const DEFAULT_BASE_URL: &str = "https://router.huggingface.co/v1";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const DEFAULT_MAX_NEW_TOKENS: u32 = 512;

/// Environment variable holding the API credential.
pub const TOKEN_ENV: &str = "HUGGINGFACEHUB_API_TOKEN";

pub struct HfChatClient {
    client: Client,
    base_url: String,
    repo_id: String,
    api_token: String,
    max_new_tokens: u32,
}

impl HfChatClient {
    /// Builds a client for `repo_id`, reading the credential from
    /// [`TOKEN_ENV`].
    pub fn new(repo_id: impl Into<String>) -> Result<Self> {
        let api_token =
            std::env::var(TOKEN_ENV).map_err(|_| anyhow!("{TOKEN_ENV} is not set"))?;
        Self::with_token(repo_id, api_token)
    }

    pub fn with_token(repo_id: impl Into<String>, api_token: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_string(),
            repo_id: repo_id.into(),
            api_token: api_token.into(),
            max_new_tokens: DEFAULT_MAX_NEW_TOKENS,
        })
    }

    /// Points the client at another OpenAI-compatible server (local vLLM,
    /// a test stub, ...).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_max_new_tokens(mut self, max_new_tokens: u32) -> Self {
        self.max_new_tokens = max_new_tokens;
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[async_trait]
impl LlmClient for HfChatClient {
    async fn invoke(&self, prompt: &str) -> Result<LlmResponse> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: &self.repo_id,
            messages: vec![ChatMessage { role: "user", content: prompt }],
            max_tokens: self.max_new_tokens,
            // Answers should be reproducible for identical prompts
            temperature: 0.0,
        };
        debug!(model = %self.repo_id, prompt_chars = prompt.len(), "invoking chat model");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_token)
            .json(&request)
            .send()
            .await
            .context("chat request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("chat request returned {status}: {body}"));
        }

        let completion: ChatCompletion =
            response.json().await.context("malformed chat response")?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("chat response contained no choices"))?;
        Ok(LlmResponse::Message(content))
    }
}
