//! Conversation summarization through a chat-completion model

use std::sync::Arc;
use steveai_core::{Error, Result, SteveConfig};
use steveai_llm::{LlmMessage, LlmProvider, LlmRequest};
use tracing::{debug, error};

/// Produces a summary of rendered conversation text.
#[async_trait::async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, text: &str) -> Result<String>;
}

/// Summarizer backed by an `LlmProvider`.
pub struct LlmSummarizer {
    provider: Arc<dyn LlmProvider>,
    model: String,
    instruction: String,
    max_tokens: u32,
}

impl LlmSummarizer {
    pub fn new(provider: Arc<dyn LlmProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            instruction: "Summarize the following chat context clearly and concisely.".to_string(),
            max_tokens: 400,
        }
    }

    pub fn from_config(provider: Arc<dyn LlmProvider>, config: &SteveConfig) -> Self {
        Self::new(provider, config.models.summarizer.clone())
            .with_instruction(config.prompts.summarizer.clone())
            .with_max_tokens(config.memory.summary_max_tokens)
    }

    pub fn with_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.instruction = instruction.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }
}

#[async_trait::async_trait]
impl Summarizer for LlmSummarizer {
    async fn summarize(&self, text: &str) -> Result<String> {
        let request = LlmRequest {
            model: self.model.clone(),
            messages: vec![LlmMessage::system(&self.instruction), LlmMessage::user(text)],
            max_tokens: Some(self.max_tokens),
            ..Default::default()
        };
        debug!("Summarizing {} chars with {}", text.len(), self.model);

        let completion = self.provider.complete(request).await.map_err(|e| {
            error!("Summarization via {} failed: {}", self.provider.name(), e);
            Error::summarization_unavailable(e.to_string())
        })?;

        let summary = completion.content.trim();
        if summary.is_empty() {
            return Err(Error::summarization_unavailable("model returned an empty summary"));
        }
        Ok(summary.to_string())
    }
}
