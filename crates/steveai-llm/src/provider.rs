//! LLM Provider trait

use crate::types::{ChatCompletion, ImageRequest, LlmRequest, StreamDelta};
use futures::Stream;
use std::pin::Pin;
use tokio_util::sync::CancellationToken;

/// Result type for LLM operations
pub type LlmResult<T> = Result<T, LlmError>;

/// LLM error types
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("authentication failed: {0}")]
    AuthFailed(String),

    #[error("rate limited: retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("stream error: {0}")]
    StreamError(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("cancelled")]
    Cancelled,

    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),
}

impl From<LlmError> for steveai_core::Error {
    fn from(e: LlmError) -> Self {
        steveai_core::Error::llm("llm", e.to_string())
    }
}

/// Stream type for LLM responses
pub type LlmStream = Pin<Box<dyn Stream<Item = LlmResult<StreamDelta>> + Send>>;

/// LLM Provider trait
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    fn name(&self) -> &str;
    fn models(&self) -> &[&str];

    fn supports_model(&self, model: &str) -> bool {
        self.models()
            .iter()
            .any(|m| *m == model || model.starts_with(m))
    }

    /// Run a completion and return the whole reply.
    async fn complete(&self, request: LlmRequest) -> LlmResult<ChatCompletion>;

    /// Stream a completion response. If `cancel` is provided and triggered,
    /// the stream yields `LlmError::Cancelled`.
    ///
    /// The default runs `complete` and yields the reply as a single delta.
    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        let completion = match cancel {
            Some(token) => tokio::select! {
                _ = token.cancelled() => return Err(LlmError::Cancelled),
                r = self.complete(request) => r?,
            },
            None => self.complete(request).await?,
        };
        let deltas = vec![
            Ok(StreamDelta::Text(completion.content)),
            Ok(StreamDelta::Done {
                finish_reason: completion.finish_reason,
                usage: completion.usage,
            }),
        ];
        Ok(Box::pin(futures::stream::iter(deltas)))
    }

    /// Generate an image and return its URL, if the upstream produced one.
    async fn generate_image(&self, request: ImageRequest) -> LlmResult<Option<String>> {
        Err(LlmError::Unsupported(format!(
            "{} cannot generate images (model {})",
            self.name(),
            request.model
        )))
    }
}
