//! A4F OpenAI-compatible API provider with key rotation and SSE streaming

use crate::provider::{LlmError, LlmProvider, LlmResult, LlmStream};
use crate::types::{ChatCompletion, ImageRequest, LlmRequest, StreamDelta, Usage};
use futures::StreamExt;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use steveai_core::ApiConfig;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, warn};

const A4F_CHAT_URL: &str = "https://api.a4f.co/v1/chat/completions";
const A4F_IMAGE_URL: &str = "https://api.a4f.co/v1/images/generations";

pub struct A4fProvider {
    client: Client,
    api_keys: Vec<String>,
    chat_url: String,
    image_url: String,
}

impl A4fProvider {
    pub fn new(api_keys: Vec<String>) -> Self {
        Self {
            client: Client::new(),
            api_keys,
            chat_url: A4F_CHAT_URL.to_string(),
            image_url: A4F_IMAGE_URL.to_string(),
        }
    }

    pub fn from_config(api: &ApiConfig) -> LlmResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            api_keys: api.api_keys.clone(),
            chat_url: api.chat_url.clone(),
            image_url: api.image_url.clone(),
        })
    }

    pub fn with_chat_url(mut self, url: impl Into<String>) -> Self {
        self.chat_url = url.into();
        self
    }

    pub fn with_image_url(mut self, url: impl Into<String>) -> Self {
        self.image_url = url.into();
        self
    }

    pub fn key_count(&self) -> usize {
        self.api_keys.len()
    }

    /// POST `body` to `url`, trying each key in order until one succeeds.
    /// Returns the last failure when every key is exhausted.
    async fn post_with_rotation<T: Serialize + ?Sized>(&self, url: &str, body: &T) -> LlmResult<Response> {
        let mut last_err = LlmError::AuthFailed("no API keys configured".to_string());

        for (attempt, key) in self.api_keys.iter().enumerate() {
            let sent = self.client
                .post(url)
                .bearer_auth(key)
                .header("content-type", "application/json")
                .json(body)
                .send()
                .await;

            let response = match sent {
                Ok(r) => r,
                Err(e) => {
                    warn!("Request with key #{} failed: {}, trying next", attempt + 1, e);
                    last_err = LlmError::NetworkError(e);
                    continue;
                }
            };

            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let error_text = response.text().await.unwrap_or_default();
            error!("Upstream error {} with key #{}: {}", status, attempt + 1, error_text);
            last_err = match status.as_u16() {
                401 | 403 => LlmError::AuthFailed(error_text),
                429 => LlmError::RateLimited { retry_after_ms: 60000 },
                _ => LlmError::RequestFailed(format!("{}: {}", status, error_text)),
            };
        }

        Err(last_err)
    }
}

#[async_trait::async_trait]
impl LlmProvider for A4fProvider {
    fn name(&self) -> &str { "a4f" }

    fn models(&self) -> &[&str] {
        &[
            "provider-3/gemini-2.5-flash-lite-preview-09-2025",
            "provider-3/gpt-5-nano",
            "provider-3/deepseek-v3-0324",
            "provider-3/gpt-4o-mini",
            "provider-3/gpt-4.1-nano",
            "provider-3/imagen-4",
            "provider-5/grok-4-0709",
        ]
    }

    async fn complete(&self, request: LlmRequest) -> LlmResult<ChatCompletion> {
        debug!("A4F request: model={} messages={}", request.model, request.messages.len());

        let body = WireRequest { request: &request, stream: false };
        let response = self.post_with_rotation(&self.chat_url, &body).await?;
        let data: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;

        let choice = data.choices.into_iter().next();
        let finish_reason = choice.as_ref().and_then(|c| c.finish_reason.clone());
        let content = choice
            .and_then(|c| c.message)
            .and_then(|m| m.content)
            .unwrap_or_default();

        Ok(ChatCompletion {
            content,
            model: data.model,
            finish_reason,
            usage: data.usage,
        })
    }

    async fn complete_stream(
        &self,
        request: LlmRequest,
        cancel: Option<CancellationToken>,
    ) -> LlmResult<LlmStream> {
        debug!("A4F stream request: model={}", request.model);

        let body = WireRequest { request: &request, stream: true };
        let response = self.post_with_rotation(&self.chat_url, &body).await?;
        let cancel = cancel.unwrap_or_else(CancellationToken::new);
        let stream = parse_sse_stream(response.bytes_stream(), cancel);
        Ok(Box::pin(stream))
    }

    async fn generate_image(&self, request: ImageRequest) -> LlmResult<Option<String>> {
        debug!("A4F image request: model={}", request.model);

        let response = self.post_with_rotation(&self.image_url, &request).await?;
        let data: ImageResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        Ok(data.data.into_iter().find_map(|d| d.url))
    }
}

/// One parsed server-sent event.
#[derive(Debug)]
pub(crate) enum SseEvent {
    Chunk(StreamChunk),
    Done,
    Error(String),
}

/// Parse a single `\n\n`-delimited SSE event. Comments and unparseable
/// payloads yield `None`.
pub(crate) fn parse_sse_event(event: &str) -> Option<SseEvent> {
    let data: String = event
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");

    if data.is_empty() {
        return None;
    }
    if data == "[DONE]" {
        return Some(SseEvent::Done);
    }
    if let Ok(err) = serde_json::from_str::<ErrorEvent>(&data) {
        return Some(SseEvent::Error(err.error.message));
    }
    serde_json::from_str::<StreamChunk>(&data).ok().map(SseEvent::Chunk)
}

pub(crate) fn parse_sse_stream(
    bytes_stream: impl futures::Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    cancel: CancellationToken,
) -> impl futures::Stream<Item = LlmResult<StreamDelta>> + Send {
    async_stream::stream! {
        let mut buffer: Vec<u8> = Vec::new();
        let mut finish_reason: Option<String> = None;
        let mut usage: Option<Usage> = None;
        let mut done = false;
        let mut cancelled = false;

        tokio::pin!(bytes_stream);

        while !done {
            let next = tokio::select! {
                _ = cancel.cancelled() => None,
                n = bytes_stream.next() => Some(n),
            };
            let chunk_result = match next {
                None => {
                    yield Err(LlmError::Cancelled);
                    cancelled = true;
                    break;
                }
                Some(None) => break,
                Some(Some(c)) => c,
            };
            let chunk = match chunk_result {
                Ok(c) => c,
                Err(e) => {
                    yield Err(LlmError::StreamError(e.to_string()));
                    continue;
                }
            };

            // CR never occurs inside a multibyte sequence, so it can be dropped bytewise.
            buffer.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

            while let Some(event_end) = find_event_end(&buffer) {
                let event: Vec<u8> = buffer.drain(..event_end + 2).collect();
                let event_str = match std::str::from_utf8(&event[..event_end]) {
                    Ok(s) => s,
                    Err(e) => {
                        yield Err(LlmError::StreamError(format!("invalid UTF-8 in event: {}", e)));
                        continue;
                    }
                };

                match parse_sse_event(event_str) {
                    Some(SseEvent::Chunk(data)) => {
                        if data.usage.is_some() {
                            usage = data.usage;
                        }
                        for choice in data.choices {
                            if let Some(reason) = choice.finish_reason {
                                finish_reason = Some(reason);
                            }
                            if let Some(text) = choice.delta.and_then(|d| d.content) {
                                if !text.is_empty() {
                                    yield Ok(StreamDelta::Text(text));
                                }
                            }
                        }
                    }
                    Some(SseEvent::Done) => {
                        done = true;
                        break;
                    }
                    Some(SseEvent::Error(message)) => {
                        yield Ok(StreamDelta::Error(message));
                    }
                    None => {}
                }
            }
        }

        if !cancelled {
            yield Ok(StreamDelta::Done { finish_reason, usage });
        }
    }
}

fn find_event_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(2).position(|w| w == b"\n\n")
}

#[derive(Serialize)]
struct WireRequest<'a> {
    #[serde(flatten)]
    request: &'a LlmRequest,
    stream: bool,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    #[serde(default)]
    message: Option<ChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct StreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<ChoiceMessage>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ImageResponse {
    #[serde(default)]
    data: Vec<ImageData>,
}

#[derive(Deserialize)]
struct ImageData {
    #[serde(default)]
    url: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEvent {
    error: ErrorDetail,
}

#[derive(Deserialize)]
struct ErrorDetail {
    message: String,
}
