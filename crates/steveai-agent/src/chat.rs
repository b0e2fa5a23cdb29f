//! Chat controller: user input → context → upstream call → recorded turn

use crate::orchestrator::{Orchestrator, Stage};
use crate::session::ConversationRegistry;
use futures::StreamExt;
use std::path::PathBuf;
use std::sync::Arc;
use steveai_core::{Command, ConversationId, Error, Mode, Result, SteveConfig, Theme, HELP_TEXT};
use steveai_llm::{ImageRequest, LlmError, LlmMessage, LlmProvider, LlmRequest, LlmResult, StreamDelta};
use tracing::{debug, info, warn};

const IMAGE_TRIGGER: &str = "image generated:";
const EMPTY_REPLY: &str = "No response.";

/// What the caller should show for one input.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatReply {
    /// Assistant reply, already recorded as a turn.
    Text(String),
    /// The model (or `/image`) asked for an image.
    Image { prompt: String, url: Option<String> },
    /// Local command output; nothing is recorded.
    Notice(String),
}

/// Progress while a reply is being produced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChatEvent<'a> {
    /// Streamed reply text, in arrival order.
    Delta(&'a str),
    /// The writer pipeline moved on.
    Stage(Stage),
}

pub struct ChatController {
    provider: Arc<dyn LlmProvider>,
    registry: Arc<ConversationRegistry>,
    orchestrator: Orchestrator,
    config: SteveConfig,
    mode: Mode,
    theme: Theme,
    orchestrate: bool,
}

impl ChatController {
    pub fn new(provider: Arc<dyn LlmProvider>, registry: Arc<ConversationRegistry>, config: SteveConfig) -> Self {
        Self {
            orchestrator: Orchestrator::new(provider.clone(), config.orchestrator.clone()),
            orchestrate: config.orchestrator.enabled,
            provider,
            registry,
            config,
            mode: Mode::default(),
            theme: Theme::default(),
        }
    }

    pub fn with_mode(mut self, mode: Mode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_orchestration(mut self, enabled: bool) -> Self {
        self.orchestrate = enabled;
        self
    }

    pub fn orchestrating(&self) -> bool {
        self.orchestrate
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn theme(&self) -> Theme {
        self.theme
    }

    pub fn registry(&self) -> &Arc<ConversationRegistry> {
        &self.registry
    }

    /// Handle one line of user input for a conversation.
    pub async fn send(&mut self, id: &ConversationId, input: &str) -> Result<ChatReply> {
        self.send_with(id, input, |_| {}).await
    }

    /// Like [`send`](Self::send), reporting streamed text and pipeline
    /// stages to `on_event` as they happen.
    pub async fn send_with<F>(&mut self, id: &ConversationId, input: &str, mut on_event: F) -> Result<ChatReply>
    where
        F: FnMut(ChatEvent<'_>) + Send,
    {
        let message = input.trim();
        if message.is_empty() {
            return Err(Error::invalid_turn("message is empty"));
        }
        match Command::parse(message) {
            Some(command) => self.run_command(id, command).await,
            None => self.ask(id, message, &mut on_event).await,
        }
    }

    /// Request for `message` with the conversation context prepended.
    pub fn build_request(&self, context: &str, message: &str) -> LlmRequest {
        LlmRequest {
            model: self.config.models.for_mode(self.mode).to_string(),
            messages: vec![
                LlmMessage::system(self.config.prompts.system_for(self.mode)),
                LlmMessage::user(format!("{}\n\nUser: {}", context, message)),
            ],
            temperature: Some(self.config.api.temperature),
            max_tokens: Some(self.config.api.max_tokens),
        }
    }

    async fn ask(
        &self,
        id: &ConversationId,
        message: &str,
        on_event: &mut (dyn FnMut(ChatEvent<'_>) + Send),
    ) -> Result<ChatReply> {
        let conversation = self.registry.get_or_load(id)?;

        let reply = {
            let mut manager = conversation.lock().await;
            let context = manager.build_context().await;

            let outcome = if self.orchestrate {
                self.orchestrator
                    .reply(&context, message, &mut |stage: Stage| on_event(ChatEvent::Stage(stage)))
                    .await
                    .map(|orchestrated| orchestrated.text)
                    .map_err(|e| e.to_string())
            } else {
                self.stream_reply(self.build_request(&context, message), on_event)
                    .await
                    .map_err(|e| e.to_string())
            };

            let reply = match outcome {
                Ok(text) => {
                    let text = text.trim();
                    if text.is_empty() { EMPTY_REPLY.to_string() } else { text.to_string() }
                }
                Err(e) => {
                    warn!("Chat request for {} failed: {}", id, e);
                    format!("⚠️ Signal lost: {}", e)
                }
            };
            manager.record_turn(message, &reply)?;
            reply
        };

        self.persist(id).await;

        match image_prompt(&reply) {
            Some(prompt) => {
                let url = self.generate_image(&prompt).await;
                Ok(ChatReply::Image { prompt, url })
            }
            None => Ok(ChatReply::Text(reply)),
        }
    }

    /// Stream a completion, forwarding each text delta. An error event ends
    /// the reply as a failure even when text already arrived.
    async fn stream_reply(
        &self,
        request: LlmRequest,
        on_event: &mut (dyn FnMut(ChatEvent<'_>) + Send),
    ) -> LlmResult<String> {
        let mut stream = self.provider.complete_stream(request, None).await?;
        let mut text = String::new();
        while let Some(delta) = stream.next().await {
            match delta? {
                StreamDelta::Text(chunk) => {
                    on_event(ChatEvent::Delta(&chunk));
                    text.push_str(&chunk);
                }
                StreamDelta::Done { finish_reason, .. } => {
                    debug!("Stream finished: {:?}", finish_reason);
                    break;
                }
                StreamDelta::Error(message) => return Err(LlmError::StreamError(message)),
            }
        }
        Ok(text)
    }

    async fn run_command(&mut self, id: &ConversationId, command: Command) -> Result<ChatReply> {
        let notice = match command {
            Command::Clear => {
                let conversation = self.registry.get_or_load(id)?;
                conversation.lock().await.reset();
                self.persist(id).await;
                "🧹 Chat cleared.".to_string()
            }
            Command::Help => HELP_TEXT.to_string(),
            Command::Theme(theme) => {
                self.theme = theme.unwrap_or_else(|| self.theme.toggled());
                format!("Theme switched to {}!", self.theme)
            }
            Command::Model(None) => format!(
                "Current mode: {} ({})",
                self.mode,
                self.config.models.for_mode(self.mode)
            ),
            Command::Model(Some(mode)) => {
                self.mode = mode;
                info!("Switched to {} mode", mode);
                format!("Switched to {} mode ({})", mode, self.config.models.for_mode(mode))
            }
            Command::Export(path) => {
                let path = self.export_target(id, path)?;
                self.registry.get_or_load(id)?;
                self.registry.export_to(id, &path).await?;
                format!("Chat exported to {}", path.display())
            }
            Command::Image(prompt) => {
                let url = self.generate_image(&prompt).await;
                return Ok(ChatReply::Image { prompt, url });
            }
            Command::Orchestrate(enabled) => {
                self.orchestrate = enabled.unwrap_or(!self.orchestrate);
                info!("Writer pipeline {}", if self.orchestrate { "enabled" } else { "disabled" });
                format!("Writer pipeline {}.", if self.orchestrate { "on" } else { "off" })
            }
            Command::Usage(usage) => usage.to_string(),
            Command::Unknown(word) => format!("Unknown command /{}, type /help for options.", word),
        };
        Ok(ChatReply::Notice(notice))
    }

    fn export_target(&self, id: &ConversationId, requested: Option<PathBuf>) -> Result<PathBuf> {
        if let Some(path) = requested {
            return Ok(path);
        }
        match self.registry.export_path(id)? {
            Some(path) => Ok(path),
            None => Ok(PathBuf::from(format!("steveai-{}-export.json", id))),
        }
    }

    async fn generate_image(&self, prompt: &str) -> Option<String> {
        let request = ImageRequest::new(self.config.models.image.clone(), prompt);
        match self.provider.generate_image(request).await {
            Ok(url) => url,
            Err(e) => {
                warn!("Image generation failed: {}", e);
                None
            }
        }
    }

    async fn persist(&self, id: &ConversationId) {
        if let Err(e) = self.registry.save(id).await {
            warn!("Failed to persist conversation {}: {}", id, e);
        }
    }
}

/// Prompt from an `Image Generated: <prompt>` reply (prefix is case-insensitive).
pub fn image_prompt(reply: &str) -> Option<String> {
    let head = reply.get(..IMAGE_TRIGGER.len())?;
    if !head.eq_ignore_ascii_case(IMAGE_TRIGGER) {
        return None;
    }
    let prompt = reply[IMAGE_TRIGGER.len()..].trim();
    if prompt.is_empty() {
        None
    } else {
        Some(prompt.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_prompt() {
        assert_eq!(image_prompt("Image Generated: a red fox"), Some("a red fox".into()));
        assert_eq!(image_prompt("IMAGE GENERATED:  sunset: beach "), Some("sunset: beach".into()));
        assert_eq!(image_prompt("Image Generated:"), None);
        assert_eq!(image_prompt("Here is an image"), None);
        assert_eq!(image_prompt("短い"), None);
    }
}
