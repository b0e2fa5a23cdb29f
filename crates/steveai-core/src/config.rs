//! SteveAI configuration
//!
//! All tunable parameters in one place. Loaded from TOML at startup,
//! falls back to defaults if no config file exists.

use crate::error::{Error, Result};
use crate::types::Mode;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Env var holding comma-separated API keys; overrides `api.api_keys`.
pub const API_KEYS_ENV: &str = "STEVEAI_API_KEYS";

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SteveConfig {
    /// Upstream endpoints and request defaults.
    pub api: ApiConfig,
    /// Model selection per mode.
    pub models: ModelConfig,
    /// Conversation memory and summarization.
    pub memory: MemoryConfig,
    /// System prompts.
    pub prompts: PromptConfig,
    /// Router/specialist writer pipeline.
    pub orchestrator: OrchestratorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// OpenAI-compatible chat completions endpoint.
    pub chat_url: String,
    /// Image generation endpoint.
    pub image_url: String,
    /// Keys tried in order; the next one is used when a request fails.
    pub api_keys: Vec<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Per-request HTTP timeout.
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub fast: String,
    pub chat: String,
    pub reasoning: String,
    pub general: String,
    /// Model used to summarize the conversation memory.
    pub summarizer: String,
    pub image: String,
}

/// Context window management.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryConfig {
    /// Approximate token ceiling over the raw turns that triggers summarization.
    pub token_budget: usize,
    /// Turn count that triggers summarization regardless of size.
    pub summarize_after_turns: u64,
    /// Recent turns rendered after the summary.
    pub recent_turns_to_show: usize,
    /// Raw turns kept after summarization.
    pub turns_to_retain: usize,
    /// Heuristic token estimate per character.
    pub tokens_per_char: f64,
    /// Turns folded into the local summary when the summarizer fails.
    pub fallback_turns: usize,
    /// Max chars of the local summary body.
    pub fallback_max_chars: usize,
    /// Completion limit for the summarizer model.
    pub summary_max_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// Prefix of every system prompt.
    pub global: String,
    pub chat: String,
    pub reasoning: String,
    pub general: String,
    /// Instruction sent to the summarizer model.
    pub summarizer: String,
}

/// A fast router model either answers directly or delegates to two
/// specialists (structure and tone) whose drafts it then merges.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Route every chat message through the pipeline (`/dagi` toggles it).
    pub enabled: bool,
    /// Decides whether to delegate, and writes the final merge.
    pub router_model: String,
    pub structure_model: String,
    pub tone_model: String,
}

// ============================================================
// Defaults
// ============================================================

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            chat_url: "https://api.a4f.co/v1/chat/completions".into(),
            image_url: "https://api.a4f.co/v1/images/generations".into(),
            api_keys: Vec::new(),
            temperature: 0.7,
            max_tokens: 1500,
            timeout_secs: 60,
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            fast: "provider-3/gemini-2.5-flash-lite-preview-09-2025".into(),
            chat: "provider-3/gpt-5-nano".into(),
            reasoning: "provider-3/deepseek-v3-0324".into(),
            general: "provider-5/grok-4-0709".into(),
            summarizer: "provider-3/gpt-4o-mini".into(),
            image: "provider-3/imagen-4".into(),
        }
    }
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            token_budget: 2200,
            summarize_after_turns: 6,
            recent_turns_to_show: 6,
            turns_to_retain: 4,
            tokens_per_char: 0.25,
            fallback_turns: 2,
            fallback_max_chars: 800,
            summary_max_tokens: 400,
        }
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            router_model: "provider-2/gemini-2.5-flash".into(),
            structure_model: "provider-1/deepseek-r1-0528".into(),
            tone_model: "provider-5/gpt-5-nano".into(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            global: "You are SteveAI, made by saadpie. You can generate images directly via the backend. \
                When a user's intent is clearly visual, respond ONLY with: Image Generated: <prompt> \
                — exactly like this, no extra text, markdown, emojis, or URLs. \
                Be concise and practical.".into(),
            chat: "Friendly, concise assistant. Suggest images when relevant.".into(),
            reasoning: "Analytical reasoning mode — be methodical and concise.".into(),
            general: "General assistant: factual, concise, step-by-step answers when requested.".into(),
            summarizer: "Summarize the following chat context clearly and concisely.".into(),
        }
    }
}

// ============================================================
// Loading
// ============================================================

impl SteveConfig {
    /// Load config from a TOML file, falling back to defaults.
    /// Keys from `STEVEAI_API_KEYS` are applied on top.
    pub fn load(path: &Path) -> Self {
        let mut config = match std::fs::read_to_string(path) {
            Ok(content) => match Self::from_toml_str(&content) {
                Ok(config) => {
                    tracing::info!("Loaded config from {}", path.display());
                    config
                }
                Err(e) => {
                    tracing::warn!("Failed to parse {}: {}, using defaults", path.display(), e);
                    Self::default()
                }
            },
            Err(_) => {
                tracing::info!("No config at {}, using defaults", path.display());
                Self::default()
            }
        };
        if let Ok(keys) = std::env::var(API_KEYS_ENV) {
            config.api.apply_keys_env(&keys);
        }
        config
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|e| Error::Config(e.to_string()))?;
        config.memory.validate()?;
        Ok(config)
    }

    /// Write the current config as TOML (for generating a default config file).
    /// API keys are left out.
    pub fn to_toml(&self) -> String {
        let mut redacted = self.clone();
        redacted.api.api_keys.clear();
        toml::to_string_pretty(&redacted).unwrap_or_default()
    }
}

impl ApiConfig {
    /// Replace the key list with a comma-separated value. Blank entries are dropped.
    pub fn apply_keys_env(&mut self, value: &str) {
        let keys: Vec<String> = value
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect();
        if !keys.is_empty() {
            self.api_keys = keys;
        }
    }
}

impl ModelConfig {
    pub fn for_mode(&self, mode: Mode) -> &str {
        match mode {
            Mode::Fast => &self.fast,
            Mode::Chat => &self.chat,
            Mode::Reasoning => &self.reasoning,
            Mode::General => &self.general,
        }
    }
}

impl PromptConfig {
    /// Full system prompt for a mode: the global prompt followed by the mode prompt.
    pub fn system_for(&self, mode: Mode) -> String {
        let mode_prompt = match mode {
            Mode::Fast | Mode::Chat => &self.chat,
            Mode::Reasoning => &self.reasoning,
            Mode::General => &self.general,
        };
        format!("{} {}", self.global, mode_prompt)
    }
}

impl MemoryConfig {
    pub fn validate(&self) -> Result<()> {
        if self.tokens_per_char.is_nan() || self.tokens_per_char <= 0.0 {
            return Err(Error::Config(format!(
                "memory.tokens_per_char must be positive, got {}",
                self.tokens_per_char
            )));
        }
        if self.summarize_after_turns == 0 {
            return Err(Error::Config("memory.summarize_after_turns must be at least 1".into()));
        }
        Ok(())
    }
}
