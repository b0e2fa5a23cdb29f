//! Error types for SteveAI

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("summarization unavailable: {0}")]
    SummarizationUnavailable(String),

    #[error("invalid turn input: {0}")]
    InvalidTurnInput(String),

    #[error("corrupted conversation state: {0}")]
    CorruptedState(String),

    #[error("conversation not found: {0}")]
    ConversationNotFound(String),

    #[error("llm error: {provider} - {message}")]
    Llm { provider: String, message: String },

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub fn summarization_unavailable(reason: impl Into<String>) -> Self {
        Self::SummarizationUnavailable(reason.into())
    }

    pub fn invalid_turn(reason: impl Into<String>) -> Self {
        Self::InvalidTurnInput(reason.into())
    }

    pub fn corrupted(reason: impl Into<String>) -> Self {
        Self::CorruptedState(reason.into())
    }

    pub fn llm(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Llm {
            provider: provider.into(),
            message: message.into(),
        }
    }
}
