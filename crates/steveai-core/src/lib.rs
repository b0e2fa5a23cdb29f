//! SteveAI Core - Types, configuration, commands, and error handling

pub mod command;
pub mod config;
pub mod error;
pub mod types;

pub use command::{Command, HELP_TEXT};
pub use config::{
    ApiConfig, MemoryConfig, ModelConfig, OrchestratorConfig, PromptConfig, SteveConfig, API_KEYS_ENV,
};
pub use error::{Error, Result};
pub use types::*;
