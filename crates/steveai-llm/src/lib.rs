//! SteveAI LLM - Chat completion and image provider adapters

pub mod a4f;
pub mod provider;
pub mod types;

pub use a4f::A4fProvider;
pub use provider::{LlmError, LlmProvider, LlmResult, LlmStream};
pub use tokio_util::sync::CancellationToken;
pub use types::*;
