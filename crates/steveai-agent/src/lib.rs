//! SteveAI Agent - Conversation memory, summarization, and chat control

pub mod chat;
pub mod context;
pub mod orchestrator;
pub mod session;
pub mod state;
pub mod summarizer;
pub mod tokens;

pub use chat::{image_prompt, ChatController, ChatEvent, ChatReply};
pub use context::{ContextManager, FALLBACK_PREFIX};
pub use orchestrator::{parse_action, split_thinking, Orchestrated, Orchestrator, Stage};
pub use session::{Conversation, ConversationRegistry, ExportDocument};
pub use state::{render_turns, ConversationState, Turn};
pub use summarizer::{LlmSummarizer, Summarizer};
pub use steveai_core::ConversationId;
pub use tokens::{CharRatioEstimator, TokenEstimator};
