//! Conversation turns and the state owned by a `ContextManager`

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use steveai_core::{Error, Result};

/// One user/assistant exchange.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub index: u64,
    pub user_text: String,
    pub bot_text: String,
}

impl Turn {
    /// `User: <u>\nBot: <b>`
    pub fn render(&self) -> String {
        format!("User: {}\nBot: {}", self.user_text, self.bot_text)
    }
}

/// Render turns one after another, joined by a newline.
pub fn render_turns<'a>(turns: impl IntoIterator<Item = &'a Turn>) -> String {
    turns
        .into_iter()
        .map(Turn::render)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Turns keyed by index, the rolling summary, and the last assigned index.
///
/// An empty `summary` means no summary has been produced yet. Once it is set,
/// `turns` only holds the tail retained after trimming.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    #[serde(default)]
    pub(crate) turns: BTreeMap<u64, Turn>,
    #[serde(default)]
    pub(crate) summary: String,
    #[serde(default)]
    pub(crate) turn_counter: u64,
}

impl ConversationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn turns(&self) -> impl DoubleEndedIterator<Item = &Turn> + ExactSizeIterator {
        self.turns.values()
    }

    pub fn turn(&self, index: u64) -> Option<&Turn> {
        self.turns.get(&index)
    }

    pub fn summary(&self) -> Option<&str> {
        if self.summary.is_empty() {
            None
        } else {
            Some(&self.summary)
        }
    }

    pub fn turn_counter(&self) -> u64 {
        self.turn_counter
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty() && self.summary.is_empty() && self.turn_counter == 0
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Check the invariants a restored state must satisfy.
    pub fn validate(&self) -> Result<()> {
        for (key, turn) in &self.turns {
            if *key != turn.index {
                return Err(Error::corrupted(format!(
                    "turn stored under {} carries index {}",
                    key, turn.index
                )));
            }
            if turn.user_text.trim().is_empty() {
                return Err(Error::corrupted(format!("turn {} has empty user text", key)));
            }
        }

        let (first, last) = match (self.turns.keys().next(), self.turns.keys().next_back()) {
            (Some(first), Some(last)) => (*first, *last),
            // Empty history is either fresh or fully folded into the summary.
            _ => {
                if self.summary.is_empty() != (self.turn_counter == 0) {
                    return Err(Error::corrupted(format!(
                        "no turns but counter is {} and summary is {}",
                        self.turn_counter,
                        if self.summary.is_empty() { "empty" } else { "set" }
                    )));
                }
                return Ok(());
            }
        };

        if first == 0 {
            return Err(Error::corrupted("turn indices start at 1"));
        }
        if last - first + 1 != self.turns.len() as u64 {
            return Err(Error::corrupted(format!(
                "gap in turn indices between {} and {}",
                first, last
            )));
        }
        if last != self.turn_counter {
            return Err(Error::corrupted(format!(
                "last turn is {} but counter is {}",
                last, self.turn_counter
            )));
        }
        if self.summary.is_empty() && first != 1 {
            return Err(Error::corrupted(format!(
                "history starts at turn {} without a summary",
                first
            )));
        }
        Ok(())
    }
}
