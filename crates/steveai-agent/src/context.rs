//! Context window management with rolling summarization
//!
//! Turns accumulate verbatim until the count or the estimated size crosses
//! its threshold. The next `build_context` then asks the summarizer for a
//! summary of everything so far, keeps only the most recent turns, and from
//! then on sends the frozen summary followed by the recent tail. Only
//! `reset` re-arms summarization.

use crate::state::{render_turns, ConversationState, Turn};
use crate::summarizer::Summarizer;
use crate::tokens::{CharRatioEstimator, TokenEstimator};
use std::sync::Arc;
use steveai_core::{Error, MemoryConfig, Result};
use tracing::{debug, info, warn};

/// Prefix of the local summary used when the summarizer fails.
pub const FALLBACK_PREFIX: &str = "Conversation so far: ";

pub struct ContextManager {
    config: MemoryConfig,
    state: ConversationState,
    summarizer: Arc<dyn Summarizer>,
    estimator: Arc<dyn TokenEstimator>,
}

impl ContextManager {
    pub fn new(config: MemoryConfig, summarizer: Arc<dyn Summarizer>) -> Self {
        let estimator = Arc::new(CharRatioEstimator::new(config.tokens_per_char));
        Self {
            config,
            state: ConversationState::default(),
            summarizer,
            estimator,
        }
    }

    /// Start from persisted state. State that fails validation is discarded
    /// and the manager starts empty.
    pub fn restore(config: MemoryConfig, summarizer: Arc<dyn Summarizer>, state: ConversationState) -> Self {
        let mut manager = Self::new(config, summarizer);
        match state.validate() {
            Ok(()) => manager.state = state,
            Err(e) => warn!("Discarding restored conversation: {}", e),
        }
        manager
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn state(&self) -> &ConversationState {
        &self.state
    }

    pub fn summary(&self) -> Option<&str> {
        self.state.summary()
    }

    pub fn is_summarized(&self) -> bool {
        !self.state.summary.is_empty()
    }

    pub fn turn_counter(&self) -> u64 {
        self.state.turn_counter
    }

    pub fn turns(&self) -> impl DoubleEndedIterator<Item = &Turn> + ExactSizeIterator {
        self.state.turns()
    }

    pub fn approx_tokens(&self, text: &str) -> usize {
        self.estimator.estimate(text)
    }

    /// Every held turn, oldest first.
    pub fn full_turns_text(&self) -> String {
        render_turns(self.state.turns.values())
    }

    /// The most recent `n` held turns, oldest first.
    pub fn last_n_turns_text(&self, n: usize) -> String {
        let skip = self.state.turns.len().saturating_sub(n);
        render_turns(self.state.turns.values().skip(skip))
    }

    /// Append a completed exchange. Blank user text is rejected and leaves
    /// the state untouched.
    pub fn record_turn(&mut self, user_text: &str, bot_text: &str) -> Result<Turn> {
        if user_text.trim().is_empty() {
            return Err(Error::invalid_turn("user text is empty"));
        }

        let index = self.state.turn_counter + 1;
        let turn = Turn {
            index,
            user_text: user_text.to_string(),
            bot_text: bot_text.to_string(),
        };
        self.state.turns.insert(index, turn.clone());
        self.state.turn_counter = index;
        debug!("Recorded turn {}", index);
        Ok(turn)
    }

    pub fn should_summarize(&self) -> bool {
        if self.is_summarized() {
            return false;
        }
        self.state.turn_counter >= self.config.summarize_after_turns
            || self.approx_tokens(&self.full_turns_text()) > self.config.token_budget
    }

    /// Produce the context block for the next request, summarizing first if
    /// a threshold has been crossed. Summarizer failures are absorbed.
    pub async fn build_context(&mut self) -> String {
        if self.should_summarize() {
            self.summarize().await;
        }

        if self.is_summarized() {
            format!(
                "[SESSION SUMMARY]\n{}\n\n[RECENT TURNS]\n{}",
                self.state.summary,
                self.last_n_turns_text(self.config.recent_turns_to_show)
            )
        } else {
            self.full_turns_text()
        }
    }

    /// Clear turns and summary and restart numbering.
    pub fn reset(&mut self) {
        self.state = ConversationState::default();
        info!("Conversation reset");
    }

    async fn summarize(&mut self) {
        let full = self.full_turns_text();
        let tokens = self.approx_tokens(&full);

        let summary = match self.summarizer.summarize(&full).await {
            Ok(s) if !s.trim().is_empty() => s.trim().to_string(),
            Ok(_) => {
                warn!("Summarizer returned nothing, using local summary");
                self.fallback_summary()
            }
            Err(e) => {
                warn!("Summarizer failed ({}), using local summary", e);
                self.fallback_summary()
            }
        };

        self.state.summary = summary;
        let before = self.state.turns.len();
        self.retain_recent(self.config.turns_to_retain);
        info!(
            "Summarized {} turns (~{} tokens) into {} chars, kept {}",
            before,
            tokens,
            self.state.summary.len(),
            self.state.turns.len()
        );
    }

    fn fallback_summary(&self) -> String {
        let recent = self
            .last_n_turns_text(self.config.fallback_turns)
            .replace("\r\n", " ")
            .replace(|c: char| c == '\r' || c == '\n', " ");
        let body: String = recent.chars().take(self.config.fallback_max_chars).collect();
        format!("{}{}", FALLBACK_PREFIX, body)
    }

    fn retain_recent(&mut self, keep: usize) {
        while self.state.turns.len() > keep {
            self.state.turns.pop_first();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Never;

    #[async_trait::async_trait]
    impl Summarizer for Never {
        async fn summarize(&self, _text: &str) -> Result<String> {
            Err(Error::summarization_unavailable("offline"))
        }
    }

    fn manager() -> ContextManager {
        ContextManager::new(MemoryConfig::default(), Arc::new(Never))
    }

    #[test]
    fn test_last_n_turns_more_than_held() {
        let mut cm = manager();
        cm.record_turn("a", "b").unwrap();
        assert_eq!(cm.last_n_turns_text(6), "User: a\nBot: b");
        assert_eq!(cm.last_n_turns_text(0), "");
    }

    #[test]
    fn test_retain_recent_drops_oldest() {
        let mut cm = manager();
        for i in 1..=5 {
            cm.record_turn(&format!("q{}", i), "a").unwrap();
        }
        cm.retain_recent(2);
        let kept: Vec<u64> = cm.turns().map(|t| t.index).collect();
        assert_eq!(kept, vec![4, 5]);
    }

    #[test]
    fn test_fallback_collapses_newlines_and_truncates() {
        let mut cm = manager();
        cm.record_turn("first", "one").unwrap();
        cm.record_turn("second", "two\r\nlines\rmore").unwrap();
        cm.record_turn("third", &"x".repeat(2000)).unwrap();

        let fallback = cm.fallback_summary();
        assert!(fallback.starts_with("Conversation so far: User: second Bot: two lines more User: third"));
        assert!(!fallback.contains('\n'));
        assert!(!fallback.contains('\r'));
        assert_eq!(fallback.chars().count(), FALLBACK_PREFIX.len() + 800);
    }
}
