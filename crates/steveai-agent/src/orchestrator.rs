//! Router + specialists writer pipeline
//!
//! A fast router model sees the conversation context and either answers
//! directly or replies `ACTION: DELEGATE`. On delegation a structure
//! specialist and a tone specialist draft in parallel from the bare request,
//! and the router model merges both drafts into the final reply.

use std::sync::Arc;
use steveai_core::{OrchestratorConfig, Result};
use steveai_llm::{LlmMessage, LlmProvider, LlmRequest};
use tracing::{debug, info, warn};

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";
const ACTION_PREFIX: &str = "ACTION: ";

/// Router action that hands the request to the specialists.
pub const DELEGATE: &str = "DELEGATE";

const TOT_METHOD: &str = "METHODOLOGY: TREE OF THOUGHTS (ToT) FOR SPECIALISTS\n\
1. BRAINSTORM: Generate 3 distinct approaches/branches (e.g., plot ideas, character styles).\n\
2. EVALUATE: Critically analyze the pros and cons of each branch in a <review> tag.\n\
3. DECIDE: Select the single best approach.\n\
4. OUTPUT: Provide ONLY the final selected content/structure of the best approach.";

const STRUCTURE_FOCUS: &str = "Focus on: PLOT STRUCTURE, NARRATIVE LOGIC, and OUTLINE.";
const TONE_FOCUS: &str = "Focus on: TONE, VOICE, and CHARACTER DIALOGUE style.";

/// Progress of one orchestrated reply.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stage {
    Routing,
    Delegating,
    Synthesizing,
}

impl Stage {
    pub fn describe(&self) -> &'static str {
        match self {
            Stage::Routing => "🧠 Analyzing intent, expect a short delay if delegation is needed.",
            Stage::Delegating => "📞 Delegating to the structure and tone specialists.",
            Stage::Synthesizing => "🔗 Combining structure and tone into the final draft.",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Orchestrated {
    pub text: String,
    pub delegated: bool,
}

pub struct Orchestrator {
    provider: Arc<dyn LlmProvider>,
    config: OrchestratorConfig,
}

impl Orchestrator {
    pub fn new(provider: Arc<dyn LlmProvider>, config: OrchestratorConfig) -> Self {
        Self { provider, config }
    }

    /// Route `message` and, when delegated, draft and merge. Only a router
    /// failure is an error; specialist and synthesis failures degrade to
    /// placeholder text.
    pub async fn reply(
        &self,
        context: &str,
        message: &str,
        on_stage: &mut (dyn FnMut(Stage) + Send),
    ) -> Result<Orchestrated> {
        on_stage(Stage::Routing);
        let routed = self
            .provider
            .complete(LlmRequest {
                model: self.config.router_model.clone(),
                messages: vec![
                    LlmMessage::system(router_prompt(message)),
                    LlmMessage::user(format!("{}\n\nUser: {}", context, message)),
                ],
                ..Default::default()
            })
            .await?;
        let router_reply = non_blank(&routed.content).unwrap_or_else(|| "No response.".to_string());

        if parse_action(&router_reply).as_deref() != Some(DELEGATE) {
            debug!("Router answered directly");
            return Ok(Orchestrated { text: router_reply, delegated: false });
        }

        on_stage(Stage::Delegating);
        let (structure, tone) = futures::join!(
            self.specialist(&self.config.structure_model, STRUCTURE_FOCUS, message),
            self.specialist(&self.config.tone_model, TONE_FOCUS, message),
        );
        let structure = structure.unwrap_or_else(|| "Structure input missing.".to_string());
        let tone = tone.unwrap_or_else(|| "Tone input missing.".to_string());

        on_stage(Stage::Synthesizing);
        let request = LlmRequest {
            model: self.config.router_model.clone(),
            messages: vec![
                LlmMessage::system(synthesis_prompt(&structure, &tone)),
                LlmMessage::user(format!("User's original request: {}", message)),
            ],
            ..Default::default()
        };
        let merged = match self.provider.complete(request).await {
            Ok(completion) => non_blank(&completion.content),
            Err(e) => {
                warn!("Synthesis via {} failed: {}", self.config.router_model, e);
                None
            }
        }
        .unwrap_or_else(|| "Synthesis failed.".to_string());

        let (thinking, _) = split_thinking(&router_reply);
        info!("Delegated reply merged ({} chars)", merged.len());
        Ok(Orchestrated {
            text: orchestration_log(thinking.unwrap_or(""), &merged),
            delegated: true,
        })
    }

    async fn specialist(&self, model: &str, focus: &str, message: &str) -> Option<String> {
        let request = LlmRequest {
            model: model.to_string(),
            messages: vec![
                LlmMessage::system(format!("{}\n{}", TOT_METHOD, focus)),
                LlmMessage::user(message),
            ],
            ..Default::default()
        };
        match self.provider.complete(request).await {
            Ok(completion) => non_blank(&completion.content),
            Err(e) => {
                warn!("Specialist {} failed: {}", model, e);
                None
            }
        }
    }
}

/// Split off the first `<think>...</think>` block. Returns the trimmed
/// thinking, if any, and the trimmed remaining text.
pub fn split_thinking(text: &str) -> (Option<&str>, String) {
    if let Some(open) = text.find(THINK_OPEN) {
        let inner = open + THINK_OPEN.len();
        if let Some(len) = text[inner..].find(THINK_CLOSE) {
            let rest = format!("{}{}", &text[..open], &text[inner + len + THINK_CLOSE.len()..]);
            return (Some(text[inner..inner + len].trim()), rest.trim().to_string());
        }
    }
    (None, text.trim().to_string())
}

/// The router's `ACTION: <word>` line, read after the thinking block.
pub fn parse_action(text: &str) -> Option<String> {
    let (_, answer) = split_thinking(text);
    answer.strip_prefix(ACTION_PREFIX).map(|a| a.trim().to_string())
}

fn non_blank(text: &str) -> Option<String> {
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

fn router_prompt(message: &str) -> String {
    format!(
        "<role>You are SteveAI-fast, the orchestrator. You use Chain-of-Thought (CoT).</role>\n\
         <task>\n\
         Analyze the user request: \"{}\" considering the conversation context.\n\n\
         Use <think> tags to reason step-by-step:\n\
         1. Is the request a creative writing task (story, poetry, script, etc.) OR a simple, fast-answer question?\n\
         2. If creative, set the action to DELEGATE. If simple, answer directly.\n\n\
         If delegating: After the </think> tag, output exactly: \"ACTION: DELEGATE\"\n\
         If answering directly: After the </think> tag, provide the final answer.\n\
         </task>",
        message
    )
}

fn synthesis_prompt(structure: &str, tone: &str) -> String {
    format!(
        "You are the Master Writer for SteveAI. Combine the Expert Structure and Expert Tone \
         inputs to write the final high-quality piece for the user.\n\n\
         EXPERT STRUCTURE: {}\n\
         EXPERT TONE: {}\n\n\
         Your final answer must be a single, polished output.",
        structure, tone
    )
}

fn orchestration_log(router_thinking: &str, merged: &str) -> String {
    format!(
        "<think>\n\
         [SteveAI Orchestration Log]\n\
         1. Router (Fast/CoT) Decision: Creative task detected. Delegation required.\n\
         2. Specialist 1 (Reasoning/ToT): Generated Structure.\n\
         3. Specialist 2 (Chat/ToT): Generated Tone/Voice.\n\
         4. Finalizer (Fast): Combined inputs for ultimate idea.\n\n\
         Router Thinking: {}\n\
         </think>\n\
         {}",
        router_thinking, merged
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action_after_thinking() {
        let reply = "<think>\nA poem is creative.\n</think>\nACTION: DELEGATE";
        assert_eq!(parse_action(reply).as_deref(), Some(DELEGATE));
        assert_eq!(parse_action("  ACTION:  DELEGATE \n").as_deref(), Some(DELEGATE));
    }

    #[test]
    fn test_parse_action_absent() {
        assert_eq!(parse_action("<think>simple</think>\nParis is the capital."), None);
        assert_eq!(parse_action("The ACTION: DELEGATE line must lead."), None);
        assert_eq!(parse_action("<think>unterminated ACTION: DELEGATE"), None);
    }

    #[test]
    fn test_only_first_thinking_block_is_stripped() {
        let (thinking, rest) = split_thinking("<think> a </think>x<think>b</think>");
        assert_eq!(thinking, Some("a"));
        assert_eq!(rest, "x<think>b</think>");
        assert_eq!(parse_action("<think>a</think><think>b</think>ACTION: DELEGATE"), None);
    }

    #[test]
    fn test_split_without_thinking() {
        assert_eq!(split_thinking("  plain  "), (None, "plain".to_string()));
    }

    #[test]
    fn test_orchestration_log_layout() {
        let log = orchestration_log("creative", "The poem.");
        assert!(log.starts_with("<think>\n[SteveAI Orchestration Log]\n1. Router"));
        assert!(log.contains("\n\nRouter Thinking: creative\n</think>\nThe poem."));
        assert_eq!(split_thinking(&log).1, "The poem.");
    }
}
