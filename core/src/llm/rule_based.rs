//! Secondary conversational fallback: keyword rules, no network.

use async_trait::async_trait;

use super::error::ProviderError;
use super::kind::ProviderKind;
use super::options::ProviderConfig;
use super::prepare::prepare_messages;
use super::provider::ProviderAdapter;
use crate::message::{ChatMessage, ModelResponse};
use crate::tools::{ToolCallExtractor, ToolRegistry};

pub const RULE_BASED_MODEL: &str = "rule-based";

const GREETINGS: &[&str] = &["hi", "hello", "hey", "good morning", "good afternoon", "good evening"];
const HELP_WORDS: &[&str] = &["help", "what can you do", "tools", "commands"];

/// Answers from the latest user message alone.
///
/// Tool directives found in that message are passed on as tool calls so the
/// orchestrator still runs them while the primary backend is down.
pub struct RuleBasedAdapter {
    tools: ToolRegistry,
    extractor: ToolCallExtractor,
}

impl RuleBasedAdapter {
    pub fn new(tools: ToolRegistry) -> Self {
        Self {
            tools,
            extractor: ToolCallExtractor::new(),
        }
    }

    fn reply_for(&self, user_text: &str) -> String {
        let lowered = user_text.trim().to_lowercase();
        if lowered.is_empty() {
            return "I didn't catch a question there. Could you rephrase it?".to_string();
        }
        if GREETINGS
            .iter()
            .any(|g| lowered == *g || lowered.starts_with(&format!("{g} ")) || lowered.starts_with(&format!("{g},")))
        {
            return "Hello! The main assistant is unavailable at the moment, but I can still run tools and answer simple requests.".to_string();
        }
        if HELP_WORDS.iter().any(|w| lowered.contains(w)) {
            let defs = self.tools.definitions();
            if defs.is_empty() {
                return "No tools are registered right now.".to_string();
            }
            let lines: Vec<String> = defs
                .iter()
                .map(|d| format!("- {}: {}", d.name, d.description))
                .collect();
            return format!(
                "Available tools:\n{}\nTo invoke one, write #TOOL: followed by the tool name and key=value arguments in parentheses.",
                lines.join("\n")
            );
        }
        "Sorry, the main assistant is unavailable right now. Please try again in a moment.".to_string()
    }
}

#[async_trait]
impl ProviderAdapter for RuleBasedAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Fallback
    }

    fn is_supported_model(&self, _model: &str) -> bool {
        true
    }

    fn default_model(&self) -> String {
        RULE_BASED_MODEL.to_string()
    }

    async fn call(
        &self,
        model: &str,
        messages: &[ChatMessage],
        _config: &ProviderConfig,
    ) -> Result<ModelResponse, ProviderError> {
        let prepared = prepare_messages(messages);
        let user_text = prepared.last_user_text().unwrap_or_default();

        let tool_calls = self.extractor.extract(user_text);
        let text = if tool_calls.is_empty() {
            self.reply_for(user_text)
        } else {
            let names: Vec<&str> = tool_calls.iter().map(|c| c.name.as_str()).collect();
            format!(
                "The main assistant is unavailable, so I ran the requested tool(s) directly: {}.",
                names.join(", ")
            )
        };

        let mut response = ModelResponse::success(model, ProviderKind::Fallback.as_str(), text);
        response.tool_calls = tool_calls;
        Ok(response)
    }

    async fn health_check(&self) -> bool {
        true
    }
}
