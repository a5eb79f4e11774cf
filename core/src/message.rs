//! Chat data model shared by every adapter and the orchestrator.
//!
//! `ModelResponse` is the canonical output shape: every adapter, the
//! rule-based fallback and the deterministic fallback produce one. Its
//! constructors keep `success` consistent with `errors`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::tools::ToolResult;

/// Placeholder substituted when a backend answers with no text at all
pub const NO_RESPONSE_PLACEHOLDER: &str = "(no response)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One message of a conversation. Treated as immutable once appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            metadata: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }
}

/// Where a tool call request was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallSource {
    /// Reported by the backend in its structured tool-call field
    Native,
    /// Recognized in the reply text by the directive grammar
    Directive,
    /// Recognized in a fenced code block tagged as a tool
    FencedBlock,
    /// Recognized as an inline JSON object with tool/params keys
    InlineJson,
}

/// Normalized tool call request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub arguments: Map<String, Value>,
    pub source: ToolCallSource,
}

impl ToolCall {
    pub fn new(name: impl Into<String>, arguments: Map<String, Value>, source: ToolCallSource) -> Self {
        Self {
            id: None,
            name: name.into(),
            arguments,
            source,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_tokens: Option<u32>,
}

impl TokenUsage {
    pub fn is_empty(&self) -> bool {
        self.input_tokens.is_none() && self.output_tokens.is_none()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FallbackTier {
    Secondary,
    Deterministic,
}

/// Response metadata. Usage and finish reason are only present when the
/// backend reported them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResponseMeta {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<TokenUsage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub original_provider: Option<String>,
    #[serde(default)]
    pub fallback_used: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_tier: Option<FallbackTier>,
    /// Errors that caused the fallback; the response itself may still be a success
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

/// Canonical response returned by every adapter and by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    pub model: String,
    pub provider: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_in: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tokens_out: Option<u32>,
    pub duration_ms: u64,
    #[serde(default)]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default)]
    pub tool_results: Vec<ToolResult>,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default)]
    pub meta: ResponseMeta,
    pub created_at: DateTime<Utc>,
}

impl ModelResponse {
    /// Successful response. Empty text is replaced by the placeholder.
    pub fn success(model: impl Into<String>, provider: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let text = if text.trim().is_empty() {
            NO_RESPONSE_PLACEHOLDER.to_string()
        } else {
            text
        };
        Self {
            model: model.into(),
            provider: provider.into(),
            text,
            tokens_in: None,
            tokens_out: None,
            duration_ms: 0,
            tool_calls: Vec::new(),
            tool_results: Vec::new(),
            success: true,
            errors: Vec::new(),
            meta: ResponseMeta::default(),
            created_at: Utc::now(),
        }
    }

    /// Failed response carrying at least one error
    pub fn failure(
        model: impl Into<String>,
        provider: impl Into<String>,
        text: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut response = Self::success(model, provider, text);
        response.push_error(error);
        response
    }

    /// Record an error; the response is no longer a success
    pub fn push_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        self.success = false;
    }

    pub fn with_usage(mut self, usage: TokenUsage) -> Self {
        self.tokens_in = usage.input_tokens;
        self.tokens_out = usage.output_tokens;
        self.meta.usage = (!usage.is_empty()).then_some(usage);
        self
    }

    pub fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Mark this response as produced by a fallback tier on behalf of `original_provider`
    pub fn mark_fallback(&mut self, tier: FallbackTier, original_provider: &str, original_error: &str) {
        self.meta.fallback_used = true;
        self.meta.fallback_tier = Some(tier);
        self.meta.original_provider = Some(original_provider.to_string());
        self.meta.errors = vec![original_error.to_string()];
    }

    /// `success` must agree with whether `errors` is empty
    pub fn is_consistent(&self) -> bool {
        self.success == self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_becomes_placeholder() {
        let r = ModelResponse::success("m", "openai", "   ");
        assert_eq!(r.text, NO_RESPONSE_PLACEHOLDER);
        assert!(r.success);
        assert!(r.is_consistent());
    }

    #[test]
    fn failure_sets_errors_and_success_together() {
        let mut r = ModelResponse::failure("m", "openai", "boom", "backend down");
        assert!(!r.success);
        assert_eq!(r.errors, vec!["backend down".to_string()]);
        r.push_error("second");
        assert!(r.is_consistent());
    }

    #[test]
    fn usage_is_absent_when_backend_reports_none() {
        let r = ModelResponse::success("m", "openai", "hi").with_usage(TokenUsage::default());
        assert!(r.meta.usage.is_none());
        assert!(r.tokens_in.is_none());

        let r = ModelResponse::success("m", "openai", "hi").with_usage(TokenUsage {
            input_tokens: Some(12),
            output_tokens: None,
        });
        assert_eq!(r.tokens_in, Some(12));
        assert_eq!(r.meta.usage.and_then(|u| u.input_tokens), Some(12));
    }

    #[test]
    fn role_serializes_lowercase() {
        let m = ChatMessage::user("hello");
        let v = serde_json::to_value(&m).unwrap();
        assert_eq!(v["role"], "user");
        assert!(v.get("metadata").is_none());
    }
}
