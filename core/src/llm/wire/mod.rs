//! Per-vendor request/response shapes.
//!
//! A `WireFormat` knows one backend's endpoint layout, auth headers, request
//! body and reply layout. Transport, timeouts and client caching live in
//! `HttpAdapter`.

mod anthropic;
mod gemini;
mod ollama;
mod openai;

pub use anthropic::AnthropicWire;
pub use gemini::GeminiWire;
pub use ollama::OllamaWire;
pub use openai::OpenAiWire;

use serde_json::{Map, Value};
use tracing::debug;

use super::kind::ProviderKind;
use super::options::ProviderConfig;
use super::prepare::PreparedConversation;
use crate::message::{TokenUsage, ToolCall};
use crate::tools::ToolDefinition;

/// Normalized backend reply before it becomes a `ModelResponse`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendReply {
    pub text: String,
    pub usage: TokenUsage,
    pub finish_reason: Option<String>,
    pub tool_calls: Vec<ToolCall>,
    /// Model the backend reports having used
    pub model: Option<String>,
}

pub trait WireFormat: Send + Sync + 'static {
    fn kind(&self) -> ProviderKind;

    fn requires_api_key(&self) -> bool {
        true
    }

    fn default_endpoint(&self) -> &'static str;

    fn default_model(&self) -> &'static str;

    fn is_supported_model(&self, model: &str) -> bool;

    /// Path appended to the base URL for a chat call
    fn chat_path(&self, model: &str) -> String;

    /// Path probed by the health check
    fn health_path(&self) -> &'static str;

    fn auth_headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)>;

    /// Request body. `tools` is empty when tool calls are disabled for the call.
    fn build_body(
        &self,
        model: &str,
        prepared: &PreparedConversation,
        config: &ProviderConfig,
        tools: &[ToolDefinition],
    ) -> Value;

    fn parse_reply(&self, body: Value) -> Result<BackendReply, String>;
}

/// Decode tool arguments that a backend sent as a JSON string
pub(crate) fn arguments_from_str(raw: &str) -> Map<String, Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => map,
        Ok(_) | Err(_) if raw.trim().is_empty() => Map::new(),
        Ok(other) => {
            debug!(target: "provider", "Tool arguments are not an object; wrapping");
            Map::from_iter([("value".to_string(), other)])
        }
        Err(e) => {
            debug!(target: "provider", error = %e, "Unparsable tool arguments; passing raw text");
            Map::from_iter([("raw".to_string(), Value::String(raw.to_string()))])
        }
    }
}

/// Arguments sent as a JSON value; anything but an object yields no arguments
pub(crate) fn arguments_from_value(value: Option<Value>) -> Map<String, Value> {
    match value {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_arguments_are_decoded() {
        let args = arguments_from_str(r#"{"sku":"ABC","qty":2}"#);
        assert_eq!(args["sku"], "ABC");
        assert_eq!(args["qty"], 2);
        assert!(arguments_from_str("").is_empty());
        assert_eq!(arguments_from_str("not json")["raw"], "not json");
    }
}
