use serde::Deserialize;
use serde_json::{json, Value};

use super::{arguments_from_value, BackendReply, WireFormat};
use crate::llm::kind::ProviderKind;
use crate::llm::options::ProviderConfig;
use crate::llm::prepare::PreparedConversation;
use crate::message::{TokenUsage, ToolCall, ToolCallSource};
use crate::tools::ToolDefinition;

/// Local model server speaking the Ollama `/api/chat` protocol (non-streaming)
#[derive(Debug, Clone, Copy, Default)]
pub struct OllamaWire;

impl WireFormat for OllamaWire {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Local
    }

    fn requires_api_key(&self) -> bool {
        false
    }

    fn default_endpoint(&self) -> &'static str {
        "http://localhost:11434"
    }

    fn default_model(&self) -> &'static str {
        "llama3.1"
    }

    /// Local servers host arbitrary model tags
    fn is_supported_model(&self, model: &str) -> bool {
        !model.trim().is_empty() && !model.contains(char::is_whitespace)
    }

    fn chat_path(&self, _model: &str) -> String {
        "/api/chat".to_string()
    }

    fn health_path(&self) -> &'static str {
        "/api/tags"
    }

    fn auth_headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        api_key
            .map(|k| vec![("authorization", format!("Bearer {k}"))])
            .unwrap_or_default()
    }

    fn build_body(
        &self,
        model: &str,
        prepared: &PreparedConversation,
        config: &ProviderConfig,
        tools: &[ToolDefinition],
    ) -> Value {
        let mut messages = Vec::with_capacity(prepared.turns.len() + 1);
        if let Some(system) = &prepared.system {
            messages.push(json!({"role": "system", "content": system}));
        }
        for m in &prepared.turns {
            messages.push(json!({"role": m.role.as_str(), "content": m.content}));
        }

        let mut body = json!({
            "model": model,
            "messages": messages,
            "stream": false,
            "options": {
                "temperature": config.temperature,
                "num_predict": config.max_tokens,
            },
        });
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.json_schema(),
                        }
                    })
                })
                .collect();
        }
        body
    }

    fn parse_reply(&self, body: Value) -> Result<BackendReply, String> {
        let resp: Response = serde_json::from_value(body).map_err(|e| format!("malformed reply: {e}"))?;
        let message = resp.message.ok_or_else(|| "reply contained no message".to_string())?;

        let tool_calls = message
            .tool_calls
            .into_iter()
            .map(|tc| ToolCall::new(tc.function.name, arguments_from_value(tc.function.arguments), ToolCallSource::Native))
            .collect();

        Ok(BackendReply {
            text: message.content,
            usage: TokenUsage {
                input_tokens: resp.prompt_eval_count,
                output_tokens: resp.eval_count,
            },
            finish_reason: resp.done_reason,
            tool_calls,
            model: resp.model,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    message: Option<ReplyMessage>,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: String,
    #[serde(default)]
    tool_calls: Vec<ReplyToolCall>,
}

#[derive(Debug, Deserialize)]
struct ReplyToolCall {
    function: ReplyFunction,
}

#[derive(Debug, Deserialize)]
struct ReplyFunction {
    name: String,
    #[serde(default)]
    arguments: Option<Value>,
}
