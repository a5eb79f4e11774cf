use serde::Deserialize;
use serde_json::{json, Value};

use super::{arguments_from_str, BackendReply, WireFormat};
use crate::llm::kind::ProviderKind;
use crate::llm::options::ProviderConfig;
use crate::llm::prepare::PreparedConversation;
use crate::message::{TokenUsage, ToolCall, ToolCallSource};
use crate::tools::ToolDefinition;

/// Chat Completions API with bearer auth
#[derive(Debug, Clone, Copy, Default)]
pub struct OpenAiWire;

impl WireFormat for OpenAiWire {
    fn kind(&self) -> ProviderKind {
        ProviderKind::OpenAi
    }

    fn default_endpoint(&self) -> &'static str {
        "https://api.openai.com/v1"
    }

    fn default_model(&self) -> &'static str {
        "gpt-4o-mini"
    }

    fn is_supported_model(&self, model: &str) -> bool {
        ["gpt-", "o1", "o3", "o4", "chatgpt-"]
            .iter()
            .any(|p| model.starts_with(p))
    }

    fn chat_path(&self, _model: &str) -> String {
        "/chat/completions".to_string()
    }

    fn health_path(&self) -> &'static str {
        "/models"
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
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
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
        let choice = resp
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| "reply contained no choices".to_string())?;

        let tool_calls = choice
            .message
            .tool_calls
            .into_iter()
            .map(|tc| {
                let mut call = ToolCall::new(
                    tc.function.name,
                    arguments_from_str(&tc.function.arguments),
                    ToolCallSource::Native,
                );
                call.id = tc.id;
                call
            })
            .collect();

        Ok(BackendReply {
            text: choice.message.content.unwrap_or_default(),
            usage: resp
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.prompt_tokens,
                    output_tokens: u.completion_tokens,
                })
                .unwrap_or_default(),
            finish_reason: choice.finish_reason,
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
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ReplyMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ReplyMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Vec<ReplyToolCall>,
}

#[derive(Debug, Deserialize)]
struct ReplyToolCall {
    #[serde(default)]
    id: Option<String>,
    function: ReplyFunction,
}

#[derive(Debug, Deserialize)]
struct ReplyFunction {
    name: String,
    #[serde(default)]
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: Option<u32>,
    #[serde(default)]
    completion_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::prepare::prepare_messages;
    use crate::message::ChatMessage;
    use crate::tools::{ParamType, ParameterSchema, ParameterSpec};

    fn lookup_def() -> ToolDefinition {
        ToolDefinition {
            name: "lookup".into(),
            description: "Look up a SKU".into(),
            parameters: ParameterSchema::from([(
                "sku".to_string(),
                ParameterSpec::required(ParamType::String),
            )]),
        }
    }

    #[test]
    fn body_hoists_system_and_declares_tools() {
        let prepared = prepare_messages(&[
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
        ]);
        let body = OpenAiWire.build_body("gpt-4o-mini", &prepared, &ProviderConfig::default(), &[lookup_def()]);

        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["tools"][0]["type"], "function");
        assert_eq!(body["tools"][0]["function"]["name"], "lookup");

        let bare = OpenAiWire.build_body("gpt-4o-mini", &prepared, &ProviderConfig::default(), &[]);
        assert!(bare.get("tools").is_none());
    }

    #[test]
    fn reply_with_usage_and_tool_calls() {
        let reply = OpenAiWire
            .parse_reply(json!({
                "model": "gpt-4o-mini-2024-07-18",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": null,
                        "tool_calls": [{
                            "id": "call_1",
                            "type": "function",
                            "function": {"name": "lookup", "arguments": "{\"sku\":\"ABC\"}"}
                        }]
                    },
                    "finish_reason": "tool_calls"
                }],
                "usage": {"prompt_tokens": 12, "completion_tokens": 5, "total_tokens": 17}
            }))
            .unwrap();

        assert_eq!(reply.text, "");
        assert_eq!(reply.finish_reason.as_deref(), Some("tool_calls"));
        assert_eq!(reply.usage.input_tokens, Some(12));
        assert_eq!(reply.tool_calls.len(), 1);
        assert_eq!(reply.tool_calls[0].id.as_deref(), Some("call_1"));
        assert_eq!(reply.tool_calls[0].arguments["sku"], "ABC");
    }

    #[test]
    fn reply_without_usage_reports_none() {
        let reply = OpenAiWire
            .parse_reply(json!({"choices": [{"message": {"content": "hello"}}]}))
            .unwrap();
        assert_eq!(reply.text, "hello");
        assert!(reply.usage.is_empty());
        assert!(reply.finish_reason.is_none());
    }

    #[test]
    fn reply_without_choices_is_an_error() {
        assert!(OpenAiWire.parse_reply(json!({"choices": []})).is_err());
    }
}
