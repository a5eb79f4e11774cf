use serde::Deserialize;
use serde_json::{json, Value};

use super::{arguments_from_value, BackendReply, WireFormat};
use crate::llm::kind::ProviderKind;
use crate::llm::options::ProviderConfig;
use crate::llm::prepare::PreparedConversation;
use crate::message::{TokenUsage, ToolCall, ToolCallSource};
use crate::tools::ToolDefinition;

const API_VERSION: &str = "2023-06-01";

/// Messages API: top-level system prompt, content blocks in the reply
#[derive(Debug, Clone, Copy, Default)]
pub struct AnthropicWire;

impl WireFormat for AnthropicWire {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Anthropic
    }

    fn default_endpoint(&self) -> &'static str {
        "https://api.anthropic.com/v1"
    }

    fn default_model(&self) -> &'static str {
        "claude-3-5-haiku-latest"
    }

    fn is_supported_model(&self, model: &str) -> bool {
        model.starts_with("claude-")
    }

    fn chat_path(&self, _model: &str) -> String {
        "/messages".to_string()
    }

    fn health_path(&self) -> &'static str {
        "/models"
    }

    fn auth_headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        let mut headers = vec![("anthropic-version", API_VERSION.to_string())];
        if let Some(k) = api_key {
            headers.push(("x-api-key", k.to_string()));
        }
        headers
    }

    fn build_body(
        &self,
        model: &str,
        prepared: &PreparedConversation,
        config: &ProviderConfig,
        tools: &[ToolDefinition],
    ) -> Value {
        let messages: Vec<Value> = prepared
            .turns
            .iter()
            .map(|m| {
                json!({
                    "role": m.role.as_str(),
                    "content": [{"type": "text", "text": m.content}],
                })
            })
            .collect();

        let mut body = json!({
            "model": model,
            "messages": messages,
            "max_tokens": config.max_tokens,
            "temperature": config.temperature,
        });
        if let Some(system) = &prepared.system {
            body["system"] = json!(system);
        }
        if !tools.is_empty() {
            body["tools"] = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "input_schema": t.json_schema(),
                    })
                })
                .collect();
        }
        body
    }

    fn parse_reply(&self, body: Value) -> Result<BackendReply, String> {
        let resp: Response = serde_json::from_value(body).map_err(|e| format!("malformed reply: {e}"))?;

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        for block in resp.content {
            match block.content_type.as_str() {
                "text" => text_parts.extend(block.text),
                "tool_use" => {
                    if let Some(name) = block.name {
                        let mut call = ToolCall::new(name, arguments_from_value(block.input), ToolCallSource::Native);
                        call.id = block.id;
                        tool_calls.push(call);
                    }
                }
                _ => {}
            }
        }

        Ok(BackendReply {
            text: text_parts.join(""),
            usage: resp
                .usage
                .map(|u| TokenUsage {
                    input_tokens: u.input_tokens,
                    output_tokens: u.output_tokens,
                })
                .unwrap_or_default(),
            finish_reason: resp.stop_reason,
            tool_calls,
            model: resp.model,
        })
    }
}

#[derive(Debug, Deserialize)]
struct Response {
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    content_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    input: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: Option<u32>,
    #[serde(default)]
    output_tokens: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::prepare::prepare_messages;
    use crate::message::ChatMessage;

    #[test]
    fn system_prompt_is_top_level() {
        let prepared = prepare_messages(&[
            ChatMessage::system("rule one"),
            ChatMessage::system("rule two"),
            ChatMessage::user("hi"),
        ]);
        let body = AnthropicWire.build_body("claude-3-5-haiku-latest", &prepared, &ProviderConfig::default(), &[]);

        assert_eq!(body["system"], "rule one\n\nrule two");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["content"][0]["text"], "hi");
        assert!(body.get("tools").is_none());
    }

    #[test]
    fn auth_uses_api_key_header() {
        let headers = AnthropicWire.auth_headers(Some("sk-ant"));
        assert!(headers.contains(&("x-api-key", "sk-ant".to_string())));
        assert!(headers.contains(&("anthropic-version", API_VERSION.to_string())));
    }

    #[test]
    fn reply_blocks_are_split_into_text_and_tool_calls() {
        let reply = AnthropicWire
            .parse_reply(json!({
                "model": "claude-3-5-haiku-20241022",
                "content": [
                    {"type": "text", "text": "Checking stock."},
                    {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {"sku": "ABC"}}
                ],
                "stop_reason": "tool_use",
                "usage": {"input_tokens": 20, "output_tokens": 9}
            }))
            .unwrap();

        assert_eq!(reply.text, "Checking stock.");
        assert_eq!(reply.finish_reason.as_deref(), Some("tool_use"));
        assert_eq!(reply.usage.output_tokens, Some(9));
        assert_eq!(reply.tool_calls[0].name, "lookup");
        assert_eq!(reply.tool_calls[0].arguments["sku"], "ABC");
    }
}
