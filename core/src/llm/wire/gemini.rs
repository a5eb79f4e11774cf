use serde::Deserialize;
use serde_json::{json, Value};

use super::{arguments_from_value, BackendReply, WireFormat};
use crate::llm::kind::ProviderKind;
use crate::llm::options::ProviderConfig;
use crate::llm::prepare::PreparedConversation;
use crate::message::{Role, TokenUsage, ToolCall, ToolCallSource};
use crate::tools::ToolDefinition;

/// generateContent API; the model is part of the path
#[derive(Debug, Clone, Copy, Default)]
pub struct GeminiWire;

impl WireFormat for GeminiWire {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Gemini
    }

    fn default_endpoint(&self) -> &'static str {
        "https://generativelanguage.googleapis.com/v1beta"
    }

    fn default_model(&self) -> &'static str {
        "gemini-1.5-flash"
    }

    /// The model becomes a path segment, so only plain identifiers pass
    fn is_supported_model(&self, model: &str) -> bool {
        model.starts_with("gemini-")
            && model
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_'))
    }

    fn chat_path(&self, model: &str) -> String {
        format!("/models/{model}:generateContent")
    }

    fn health_path(&self) -> &'static str {
        "/models"
    }

    fn auth_headers(&self, api_key: Option<&str>) -> Vec<(&'static str, String)> {
        api_key
            .map(|k| vec![("x-goog-api-key", k.to_string())])
            .unwrap_or_default()
    }

    fn build_body(
        &self,
        _model: &str,
        prepared: &PreparedConversation,
        config: &ProviderConfig,
        tools: &[ToolDefinition],
    ) -> Value {
        let contents: Vec<Value> = prepared
            .turns
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::Assistant => "model",
                    _ => "user",
                };
                json!({"role": role, "parts": [{"text": m.content}]})
            })
            .collect();

        let mut body = json!({
            "contents": contents,
            "generationConfig": {
                "maxOutputTokens": config.max_tokens,
                "temperature": config.temperature,
            },
        });
        if let Some(system) = &prepared.system {
            body["systemInstruction"] = json!({"parts": [{"text": system}]});
        }
        if !tools.is_empty() {
            let declarations: Vec<Value> = tools
                .iter()
                .map(|t| {
                    json!({
                        "name": t.name,
                        "description": t.description,
                        "parameters": t.json_schema(),
                    })
                })
                .collect();
            body["tools"] = json!([{"functionDeclarations": declarations}]);
        }
        body
    }

    fn parse_reply(&self, body: Value) -> Result<BackendReply, String> {
        let resp: Response = serde_json::from_value(body).map_err(|e| format!("malformed reply: {e}"))?;
        let candidate = resp
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| "reply contained no candidates".to_string())?;

        let mut text_parts = Vec::new();
        let mut tool_calls = Vec::new();
        for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
            if let Some(text) = part.text {
                text_parts.push(text);
            }
            if let Some(call) = part.function_call {
                tool_calls.push(ToolCall::new(
                    call.name,
                    arguments_from_value(call.args),
                    ToolCallSource::Native,
                ));
            }
        }

        Ok(BackendReply {
            text: text_parts.join(""),
            usage: resp
                .usage_metadata
                .map(|u| TokenUsage {
                    input_tokens: u.prompt_token_count,
                    output_tokens: u.candidates_token_count,
                })
                .unwrap_or_default(),
            finish_reason: candidate.finish_reason,
            tool_calls,
            model: resp.model_version,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Response {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    model_version: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    function_call: Option<FunctionCall>,
}

#[derive(Debug, Deserialize)]
struct FunctionCall {
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: Option<u32>,
    #[serde(default)]
    candidates_token_count: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::prepare::prepare_messages;
    use crate::message::ChatMessage;

    #[test]
    fn assistant_turns_use_model_role() {
        let prepared = prepare_messages(&[
            ChatMessage::system("be brief"),
            ChatMessage::user("hi"),
            ChatMessage::assistant("hello"),
        ]);
        let body = GeminiWire.build_body("gemini-1.5-flash", &prepared, &ProviderConfig::default(), &[]);

        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["systemInstruction"]["parts"][0]["text"], "be brief");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], 1024);
        assert_eq!(GeminiWire.chat_path("gemini-1.5-flash"), "/models/gemini-1.5-flash:generateContent");
    }

    #[test]
    fn models_that_would_alter_the_path_are_unsupported() {
        assert!(GeminiWire.is_supported_model("gemini-2.0-flash_exp"));
        assert!(!GeminiWire.is_supported_model("gemini-x/../../v1/files"));
        assert!(!GeminiWire.is_supported_model("gemini-pro?alt=sse"));
        assert!(!GeminiWire.is_supported_model("gemini-pro#frag"));
        assert!(!GeminiWire.is_supported_model("gpt-4o"));
    }

    #[test]
    fn reply_parts_and_usage() {
        let reply = GeminiWire
            .parse_reply(json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [
                        {"text": "Let me check."},
                        {"functionCall": {"name": "lookup", "args": {"sku": "ABC"}}}
                    ]},
                    "finishReason": "STOP"
                }],
                "usageMetadata": {"promptTokenCount": 7, "candidatesTokenCount": 4},
                "modelVersion": "gemini-1.5-flash-002"
            }))
            .unwrap();

        assert_eq!(reply.text, "Let me check.");
        assert_eq!(reply.finish_reason.as_deref(), Some("STOP"));
        assert_eq!(reply.usage.input_tokens, Some(7));
        assert_eq!(reply.tool_calls[0].arguments["sku"], "ABC");
        assert_eq!(reply.model.as_deref(), Some("gemini-1.5-flash-002"));
    }
}
