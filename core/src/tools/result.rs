use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::ToolError;

/// Outcome of one tool execution. Created once, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub source_tool: String,
    pub runtime_ms: u64,
    pub timestamp: DateTime<Utc>,
}

impl ToolResult {
    pub fn ok(source_tool: impl Into<String>, data: Value, runtime_ms: u64) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            source_tool: source_tool.into(),
            runtime_ms,
            timestamp: Utc::now(),
        }
    }

    pub fn failed(source_tool: impl Into<String>, error: &ToolError, runtime_ms: u64) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(error.to_string()),
            source_tool: source_tool.into(),
            runtime_ms,
            timestamp: Utc::now(),
        }
    }

    /// One-line human readable rendering used in reply summaries
    pub fn summary_line(&self) -> String {
        if self.success {
            let data = self
                .data
                .as_ref()
                .map(safe_snippet)
                .unwrap_or_else(|| "<empty>".into());
            format!("{} → {}", self.source_tool, data)
        } else {
            let msg = self.error.as_deref().unwrap_or("unknown error");
            format!("{} → error: {}", self.source_tool, msg)
        }
    }
}

fn safe_snippet(value: &Value) -> String {
    let s = match value {
        Value::String(s) => s.trim().to_string(),
        other => other.to_string(),
    };
    if s.chars().count() > 280 {
        let truncated: String = s.chars().take(280).collect();
        format!("{}…", truncated)
    } else {
        s
    }
}
