use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::debug;

use crate::tools::{ParamType, ParameterSchema, ParameterSpec, Tool, ToolError};

/// Configuration for the fetch tool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpFetchConfig {
    /// Timeout for requests in milliseconds
    pub timeout_ms: u64,
    /// User agent string
    pub user_agent: String,
    /// Upper bound for `max_bytes`
    pub max_bytes_limit: usize,
}

impl Default for HttpFetchConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            user_agent: "switchboard-agent/0.1".to_string(),
            max_bytes_limit: 64 * 1024,
        }
    }
}

/// Fetches a URL over HTTP GET and returns (a prefix of) the body
pub struct HttpFetchTool {
    config: HttpFetchConfig,
    http_client: reqwest::Client,
}

impl Default for HttpFetchTool {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpFetchTool {
    pub fn new() -> Self {
        Self::with_config(HttpFetchConfig::default())
    }

    pub fn with_config(config: HttpFetchConfig) -> Self {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(&config.user_agent)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            config,
            http_client,
        }
    }
}

#[async_trait]
impl Tool for HttpFetchTool {
    fn name(&self) -> String {
        "http.fetch".to_string()
    }

    fn description(&self) -> String {
        "Fetch a web page or API endpoint with HTTP GET".to_string()
    }

    fn parameters(&self) -> ParameterSchema {
        ParameterSchema::from([
            (
                "url".to_string(),
                ParameterSpec::required(ParamType::String).describe("Absolute http(s) URL"),
            ),
            (
                "max_bytes".to_string(),
                ParameterSpec::optional(ParamType::Integer)
                    .with_default(json!(4096))
                    .describe("Maximum number of body bytes to return"),
            ),
        ])
    }

    async fn call(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let url = arguments
            .get("url")
            .and_then(Value::as_str)
            .ok_or_else(|| ToolError::InvalidArguments("'url' must be a string".to_string()))?;
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ToolError::InvalidArguments(format!(
                "Unsupported URL scheme: {}",
                url
            )));
        }
        let max_bytes = arguments
            .get("max_bytes")
            .and_then(Value::as_u64)
            .map(|n| n as usize)
            .unwrap_or(4096)
            .min(self.config.max_bytes_limit);

        debug!(target: "http_fetch_tool", url = %url, max_bytes, "Fetching");

        let resp = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| ToolError::ExecutionFailed(format!("Request failed: {}", e)))?;
        let status = resp.status();
        if !status.is_success() {
            return Err(ToolError::ExecutionFailed(format!(
                "HTTP {} from {}",
                status, url
            )));
        }

        let (bytes, truncated) = read_capped(resp, max_bytes).await?;
        let body = String::from_utf8_lossy(&bytes).to_string();

        Ok(json!({
            "url": url,
            "status": status.as_u16(),
            "body": body,
            "truncated": truncated,
        }))
    }
}

/// Read at most `max_bytes` of the body, stopping the download once the cap is hit
async fn read_capped(mut resp: reqwest::Response, max_bytes: usize) -> Result<(Vec<u8>, bool), ToolError> {
    let mut buf = Vec::with_capacity(max_bytes.min(16 * 1024));
    while let Some(chunk) = resp
        .chunk()
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read body: {}", e)))?
    {
        let room = max_bytes - buf.len();
        if chunk.len() > room {
            buf.extend_from_slice(&chunk[..room]);
            return Ok((buf, true));
        }
        buf.extend_from_slice(&chunk);
        if buf.len() == max_bytes {
            let more = resp
                .chunk()
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("Failed to read body: {}", e)))?
                .is_some_and(|c| !c.is_empty());
            return Ok((buf, more));
        }
    }
    Ok((buf, false))
}
