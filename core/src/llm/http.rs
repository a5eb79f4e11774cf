//! Shared machinery for every network-backed adapter.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::Instant;
use tracing::{debug, warn};

use super::client_cell::ClientRegistry;
use super::error::ProviderError;
use super::kind::ProviderKind;
use super::options::ProviderConfig;
use super::prepare::{prepare_messages, PreparedConversation};
use super::provider::{race_timeout, settle, ProviderAdapter};
use super::wire::WireFormat;
use crate::config::ProviderSettings;
use crate::message::{ChatMessage, ModelResponse};
use crate::tools::ToolRegistry;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);

/// Lazily built per-provider transport handle
#[derive(Debug, Clone)]
pub struct BackendClient {
    pub http: reqwest::Client,
    pub base_url: String,
    pub api_key: Option<String>,
}

impl BackendClient {
    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Client cache shared by all HTTP adapters of one orchestrator
pub type SharedClients = Arc<ClientRegistry<BackendClient>>;

/// Adapter for an HTTP backend described by a `WireFormat`
pub struct HttpAdapter<W: WireFormat> {
    wire: W,
    settings: ProviderSettings,
    clients: SharedClients,
    tools: ToolRegistry,
}

impl<W: WireFormat> HttpAdapter<W> {
    pub fn new(wire: W, settings: ProviderSettings, clients: SharedClients, tools: ToolRegistry) -> Self {
        Self {
            wire,
            settings,
            clients,
            tools,
        }
    }

    /// Number of client initializations started for this provider
    pub fn client_init_attempts(&self) -> u64 {
        self.clients.cell(self.wire.kind().as_str()).init_attempts()
    }

    async fn client(&self) -> Result<Arc<BackendClient>, ProviderError> {
        let kind = self.wire.kind();
        let api_key = self.settings.api_key.clone().filter(|k| !k.is_empty());
        let base_url = self
            .settings
            .endpoint
            .clone()
            .unwrap_or_else(|| self.wire.default_endpoint().to_string());
        let requires_key = self.wire.requires_api_key();

        self.clients
            .acquire(kind.as_str(), move || async move {
                if requires_key && api_key.is_none() {
                    return Err(ProviderError::client_init(kind.as_str(), "missing api key"));
                }
                let http = reqwest::Client::builder()
                    .connect_timeout(CONNECT_TIMEOUT)
                    .build()
                    .map_err(|e| ProviderError::client_init(kind.as_str(), e.to_string()))?;
                debug!(target: "provider", provider = %kind, base_url = %base_url, "Backend client ready");
                Ok(BackendClient {
                    http,
                    base_url,
                    api_key,
                })
            })
            .await
    }

    async fn exchange(
        &self,
        client: &BackendClient,
        model: &str,
        prepared: &PreparedConversation,
        config: &ProviderConfig,
    ) -> Result<ModelResponse, ProviderError> {
        let kind = self.wire.kind();
        let tools = if config.tool_calls_enabled {
            self.tools.definitions()
        } else {
            Vec::new()
        };
        let body = self.wire.build_body(model, prepared, config, &tools);

        let mut req = client.http.post(client.url(&self.wire.chat_path(model))).json(&body);
        for (name, value) in self.wire.auth_headers(client.api_key.as_deref()) {
            req = req.header(name, value);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ProviderError::backend(kind.as_str(), e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            if matches!(status.as_u16(), 401 | 403) {
                // Rejected credentials; rebuild the client on the next call
                self.clients.invalidate(kind.as_str());
            }
            let text = resp.text().await.unwrap_or_default();
            return Err(ProviderError::backend(
                kind.as_str(),
                format!("HTTP {}: {}", status.as_u16(), truncate(&text, 200)),
            ));
        }
        let json: Value = resp
            .json()
            .await
            .map_err(|e| ProviderError::backend(kind.as_str(), format!("invalid JSON: {e}")))?;
        let reply = self
            .wire
            .parse_reply(json)
            .map_err(|e| ProviderError::backend(kind.as_str(), e))?;

        let mut response = ModelResponse::success(
            reply.model.unwrap_or_else(|| model.to_string()),
            kind.as_str(),
            reply.text,
        )
        .with_usage(reply.usage);
        response.meta.finish_reason = reply.finish_reason;
        response.tool_calls = reply.tool_calls;
        Ok(response)
    }
}

#[async_trait]
impl<W: WireFormat> ProviderAdapter for HttpAdapter<W> {
    fn kind(&self) -> ProviderKind {
        self.wire.kind()
    }

    fn is_supported_model(&self, model: &str) -> bool {
        self.wire.is_supported_model(model)
    }

    fn default_model(&self) -> String {
        self.settings
            .model
            .clone()
            .unwrap_or_else(|| self.wire.default_model().to_string())
    }

    #[tracing::instrument(name = "provider.call", skip(self, messages, config), fields(provider = %self.wire.kind(), model = %model))]
    async fn call(
        &self,
        model: &str,
        messages: &[ChatMessage],
        config: &ProviderConfig,
    ) -> Result<ModelResponse, ProviderError> {
        let kind = self.wire.kind();
        let started = Instant::now();
        let prepared = prepare_messages(messages);
        let default_model;
        let model = if self.wire.is_supported_model(model) {
            model
        } else {
            default_model = self.default_model();
            debug!(target: "provider", provider = %kind, requested = %model, using = %default_model, "Unsupported model; using default");
            default_model.as_str()
        };

        let result = match self.client().await {
            Ok(client) => {
                race_timeout(kind, config.timeout_ms, self.exchange(&client, model, &prepared, config)).await
            }
            Err(e) => Err(e),
        };
        let duration_ms = started.elapsed().as_millis() as u64;

        match &result {
            Ok(r) => debug!(target: "provider", provider = %kind, duration_ms, tool_calls = r.tool_calls.len(), "Backend replied"),
            Err(e) => warn!(target: "provider", provider = %kind, duration_ms, error = %e, "Backend call failed"),
        }
        settle(result, model, kind, config).map(|r| r.with_duration_ms(duration_ms))
    }

    async fn health_check(&self) -> bool {
        let client = match self.client().await {
            Ok(c) => c,
            Err(e) => {
                debug!(target: "provider", provider = %self.wire.kind(), error = %e, "Health check: no client");
                return false;
            }
        };
        let mut req = client
            .http
            .get(client.url(self.wire.health_path()))
            .timeout(HEALTH_TIMEOUT);
        for (name, value) in self.wire.auth_headers(client.api_key.as_deref()) {
            req = req.header(name, value);
        }
        match req.send().await {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                debug!(target: "provider", provider = %self.wire.kind(), error = %e, "Health check failed");
                false
            }
        }
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::wire::{OllamaWire, OpenAiWire};

    fn adapter<W: WireFormat>(wire: W, settings: ProviderSettings) -> HttpAdapter<W> {
        HttpAdapter::new(wire, settings, Arc::new(ClientRegistry::new()), ToolRegistry::new())
    }

    #[tokio::test]
    async fn missing_key_is_a_client_init_error() {
        let a = adapter(OpenAiWire, ProviderSettings::default());
        let err = a
            .call("gpt-4o-mini", &[ChatMessage::user("hi")], &ProviderConfig::default())
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::ClientInit { .. }), "{err}");
        assert!(!a.health_check().await);
    }

    #[tokio::test]
    async fn missing_key_folds_into_failed_response_when_asked() {
        let a = adapter(OpenAiWire, ProviderSettings::default());
        let config = ProviderConfig {
            fallback_on_error: true,
            ..Default::default()
        };
        let response = a.call("gpt-4o-mini", &[ChatMessage::user("hi")], &config).await.unwrap();
        assert!(!response.success);
        assert!(response.is_consistent());
        assert_eq!(response.provider, "openai");
    }

    #[test]
    fn default_model_prefers_settings() {
        let a = adapter(OllamaWire, ProviderSettings::default());
        assert_eq!(a.default_model(), "llama3.1");
        let b = adapter(
            OllamaWire,
            ProviderSettings {
                model: Some("qwen2.5:7b".into()),
                ..Default::default()
            },
        );
        assert_eq!(b.default_model(), "qwen2.5:7b");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo", 2), "hé");
        assert_eq!(truncate("hi", 10), "hi");
    }
}
