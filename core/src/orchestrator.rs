//! Chat orchestrator: provider dispatch, tool phase, and the fallback cascade.
//!
//! `handle_chat_request` never fails. A primary adapter error (or a
//! `success=false` reply) walks an ordered list of fallback strategies; the
//! last strategy is the deterministic responder, which cannot fail.

use std::collections::HashMap;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex, PoisonError};

use futures::future::join_all;
use futures::FutureExt;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::ChatConfig;
use crate::conversation::ConversationContext;
use crate::llm::{
    deterministic_response, error_response, AnthropicWire, ClientRegistry, GeminiWire, HttpAdapter,
    OllamaWire, OpenAiWire, ProviderAdapter, ProviderConfig, ProviderError, ProviderKind,
    ProviderOverrides, RuleBasedAdapter, SharedClients,
};
use crate::message::{ChatMessage, FallbackTier, ModelResponse};
use crate::tools::{ToolCallExtractor, ToolDefinition, ToolExecutor, ToolRegistry, WorkflowDefinition};

/// Request-scoped options for `handle_chat_request`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Provider name; unknown or missing names use the configured active provider
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default, flatten)]
    pub overrides: ProviderOverrides,
}

impl ChatOptions {
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    pub fn with_overrides(mut self, overrides: ProviderOverrides) -> Self {
        self.overrides = overrides;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderStatus {
    pub provider: String,
    pub available: bool,
}

/// Introspection snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSystemInfo {
    pub active_provider: ProviderKind,
    pub fallback_enabled: bool,
    pub fallback_provider: ProviderKind,
    pub tools: Vec<ToolDefinition>,
    pub workflows: Vec<WorkflowDefinition>,
}

/// Lightweight in-orchestrator counters for observability
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatStats {
    pub total_requests: u64,
    pub total_fallbacks: u64,
    pub total_deterministic_fallbacks: u64,
    pub total_tool_calls: u64,
    pub total_tool_errors: u64,
    pub avg_latency_ms: f64,
}

/// One tier of the fallback cascade
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackStrategy {
    /// Another adapter, normally the rule-based responder
    Secondary(ProviderKind),
    Deterministic,
}

impl FallbackStrategy {
    pub fn tier(&self) -> FallbackTier {
        match self {
            FallbackStrategy::Secondary(_) => FallbackTier::Secondary,
            FallbackStrategy::Deterministic => FallbackTier::Deterministic,
        }
    }
}

pub struct ChatOrchestrator {
    config: ChatConfig,
    adapters: HashMap<ProviderKind, Arc<dyn ProviderAdapter>>,
    executor: ToolExecutor,
    extractor: ToolCallExtractor,
    stats: Mutex<ChatStats>,
}

impl ChatOrchestrator {
    /// Build an orchestrator with every built-in adapter registered
    pub fn new(config: ChatConfig, registry: ToolRegistry) -> Self {
        let clients: SharedClients = Arc::new(ClientRegistry::new());
        let settings = |kind| config.providers.settings(kind);

        let adapters: Vec<Arc<dyn ProviderAdapter>> = vec![
            Arc::new(HttpAdapter::new(OpenAiWire, settings(ProviderKind::OpenAi), clients.clone(), registry.clone())),
            Arc::new(HttpAdapter::new(AnthropicWire, settings(ProviderKind::Anthropic), clients.clone(), registry.clone())),
            Arc::new(HttpAdapter::new(GeminiWire, settings(ProviderKind::Gemini), clients.clone(), registry.clone())),
            Arc::new(HttpAdapter::new(OllamaWire, settings(ProviderKind::Local), clients, registry.clone())),
            Arc::new(RuleBasedAdapter::new(registry.clone())),
        ];

        info!(
            target: "orchestrator",
            active = %config.active_provider,
            fallback_enabled = config.fallback_enabled,
            fallback = %config.fallback_provider,
            tools = registry.len(),
            "Chat orchestrator ready"
        );

        Self {
            adapters: adapters.into_iter().map(|a| (a.kind(), a)).collect(),
            executor: ToolExecutor::new(registry),
            extractor: ToolCallExtractor::new(),
            stats: Mutex::new(ChatStats::default()),
            config,
        }
    }

    /// Install or replace the adapter for `adapter.kind()`
    pub fn with_adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn with_tool_executor(mut self, executor: ToolExecutor) -> Self {
        self.executor = executor;
        self
    }

    pub fn config(&self) -> &ChatConfig {
        &self.config
    }

    pub fn registry(&self) -> &ToolRegistry {
        self.executor.registry()
    }

    /// Case-insensitive provider resolution; never fails
    pub fn normalize_provider(&self, name: Option<&str>) -> ProviderKind {
        let kind = ProviderKind::normalize(name, self.config.active_provider);
        if name.is_some() && kind == self.config.active_provider {
            debug!(target: "orchestrator", requested = ?name, resolved = %kind, "Provider resolved to active default");
        }
        kind
    }

    /// Run one chat exchange. Always returns a response.
    #[tracing::instrument(name = "orchestrator.handle_chat_request", skip(self, messages, options, ctx), fields(model = %model, provider))]
    pub async fn handle_chat_request(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ChatOptions,
        ctx: &mut ConversationContext,
    ) -> ModelResponse {
        let started = Instant::now();
        let primary = self.normalize_provider(options.provider.as_deref());
        tracing::Span::current().record("provider", primary.as_str());
        let call_config = self.call_config(primary, &options.overrides);

        let mut response = match self.call_adapter(primary, model, messages, &call_config).await {
            Ok(r) if r.success => r,
            Ok(r) => {
                let error = r.errors.join("; ");
                warn!(target: "orchestrator", provider = %primary, error = %error, "Provider returned a failed response");
                self.run_cascade(primary, model, messages, &options.overrides, error).await
            }
            Err(e) => {
                warn!(target: "orchestrator", provider = %primary, error = %e, "Provider call failed");
                self.run_cascade(primary, model, messages, &options.overrides, e.to_string()).await
            }
        };

        let tool_phase = call_config.tool_calls_enabled
            && response.success
            && response.meta.fallback_tier != Some(FallbackTier::Deterministic);
        if tool_phase {
            self.run_tool_phase(&mut response).await;
        }

        let duration_ms = started.elapsed().as_millis() as u64;
        response.duration_ms = duration_ms;
        ctx.update(messages, duration_ms);
        self.record(&response, duration_ms);

        info!(
            target: "orchestrator",
            provider = %response.provider,
            success = response.success,
            fallback = response.meta.fallback_used,
            tool_calls = response.tool_calls.len(),
            duration_ms,
            "Chat request settled"
        );
        response
    }

    /// Liveness of every registered adapter
    pub async fn get_provider_status(&self) -> Vec<ProviderStatus> {
        let kinds: Vec<ProviderKind> = ProviderKind::ALL
            .into_iter()
            .filter(|k| self.adapters.contains_key(k))
            .collect();
        let probes = kinds.iter().filter_map(|k| self.adapters.get(k)).map(|a| a.health_check());
        let results = join_all(probes).await;

        kinds
            .into_iter()
            .zip(results)
            .map(|(kind, available)| ProviderStatus {
                provider: kind.as_str().to_string(),
                available,
            })
            .collect()
    }

    pub fn get_chat_system_info(&self) -> ChatSystemInfo {
        ChatSystemInfo {
            active_provider: self.config.active_provider,
            fallback_enabled: self.config.fallback_enabled,
            fallback_provider: self.config.fallback_provider,
            tools: self.registry().definitions(),
            workflows: self.registry().workflows(),
        }
    }

    pub fn stats(&self) -> ChatStats {
        self.stats.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Fallback tiers tried, in order, after `primary` fails
    pub fn cascade(&self, primary: ProviderKind) -> Vec<FallbackStrategy> {
        if !self.config.fallback_enabled {
            return Vec::new();
        }
        let mut strategies = Vec::with_capacity(2);
        let secondary = self.config.fallback_provider;
        // The rule-based responder never falls back to itself; neither does a failed primary
        if primary != ProviderKind::Fallback && secondary != primary {
            strategies.push(FallbackStrategy::Secondary(secondary));
        }
        strategies.push(FallbackStrategy::Deterministic);
        strategies
    }

    fn call_config(&self, kind: ProviderKind, overrides: &ProviderOverrides) -> ProviderConfig {
        self.config.providers.settings(kind).call_config(overrides)
    }

    async fn call_adapter(
        &self,
        kind: ProviderKind,
        model: &str,
        messages: &[ChatMessage],
        config: &ProviderConfig,
    ) -> Result<ModelResponse, ProviderError> {
        let adapter = self
            .adapters
            .get(&kind)
            .ok_or_else(|| ProviderError::UnknownProvider(kind.to_string()))?;

        let model = if adapter.is_supported_model(model) {
            model.to_string()
        } else {
            let fallback_model = adapter.default_model();
            debug!(target: "orchestrator", provider = %kind, requested = %model, using = %fallback_model, "Model not supported; using adapter default");
            fallback_model
        };

        match AssertUnwindSafe(adapter.call(&model, messages, config)).catch_unwind().await {
            Ok(result) => result,
            Err(_) => Err(ProviderError::backend(kind.as_str(), "adapter panicked")),
        }
    }

    async fn run_cascade(
        &self,
        primary: ProviderKind,
        model: &str,
        messages: &[ChatMessage],
        overrides: &ProviderOverrides,
        error: String,
    ) -> ModelResponse {
        for strategy in self.cascade(primary) {
            match self.attempt(strategy, model, messages, overrides).await {
                Ok(mut response) => {
                    response.mark_fallback(strategy.tier(), primary.as_str(), &error);
                    info!(target: "orchestrator", original = %primary, tier = ?strategy.tier(), provider = %response.provider, "Fallback answered");
                    return response;
                }
                Err(e) => {
                    warn!(target: "orchestrator", tier = ?strategy.tier(), error = %e, "Fallback tier failed; trying next");
                }
            }
        }

        warn!(target: "orchestrator", provider = %primary, "Fallback disabled; returning error response");
        error_response(model, primary.as_str(), &error)
    }

    async fn attempt(
        &self,
        strategy: FallbackStrategy,
        model: &str,
        messages: &[ChatMessage],
        overrides: &ProviderOverrides,
    ) -> Result<ModelResponse, ProviderError> {
        match strategy {
            FallbackStrategy::Secondary(kind) => {
                let config = self.call_config(kind, overrides);
                let response = self.call_adapter(kind, model, messages, &config).await?;
                if response.success {
                    Ok(response)
                } else {
                    Err(ProviderError::backend(kind.as_str(), response.errors.join("; ")))
                }
            }
            FallbackStrategy::Deterministic => Ok(deterministic_response(model, messages)),
        }
    }

    /// Execute the reply's tool calls in order and append a summary block
    async fn run_tool_phase(&self, response: &mut ModelResponse) {
        // Rule-based replies already carry the calls found in the user message
        let rule_based = response.provider == ProviderKind::Fallback.as_str();
        if response.tool_calls.is_empty() && !rule_based {
            response.tool_calls = self.extractor.extract(&response.text);
        }
        if response.tool_calls.is_empty() {
            return;
        }
        for call in response.tool_calls.iter_mut().filter(|c| c.id.is_none()) {
            call.id = Some(new_call_id());
        }

        let mut lines = Vec::with_capacity(response.tool_calls.len());
        for call in &response.tool_calls {
            let result = self.executor.execute(&call.name, call.arguments.clone()).await;
            debug!(target: "orchestrator", tool = %call.name, success = result.success, runtime_ms = result.runtime_ms, "Tool finished");
            lines.push(result.summary_line());
            response.tool_results.push(result);
        }
        response.text = format!("{}\n\nTool results:\n{}", response.text.trim_end(), lines.join("\n"));
    }

    fn record(&self, response: &ModelResponse, duration_ms: u64) {
        let mut stats = self.stats.lock().unwrap_or_else(PoisonError::into_inner);
        stats.total_requests += 1;
        if response.meta.fallback_used {
            stats.total_fallbacks += 1;
        }
        if response.meta.fallback_tier == Some(FallbackTier::Deterministic) {
            stats.total_deterministic_fallbacks += 1;
        }
        stats.total_tool_calls += response.tool_results.len() as u64;
        stats.total_tool_errors += response.tool_results.iter().filter(|r| !r.success).count() as u64;

        let n = stats.total_requests as f64;
        stats.avg_latency_ms = ((stats.avg_latency_ms * (n - 1.0)) + duration_ms as f64) / n;
    }
}

fn new_call_id() -> String {
    format!("call_{}", uuid::Uuid::new_v4().simple())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn orchestrator(config: ChatConfig) -> ChatOrchestrator {
        ChatOrchestrator::new(config, ToolRegistry::new())
    }

    #[test]
    fn normalize_provider_never_fails() {
        let orch = orchestrator(ChatConfig {
            active_provider: ProviderKind::Anthropic,
            ..Default::default()
        });
        assert_eq!(orch.normalize_provider(None), ProviderKind::Anthropic);
        assert_eq!(orch.normalize_provider(Some("GEMINI")), ProviderKind::Gemini);
        assert_eq!(orch.normalize_provider(Some("nonsense")), ProviderKind::Anthropic);
        assert_eq!(orch.normalize_provider(Some("")), ProviderKind::Anthropic);
    }

    #[test]
    fn cascade_order_and_gates() {
        let orch = orchestrator(ChatConfig::default());
        assert_eq!(
            orch.cascade(ProviderKind::OpenAi),
            vec![
                FallbackStrategy::Secondary(ProviderKind::Fallback),
                FallbackStrategy::Deterministic
            ]
        );
        assert_eq!(orch.cascade(ProviderKind::Fallback), vec![FallbackStrategy::Deterministic]);

        let disabled = orchestrator(ChatConfig {
            fallback_enabled: false,
            ..Default::default()
        });
        assert!(disabled.cascade(ProviderKind::OpenAi).is_empty());
    }

    #[test]
    fn system_info_reflects_config() {
        let orch = orchestrator(ChatConfig::default());
        let info = orch.get_chat_system_info();
        assert_eq!(info.active_provider, ProviderKind::OpenAi);
        assert!(info.fallback_enabled);
        assert!(info.tools.is_empty());
    }

    #[tokio::test]
    async fn missing_credentials_fall_back_to_rule_based() {
        let orch = orchestrator(ChatConfig::default());
        let mut ctx = ConversationContext::new();
        let response = orch
            .handle_chat_request("gpt-4o-mini", &[ChatMessage::user("hello")], &ChatOptions::default(), &mut ctx)
            .await;

        assert!(response.success);
        assert_eq!(response.provider, "fallback");
        assert!(response.meta.fallback_used);
        assert_eq!(response.meta.original_provider.as_deref(), Some("openai"));
        assert_eq!(response.meta.fallback_tier, Some(FallbackTier::Secondary));
        assert!(response.meta.errors[0].contains("missing api key"));
        assert_eq!(ctx.turn_count, 1);
        assert_eq!(orch.stats().total_fallbacks, 1);
    }
}
