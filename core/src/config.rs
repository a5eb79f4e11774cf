//! Chat configuration: static defaults, environment overlay, TOML overlay.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::{ProviderConfig, ProviderKind, ProviderOverrides};

/// Top-level configuration consumed by the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Adapter used when a request names no provider or an unknown one
    pub active_provider: ProviderKind,
    pub fallback_enabled: bool,
    /// Adapter tried as the secondary conversational fallback
    pub fallback_provider: ProviderKind,
    pub providers: ProvidersConfig,
}

/// Per-adapter settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub openai: ProviderSettings,
    pub anthropic: ProviderSettings,
    pub gemini: ProviderSettings,
    pub local: ProviderSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderSettings {
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL; the adapter's public endpoint when unset
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Default model; the adapter's built-in default when unset
    #[serde(default)]
    pub model: Option<String>,
    pub timeout_ms: u64,
    pub max_tokens: u32,
    pub temperature: f32,
    pub tool_calls_enabled: bool,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        let call = ProviderConfig::default();
        Self {
            api_key: None,
            endpoint: None,
            model: None,
            timeout_ms: call.timeout_ms,
            max_tokens: call.max_tokens,
            temperature: call.temperature,
            tool_calls_enabled: call.tool_calls_enabled,
        }
    }
}

impl ProviderSettings {
    /// Call tunables for one request: these settings with `overrides` on top
    pub fn call_config(&self, overrides: &ProviderOverrides) -> ProviderConfig {
        ProviderConfig {
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            timeout_ms: self.timeout_ms,
            tool_calls_enabled: self.tool_calls_enabled,
            fallback_on_error: false,
        }
        .with_overrides(overrides)
    }

    fn apply_env(&mut self, prefix: &str) {
        if let Some(v) = env_var(&format!("{prefix}_API_KEY")) {
            self.api_key = Some(v);
        }
        if let Some(v) = env_var(&format!("{prefix}_ENDPOINT")) {
            self.endpoint = Some(v);
        }
        if let Some(v) = env_var(&format!("{prefix}_MODEL")) {
            self.model = Some(v);
        }
        if let Some(v) = env_parse(&format!("{prefix}_TIMEOUT_MS")) {
            self.timeout_ms = v;
        }
        if let Some(v) = env_parse(&format!("{prefix}_MAX_TOKENS")) {
            self.max_tokens = v;
        }
        if let Some(v) = env_parse(&format!("{prefix}_TEMPERATURE")) {
            self.temperature = v;
        }
        if let Some(v) = env_bool(&format!("{prefix}_TOOL_CALLS")) {
            self.tool_calls_enabled = v;
        }
    }
}

impl ProvidersConfig {
    /// Settings for `kind`; the rule-based fallback has no settings of its own
    pub fn settings(&self, kind: ProviderKind) -> ProviderSettings {
        match kind {
            ProviderKind::OpenAi => self.openai.clone(),
            ProviderKind::Anthropic => self.anthropic.clone(),
            ProviderKind::Gemini => self.gemini.clone(),
            ProviderKind::Local => self.local.clone(),
            ProviderKind::Fallback => ProviderSettings::default(),
        }
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            active_provider: ProviderKind::OpenAi,
            fallback_enabled: true,
            fallback_provider: ProviderKind::Fallback,
            providers: ProvidersConfig::default(),
        }
    }
}

impl ChatConfig {
    /// Static defaults overlaid with environment variables
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        if let Some(v) = env_var("CHAT_ACTIVE_PROVIDER") {
            cfg.active_provider = ProviderKind::normalize(Some(&v), cfg.active_provider);
        }
        if let Some(v) = env_bool("CHAT_FALLBACK_ENABLED") {
            cfg.fallback_enabled = v;
        }
        if let Some(v) = env_var("CHAT_FALLBACK_PROVIDER") {
            cfg.fallback_provider = ProviderKind::normalize(Some(&v), cfg.fallback_provider);
        }
        cfg.providers.openai.apply_env("OPENAI");
        cfg.providers.anthropic.apply_env("ANTHROPIC");
        cfg.providers.gemini.apply_env("GEMINI");
        cfg.providers.local.apply_env("OLLAMA");
        cfg
    }

    /// Load configuration from a TOML file (path via SWITCHBOARD_CONFIG or ./switchboard.toml),
    /// overlaying values onto env-driven defaults.
    pub fn load() -> Self {
        let path = std::env::var("SWITCHBOARD_CONFIG").unwrap_or_else(|_| "switchboard.toml".into());
        Self::from_env().overlay_file(Path::new(&path))
    }

    /// Overlay a TOML file; a missing or malformed file leaves `self` untouched
    pub fn overlay_file(self, path: &Path) -> Self {
        if !path.exists() {
            info!(target: "config", path = %path.display(), "No TOML config found; using defaults/env");
            return self;
        }
        let raw = match fs::read_to_string(path) {
            Ok(s) => s,
            Err(e) => {
                warn!(target: "config", error = %e, "Failed to read TOML; using defaults/env");
                return self;
            }
        };
        match self.clone().overlay_toml(&raw) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(target: "config", error = %e, "Failed to parse TOML; using defaults/env");
                self
            }
        }
    }

    pub fn overlay_toml(self, raw: &str) -> crate::Result<Self> {
        let overlay: ChatToml = toml::from_str(raw)?;
        Ok(overlay.overlay(self))
    }

    /// Static defaults with a TOML document overlaid
    pub fn from_toml_str(raw: &str) -> crate::Result<Self> {
        Self::default().overlay_toml(raw)
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    env_var(name).and_then(|v| v.parse().ok())
}

fn env_bool(name: &str) -> Option<bool> {
    env_var(name).and_then(|v| match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

// =========================
// TOML overlay definitions
// =========================

#[derive(Debug, Clone, Default, Deserialize)]
struct ChatToml {
    active_provider: Option<String>,
    fallback_enabled: Option<bool>,
    fallback_provider: Option<String>,
    openai: Option<ProviderToml>,
    anthropic: Option<ProviderToml>,
    gemini: Option<ProviderToml>,
    #[serde(alias = "ollama")]
    local: Option<ProviderToml>,
}

impl ChatToml {
    fn overlay(self, mut base: ChatConfig) -> ChatConfig {
        if let Some(v) = self.active_provider {
            base.active_provider = ProviderKind::normalize(Some(&v), base.active_provider);
        }
        if let Some(v) = self.fallback_enabled {
            base.fallback_enabled = v;
        }
        if let Some(v) = self.fallback_provider {
            base.fallback_provider = ProviderKind::normalize(Some(&v), base.fallback_provider);
        }
        if let Some(p) = self.openai {
            p.apply(&mut base.providers.openai);
        }
        if let Some(p) = self.anthropic {
            p.apply(&mut base.providers.anthropic);
        }
        if let Some(p) = self.gemini {
            p.apply(&mut base.providers.gemini);
        }
        if let Some(p) = self.local {
            p.apply(&mut base.providers.local);
        }
        base
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct ProviderToml {
    api_key: Option<String>,
    endpoint: Option<String>,
    model: Option<String>,
    timeout_ms: Option<u64>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    tool_calls_enabled: Option<bool>,
}

impl ProviderToml {
    fn apply(self, s: &mut ProviderSettings) {
        if let Some(v) = self.api_key.filter(|v| !v.is_empty()) {
            s.api_key = Some(v);
        }
        if let Some(v) = self.endpoint.filter(|v| !v.is_empty()) {
            s.endpoint = Some(v);
        }
        if let Some(v) = self.model.filter(|v| !v.is_empty()) {
            s.model = Some(v);
        }
        if let Some(v) = self.timeout_ms {
            s.timeout_ms = v;
        }
        if let Some(v) = self.max_tokens {
            s.max_tokens = v;
        }
        if let Some(v) = self.temperature {
            s.temperature = v;
        }
        if let Some(v) = self.tool_calls_enabled {
            s.tool_calls_enabled = v;
        }
    }
}
