use serde::{Deserialize, Serialize};

/// Per-call tunables, derived from provider settings plus request overrides
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout_ms: u64,
    pub tool_calls_enabled: bool,
    /// Convert backend failures into a `success=false` response instead of an error
    pub fallback_on_error: bool,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            max_tokens: 1024,
            temperature: 0.7,
            timeout_ms: 30_000,
            tool_calls_enabled: true,
            fallback_on_error: false,
        }
    }
}

impl ProviderConfig {
    pub fn with_overrides(mut self, overrides: &ProviderOverrides) -> Self {
        if let Some(v) = overrides.max_tokens {
            self.max_tokens = v;
        }
        if let Some(v) = overrides.temperature {
            self.temperature = v;
        }
        if let Some(v) = overrides.timeout_ms {
            self.timeout_ms = v;
        }
        if let Some(v) = overrides.tool_calls_enabled {
            self.tool_calls_enabled = v;
        }
        if let Some(v) = overrides.fallback_on_error {
            self.fallback_on_error = v;
        }
        self
    }
}

/// Request-scoped overrides; unset fields keep the configured value
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProviderOverrides {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_ms: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls_enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_on_error: Option<bool>,
}
