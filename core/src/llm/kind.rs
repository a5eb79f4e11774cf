use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::ProviderError;

/// The fixed set of adapters the orchestrator can dispatch to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Anthropic,
    Gemini,
    Local,
    /// Rule-based responder that never touches the network
    Fallback,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 5] = [
        ProviderKind::OpenAi,
        ProviderKind::Anthropic,
        ProviderKind::Gemini,
        ProviderKind::Local,
        ProviderKind::Fallback,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::OpenAi => "openai",
            ProviderKind::Anthropic => "anthropic",
            ProviderKind::Gemini => "gemini",
            ProviderKind::Local => "local",
            ProviderKind::Fallback => "fallback",
        }
    }

    /// Case-insensitive lookup that never fails: anything unrecognized maps to `default`
    pub fn normalize(name: Option<&str>, default: ProviderKind) -> ProviderKind {
        name.and_then(|n| n.parse().ok()).unwrap_or(default)
    }
}

impl FromStr for ProviderKind {
    type Err = ProviderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(ProviderKind::OpenAi),
            "anthropic" => Ok(ProviderKind::Anthropic),
            "gemini" => Ok(ProviderKind::Gemini),
            "local" | "ollama" => Ok(ProviderKind::Local),
            "fallback" => Ok(ProviderKind::Fallback),
            _ => Err(ProviderError::UnknownProvider(s.to_string())),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
