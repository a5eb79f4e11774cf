use switchboard_core::ChatConfig;

/// Console session settings layered on top of the core chat configuration
#[derive(Clone, Debug)]
pub struct ConsoleConfig {
    pub chat: ChatConfig,
    pub model: String,
    /// Provider name sent with every request; the configured active provider when unset
    pub provider: Option<String>,
    pub system_prompt: String,
}

impl ConsoleConfig {
    /// Core config (defaults + env + optional TOML overlay) plus console env vars
    pub fn load() -> Self {
        Self {
            chat: ChatConfig::load(),
            model: std::env::var("CONSOLE_MODEL")
                .ok()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "gpt-4o-mini".to_string()),
            provider: std::env::var("CONSOLE_PROVIDER").ok().filter(|s| !s.is_empty()),
            system_prompt: std::env::var("CONSOLE_SYSTEM_PROMPT").unwrap_or_else(|_| {
                "You are a concise assistant. To use a tool, write #TOOL: name(key=value).".into()
            }),
        }
    }
}
