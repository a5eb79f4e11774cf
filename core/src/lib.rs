// Switchboard Core Library
// Multi-provider chat orchestration runtime

pub mod config;
pub mod conversation;
pub mod llm;
pub mod message;
pub mod orchestrator;
pub mod telemetry;
pub mod tools;

// Export core types
pub use config::{ChatConfig, ProviderSettings, ProvidersConfig};
pub use conversation::ConversationContext;
pub use llm::{ProviderAdapter, ProviderConfig, ProviderError, ProviderKind, ProviderOverrides};
pub use message::{
    ChatMessage, FallbackTier, ModelResponse, ResponseMeta, Role, TokenUsage, ToolCall, ToolCallSource,
};
pub use orchestrator::{
    ChatOptions, ChatOrchestrator, ChatStats, ChatSystemInfo, FallbackStrategy, ProviderStatus,
};
pub use telemetry::{init_tracing, TelemetryConfig};
pub use tools::{
    Tool, ToolDefinition, ToolError, ToolExecutor, ToolRegistry, ToolResult, WorkflowDefinition,
};

// Error types
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SwitchboardError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Provider error: {0}")]
    ProviderError(#[from] ProviderError),

    #[error("Tool error: {0}")]
    ToolError(#[from] ToolError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}
pub type Result<T> = std::result::Result<T, SwitchboardError>;
