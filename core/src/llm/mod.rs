//! Provider layer: adapter interface, per-vendor wire formats, single-flight
//! client cells, and the fallback responders.

pub mod client_cell;
pub mod error;
pub mod fallback;
pub mod http;
pub mod kind;
pub mod options;
pub mod prepare;
pub mod provider;
pub mod rule_based;
pub mod wire;

pub use client_cell::{ClientCell, ClientRegistry};
pub use error::ProviderError;
pub use fallback::{deterministic_response, error_response, DETERMINISTIC_PROVIDER};
pub use http::{BackendClient, HttpAdapter, SharedClients};
pub use kind::ProviderKind;
pub use options::{ProviderConfig, ProviderOverrides};
pub use prepare::{prepare_messages, PreparedConversation};
pub use provider::{race_timeout, settle, ProviderAdapter};
pub use rule_based::{RuleBasedAdapter, RULE_BASED_MODEL};
pub use wire::{AnthropicWire, BackendReply, GeminiWire, OllamaWire, OpenAiWire, WireFormat};
