use thiserror::Error;

/// Errors raised by provider adapters.
///
/// `Clone` so that one in-flight client initialization can hand the same
/// failure to every caller waiting on it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProviderError {
    #[error("{provider} client initialization failed: {message}")]
    ClientInit { provider: String, message: String },

    #[error("{provider} request timed out after {timeout_ms} ms")]
    Timeout { provider: String, timeout_ms: u64 },

    #[error("{provider} backend error: {message}")]
    Backend { provider: String, message: String },

    #[error("unknown provider: {0}")]
    UnknownProvider(String),
}

impl ProviderError {
    pub fn client_init(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::ClientInit {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn backend(provider: impl Into<String>, message: impl Into<String>) -> Self {
        ProviderError::Backend {
            provider: provider.into(),
            message: message.into(),
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, ProviderError::Timeout { .. })
    }
}
