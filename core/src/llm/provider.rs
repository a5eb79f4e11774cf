//! Provider adapter capability interface
//!
//! Every backend (network or local) implements `ProviderAdapter` once and is
//! registered in the orchestrator's adapter map keyed by `ProviderKind`.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;

use super::error::ProviderError;
use super::kind::ProviderKind;
use super::options::ProviderConfig;
use crate::message::{ChatMessage, ModelResponse};

#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    /// Whether `model` can be sent to this backend as-is
    fn is_supported_model(&self, model: &str) -> bool;

    /// Model used when the requested one is not supported
    fn default_model(&self) -> String;

    /// Run one chat exchange.
    ///
    /// Errors are returned only when `config.fallback_on_error` is false;
    /// otherwise they become a `success=false` response.
    async fn call(
        &self,
        model: &str,
        messages: &[ChatMessage],
        config: &ProviderConfig,
    ) -> Result<ModelResponse, ProviderError>;

    /// Cheap liveness probe; never errors
    async fn health_check(&self) -> bool;
}

/// Race `fut` against a timer of `timeout_ms`; losing the race is a `ProviderError::Timeout`.
pub async fn race_timeout<T, F>(provider: ProviderKind, timeout_ms: u64, fut: F) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(Duration::from_millis(timeout_ms), fut).await {
        Ok(res) => res,
        Err(_) => Err(ProviderError::Timeout {
            provider: provider.as_str().to_string(),
            timeout_ms,
        }),
    }
}

/// Adapter-level failure conversion: either surface the error or fold it
/// into a `success=false` response.
pub fn settle(
    result: Result<ModelResponse, ProviderError>,
    model: &str,
    provider: ProviderKind,
    config: &ProviderConfig,
) -> Result<ModelResponse, ProviderError> {
    match result {
        Err(e) if config.fallback_on_error => Ok(ModelResponse::failure(
            model,
            provider.as_str(),
            format!("{} request failed", provider),
            e.to_string(),
        )),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn race_timeout_rejects_a_call_that_never_settles() {
        let started = tokio::time::Instant::now();
        let res: Result<(), _> =
            race_timeout(ProviderKind::OpenAi, 200, std::future::pending()).await;
        let err = res.unwrap_err();
        assert!(err.is_timeout());
        assert!(err.to_string().contains("200 ms"));
        assert!(started.elapsed() >= Duration::from_millis(200));
        assert!(started.elapsed() < Duration::from_millis(300));
    }

    #[tokio::test]
    async fn race_timeout_passes_through_a_fast_result() {
        let res = race_timeout(ProviderKind::Local, 1_000, async { Ok::<_, ProviderError>(7) }).await;
        assert_eq!(res.unwrap(), 7);
    }

    #[test]
    fn settle_folds_errors_only_when_asked() {
        let err = || Err(ProviderError::backend("openai", "503"));
        let strict = ProviderConfig::default();
        assert!(settle(err(), "gpt", ProviderKind::OpenAi, &strict).is_err());

        let lenient = ProviderConfig {
            fallback_on_error: true,
            ..Default::default()
        };
        let response = settle(err(), "gpt", ProviderKind::OpenAi, &lenient).unwrap();
        assert!(!response.success);
        assert_eq!(response.provider, "openai");
        assert!(response.errors[0].contains("503"));
    }
}
