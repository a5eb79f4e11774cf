//! Last-resort responses that never touch the network and cannot fail.

use super::prepare::prepare_messages;
use crate::message::{ChatMessage, ModelResponse};

/// Provider name reported by the deterministic tier
pub const DETERMINISTIC_PROVIDER: &str = "deterministic";

const ECHO_LIMIT: usize = 120;

/// Canned reply for the tertiary fallback tier
pub fn deterministic_response(model: &str, messages: &[ChatMessage]) -> ModelResponse {
    let prepared = prepare_messages(messages);
    let text = match prepared.last_user_text().map(str::trim).filter(|t| !t.is_empty()) {
        Some(question) => format!(
            "I'm sorry, the assistant service is unavailable right now. Your message \"{}\" was received; please try again shortly.",
            clip(question, ECHO_LIMIT)
        ),
        None => "I'm sorry, the assistant service is unavailable right now. Please try again shortly.".to_string(),
    };
    ModelResponse::success(model, DETERMINISTIC_PROVIDER, text)
}

/// Response returned when the fallback cascade is disabled
pub fn error_response(model: &str, provider: &str, error: &str) -> ModelResponse {
    ModelResponse::failure(
        model,
        provider,
        format!("The {provider} provider could not answer this request: {error}"),
        error,
    )
}

fn clip(s: &str, max_chars: usize) -> String {
    let mut chars = s.chars();
    let head: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
