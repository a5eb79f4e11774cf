use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::message::{ChatMessage, Role};

/// Per-conversation bookkeeping updated after every exchange.
///
/// Owned by the caller's session and handed to the orchestrator by mutable
/// reference; it is never shared between conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub turn_count: u64,
    pub last_duration_ms: u64,
    pub total_duration_ms: u64,
    /// Number of messages seen in the most recent turn
    pub last_message_count: usize,
    pub updated_at: DateTime<Utc>,
}

impl Default for ConversationContext {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversationContext {
    pub fn new() -> Self {
        Self {
            turn_count: 0,
            last_duration_ms: 0,
            total_duration_ms: 0,
            last_message_count: 0,
            updated_at: Utc::now(),
        }
    }

    /// Record one exchange
    pub fn update(&mut self, messages: &[ChatMessage], duration_ms: u64) {
        self.turn_count += 1;
        self.last_duration_ms = duration_ms;
        self.total_duration_ms = self.total_duration_ms.saturating_add(duration_ms);
        self.last_message_count = messages.iter().filter(|m| m.role != Role::System).count();
        self.updated_at = Utc::now();
    }

    pub fn average_duration_ms(&self) -> f64 {
        if self.turn_count == 0 {
            return 0.0;
        }
        self.total_duration_ms as f64 / self.turn_count as f64
    }
}
