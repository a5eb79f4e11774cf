use crate::message::{ChatMessage, Role};

/// Conversation normalized for a backend request
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreparedConversation {
    /// All system messages joined by blank lines, in order
    pub system: Option<String>,
    /// User/assistant turns in order, empty messages dropped
    pub turns: Vec<ChatMessage>,
}

impl PreparedConversation {
    /// Content of the most recent user turn
    pub fn last_user_text(&self) -> Option<&str> {
        self.turns
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Hoist system messages into one prompt and keep the remaining turns in order
pub fn prepare_messages(messages: &[ChatMessage]) -> PreparedConversation {
    let mut system_parts = Vec::new();
    let mut turns = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                if !message.content.trim().is_empty() {
                    system_parts.push(message.content.as_str());
                }
            }
            Role::User | Role::Assistant => {
                if !message.content.trim().is_empty() {
                    turns.push(message.clone());
                }
            }
        }
    }

    PreparedConversation {
        system: (!system_parts.is_empty()).then(|| system_parts.join("\n\n")),
        turns,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_messages_are_pooled_and_hoisted() {
        let messages = vec![
            ChatMessage::system("You are helpful."),
            ChatMessage::user("hi"),
            ChatMessage::system("Answer in English."),
            ChatMessage::assistant(""),
            ChatMessage::assistant("hello"),
            ChatMessage::user("stock?"),
        ];
        let prepared = prepare_messages(&messages);

        assert_eq!(
            prepared.system.as_deref(),
            Some("You are helpful.\n\nAnswer in English.")
        );
        let contents: Vec<&str> = prepared.turns.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["hi", "hello", "stock?"]);
        assert_eq!(prepared.last_user_text(), Some("stock?"));
    }

    #[test]
    fn no_system_messages_means_no_system_prompt() {
        let prepared = prepare_messages(&[ChatMessage::user("hi")]);
        assert!(prepared.system.is_none());
        assert_eq!(prepared.turns.len(), 1);
    }
}
