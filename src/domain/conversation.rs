//! Cache-resident conversation state mirroring the wire request sent to the
//! model provider. The serialized form doubles as the next request body, so
//! the field names here are part of the cache payload format.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Opening system turn for every new conversation.
pub const SYSTEM_PREAMBLE: &str =
    "Halo! Perkenalkan aku adalah ChatBot Assistant. Bagimana aku bisa membantumu hari ini?";

/// Speaker label stored for bot replies.
pub const BOT_NAME: &str = "Bot";

/// Expiry applied to both cached projections.
pub const CACHE_TTL: Duration = Duration::from_secs(60 * 60);

/// Cache key for the in-flight conversation state. The literal prefix is
/// shared with other consumers of the store and must not change.
pub fn conversation_key(user_id: i64) -> String {
    format!("ChatBot_{user_id}")
}

/// Cache key for the display history projection. Same interop constraint.
pub fn history_key(user_id: i64) -> String {
    format!("getHistory_{user_id}")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

/// Ordered message sequence for one user: system preamble, then alternating
/// user/assistant turns. At most one lives in the cache per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationState {
    pub model: String,
    pub messages: Vec<ConversationMessage>,
}

impl ConversationState {
    /// A fresh conversation holding only the system preamble.
    pub fn opening(model: &str) -> Self {
        ConversationState {
            model: model.to_string(),
            messages: vec![ConversationMessage {
                role: Role::System,
                content: SYSTEM_PREAMBLE.to_string(),
            }],
        }
    }

    pub fn push(&mut self, role: Role, content: &str) {
        self.messages.push(ConversationMessage {
            role,
            content: content.to_string(),
        });
    }

    pub fn push_message(&mut self, message: ConversationMessage) {
        self.messages.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn opening_state_holds_only_the_preamble() {
        let state = ConversationState::opening("gpt-3.5-turbo");
        assert_eq!(state.model, "gpt-3.5-turbo");
        assert_eq!(state.messages.len(), 1);
        assert_eq!(state.messages[0].role, Role::System);
        assert_eq!(state.messages[0].content, SYSTEM_PREAMBLE);
    }

    #[test]
    fn cache_keys_keep_their_literal_prefixes() {
        assert_eq!(conversation_key(1), "ChatBot_1");
        assert_eq!(history_key(42), "getHistory_42");
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut state = ConversationState::opening("gpt-3.5-turbo");
        state.push(Role::User, "testing");
        state.push(Role::Assistant, "jawaban");

        let payload = serde_json::to_string(&state).unwrap();
        let decoded: ConversationState = serde_json::from_str(&payload).unwrap();
        assert_eq!(decoded, state);
    }

    #[test]
    fn roles_serialize_lowercase() {
        let payload = serde_json::to_string(&ConversationMessage {
            role: Role::Assistant,
            content: "ok".into(),
        })
        .unwrap();
        assert_eq!(payload, r#"{"role":"assistant","content":"ok"}"#);
    }
}
