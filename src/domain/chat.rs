use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One persisted turn of a conversation. Created in user/bot pairs per
/// question-answer cycle and never updated afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub user_id: i64,
    /// Speaker: the user's display name or the fixed bot label.
    pub name: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewChatMessage {
    pub user_id: i64,
    pub name: String,
    pub message: String,
}

/// Display projection of a chat message, cached as the history view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub name: String,
    pub message: String,
}

impl From<ChatMessage> for HistoryEntry {
    fn from(row: ChatMessage) -> Self {
        HistoryEntry {
            id: row.id,
            name: row.name,
            message: row.message,
        }
    }
}
