pub mod chat;
pub mod conversation;
pub mod user;

pub use chat::{ChatMessage, HistoryEntry, NewChatMessage};
pub use conversation::{ConversationMessage, ConversationState, Role};
pub use user::{NewUser, User};
