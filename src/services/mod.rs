pub mod chat_service;
pub mod llm;
pub mod user_service;

pub use chat_service::ChatService;
pub use llm::{ModelClient, OpenAiChatClient};
pub use user_service::UserService;
