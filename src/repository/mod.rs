pub mod cache;
pub mod chat_repository;
pub mod user_repository;

pub use cache::{CacheStore, RedisCacheStore};
pub use chat_repository::{ChatRepository, ChatTransaction, MySqlChatRepository};
pub use user_repository::{MySqlUserRepository, UserRepository};
