pub mod settings;

pub use settings::{DatabaseConfig, JwtConfig, LlmConfig, RedisConfig, ServerConfig, Settings};
