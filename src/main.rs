use anyhow::Result;
use axum::{
    routing::{get, post},
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::info;

use chatbot_api::auth::JwtManager;
use chatbot_api::config::Settings;
use chatbot_api::handlers;
use chatbot_api::repository::{
    MySqlChatRepository, MySqlUserRepository, RedisCacheStore,
};
use chatbot_api::services::{ChatService, OpenAiChatClient, UserService};
use chatbot_api::state::AppState;
use chatbot_api::{database, repository, services};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,chatbot_api=debug".to_string()),
        )
        .with_target(true)
        .json()
        .init();

    info!("🚀 Starting chatbot API...");

    let settings = Settings::load()?;
    info!("✅ Configuration loaded");

    let pool = database::connect(&settings.database).await?;
    info!("✅ Database connection established");

    let cache = RedisCacheStore::connect(&settings.redis.url).await?;
    info!("✅ Redis connection established");

    let user_repo: Arc<dyn repository::UserRepository> =
        Arc::new(MySqlUserRepository::new(pool.clone()));
    let chat_repo: Arc<dyn repository::ChatRepository> =
        Arc::new(MySqlChatRepository::new(pool.clone()));
    let cache: Arc<dyn repository::CacheStore> = Arc::new(cache);
    let model: Arc<dyn services::ModelClient> =
        Arc::new(OpenAiChatClient::new(settings.llm.clone())?);

    let jwt = Arc::new(JwtManager::new(
        &settings.jwt.secret,
        settings.jwt.expiry_seconds,
    ));

    let state = AppState {
        chat: Arc::new(ChatService::new(
            user_repo.clone(),
            chat_repo,
            cache,
            model,
            settings.llm.model.clone(),
        )),
        users: Arc::new(UserService::new(user_repo, jwt.clone())),
        jwt,
    };

    let app = build_router(state, settings.server.request_timeout_seconds);

    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));
    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn build_router(state: AppState, request_timeout_seconds: u64) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/register", post(handlers::auth::register))
        .route("/login", post(handlers::auth::login))
        .route(
            "/chat",
            post(handlers::chat::ask).get(handlers::chat::history),
        )
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(Duration::from_secs(
            request_timeout_seconds,
        )))
}
