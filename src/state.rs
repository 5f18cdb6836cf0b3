use std::sync::Arc;

use crate::auth::JwtManager;
use crate::services::{ChatService, UserService};

#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ChatService>,
    pub users: Arc<UserService>,
    pub jwt: Arc<JwtManager>,
}
