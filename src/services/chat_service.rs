//! Conversation engine: answers a user's question against the model provider
//! and serves the cached history projection.

use std::sync::Arc;
use tracing::{error, warn};

use crate::domain::conversation::{
    conversation_key, history_key, ConversationState, Role, BOT_NAME, CACHE_TTL,
};
use crate::domain::{HistoryEntry, NewChatMessage};
use crate::error::ServiceError;
use crate::repository::{CacheStore, ChatRepository, UserRepository};
use crate::services::llm::ModelClient;

/// Stateless orchestrator; all conversational state lives in the external
/// stores, so one instance is shared across request tasks.
pub struct ChatService {
    user_repo: Arc<dyn UserRepository>,
    chat_repo: Arc<dyn ChatRepository>,
    cache: Arc<dyn CacheStore>,
    model: Arc<dyn ModelClient>,
    model_name: String,
}

impl ChatService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        chat_repo: Arc<dyn ChatRepository>,
        cache: Arc<dyn CacheStore>,
        model: Arc<dyn ModelClient>,
        model_name: String,
    ) -> Self {
        Self {
            user_repo,
            chat_repo,
            cache,
            model,
            model_name,
        }
    }

    /// Answer one question for the given user.
    ///
    /// Resumes the cached conversation when one exists, otherwise rebuilds
    /// one from persisted history. The exchange is persisted as a user/bot
    /// row pair in a single transaction, after which the history projection
    /// is invalidated.
    pub async fn answer_question(
        &self,
        user_id: i64,
        question: &str,
    ) -> Result<String, ServiceError> {
        let user = self
            .user_repo
            .get_by_id(user_id)
            .await?
            .ok_or(ServiceError::UserNotFound)?;

        let key = conversation_key(user_id);
        let cached = match self.cache.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Conversation cache read failed, treating as miss: {}", e);
                None
            }
        };

        let mut conversation = match cached {
            Some(raw) if !raw.is_empty() => {
                // A cached conversation always wins over the persisted record;
                // a payload that no longer decodes points at a caching bug and
                // aborts the call instead of being silently re-derived.
                let mut state: ConversationState = serde_json::from_str(&raw)
                    .map_err(|e| ServiceError::CacheCorrupt(e.to_string()))?;
                state.push(Role::User, question);
                state
            }
            _ => {
                let history = self.chat_repo.get_messages_by_user(user_id).await?;
                let mut state = ConversationState::opening(&self.model_name);
                // Every stored row is replayed as a user turn, bot replies
                // included.
                for row in &history {
                    state.push(Role::User, &row.message);
                }
                state.push(Role::User, question);
                state
            }
        };

        let reply = self.model.generate(&conversation).await?;
        conversation.push_message(reply.clone());

        // Write-through of the updated state; a failure here must not mask
        // the answer we already hold.
        match serde_json::to_string(&conversation) {
            Ok(payload) => {
                if let Err(e) = self.cache.set(&key, &payload, CACHE_TTL).await {
                    warn!("Failed to cache conversation state: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode conversation state: {}", e),
        }

        let answer = reply.content;

        let pair = [
            NewChatMessage {
                user_id,
                name: user.name.clone(),
                message: question.to_string(),
            },
            NewChatMessage {
                user_id,
                name: BOT_NAME.to_string(),
                message: answer.clone(),
            },
        ];

        let mut tx = self.chat_repo.begin().await?;
        for row in &pair {
            if let Err(e) = tx.insert(row).await {
                if let Err(rb) = tx.rollback().await {
                    error!("Rollback failed: {}", rb);
                }
                return Err(e);
            }
        }
        tx.commit().await?;

        if let Err(e) = self.cache.delete(&history_key(user_id)).await {
            warn!("Failed to invalidate history cache: {}", e);
        }

        Ok(answer)
    }

    /// Serve the display history for a user, newest first, first page.
    /// Cache-backed; rebuilt lazily from the store on a miss.
    pub async fn history(&self, user_id: i64) -> Result<Vec<HistoryEntry>, ServiceError> {
        let key = history_key(user_id);
        let cached = match self.cache.get(&key).await {
            Ok(value) => value,
            Err(e) => {
                warn!("History cache read failed, treating as miss: {}", e);
                None
            }
        };

        match cached {
            Some(raw) if !raw.is_empty() => {
                serde_json::from_str(&raw).map_err(|e| ServiceError::CacheCorrupt(e.to_string()))
            }
            _ => {
                let rows = self.chat_repo.get_history_by_user(user_id).await?;
                let entries: Vec<HistoryEntry> =
                    rows.into_iter().map(HistoryEntry::from).collect();

                match serde_json::to_string(&entries) {
                    Ok(payload) => {
                        if let Err(e) = self.cache.set(&key, &payload, CACHE_TTL).await {
                            warn!("Failed to cache history view: {}", e);
                        }
                    }
                    Err(e) => warn!("Failed to encode history view: {}", e),
                }

                Ok(entries)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::{ConversationMessage, SYSTEM_PREAMBLE};
    use crate::domain::{ChatMessage, User};
    use crate::repository::cache::MockCacheStore;
    use crate::repository::chat_repository::{MockChatRepository, MockChatTransaction};
    use crate::repository::user_repository::MockUserRepository;
    use crate::services::llm::MockModelClient;
    use chrono::Utc;
    use mockall::predicate::eq;
    use mockall::Sequence;

    const MODEL: &str = "gpt-3.5-turbo";
    const QUESTION: &str = "bagaimana cara memasak nasi goreng?";
    const ANSWER: &str = "cara memasak nasi goreng: panaskan minyak terlebih dahulu";

    fn test_user() -> User {
        User {
            id: 1,
            email: "testing@mail.com".to_string(),
            password: "$2b$12$hash".to_string(),
            name: "testing".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn stored_message(id: i64, name: &str, message: &str) -> ChatMessage {
        ChatMessage {
            id,
            user_id: 1,
            name: name.to_string(),
            message: message.to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            deleted_at: None,
        }
    }

    fn service(
        user_repo: MockUserRepository,
        chat_repo: MockChatRepository,
        cache: MockCacheStore,
        model: MockModelClient,
    ) -> ChatService {
        ChatService::new(
            Arc::new(user_repo),
            Arc::new(chat_repo),
            Arc::new(cache),
            Arc::new(model),
            MODEL.to_string(),
        )
    }

    fn assistant(content: &str) -> ConversationMessage {
        ConversationMessage {
            role: Role::Assistant,
            content: content.to_string(),
        }
    }

    fn successful_pair_tx() -> MockChatTransaction {
        let mut tx = MockChatTransaction::new();
        tx.expect_insert()
            .times(2)
            .withf(|row: &NewChatMessage| {
                (row.name == "testing" && row.message == QUESTION)
                    || (row.name == BOT_NAME && row.message == ANSWER)
            })
            .returning(|_| Ok(()));
        tx.expect_commit().times(1).returning(|| Ok(()));
        tx
    }

    #[tokio::test]
    async fn unknown_user_fails_without_touching_store_or_cache() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_get_by_id()
            .with(eq(7))
            .returning(|_| Ok(None));

        // No expectations on the other collaborators: any call panics.
        let svc = service(
            user_repo,
            MockChatRepository::new(),
            MockCacheStore::new(),
            MockModelClient::new(),
        );

        let err = svc.answer_question(7, QUESTION).await.unwrap_err();
        assert!(matches!(err, ServiceError::UserNotFound));
    }

    #[tokio::test]
    async fn cache_miss_rebuilds_from_history_and_persists_the_exchange() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_get_by_id()
            .with(eq(1))
            .returning(|_| Ok(Some(test_user())));

        let mut cache = MockCacheStore::new();
        cache
            .expect_get()
            .withf(|key: &str| key == "ChatBot_1")
            .returning(|_| Ok(None));
        cache
            .expect_set()
            .times(1)
            .withf(|key: &str, value: &str, ttl: &std::time::Duration| {
                let state: ConversationState = serde_json::from_str(value).unwrap();
                key == "ChatBot_1"
                    && *ttl == CACHE_TTL
                    && state.messages.len() == 4
                    && state.messages[3] == assistant(ANSWER)
            })
            .returning(|_, _, _| Ok(()));
        cache
            .expect_delete()
            .times(1)
            .withf(|key: &str| key == "getHistory_1")
            .returning(|_| Ok(()));

        let mut chat_repo = MockChatRepository::new();
        chat_repo
            .expect_get_messages_by_user()
            .with(eq(1))
            .returning(|_| Ok(vec![stored_message(1, "testing", "testing")]));
        let tx = successful_pair_tx();
        chat_repo
            .expect_begin()
            .return_once(move || Ok(Box::new(tx)));

        let mut model = MockModelClient::new();
        model
            .expect_generate()
            .withf(|req: &ConversationState| {
                req.model == MODEL
                    && req.messages.len() == 3
                    && req.messages[0].role == Role::System
                    && req.messages[0].content == SYSTEM_PREAMBLE
                    && req.messages[1].role == Role::User
                    && req.messages[1].content == "testing"
                    && req.messages[2].role == Role::User
                    && req.messages[2].content == QUESTION
            })
            .return_once(|_| Ok(assistant(ANSWER)));

        let svc = service(user_repo, chat_repo, cache, model);
        let answer = svc.answer_question(1, QUESTION).await.unwrap();
        assert_eq!(answer, ANSWER);
    }

    #[tokio::test]
    async fn cached_conversation_wins_over_persisted_history() {
        let mut prior = ConversationState::opening(MODEL);
        prior.push(Role::User, "halo");
        prior.push(Role::Assistant, "hai, ada yang bisa dibantu?");
        let payload = serde_json::to_string(&prior).unwrap();

        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_get_by_id()
            .with(eq(1))
            .returning(|_| Ok(Some(test_user())));

        let mut cache = MockCacheStore::new();
        cache
            .expect_get()
            .withf(|key: &str| key == "ChatBot_1")
            .return_once(move |_| Ok(Some(payload)));
        cache.expect_set().times(1).returning(|_, _, _| Ok(()));
        cache.expect_delete().times(1).returning(|_| Ok(()));

        // get_messages_by_user must not be called on a cache hit.
        let mut chat_repo = MockChatRepository::new();
        let tx = successful_pair_tx();
        chat_repo
            .expect_begin()
            .return_once(move || Ok(Box::new(tx)));

        let mut model = MockModelClient::new();
        model
            .expect_generate()
            .withf(|req: &ConversationState| {
                req.messages.len() == 4
                    && req.messages[2].role == Role::Assistant
                    && req.messages[3].role == Role::User
                    && req.messages[3].content == QUESTION
            })
            .return_once(|_| Ok(assistant(ANSWER)));

        let svc = service(user_repo, chat_repo, cache, model);
        let answer = svc.answer_question(1, QUESTION).await.unwrap();
        assert_eq!(answer, ANSWER);
    }

    #[tokio::test]
    async fn corrupt_cached_conversation_aborts_before_any_write() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_get_by_id()
            .with(eq(1))
            .returning(|_| Ok(Some(test_user())));

        let mut cache = MockCacheStore::new();
        cache
            .expect_get()
            .withf(|key: &str| key == "ChatBot_1")
            .returning(|_| Ok(Some("{not valid json".to_string())));

        let svc = service(
            user_repo,
            MockChatRepository::new(),
            cache,
            MockModelClient::new(),
        );

        let err = svc.answer_question(1, QUESTION).await.unwrap_err();
        assert!(matches!(err, ServiceError::CacheCorrupt(_)));
    }

    #[tokio::test]
    async fn insert_failure_rolls_back_and_reports_storage() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_get_by_id()
            .with(eq(1))
            .returning(|_| Ok(Some(test_user())));

        let mut cache = MockCacheStore::new();
        cache.expect_get().returning(|_| Ok(None));
        cache.expect_set().returning(|_, _, _| Ok(()));
        // History key must not be invalidated on a failed transaction.

        let mut chat_repo = MockChatRepository::new();
        chat_repo
            .expect_get_messages_by_user()
            .returning(|_| Ok(vec![]));

        let mut tx = MockChatTransaction::new();
        let mut seq = Sequence::new();
        tx.expect_insert()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(()));
        tx.expect_insert()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Err(ServiceError::Storage("insert failed".to_string())));
        tx.expect_rollback()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        chat_repo
            .expect_begin()
            .return_once(move || Ok(Box::new(tx)));

        let mut model = MockModelClient::new();
        model.expect_generate().return_once(|_| Ok(assistant(ANSWER)));

        let svc = service(user_repo, chat_repo, cache, model);
        let err = svc.answer_question(1, QUESTION).await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
    }

    #[tokio::test]
    async fn commit_failure_reports_storage_and_keeps_history_cache() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_get_by_id()
            .with(eq(1))
            .returning(|_| Ok(Some(test_user())));

        let mut cache = MockCacheStore::new();
        cache.expect_get().returning(|_| Ok(None));
        cache.expect_set().returning(|_, _, _| Ok(()));

        let mut chat_repo = MockChatRepository::new();
        chat_repo
            .expect_get_messages_by_user()
            .returning(|_| Ok(vec![]));

        let mut tx = MockChatTransaction::new();
        tx.expect_insert().times(2).returning(|_| Ok(()));
        tx.expect_commit()
            .times(1)
            .returning(|| Err(ServiceError::Storage("commit failed".to_string())));
        chat_repo
            .expect_begin()
            .return_once(move || Ok(Box::new(tx)));

        let mut model = MockModelClient::new();
        model.expect_generate().return_once(|_| Ok(assistant(ANSWER)));

        let svc = service(user_repo, chat_repo, cache, model);
        let err = svc.answer_question(1, QUESTION).await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
    }

    #[tokio::test]
    async fn conversation_cache_write_failure_does_not_mask_the_answer() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_get_by_id()
            .with(eq(1))
            .returning(|_| Ok(Some(test_user())));

        let mut cache = MockCacheStore::new();
        cache.expect_get().returning(|_| Ok(None));
        cache
            .expect_set()
            .returning(|_, _, _| Err(ServiceError::Storage("redis down".to_string())));
        cache.expect_delete().times(1).returning(|_| Ok(()));

        let mut chat_repo = MockChatRepository::new();
        chat_repo
            .expect_get_messages_by_user()
            .returning(|_| Ok(vec![]));
        let tx = successful_pair_tx();
        chat_repo
            .expect_begin()
            .return_once(move || Ok(Box::new(tx)));

        let mut model = MockModelClient::new();
        model.expect_generate().return_once(|_| Ok(assistant(ANSWER)));

        let svc = service(user_repo, chat_repo, cache, model);
        let answer = svc.answer_question(1, QUESTION).await.unwrap();
        assert_eq!(answer, ANSWER);
    }

    #[tokio::test]
    async fn model_failure_persists_nothing() {
        let mut user_repo = MockUserRepository::new();
        user_repo
            .expect_get_by_id()
            .with(eq(1))
            .returning(|_| Ok(Some(test_user())));

        let mut cache = MockCacheStore::new();
        cache.expect_get().returning(|_| Ok(None));

        let mut chat_repo = MockChatRepository::new();
        chat_repo
            .expect_get_messages_by_user()
            .returning(|_| Ok(vec![]));

        let mut model = MockModelClient::new();
        model
            .expect_generate()
            .return_once(|_| Err(ServiceError::Upstream("model unavailable".to_string())));

        let svc = service(user_repo, chat_repo, cache, model);
        let err = svc.answer_question(1, QUESTION).await.unwrap_err();
        assert!(matches!(err, ServiceError::Upstream(_)));
    }

    #[tokio::test]
    async fn cached_history_is_returned_verbatim() {
        let mut cache = MockCacheStore::new();
        cache
            .expect_get()
            .withf(|key: &str| key == "getHistory_1")
            .returning(|_| {
                Ok(Some(
                    r#"[{"id":1,"name":"testing","message":"testing"}]"#.to_string(),
                ))
            });

        // The store must not be touched on a cache hit.
        let svc = service(
            MockUserRepository::new(),
            MockChatRepository::new(),
            cache,
            MockModelClient::new(),
        );

        let entries = svc.history(1).await.unwrap();
        assert_eq!(
            entries,
            vec![HistoryEntry {
                id: 1,
                name: "testing".to_string(),
                message: "testing".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn history_miss_reads_the_store_and_populates_the_cache() {
        let mut cache = MockCacheStore::new();
        cache.expect_get().returning(|_| Ok(None));
        cache
            .expect_set()
            .times(1)
            .withf(|key: &str, value: &str, ttl: &std::time::Duration| {
                let entries: Vec<HistoryEntry> = serde_json::from_str(value).unwrap();
                key == "getHistory_1"
                    && *ttl == CACHE_TTL
                    && entries.len() == 2
                    && entries[0].id == 2
            })
            .returning(|_, _, _| Ok(()));

        let mut chat_repo = MockChatRepository::new();
        chat_repo
            .expect_get_history_by_user()
            .with(eq(1))
            .returning(|_| {
                Ok(vec![
                    stored_message(2, BOT_NAME, ANSWER),
                    stored_message(1, "testing", QUESTION),
                ])
            });

        let svc = service(
            MockUserRepository::new(),
            chat_repo,
            cache,
            MockModelClient::new(),
        );

        let entries = svc.history(1).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, BOT_NAME);
        assert_eq!(entries[1].message, QUESTION);
    }

    #[tokio::test]
    async fn history_store_error_caches_nothing() {
        let mut cache = MockCacheStore::new();
        cache.expect_get().returning(|_| Ok(None));

        let mut chat_repo = MockChatRepository::new();
        chat_repo
            .expect_get_history_by_user()
            .returning(|_| Err(ServiceError::Storage("db down".to_string())));

        let svc = service(
            MockUserRepository::new(),
            chat_repo,
            cache,
            MockModelClient::new(),
        );

        let err = svc.history(1).await.unwrap_err();
        assert!(matches!(err, ServiceError::Storage(_)));
    }

    #[tokio::test]
    async fn corrupt_history_cache_fails_without_store_fallback() {
        let mut cache = MockCacheStore::new();
        cache
            .expect_get()
            .returning(|_| Ok(Some("[not json".to_string())));

        let svc = service(
            MockUserRepository::new(),
            MockChatRepository::new(),
            cache,
            MockModelClient::new(),
        );

        let err = svc.history(1).await.unwrap_err();
        assert!(matches!(err, ServiceError::CacheCorrupt(_)));
    }

    #[tokio::test]
    async fn history_cache_read_error_falls_back_to_the_store() {
        let mut cache = MockCacheStore::new();
        cache
            .expect_get()
            .returning(|_| Err(ServiceError::Storage("redis down".to_string())));
        cache.expect_set().returning(|_, _, _| Ok(()));

        let mut chat_repo = MockChatRepository::new();
        chat_repo
            .expect_get_history_by_user()
            .returning(|_| Ok(vec![stored_message(1, "testing", QUESTION)]));

        let svc = service(
            MockUserRepository::new(),
            chat_repo,
            cache,
            MockModelClient::new(),
        );

        let entries = svc.history(1).await.unwrap();
        assert_eq!(entries.len(), 1);
    }
}
