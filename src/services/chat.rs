//! Chat turn orchestration
//!
//! One turn = insert the query (`Processing`), call the answer backend,
//! insert the response, mark the query terminal. On any fault the service
//! records a compensating `Failed`/`Error` pair instead of propagating, so a
//! turn always leaves behind either a persisted answer or a persisted error
//! record. The fault is only re-raised when the in-flight query row cannot be
//! located, which means the very first write failed.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::models::{QueryStatus, ResponseStatus};
use crate::db::queries::{self, NewResponse};
use crate::services::backend_client::{BackendClient, BackendError};

/// User-facing text stored and returned for a failed turn.
const APOLOGY_RESPONSE: &str =
    "Sorry, I encountered an error while processing your request. Please try again.";

/// Stored error descriptions are bounded by the schema.
const MAX_ERROR_MESSAGE_LEN: usize = 500;

/// Faults re-raised to the API layer when the degraded path cannot run.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Backend unavailability, surfaced as 503.
    #[error("{0}")]
    Unavailable(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Fault inside a turn, before the compensating writes have run.
#[derive(Debug, Error)]
enum TurnFault {
    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Completed chat turn, also the wire shape of `POST /api/chat` and history
/// entries.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatTurn {
    pub query_id: i64,
    pub question: String,
    pub response: String,
    pub question_timestamp: DateTime<Utc>,
    pub response_timestamp: DateTime<Utc>,
    pub processing_time_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    pub session_id: String,
}

/// Orchestrates persistence and backend calls for chat turns.
#[derive(Clone)]
pub struct ChatService {
    db: SqlitePool,
    backend: Arc<BackendClient>,
}

impl ChatService {
    pub fn new(db: SqlitePool, backend: Arc<BackendClient>) -> Self {
        Self { db, backend }
    }

    /// Process one chat turn. The caller has already validated the question
    /// (non-empty, at most 2000 chars).
    pub async fn process_chat_turn(
        &self,
        question: &str,
        session_id: Option<Uuid>,
    ) -> Result<ChatTurn, ChatError> {
        let started = Instant::now();
        let session_id = session_id.unwrap_or_else(Uuid::new_v4).to_string();

        info!(session_id = %session_id, "Processing chat turn");

        match self.run_turn(question, &session_id, started).await {
            Ok(turn) => Ok(turn),
            Err(fault) => self.complete_failed_turn(question, started, fault).await,
        }
    }

    /// Happy path: query row, backend call, response row, terminal status.
    async fn run_turn(
        &self,
        question: &str,
        session_id: &str,
        started: Instant,
    ) -> Result<ChatTurn, TurnFault> {
        let query = queries::insert_query(&self.db, question, session_id).await?;
        info!(query_id = query.query_id, "Saved user query");

        let reply = self.backend.send_chat_question(question).await?;

        let elapsed_ms = started.elapsed().as_millis() as i64;
        let sources_json = match &reply.sources {
            Some(sources) => Some(serde_json::to_string(sources)?),
            None => None,
        };

        let response = queries::insert_response(
            &self.db,
            NewResponse {
                query_id: query.query_id,
                response: &reply.response,
                processing_time_ms: elapsed_ms,
                sources: sources_json,
                status: ResponseStatus::Success,
                error_message: None,
            },
        )
        .await?;
        queries::update_query_status(&self.db, query.query_id, QueryStatus::Completed).await?;

        info!(
            query_id = query.query_id,
            processing_time_ms = elapsed_ms,
            "Chat turn completed"
        );

        Ok(ChatTurn {
            query_id: query.query_id,
            question: query.question,
            response: response.response,
            question_timestamp: query.timestamp,
            response_timestamp: response.timestamp,
            processing_time_ms: response.processing_time_ms,
            sources: reply.sources,
            status: response.status,
            error_message: None,
            session_id: session_id.to_string(),
        })
    }

    /// Compensating path: mark the in-flight query `Failed` and persist an
    /// `Error` response carrying the fault description. Re-raises only when
    /// no in-flight query exists.
    async fn complete_failed_turn(
        &self,
        question: &str,
        started: Instant,
        fault: TurnFault,
    ) -> Result<ChatTurn, ChatError> {
        let elapsed_ms = started.elapsed().as_millis() as i64;
        error!(error = %fault, "Chat turn failed");

        let Some(query) = queries::find_processing_query(&self.db, question).await? else {
            // First write never landed; nothing to compensate
            return Err(match fault {
                TurnFault::Backend(BackendError::Unavailable(_)) => {
                    ChatError::Unavailable(fault.to_string())
                }
                TurnFault::Backend(BackendError::BadFormat(msg)) => ChatError::Internal(msg),
                TurnFault::Database(e) => ChatError::Database(e),
                TurnFault::Serialize(e) => ChatError::Internal(e.to_string()),
            });
        };

        queries::update_query_status(&self.db, query.query_id, QueryStatus::Failed).await?;

        let mut error_message = fault.to_string();
        error_message.truncate(
            error_message
                .char_indices()
                .nth(MAX_ERROR_MESSAGE_LEN)
                .map(|(i, _)| i)
                .unwrap_or(error_message.len()),
        );

        let response = queries::insert_response(
            &self.db,
            NewResponse {
                query_id: query.query_id,
                response: APOLOGY_RESPONSE,
                processing_time_ms: elapsed_ms,
                sources: None,
                status: ResponseStatus::Error,
                error_message: Some(error_message.clone()),
            },
        )
        .await?;

        warn!(query_id = query.query_id, "Recorded degraded chat turn");

        Ok(ChatTurn {
            query_id: query.query_id,
            question: query.question,
            response: response.response,
            question_timestamp: query.timestamp,
            response_timestamp: response.timestamp,
            processing_time_ms: response.processing_time_ms,
            sources: None,
            status: response.status,
            error_message: Some(error_message),
            session_id: query.session_id,
        })
    }

    /// Most-recent-first conversation history, optionally scoped to one
    /// session. The caller bounds `limit` to 1..=100.
    pub async fn conversation_history(
        &self,
        session_id: Option<Uuid>,
        limit: i64,
    ) -> Result<Vec<ChatTurn>, ChatError> {
        let session = session_id.map(|s| s.to_string());
        let rows = queries::fetch_history(&self.db, session.as_deref(), limit).await?;

        let turns = rows
            .into_iter()
            .map(|row| {
                let sources = row.sources.as_deref().and_then(|json| {
                    serde_json::from_str::<Vec<String>>(json)
                        .map_err(|e| warn!(query_id = row.query_id, error = %e, "Unreadable sources column"))
                        .ok()
                });

                ChatTurn {
                    query_id: row.query_id,
                    question: row.question,
                    response: row.response.unwrap_or_default(),
                    question_timestamp: row.question_timestamp,
                    response_timestamp: row.response_timestamp.unwrap_or(row.question_timestamp),
                    processing_time_ms: row.processing_time_ms,
                    sources,
                    status: row
                        .response_status
                        .unwrap_or_else(|| QueryStatus::Pending.as_str().to_string()),
                    error_message: row.error_message,
                    session_id: row.session_id,
                }
            })
            .collect::<Vec<_>>();

        info!(count = turns.len(), "Retrieved conversation history");
        Ok(turns)
    }
}

/// Row counts and recent rows for operational diagnostics.
#[derive(Debug, Serialize)]
pub struct DatabaseStats {
    pub database_status: String,
    pub user_queries_count: i64,
    pub chatbot_responses_count: i64,
    pub recent_queries: Vec<crate::db::models::UserQuery>,
    pub recent_responses: Vec<crate::db::models::ChatbotResponse>,
}

impl ChatService {
    pub async fn database_stats(&self) -> Result<DatabaseStats, ChatError> {
        Ok(DatabaseStats {
            database_status: "Connected".to_string(),
            user_queries_count: queries::count_queries(&self.db).await?,
            chatbot_responses_count: queries::count_responses(&self.db).await?,
            recent_queries: queries::recent_queries(&self.db, 5).await?,
            recent_responses: queries::recent_responses(&self.db, 5).await?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;
    use std::time::Duration;

    async fn memory_pool() -> SqlitePool {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::query("PRAGMA foreign_keys = ON")
            .execute(&pool)
            .await
            .unwrap();
        crate::db::create_schema(&pool).await.unwrap();
        pool
    }

    fn service(pool: SqlitePool) -> ChatService {
        // Port 9 (discard) is never listening locally; turns against it take
        // the connection-failure fallback path.
        let backend =
            BackendClient::new("http://127.0.0.1:9", Duration::from_secs(1)).unwrap();
        ChatService::new(pool, Arc::new(backend))
    }

    #[tokio::test]
    async fn turn_with_unreachable_backend_completes_with_fallback() {
        let pool = memory_pool().await;
        let service = service(pool.clone());

        let turn = service
            .process_chat_turn("What is the refund policy?", None)
            .await
            .unwrap();

        assert!(turn.query_id > 0);
        assert_eq!(turn.status, "Success");
        assert!(turn
            .sources
            .as_ref()
            .unwrap()
            .contains(&crate::services::backend_client::FALLBACK_SOURCE.to_string()));
        // A session correlator was generated
        assert!(Uuid::parse_str(&turn.session_id).is_ok());

        let status: String =
            sqlx::query_scalar("SELECT status FROM user_queries WHERE query_id = ?")
                .bind(turn.query_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, "Completed");
    }

    #[tokio::test]
    async fn supplied_session_id_is_kept() {
        let pool = memory_pool().await;
        let service = service(pool);

        let session = Uuid::new_v4();
        let turn = service
            .process_chat_turn("hello", Some(session))
            .await
            .unwrap();
        assert_eq!(turn.session_id, session.to_string());
    }

    #[tokio::test]
    async fn history_reports_pending_for_unanswered_queries() {
        let pool = memory_pool().await;
        let service = service(pool.clone());

        queries::insert_query(&pool, "unanswered", "11111111-1111-1111-1111-111111111111")
            .await
            .unwrap();

        let history = service.conversation_history(None, 50).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, "Pending");
        assert_eq!(history[0].response, "");
        assert_eq!(
            history[0].response_timestamp,
            history[0].question_timestamp
        );
    }

    #[tokio::test]
    async fn sources_round_trip_through_persistence() {
        let pool = memory_pool().await;
        let service = service(pool.clone());

        let query = queries::insert_query(&pool, "q", "s").await.unwrap();
        let sources = vec!["policy.md".to_string(), "faq.md".to_string()];
        queries::insert_response(
            &pool,
            NewResponse {
                query_id: query.query_id,
                response: "answer",
                processing_time_ms: 42,
                sources: Some(serde_json::to_string(&sources).unwrap()),
                status: ResponseStatus::Success,
                error_message: None,
            },
        )
        .await
        .unwrap();

        let history = service.conversation_history(None, 50).await.unwrap();
        assert_eq!(history[0].sources.as_ref().unwrap(), &sources);
        assert_eq!(history[0].processing_time_ms, Some(42));
    }

    #[tokio::test]
    async fn stats_count_both_tables() {
        let pool = memory_pool().await;
        let service = service(pool.clone());

        service.process_chat_turn("q1", None).await.unwrap();
        let stats = service.database_stats().await.unwrap();

        assert_eq!(stats.database_status, "Connected");
        assert_eq!(stats.user_queries_count, 1);
        assert_eq!(stats.chatbot_responses_count, 1);
        assert_eq!(stats.recent_queries.len(), 1);
        assert_eq!(stats.recent_responses.len(), 1);
    }
}
