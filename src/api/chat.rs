//! Chat endpoints: turn processing, history, database diagnostics

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

use crate::services::chat::DatabaseStats;
use crate::services::{ChatError, ChatTurn};
use crate::AppState;

const MAX_QUESTION_LEN: usize = 2000;

/// Body of `POST /api/chat`.
///
/// `user_id` is accepted for forward compatibility but not persisted.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequest {
    pub question: String,
    pub session_id: Option<Uuid>,
    pub user_id: Option<String>,
}

/// Query parameters for `GET /api/chat/history`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryParams {
    pub session_id: Option<Uuid>,
    #[serde(default = "default_limit")]
    pub limit: i64,
}

fn default_limit() -> i64 {
    50
}

/// API-facing errors, mapped to status codes
#[derive(Debug)]
pub enum ApiError {
    /// 400 with the validation message
    Validation(String),
    /// 503, backend unavailability; the condition's message is exposed
    Unavailable(String),
    /// 500 with a fixed generic message (internal text never leaks)
    Internal,
}

impl From<ChatError> for ApiError {
    fn from(e: ChatError) -> Self {
        match e {
            ChatError::Unavailable(msg) => ApiError::Unavailable(msg),
            ChatError::Database(e) => {
                error!(error = %e, "Database fault during chat processing");
                ApiError::Internal
            }
            ChatError::Internal(msg) => {
                error!(error = %msg, "Internal fault during chat processing");
                ApiError::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "An unexpected error occurred while processing your request.".to_string(),
            ),
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}

/// POST /api/chat
pub async fn post_chat(
    State(state): State<AppState>,
    Json(request): Json<ChatRequest>,
) -> Result<Json<ChatTurn>, ApiError> {
    if request.question.is_empty() {
        return Err(ApiError::Validation("Question must not be empty".to_string()));
    }
    if request.question.chars().count() > MAX_QUESTION_LEN {
        return Err(ApiError::Validation(format!(
            "Question must be between 1 and {MAX_QUESTION_LEN} characters"
        )));
    }

    let turn = state
        .chat
        .process_chat_turn(&request.question, request.session_id)
        .await?;

    Ok(Json(turn))
}

/// GET /api/chat/history
pub async fn get_history(
    State(state): State<AppState>,
    Query(params): Query<HistoryParams>,
) -> Result<Json<Vec<ChatTurn>>, ApiError> {
    if !(1..=100).contains(&params.limit) {
        return Err(ApiError::Validation(
            "Limit must be between 1 and 100".to_string(),
        ));
    }

    let history = state
        .chat
        .conversation_history(params.session_id, params.limit)
        .await?;

    Ok(Json(history))
}

/// GET /api/chat/db-stats
pub async fn get_db_stats(
    State(state): State<AppState>,
) -> Result<Json<DatabaseStats>, ApiError> {
    let stats = state.chat.database_stats().await?;
    Ok(Json(stats))
}
