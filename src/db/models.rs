//! Database models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Lifecycle of a persisted user question.
///
/// `Pending -> Processing -> Completed | Failed`; a query reaches exactly one
/// terminal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QueryStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl QueryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryStatus::Pending => "Pending",
            QueryStatus::Processing => "Processing",
            QueryStatus::Completed => "Completed",
            QueryStatus::Failed => "Failed",
        }
    }
}

/// Status of a persisted answer row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResponseStatus {
    Success,
    Error,
}

impl ResponseStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseStatus::Success => "Success",
            ResponseStatus::Error => "Error",
        }
    }
}

/// One row of `user_queries`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct UserQuery {
    pub query_id: i64,
    pub question: String,
    pub timestamp: DateTime<Utc>,
    pub session_id: String,
    pub status: String,
}

/// One row of `chatbot_responses`.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct ChatbotResponse {
    pub response_id: i64,
    pub query_id: i64,
    pub response: String,
    pub timestamp: DateTime<Utc>,
    pub processing_time_ms: Option<i64>,
    pub sources: Option<String>,
    pub status: String,
    pub error_message: Option<String>,
}

/// Joined query + optional response row, newest first, for history listings.
#[derive(Debug, Clone, FromRow)]
pub struct HistoryRow {
    pub query_id: i64,
    pub question: String,
    pub question_timestamp: DateTime<Utc>,
    pub session_id: String,
    pub response: Option<String>,
    pub response_timestamp: Option<DateTime<Utc>>,
    pub processing_time_ms: Option<i64>,
    pub sources: Option<String>,
    pub response_status: Option<String>,
    pub error_message: Option<String>,
}
