//! HTTP client for the answer backend
//!
//! The backend is opaque beyond two calls: `POST /chat` produces an answer
//! with optional source citations, `GET /health` reports backend and vector
//! store status.
//!
//! Failure policy, deliberate and asymmetric:
//! - Timeout propagates as [`BackendError::Unavailable`] so the caller can
//!   record a failed turn.
//! - Connection-level failure (backend not running) returns a fixed fallback
//!   reply instead of an error, marked with the [`FALLBACK_SOURCE`] sentinel.
//!   This keeps the relay usable while the backend is absent.
//! - A reply body that does not parse is [`BackendError::BadFormat`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Sentinel source entry marking a fallback answer.
pub const FALLBACK_SOURCE: &str = "Fallback Response";

const FALLBACK_RESPONSE: &str = "This is a fallback response because the answer backend is \
     not available. Start the backend service for full functionality.";

/// Backend client errors
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Backend request timed out after {0} seconds")]
    Unavailable(u64),

    #[error("Invalid response format from backend: {0}")]
    BadFormat(String),
}

#[derive(Debug, Serialize)]
struct BackendChatRequest<'a> {
    question: &'a str,
}

/// Answer returned by `POST /chat`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendChatReply {
    pub response: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,
}

/// Payload of `GET /health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendHealth {
    pub status: String,
    #[serde(default)]
    pub vector_store_status: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Long-lived client for the answer backend, built once at startup.
pub struct BackendClient {
    http: reqwest::Client,
    base_url: String,
    timeout: Duration,
}

impl BackendClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            timeout,
        })
    }

    /// Send one question to the backend and return its answer.
    pub async fn send_chat_question(
        &self,
        question: &str,
    ) -> Result<BackendChatReply, BackendError> {
        let url = format!("{}/chat", self.base_url);
        debug!(url = %url, "Sending chat question to backend");

        let result = self
            .http
            .post(&url)
            .json(&BackendChatRequest { question })
            .send()
            .await;

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!(
                    timeout_secs = self.timeout.as_secs(),
                    "Backend chat request timed out"
                );
                return Err(BackendError::Unavailable(self.timeout.as_secs()));
            }
            Err(e) => {
                warn!(error = %e, "Backend not reachable, using fallback answer");
                return Ok(Self::fallback_reply());
            }
        };

        let response = match response.error_for_status() {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Backend returned error status, using fallback answer");
                return Ok(Self::fallback_reply());
            }
        };

        let reply: BackendChatReply = response
            .json()
            .await
            .map_err(|e| BackendError::BadFormat(e.to_string()))?;

        info!(
            answer_len = reply.response.len(),
            sources = reply.sources.as_ref().map(|s| s.len()).unwrap_or(0),
            "Received answer from backend"
        );
        Ok(reply)
    }

    /// Query backend health. Connection failure yields a degraded payload
    /// instead of an error so `/api/health` can always answer.
    pub async fn check_health(&self) -> Result<BackendHealth, BackendError> {
        let url = format!("{}/health", self.base_url);
        debug!(url = %url, "Checking backend health");

        let result = self.http.get(&url).send().await;

        let response = match result {
            Ok(response) => response,
            Err(e) if e.is_timeout() => {
                warn!("Backend health check timed out");
                return Err(BackendError::Unavailable(self.timeout.as_secs()));
            }
            Err(e) => {
                warn!(error = %e, "Backend not reachable for health check");
                return Ok(BackendHealth {
                    status: "unavailable".to_string(),
                    vector_store_status: "unavailable".to_string(),
                    error: Some("Backend is not running".to_string()),
                });
            }
        };

        let response = response
            .error_for_status()
            .map_err(|e| BackendError::BadFormat(e.to_string()))?;

        response
            .json()
            .await
            .map_err(|e| BackendError::BadFormat(e.to_string()))
    }

    fn fallback_reply() -> BackendChatReply {
        BackendChatReply {
            response: FALLBACK_RESPONSE.to_string(),
            timestamp: Some(Utc::now()),
            sources: Some(vec![FALLBACK_SOURCE.to_string()]),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_creation() {
        let client = BackendClient::new("http://localhost:8000/", Duration::from_secs(60));
        assert!(client.is_ok());
        // Trailing slash normalized away
        assert_eq!(client.unwrap().base_url, "http://localhost:8000");
    }

    #[test]
    fn chat_request_wire_format() {
        let json = serde_json::to_value(BackendChatRequest {
            question: "What is the refund policy?",
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({ "question": "What is the refund policy?" }));
    }

    #[test]
    fn chat_reply_parses_with_and_without_sources() {
        let full: BackendChatReply = serde_json::from_str(
            r#"{"response":"ok","timestamp":"2026-01-01T00:00:00Z","sources":["a.md","b.md"]}"#,
        )
        .unwrap();
        assert_eq!(full.sources.as_deref(), Some(["a.md".to_string(), "b.md".to_string()].as_slice()));

        let bare: BackendChatReply = serde_json::from_str(r#"{"response":"ok"}"#).unwrap();
        assert!(bare.sources.is_none());
        assert!(bare.timestamp.is_none());
    }

    #[test]
    fn fallback_reply_carries_sentinel_source() {
        let reply = BackendClient::fallback_reply();
        assert_eq!(reply.sources.unwrap(), vec![FALLBACK_SOURCE.to_string()]);
    }

    #[test]
    fn unavailable_error_names_timeout() {
        let message = BackendError::Unavailable(60).to_string();
        assert!(message.contains("60 seconds"));
    }
}
