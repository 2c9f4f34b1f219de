//! Combined health endpoint
//!
//! Always answers 200: the relay itself is healthy if it can serve the
//! request; the backend block degrades to "unhealthy" when the health call
//! fails outright (e.g. times out).

use axum::{extract::State, Json};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;
use tracing::warn;

use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub timestamp: DateTime<Utc>,
    pub api: ApiHealth,
    pub python_backend: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ApiHealth {
    pub status: String,
    pub version: String,
}

/// GET /api/health
pub async fn get_health(State(state): State<AppState>) -> Json<HealthResponse> {
    let python_backend = match state.backend.check_health().await {
        Ok(health) => json!({
            "status": health.status,
            "vector_store_status": health.vector_store_status,
            "error": health.error,
        }),
        Err(e) => {
            warn!(error = %e, "Backend health check failed");
            json!({
                "status": "unhealthy",
                "vector_store_status": "unknown",
                "error": e.to_string(),
            })
        }
    };

    Json(HealthResponse {
        timestamp: Utc::now(),
        api: ApiHealth {
            status: "healthy".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        },
        python_backend,
    })
}

/// GET / - service banner
pub async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "message": "Chat Relay API",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "chat": "/api/chat",
            "history": "/api/chat/history",
            "health": "/api/health",
            "db_stats": "/api/chat/db-stats",
        }
    }))
}
