//! chat-relay library
//!
//! Thin relay API: accepts chat questions over HTTP, forwards them to the
//! answer backend, persists every question/answer pair in SQLite, and serves
//! history and diagnostics.

use axum::routing::{get, post};
use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod config;
pub mod db;
pub mod services;

use services::{BackendClient, ChatService};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Chat turn orchestration
    pub chat: ChatService,
    /// Answer backend client (shared, long-lived)
    pub backend: Arc<BackendClient>,
}

impl AppState {
    pub fn new(db: SqlitePool, backend: Arc<BackendClient>) -> Self {
        let chat = ChatService::new(db.clone(), backend.clone());
        Self { db, chat, backend }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(api::index))
        .route("/api/chat", post(api::post_chat))
        .route("/api/chat/history", get(api::get_history))
        .route("/api/chat/db-stats", get(api::get_db_stats))
        .route("/api/health", get(api::get_health))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
