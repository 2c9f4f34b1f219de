//! HTTP API handlers

pub mod chat;
pub mod health;

pub use chat::{get_db_stats, get_history, post_chat};
pub use health::{get_health, index};
