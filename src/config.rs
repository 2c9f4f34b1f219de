//! Process configuration
//!
//! All settings are resolved once at startup (CLI flag > environment variable
//! > compiled default) and handed to the rest of the process as an immutable
//! struct. Nothing mutates configuration at runtime.

use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Chat relay API - forwards chat questions to the answer backend and
/// persists every question/answer pair.
#[derive(Debug, Clone, Parser)]
#[command(name = "chat-relay", version)]
pub struct Config {
    /// Address to listen on
    #[arg(long, env = "CHAT_RELAY_LISTEN", default_value = "127.0.0.1:5001")]
    pub listen: SocketAddr,

    /// Path to the SQLite database file (created on first run)
    #[arg(long, env = "CHAT_RELAY_DATABASE", default_value = "chatbot.db")]
    pub database: PathBuf,

    /// Base URL of the answer backend
    #[arg(long, env = "CHAT_RELAY_BACKEND_URL", default_value = "http://localhost:8000")]
    pub backend_url: String,

    /// Timeout for answer backend requests, in seconds
    #[arg(long, env = "CHAT_RELAY_BACKEND_TIMEOUT", default_value_t = 60)]
    pub backend_timeout_secs: u64,
}

impl Config {
    pub fn backend_timeout(&self) -> Duration {
        Duration::from_secs(self.backend_timeout_secs)
    }
}
