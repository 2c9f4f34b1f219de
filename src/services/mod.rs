//! Application services

pub mod backend_client;
pub mod chat;

pub use backend_client::{BackendClient, BackendError, BackendHealth};
pub use chat::{ChatError, ChatService, ChatTurn};
