//! Database initialization and access
//!
//! SQLite via sqlx. The schema is created on first run with idempotent
//! `CREATE TABLE IF NOT EXISTS` statements, so no separate migration step is
//! needed for a fresh deployment.

use anyhow::{Context, Result};
use sqlx::sqlite::SqlitePoolOptions;
use sqlx::SqlitePool;
use std::path::Path;
use tracing::info;

pub mod models;
pub mod queries;

/// Open (or create) the database and ensure the schema exists.
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    // mode=rwc: create the database file if missing
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await
        .context("Failed to connect to database")?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    // WAL allows concurrent readers while a turn is being written
    sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
    sqlx::query("PRAGMA journal_mode = WAL").execute(&pool).await?;
    sqlx::query("PRAGMA busy_timeout = 5000").execute(&pool).await?;

    create_schema(&pool).await?;

    Ok(pool)
}

/// Create both tables and their indexes. Idempotent.
pub async fn create_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    create_user_queries_table(pool).await?;
    create_chatbot_responses_table(pool).await?;
    Ok(())
}

async fn create_user_queries_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS user_queries (
            query_id   INTEGER PRIMARY KEY AUTOINCREMENT,
            question   TEXT NOT NULL,
            timestamp  TEXT NOT NULL,
            session_id TEXT NOT NULL,
            status     TEXT NOT NULL DEFAULT 'Pending'
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_queries_timestamp ON user_queries(timestamp)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS idx_user_queries_session ON user_queries(session_id)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_chatbot_responses_table(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // query_id is UNIQUE: exactly one response per query
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS chatbot_responses (
            response_id        INTEGER PRIMARY KEY AUTOINCREMENT,
            query_id           INTEGER NOT NULL UNIQUE
                               REFERENCES user_queries(query_id) ON DELETE CASCADE,
            response           TEXT NOT NULL,
            timestamp          TEXT NOT NULL,
            processing_time_ms INTEGER,
            sources            TEXT,
            status             TEXT NOT NULL DEFAULT 'Success',
            error_message      TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_chatbot_responses_query ON chatbot_responses(query_id)")
        .execute(pool)
        .await?;
    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_chatbot_responses_timestamp ON chatbot_responses(timestamp)",
    )
    .execute(pool)
    .await?;

    Ok(())
}
