//! SQL access for the chat tables
//!
//! All statements live here; services never build SQL themselves.

use chrono::Utc;
use sqlx::SqlitePool;

use super::models::{ChatbotResponse, HistoryRow, QueryStatus, ResponseStatus, UserQuery};

/// Insert a new query row with status `Processing`. Timestamps are assigned
/// server-side at insert.
pub async fn insert_query(
    pool: &SqlitePool,
    question: &str,
    session_id: &str,
) -> Result<UserQuery, sqlx::Error> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO user_queries (question, timestamp, session_id, status) VALUES (?, ?, ?, ?)",
    )
    .bind(question)
    .bind(now)
    .bind(session_id)
    .bind(QueryStatus::Processing.as_str())
    .execute(pool)
    .await?;

    Ok(UserQuery {
        query_id: result.last_insert_rowid(),
        question: question.to_string(),
        timestamp: now,
        session_id: session_id.to_string(),
        status: QueryStatus::Processing.as_str().to_string(),
    })
}

pub async fn update_query_status(
    pool: &SqlitePool,
    query_id: i64,
    status: QueryStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE user_queries SET status = ? WHERE query_id = ?")
        .bind(status.as_str())
        .bind(query_id)
        .execute(pool)
        .await?;
    Ok(())
}

/// Fields for a new response row; id and timestamp are assigned at insert.
#[derive(Debug)]
pub struct NewResponse<'a> {
    pub query_id: i64,
    pub response: &'a str,
    pub processing_time_ms: i64,
    pub sources: Option<String>,
    pub status: ResponseStatus,
    pub error_message: Option<String>,
}

pub async fn insert_response(
    pool: &SqlitePool,
    new: NewResponse<'_>,
) -> Result<ChatbotResponse, sqlx::Error> {
    let now = Utc::now();

    let result = sqlx::query(
        r#"
        INSERT INTO chatbot_responses
            (query_id, response, timestamp, processing_time_ms, sources, status, error_message)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(new.query_id)
    .bind(new.response)
    .bind(now)
    .bind(new.processing_time_ms)
    .bind(&new.sources)
    .bind(new.status.as_str())
    .bind(&new.error_message)
    .execute(pool)
    .await?;

    Ok(ChatbotResponse {
        response_id: result.last_insert_rowid(),
        query_id: new.query_id,
        response: new.response.to_string(),
        timestamp: now,
        processing_time_ms: Some(new.processing_time_ms),
        sources: new.sources,
        status: new.status.as_str().to_string(),
        error_message: new.error_message,
    })
}

/// Locate the in-flight query for a failed turn: same question text, still
/// `Processing`, newest first.
pub async fn find_processing_query(
    pool: &SqlitePool,
    question: &str,
) -> Result<Option<UserQuery>, sqlx::Error> {
    sqlx::query_as::<_, UserQuery>(
        r#"
        SELECT query_id, question, timestamp, session_id, status
        FROM user_queries
        WHERE question = ? AND status = ?
        ORDER BY query_id DESC
        LIMIT 1
        "#,
    )
    .bind(question)
    .bind(QueryStatus::Processing.as_str())
    .fetch_optional(pool)
    .await
}

/// Joined history, most recent first, optionally filtered to one session.
/// The caller bounds `limit`.
pub async fn fetch_history(
    pool: &SqlitePool,
    session_id: Option<&str>,
    limit: i64,
) -> Result<Vec<HistoryRow>, sqlx::Error> {
    let base = r#"
        SELECT q.query_id,
               q.question,
               q.timestamp  AS question_timestamp,
               q.session_id,
               r.response,
               r.timestamp  AS response_timestamp,
               r.processing_time_ms,
               r.sources,
               r.status     AS response_status,
               r.error_message
        FROM user_queries q
        LEFT JOIN chatbot_responses r ON r.query_id = q.query_id
    "#;

    match session_id {
        Some(session) => {
            let sql = format!(
                "{base} WHERE q.session_id = ? ORDER BY q.timestamp DESC, q.query_id DESC LIMIT ?"
            );
            sqlx::query_as::<_, HistoryRow>(&sql)
                .bind(session)
                .bind(limit)
                .fetch_all(pool)
                .await
        }
        None => {
            let sql = format!("{base} ORDER BY q.timestamp DESC, q.query_id DESC LIMIT ?");
            sqlx::query_as::<_, HistoryRow>(&sql)
                .bind(limit)
                .fetch_all(pool)
                .await
        }
    }
}

pub async fn count_queries(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM user_queries")
        .fetch_one(pool)
        .await
}

pub async fn count_responses(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    sqlx::query_scalar("SELECT COUNT(*) FROM chatbot_responses")
        .fetch_one(pool)
        .await
}

pub async fn recent_queries(pool: &SqlitePool, limit: i64) -> Result<Vec<UserQuery>, sqlx::Error> {
    sqlx::query_as::<_, UserQuery>(
        r#"
        SELECT query_id, question, timestamp, session_id, status
        FROM user_queries
        ORDER BY timestamp DESC, query_id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn recent_responses(
    pool: &SqlitePool,
    limit: i64,
) -> Result<Vec<ChatbotResponse>, sqlx::Error> {
    sqlx::query_as::<_, ChatbotResponse>(
        r#"
        SELECT response_id, query_id, response, timestamp, processing_time_ms,
               sources, status, error_message
        FROM chatbot_responses
        ORDER BY timestamp DESC, response_id DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

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

    #[tokio::test]
    async fn insert_query_assigns_monotonic_ids() {
        let pool = memory_pool().await;

        let first = insert_query(&pool, "first", "s1").await.unwrap();
        let second = insert_query(&pool, "second", "s1").await.unwrap();

        assert!(first.query_id > 0);
        assert!(second.query_id > first.query_id);
        assert_eq!(first.status, "Processing");
    }

    #[tokio::test]
    async fn query_status_transitions_persist() {
        let pool = memory_pool().await;

        let query = insert_query(&pool, "q", "s1").await.unwrap();
        update_query_status(&pool, query.query_id, QueryStatus::Completed)
            .await
            .unwrap();

        let status: String =
            sqlx::query_scalar("SELECT status FROM user_queries WHERE query_id = ?")
                .bind(query.query_id)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(status, "Completed");
    }

    #[tokio::test]
    async fn find_processing_query_picks_newest_match() {
        let pool = memory_pool().await;

        let older = insert_query(&pool, "same question", "s1").await.unwrap();
        let newer = insert_query(&pool, "same question", "s2").await.unwrap();
        update_query_status(&pool, older.query_id, QueryStatus::Completed)
            .await
            .unwrap();

        let found = find_processing_query(&pool, "same question")
            .await
            .unwrap()
            .expect("should find the in-flight query");
        assert_eq!(found.query_id, newer.query_id);

        assert!(find_processing_query(&pool, "never asked")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn one_response_per_query_enforced() {
        let pool = memory_pool().await;
        let query = insert_query(&pool, "q", "s1").await.unwrap();

        insert_response(
            &pool,
            NewResponse {
                query_id: query.query_id,
                response: "a",
                processing_time_ms: 10,
                sources: None,
                status: ResponseStatus::Success,
                error_message: None,
            },
        )
        .await
        .unwrap();

        let duplicate = insert_response(
            &pool,
            NewResponse {
                query_id: query.query_id,
                response: "b",
                processing_time_ms: 10,
                sources: None,
                status: ResponseStatus::Success,
                error_message: None,
            },
        )
        .await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn deleting_query_cascades_to_response() {
        let pool = memory_pool().await;
        let query = insert_query(&pool, "q", "s1").await.unwrap();
        insert_response(
            &pool,
            NewResponse {
                query_id: query.query_id,
                response: "a",
                processing_time_ms: 5,
                sources: None,
                status: ResponseStatus::Success,
                error_message: None,
            },
        )
        .await
        .unwrap();

        sqlx::query("DELETE FROM user_queries WHERE query_id = ?")
            .bind(query.query_id)
            .execute(&pool)
            .await
            .unwrap();

        assert_eq!(count_responses(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn history_filters_by_session_and_respects_limit() {
        let pool = memory_pool().await;

        for i in 0..3 {
            let q = insert_query(&pool, &format!("q{i}"), "session-a").await.unwrap();
            insert_response(
                &pool,
                NewResponse {
                    query_id: q.query_id,
                    response: "a",
                    processing_time_ms: 1,
                    sources: None,
                    status: ResponseStatus::Success,
                    error_message: None,
                },
            )
            .await
            .unwrap();
        }
        insert_query(&pool, "other", "session-b").await.unwrap();

        let all = fetch_history(&pool, None, 50).await.unwrap();
        assert_eq!(all.len(), 4);
        // Most recent first
        assert_eq!(all[0].question, "other");

        let filtered = fetch_history(&pool, Some("session-a"), 2).await.unwrap();
        assert_eq!(filtered.len(), 2);
        assert_eq!(filtered[0].question, "q2");

        // No response yet -> joined columns are NULL
        assert!(all[0].response.is_none());
        assert!(all[0].response_status.is_none());
    }
}
