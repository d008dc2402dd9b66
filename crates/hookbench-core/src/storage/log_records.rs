//! SQLite-backed log store.
//!
//! One table, `log_records`, written one statement at a time. Ids come from
//! `AUTOINCREMENT` so they are never reused after a clear.

use std::{future::Future, pin::Pin, str::FromStr, sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    FromRow, SqlitePool,
};
use tracing::debug;

use super::LogStore;
use crate::{
    error::{CoreError, Result},
    models::{CallbackMethod, LogId, LogRecord},
    time::{utc_now, Clock, RealClock},
};

/// Opens a pool against a SQLite URL, creating the file if needed.
///
/// # Errors
///
/// Returns `CoreError::InvalidInput` for a malformed URL and
/// `CoreError::Database` if the database cannot be opened.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|e| CoreError::InvalidInput(format!("invalid database url: {e}")))?
        .create_if_missing(true)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Opens a private in-memory database.
///
/// The pool is pinned to a single connection that never expires, since
/// every SQLite in-memory connection is its own database.
///
/// # Errors
///
/// Returns `CoreError::Database` if SQLite cannot be opened.
pub async fn connect_in_memory() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| CoreError::InvalidInput(format!("invalid database url: {e}")))?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    Ok(pool)
}

/// Creates the log table and its ordering index if they do not exist.
///
/// # Errors
///
/// Returns `CoreError::Database` if a statement fails.
pub async fn migrate(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS log_records (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            method TEXT NOT NULL CHECK (method IN ('GET', 'POST')),
            time TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
            body TEXT,
            outcome_recorded INTEGER NOT NULL DEFAULT 0
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_log_records_time
        ON log_records(time DESC, id DESC)
        "#,
    )
    .execute(pool)
    .await?;

    debug!("log_records schema ready");
    Ok(())
}

#[derive(Debug, FromRow)]
struct LogRow {
    id: i64,
    method: String,
    time: DateTime<Utc>,
    body: Option<String>,
}

impl TryFrom<LogRow> for LogRecord {
    type Error = CoreError;

    fn try_from(row: LogRow) -> Result<Self> {
        Ok(Self { id: LogId(row.id), method: row.method.parse()?, time: row.time, body: row.body })
    }
}

/// Log store over a SQLite pool.
#[derive(Debug, Clone)]
pub struct SqliteLogStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteLogStore {
    /// Creates a store over an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self::with_clock(pool, Arc::new(RealClock::new()))
    }

    /// Creates a store stamping records with `clock`.
    pub fn with_clock(pool: SqlitePool, clock: Arc<dyn Clock>) -> Self {
        Self { pool, clock }
    }

    /// Returns the underlying pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn insert(&self, method: CallbackMethod, body: Option<String>) -> Result<LogId> {
        let result = sqlx::query(
            r#"
            INSERT INTO log_records (method, time, body)
            VALUES (?, ?, ?)
            "#,
        )
        .bind(method.as_str())
        .bind(utc_now(self.clock.as_ref()))
        .bind(body)
        .execute(&self.pool)
        .await?;

        Ok(LogId(result.last_insert_rowid()))
    }

    async fn fetch(&self, limit: Option<usize>) -> Result<Vec<LogRecord>> {
        // SQLite treats a negative LIMIT as unbounded.
        let limit = limit.map_or(-1, |n| i64::try_from(n).unwrap_or(i64::MAX));

        let rows = sqlx::query_as::<_, LogRow>(
            r#"
            SELECT id, method, time, body
            FROM log_records
            ORDER BY time DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(LogRecord::try_from).collect()
    }

    async fn delete_all(&self) -> Result<u64> {
        let result = sqlx::query("DELETE FROM log_records").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    async fn record_outcome(&self, id: LogId, outcome: String) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE log_records
            SET body = CASE WHEN body IS NULL THEN ?1 ELSE body || char(10) || ?1 END,
                outcome_recorded = 1
            WHERE id = ?2 AND outcome_recorded = 0
            "#,
        )
        .bind(outcome)
        .bind(id.0)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            debug!(log_id = %id, "No pending record for outcome");
        }
        Ok(())
    }
}

impl LogStore for SqliteLogStore {
    fn append(
        &self,
        method: CallbackMethod,
        body: Option<String>,
    ) -> Pin<Box<dyn Future<Output = Result<LogId>> + Send + '_>> {
        Box::pin(self.insert(method, body))
    }

    fn list_all(&self) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>>> + Send + '_>> {
        Box::pin(self.fetch(None))
    }

    fn list_recent(
        &self,
        limit: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<LogRecord>>> + Send + '_>> {
        Box::pin(self.fetch(Some(limit)))
    }

    fn clear_all(&self) -> Pin<Box<dyn Future<Output = Result<u64>> + Send + '_>> {
        Box::pin(self.delete_all())
    }

    fn append_outcome(
        &self,
        id: LogId,
        outcome: String,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(self.record_outcome(id, outcome))
    }

    fn health_check(&self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        Box::pin(async move {
            let _: (i32,) = sqlx::query_as("SELECT 1").fetch_one(&self.pool).await?;
            Ok(())
        })
    }
}
