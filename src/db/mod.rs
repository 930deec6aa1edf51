//! Database module
//!
//! Security events are aggregated per client, kind and minute: the first
//! detection in a bucket inserts a row, every later one bumps its attack
//! count. The aggregation is a single `INSERT ... ON CONFLICT` statement so
//! concurrent detections for the same bucket never produce duplicate rows.

mod schema;

use async_trait::async_trait;
use chrono::{DateTime, DurationRound, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use std::time::Duration;

use crate::config::DatabaseConfig;
use crate::domain::{AttackKind, PersistedSecurityEvent, SecurityEvent};
use crate::error::{Error, Result};

/// Durable store of aggregated security events
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Record one detection in its minute bucket
    async fn upsert(&self, event: &SecurityEvent) -> Result<()>;

    /// Most recently active events, optionally restricted to one kind
    async fn find_alerts(&self, kind: Option<AttackKind>, limit: usize) -> Result<Vec<PersistedSecurityEvent>>;
}

#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

type EventRow = (i64, i64, i64, String, String, i64, i64, String);

impl Database {
    pub async fn new(config: &DatabaseConfig) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(&format!("sqlite:{}", config.url))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await?;
        Ok(Self { pool })
    }

    /// Single-connection in-memory database; the schema lives as long as the pool
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await?;
        let db = Self { pool };
        db.run_migrations().await?;
        Ok(db)
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::query(schema::CREATE_TABLE)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_BUCKET)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_UPDATED_AT)
            .execute(&self.pool)
            .await?;
        sqlx::query(schema::CREATE_INDEX_KIND_UPDATED_AT)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Upsert with an explicit wall-clock time for `created_at` / `updated_at`
    pub async fn upsert_at(&self, event: &SecurityEvent, now: DateTime<Utc>) -> Result<()> {
        let bucket = minute_bucket(event.timestamp)?;

        sqlx::query(
            r#"
            INSERT INTO security_events (created_at, updated_at, kind, client_ip, timestamp, attacks, details)
            VALUES (?, ?, ?, ?, ?, 1, ?)
            ON CONFLICT(client_ip, kind, timestamp) DO UPDATE SET
                attacks = security_events.attacks + 1,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(now.timestamp_millis())
        .bind(now.timestamp_millis())
        .bind(event.kind.as_str())
        .bind(&event.client_ip)
        .bind(bucket.timestamp_millis())
        .bind(&event.details)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl EventStore for Database {
    async fn upsert(&self, event: &SecurityEvent) -> Result<()> {
        self.upsert_at(event, Utc::now()).await
    }

    async fn find_alerts(&self, kind: Option<AttackKind>, limit: usize) -> Result<Vec<PersistedSecurityEvent>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let rows: Vec<EventRow> = match kind {
            None => {
                sqlx::query_as(
                    r#"
                    SELECT id, created_at, updated_at, kind, client_ip, timestamp, attacks, details
                    FROM security_events
                    ORDER BY updated_at DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
            Some(kind) => {
                sqlx::query_as(
                    r#"
                    SELECT id, created_at, updated_at, kind, client_ip, timestamp, attacks, details
                    FROM security_events
                    WHERE kind = ?
                    ORDER BY updated_at DESC, id DESC
                    LIMIT ?
                    "#,
                )
                .bind(kind.as_str())
                .bind(limit)
                .fetch_all(&self.pool)
                .await?
            }
        };

        rows.into_iter().map(event_from_row).collect()
    }
}

fn minute_bucket(ts: DateTime<Utc>) -> Result<DateTime<Utc>> {
    ts.duration_trunc(chrono::Duration::minutes(1))
        .map_err(|e| Error::InvalidRecord(format!("cannot truncate {} to the minute: {}", ts, e)))
}

fn millis_to_datetime(millis: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| Error::InvalidRecord(format!("timestamp {} out of range", millis)))
}

fn event_from_row(row: EventRow) -> Result<PersistedSecurityEvent> {
    let (id, created_at, updated_at, kind, client_ip, timestamp, attacks, details) = row;
    Ok(PersistedSecurityEvent {
        id,
        created_at: millis_to_datetime(created_at)?,
        updated_at: millis_to_datetime(updated_at)?,
        kind: kind
            .parse()
            .map_err(|e| Error::InvalidRecord(format!("row {}: {}", id, e)))?,
        client_ip,
        timestamp: millis_to_datetime(timestamp)?,
        attacks,
        details,
    })
}
