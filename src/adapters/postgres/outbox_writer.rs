//! PostgreSQL implementation of OutboxWriter.
//!
//! `insert_entry` is also called from inside the activation transaction,
//! which is what makes the outbox transactional.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::types::Json;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use super::payment_repository::corrupt;
use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{OutboxEntry, OutboxStatus, OutboxWriter};

pub struct PostgresOutboxWriter {
    pool: PgPool,
}

impl PostgresOutboxWriter {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OutboxRow {
    id: Uuid,
    partition_key: String,
    event: Json<EventEnvelope>,
    status: String,
    attempts: i32,
    last_error: Option<String>,
    created_at: DateTime<Utc>,
    processed_at: Option<DateTime<Utc>>,
    next_attempt_at: DateTime<Utc>,
}

impl TryFrom<OutboxRow> for OutboxEntry {
    type Error = DomainError;

    fn try_from(row: OutboxRow) -> Result<Self, Self::Error> {
        Ok(OutboxEntry {
            id: row.id,
            event: row.event.0,
            status: OutboxStatus::parse(&row.status)
                .ok_or_else(|| corrupt("outbox status", &row.status))?,
            created_at: row.created_at,
            processed_at: row.processed_at,
            next_attempt_at: row.next_attempt_at,
            attempts: u32::try_from(row.attempts).map_err(|e| corrupt("attempts", e))?,
            last_error: row.last_error,
            partition_key: row.partition_key,
        })
    }
}

pub(super) async fn insert_entry(
    conn: &mut PgConnection,
    entry: &OutboxEntry,
) -> Result<(), DomainError> {
    sqlx::query(
        r#"
        INSERT INTO outbox (
            id, event_id, event_type, partition_key, event, status, attempts,
            created_at, next_attempt_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        "#,
    )
    .bind(entry.id)
    .bind(entry.event.event_id.as_str())
    .bind(&entry.event.event_type)
    .bind(&entry.partition_key)
    .bind(Json(&entry.event))
    .bind(entry.status.as_str())
    .bind(entry.attempts as i32)
    .bind(entry.created_at)
    .bind(entry.next_attempt_at)
    .execute(&mut *conn)
    .await
    .map_err(|e| DomainError::database("Failed to write outbox entry", e))?;

    Ok(())
}

#[async_trait]
impl OutboxWriter for PostgresOutboxWriter {
    async fn write(
        &self,
        event: &EventEnvelope,
        partition_key: &str,
    ) -> Result<OutboxEntry, DomainError> {
        let entry = OutboxEntry::new(event.clone(), partition_key);
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DomainError::database("Failed to acquire connection", e))?;
        insert_entry(&mut *conn, &entry).await?;
        Ok(entry)
    }

    async fn get_pending(&self, limit: u32) -> Result<Vec<OutboxEntry>, DomainError> {
        let rows = sqlx::query_as::<_, OutboxRow>(
            r#"
            SELECT id, partition_key, event, status, attempts, last_error,
                   created_at, processed_at, next_attempt_at
            FROM outbox
            WHERE status IN ('pending', 'failed') AND next_attempt_at <= NOW()
            ORDER BY created_at ASC
            LIMIT $1
            "#,
        )
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to fetch outbox entries", e))?;

        rows.into_iter().map(OutboxEntry::try_from).collect()
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE outbox SET
                status = 'published',
                attempts = attempts + 1,
                processed_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to mark outbox entry published", e))?;

        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError> {
        sqlx::query(
            r#"
            UPDATE outbox SET
                status = CASE WHEN $3::timestamptz IS NULL THEN 'dead' ELSE 'failed' END,
                attempts = attempts + 1,
                last_error = $2,
                processed_at = NOW(),
                next_attempt_at = COALESCE($3, next_attempt_at)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(error)
        .bind(retry_at)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to mark outbox entry failed", e))?;

        Ok(())
    }

    async fn cleanup_old(&self, older_than_hours: u32) -> Result<u64, DomainError> {
        let cutoff = Utc::now() - Duration::hours(i64::from(older_than_hours));
        let result = sqlx::query(
            "DELETE FROM outbox WHERE status = 'published' AND processed_at < $1",
        )
        .bind(cutoff)
        .execute(&self.pool)
        .await
        .map_err(|e| DomainError::database("Failed to clean up outbox", e))?;

        Ok(result.rows_affected())
    }
}
