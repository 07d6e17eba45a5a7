//! OutboxWriter port - transactional outbox for payment side effects.
//!
//! Activation writes its side-effect events into the outbox in the same
//! transaction as the status change. The outbox publisher then delivers
//! them with its own retry policy, so "did the email go out" is tracked
//! independently of "is the payment completed".

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::foundation::{DomainError, EventEnvelope};

/// Status of an outbox entry in the delivery pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutboxStatus {
    /// Written, not yet delivered.
    Pending,
    /// Delivered to its consumer.
    Published,
    /// Last attempt failed; eligible again at `next_attempt_at`.
    Failed,
    /// Retries exhausted. Needs a human.
    Dead,
}

impl OutboxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutboxStatus::Pending => "pending",
            OutboxStatus::Published => "published",
            OutboxStatus::Failed => "failed",
            OutboxStatus::Dead => "dead",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(OutboxStatus::Pending),
            "published" => Some(OutboxStatus::Published),
            "failed" => Some(OutboxStatus::Failed),
            "dead" => Some(OutboxStatus::Dead),
            _ => None,
        }
    }
}

/// An entry in the outbox table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: Uuid,

    pub event: EventEnvelope,

    pub status: OutboxStatus,

    pub created_at: DateTime<Utc>,

    /// When the event was last processed (published or failed).
    pub processed_at: Option<DateTime<Utc>>,

    /// Earliest time the next delivery attempt may run.
    pub next_attempt_at: DateTime<Utc>,

    pub attempts: u32,

    pub last_error: Option<String>,

    /// Typically the user the side effect concerns.
    pub partition_key: String,
}

impl OutboxEntry {
    /// Create a new pending outbox entry for an event.
    pub fn new(event: EventEnvelope, partition_key: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            event,
            status: OutboxStatus::Pending,
            created_at: now,
            processed_at: None,
            next_attempt_at: now,
            attempts: 0,
            last_error: None,
            partition_key: partition_key.into(),
        }
    }

    /// Partitioned by the user the event concerns, else by its aggregate.
    pub fn for_event(event: EventEnvelope) -> Self {
        let key = event
            .metadata
            .user_id
            .clone()
            .unwrap_or_else(|| event.aggregate_id.clone());
        Self::new(event, key)
    }

    pub fn mark_published(&mut self) {
        self.status = OutboxStatus::Published;
        self.processed_at = Some(Utc::now());
        self.attempts += 1;
    }

    /// Records a failed attempt. `retry_at = None` marks the entry dead.
    pub fn mark_failed(&mut self, error: impl Into<String>, retry_at: Option<DateTime<Utc>>) {
        let now = Utc::now();
        self.processed_at = Some(now);
        self.attempts += 1;
        self.last_error = Some(error.into());
        match retry_at {
            Some(at) => {
                self.status = OutboxStatus::Failed;
                self.next_attempt_at = at;
            }
            None => self.status = OutboxStatus::Dead,
        }
    }

    /// Pending or failed, and due.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        matches!(self.status, OutboxStatus::Pending | OutboxStatus::Failed)
            && self.next_attempt_at <= now
    }
}

#[async_trait]
pub trait OutboxWriter: Send + Sync {
    /// Write a single event outside any activation transaction.
    async fn write(
        &self,
        event: &EventEnvelope,
        partition_key: &str,
    ) -> Result<OutboxEntry, DomainError>;

    /// Due entries (pending, or failed with `next_attempt_at` passed), oldest first.
    async fn get_pending(&self, limit: u32) -> Result<Vec<OutboxEntry>, DomainError>;

    async fn mark_published(&self, id: Uuid) -> Result<(), DomainError>;

    /// Record a failed attempt; `retry_at = None` gives up on the entry.
    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError>;

    /// Deletes entries published more than `older_than_hours` ago.
    async fn cleanup_old(&self, older_than_hours: u32) -> Result<u64, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn new_entry_is_due_immediately() {
        let entry = OutboxEntry::new(EventEnvelope::test_fixture(), "user-123");
        assert_eq!(entry.status, OutboxStatus::Pending);
        assert!(entry.is_due(Utc::now()));
    }

    #[test]
    fn for_event_partitions_by_user_when_known() {
        let event = EventEnvelope::test_fixture().with_user_id("user-9");
        assert_eq!(OutboxEntry::for_event(event).partition_key, "user-9");

        let anonymous = EventEnvelope::test_fixture();
        let aggregate = anonymous.aggregate_id.clone();
        assert_eq!(OutboxEntry::for_event(anonymous).partition_key, aggregate);
    }

    #[test]
    fn published_entry_is_never_due() {
        let mut entry = OutboxEntry::new(EventEnvelope::test_fixture(), "user-123");
        entry.mark_published();
        assert_eq!(entry.attempts, 1);
        assert!(!entry.is_due(Utc::now() + Duration::days(1)));
    }

    #[test]
    fn failed_entry_waits_for_retry_time() {
        let mut entry = OutboxEntry::new(EventEnvelope::test_fixture(), "user-123");
        let retry_at = Utc::now() + Duration::seconds(30);
        entry.mark_failed("smtp timeout", Some(retry_at));

        assert_eq!(entry.status, OutboxStatus::Failed);
        assert_eq!(entry.last_error.as_deref(), Some("smtp timeout"));
        assert!(!entry.is_due(Utc::now()));
        assert!(entry.is_due(retry_at));
    }

    #[test]
    fn failure_without_retry_is_dead() {
        let mut entry = OutboxEntry::new(EventEnvelope::test_fixture(), "user-123");
        entry.mark_failed("gave up", None);
        assert_eq!(entry.status, OutboxStatus::Dead);
        assert!(!entry.is_due(Utc::now() + Duration::days(365)));
    }

    #[test]
    fn status_parses_its_own_strings() {
        for s in [
            OutboxStatus::Pending,
            OutboxStatus::Published,
            OutboxStatus::Failed,
            OutboxStatus::Dead,
        ] {
            assert_eq!(OutboxStatus::parse(s.as_str()), Some(s));
        }
    }
}
