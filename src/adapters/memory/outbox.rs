//! Outbox queue and webhook de-duplication log.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use super::InMemoryStore;
use crate::domain::foundation::{DomainError, EventEnvelope};
use crate::ports::{
    OutboxEntry, OutboxStatus, OutboxWriter, SaveResult, WebhookEventRecord,
    WebhookEventRepository,
};

#[async_trait]
impl OutboxWriter for InMemoryStore {
    async fn write(
        &self,
        event: &EventEnvelope,
        partition_key: &str,
    ) -> Result<OutboxEntry, DomainError> {
        let entry = if partition_key.is_empty() {
            OutboxEntry::for_event(event.clone())
        } else {
            OutboxEntry::new(event.clone(), partition_key)
        };
        self.state.write().await.outbox.push(entry.clone());
        Ok(entry)
    }

    async fn get_pending(&self, limit: u32) -> Result<Vec<OutboxEntry>, DomainError> {
        let now = Utc::now();
        let state = self.state.read().await;
        let mut due: Vec<OutboxEntry> = state
            .outbox
            .iter()
            .filter(|e| e.is_due(now))
            .cloned()
            .collect();
        due.sort_by_key(|e| e.created_at);
        due.truncate(limit as usize);
        Ok(due)
    }

    async fn mark_published(&self, id: Uuid) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        if let Some(entry) = state.outbox.iter_mut().find(|e| e.id == id) {
            entry.mark_published();
        }
        Ok(())
    }

    async fn mark_failed(
        &self,
        id: Uuid,
        error: &str,
        retry_at: Option<DateTime<Utc>>,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        if let Some(entry) = state.outbox.iter_mut().find(|e| e.id == id) {
            entry.mark_failed(error, retry_at);
        }
        Ok(())
    }

    async fn cleanup_old(&self, older_than_hours: u32) -> Result<u64, DomainError> {
        let cutoff = Utc::now() - Duration::hours(i64::from(older_than_hours));
        let mut state = self.state.write().await;
        let before = state.outbox.len();
        state.outbox.retain(|e| {
            !(e.status == OutboxStatus::Published && e.processed_at.map_or(false, |at| at < cutoff))
        });
        Ok((before - state.outbox.len()) as u64)
    }
}

#[async_trait]
impl WebhookEventRepository for InMemoryStore {
    async fn find_by_event_id(
        &self,
        event_id: &str,
    ) -> Result<Option<WebhookEventRecord>, DomainError> {
        Ok(self.state.read().await.webhook_events.get(event_id).cloned())
    }

    async fn save(&self, record: WebhookEventRecord) -> Result<SaveResult, DomainError> {
        let mut state = self.state.write().await;
        let result = match state.webhook_events.get(&record.event_id) {
            None => SaveResult::Inserted,
            Some(existing) if existing.outcome.allows_retry() => SaveResult::Replaced,
            Some(_) => return Ok(SaveResult::AlreadyExists),
        };
        state.webhook_events.insert(record.event_id.clone(), record);
        Ok(result)
    }

    async fn delete_before(&self, cutoff: DateTime<Utc>) -> Result<u64, DomainError> {
        let mut state = self.state.write().await;
        let before = state.webhook_events.len();
        state.webhook_events.retain(|_, r| r.processed_at >= cutoff);
        Ok((before - state.webhook_events.len()) as u64)
    }
}
