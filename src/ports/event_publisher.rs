//! EventPublisher port - delivery target for outbox entries.
//!
//! The outbox publisher hands every pending envelope to an implementation
//! of this trait. Delivery is at-least-once; consumers de-duplicate.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, EventEnvelope};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError>;

    /// Publish several events in order, stopping at the first failure.
    async fn publish_all(&self, events: Vec<EventEnvelope>) -> Result<(), DomainError> {
        for event in events {
            self.publish(event).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl EventPublisher for Recording {
        async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
            if self.fail_on.as_deref() == Some(event.event_type.as_str()) {
                return Err(DomainError::new(
                    crate::domain::foundation::ErrorCode::InternalError,
                    "boom",
                ));
            }
            self.seen.lock().unwrap().push(event.event_type);
            Ok(())
        }
    }

    fn envelope(event_type: &str) -> EventEnvelope {
        EventEnvelope::new(event_type, "agg", serde_json::json!({}))
    }

    #[tokio::test]
    async fn publish_all_preserves_order() {
        let publisher = Recording::default();
        publisher
            .publish_all(vec![envelope("a.v1"), envelope("b.v1")])
            .await
            .unwrap();
        assert_eq!(*publisher.seen.lock().unwrap(), vec!["a.v1", "b.v1"]);
    }

    #[tokio::test]
    async fn publish_all_stops_at_first_failure() {
        let publisher = Recording {
            fail_on: Some("a.v1".to_string()),
            ..Default::default()
        };
        assert!(publisher
            .publish_all(vec![envelope("a.v1"), envelope("b.v1")])
            .await
            .is_err());
        assert!(publisher.seen.lock().unwrap().is_empty());
    }
}
