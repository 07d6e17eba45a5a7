//! SideEffectDispatcher - routes outbox events to their consumers.
//!
//! | Event type | Consumer |
//! |------------|----------|
//! | `payment.activated.v1` | `Notifier::payment_activated` |
//! | `payment.commission_requested.v1` | `CommissionLedger::record` |
//! | `payment.reverted.v1` | `Notifier::payment_reverted` |
//!
//! Delivery is at-least-once. The commission ledger de-duplicates on
//! payment id; notifications may repeat after a crash mid-delivery.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, ErrorCode, EventEnvelope, Timestamp};
use crate::domain::ledger::Commission;
use crate::domain::payment::{CommissionRequested, PaymentActivated, PaymentReverted};
use crate::ports::{CommissionLedger, EventPublisher, Notifier, RecordOutcome};

pub struct SideEffectDispatcher {
    notifier: Arc<dyn Notifier>,
    commissions: Arc<dyn CommissionLedger>,
    commission_rate_bps: u32,
}

impl SideEffectDispatcher {
    pub fn new(
        notifier: Arc<dyn Notifier>,
        commissions: Arc<dyn CommissionLedger>,
        commission_rate_bps: u32,
    ) -> Self {
        Self {
            notifier,
            commissions,
            commission_rate_bps,
        }
    }

    async fn record_commission(&self, event: CommissionRequested) -> Result<(), DomainError> {
        let commission = Commission::compute(
            event.affiliate_id,
            event.referred_user_id,
            event.payment_id,
            event.amount_minor,
            event.currency,
            self.commission_rate_bps,
            Timestamp::now(),
        );

        match self.commissions.record(&commission).await? {
            RecordOutcome::Recorded => tracing::info!(
                payment_id = %commission.payment_id,
                affiliate_id = %commission.affiliate_id,
                amount_minor = commission.amount_minor,
                "commission recorded"
            ),
            RecordOutcome::Duplicate => tracing::debug!(
                payment_id = %commission.payment_id,
                "commission already recorded"
            ),
        }
        Ok(())
    }
}

fn decode<T: for<'de> serde::Deserialize<'de>>(event: &EventEnvelope) -> Result<T, DomainError> {
    event.payload_as().map_err(|e| {
        DomainError::new(
            ErrorCode::SerializationError,
            format!("Malformed {} payload: {}", event.event_type, e),
        )
    })
}

#[async_trait]
impl EventPublisher for SideEffectDispatcher {
    async fn publish(&self, event: EventEnvelope) -> Result<(), DomainError> {
        match event.event_type.as_str() {
            "payment.activated.v1" => {
                let activated: PaymentActivated = decode(&event)?;
                self.notifier.payment_activated(&activated).await
            }
            "payment.commission_requested.v1" => self.record_commission(decode(&event)?).await,
            "payment.reverted.v1" => {
                let reverted: PaymentReverted = decode(&event)?;
                self.notifier.payment_reverted(&reverted).await
            }
            other => {
                tracing::warn!(event_type = other, event_id = %event.event_id, "no consumer for event type");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::foundation::{AffiliateId, EventId, PaymentId, UserId};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingNotifier {
        activated: AtomicUsize,
        reverted: AtomicUsize,
    }

    #[async_trait]
    impl Notifier for CountingNotifier {
        async fn payment_activated(&self, _: &PaymentActivated) -> Result<(), DomainError> {
            self.activated.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn payment_reverted(&self, _: &PaymentReverted) -> Result<(), DomainError> {
            self.reverted.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn commission_event(payment_id: PaymentId) -> EventEnvelope {
        EventEnvelope::from_event(&CommissionRequested {
            event_id: EventId::new(),
            payment_id,
            affiliate_id: AffiliateId::new("aff-1").unwrap(),
            referred_user_id: UserId::new("u1").unwrap(),
            amount_minor: 34900,
            currency: "USD".to_string(),
            requested_at: Timestamp::now(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn commission_event_is_recorded_once() {
        let store = Arc::new(InMemoryStore::new());
        let dispatcher =
            SideEffectDispatcher::new(Arc::new(CountingNotifier::default()), store.clone(), 2000);
        let payment_id = PaymentId::new();

        dispatcher.publish(commission_event(payment_id)).await.unwrap();
        dispatcher.publish(commission_event(payment_id)).await.unwrap();

        assert_eq!(store.commission_count().await, 1);
        let commission = store.find_by_payment(payment_id).await.unwrap().unwrap();
        assert_eq!(commission.amount_minor, 6980);
    }

    #[tokio::test]
    async fn reverted_event_reaches_notifier() {
        let notifier = Arc::new(CountingNotifier::default());
        let dispatcher =
            SideEffectDispatcher::new(notifier.clone(), Arc::new(InMemoryStore::new()), 2000);
        let event = EventEnvelope::from_event(&PaymentReverted {
            event_id: EventId::new(),
            payment_id: PaymentId::new(),
            user_id: None,
            reason: "chargeback".to_string(),
            reverted_at: Timestamp::now(),
        })
        .unwrap();

        dispatcher.publish(event).await.unwrap();

        assert_eq!(notifier.reverted.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.activated.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn malformed_payload_is_an_error() {
        let dispatcher = SideEffectDispatcher::new(
            Arc::new(CountingNotifier::default()),
            Arc::new(InMemoryStore::new()),
            2000,
        );
        let event = EventEnvelope::new(
            "payment.activated.v1",
            "p1",
            serde_json::json!({"nope": true}),
        );

        let err = dispatcher.publish(event).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::SerializationError);
    }

    #[tokio::test]
    async fn unknown_event_type_is_skipped() {
        let dispatcher = SideEffectDispatcher::new(
            Arc::new(CountingNotifier::default()),
            Arc::new(InMemoryStore::new()),
            2000,
        );
        assert!(dispatcher.publish(EventEnvelope::test_fixture()).await.is_ok());
    }
}
