//! RevertPaymentHandler - chargebacks, refunds and admin reversals.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, EventId, PaymentId, Timestamp};
use crate::domain::payment::{PaymentError, PaymentKind, PaymentReverted};
use crate::ports::{ActivationStore, PaymentRepository, ReversalCommit, ReversalOutcome};

use super::activate_payment::envelope;

#[derive(Debug, Clone)]
pub struct RevertPaymentCommand {
    pub payment_id: PaymentId,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevertPaymentResult {
    Reverted,
    /// Only completed payments can be reverted.
    NotCompleted,
}

pub struct RevertPaymentHandler {
    payments: Arc<dyn PaymentRepository>,
    store: Arc<dyn ActivationStore>,
}

impl RevertPaymentHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>, store: Arc<dyn ActivationStore>) -> Self {
        Self { payments, store }
    }

    pub async fn handle(&self, cmd: RevertPaymentCommand) -> Result<RevertPaymentResult, DomainError> {
        let payment = self
            .payments
            .find_by_id(cmd.payment_id)
            .await?
            .ok_or(PaymentError::NotFound(cmd.payment_id))?;

        if !payment.status.can_revert() {
            tracing::warn!(
                payment_id = %payment.id,
                status = %payment.status,
                "revert requested for payment that is not completed"
            );
            return Ok(RevertPaymentResult::NotCompleted);
        }

        let at = Timestamp::now();
        let credits_amount = match &payment.kind {
            PaymentKind::Credits { credits_amount } => Some(*credits_amount),
            PaymentKind::Subscription { .. } => None,
        };

        let event = PaymentReverted {
            event_id: EventId::new(),
            payment_id: payment.id,
            user_id: payment.owner.clone(),
            reason: cmd.reason.clone(),
            reverted_at: at,
        };
        let events = match &payment.owner {
            Some(owner) => vec![envelope(&event, owner)?],
            None => Vec::new(),
        };

        let outcome = self
            .store
            .revert_completed(ReversalCommit {
                payment_id: payment.id,
                reason: cmd.reason.clone(),
                at,
                credits_amount,
                events,
            })
            .await?;

        let ReversalOutcome::Reverted {
            owner,
            grant_was_applied,
        } = outcome
        else {
            return Ok(RevertPaymentResult::NotCompleted);
        };

        tracing::info!(payment_id = %payment.id, reason = %cmd.reason, "payment reverted");
        if credits_amount.is_none() && grant_was_applied {
            tracing::warn!(
                payment_id = %payment.id,
                user_id = ?owner,
                "subscription grant left in place after reversal; review manually"
            );
        }
        Ok(RevertPaymentResult::Reverted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::application::handlers::payment::ActivationEngine;
    use crate::domain::account::BillingTerms;
    use crate::domain::foundation::{ErrorCode, UserId};
    use crate::domain::payment::test_support::pro_subscription;
    use crate::domain::payment::{ActivationMethod, Payment, PaymentStatus};
    use crate::ports::AccountRepository;

    async fn completed_credits(store: &InMemoryStore) -> Payment {
        let mut new = pro_subscription(Some("u1"));
        new.kind = PaymentKind::Credits { credits_amount: 40 };
        let payment = Payment::create(new, Timestamp::now()).unwrap();
        store.create(&payment).await.unwrap();
        ActivationEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            BillingTerms::default(),
        )
        .activate(payment.id, ActivationMethod::Webhook)
        .await
        .unwrap();
        payment
    }

    fn handler(store: &InMemoryStore) -> RevertPaymentHandler {
        RevertPaymentHandler::new(Arc::new(store.clone()), Arc::new(store.clone()))
    }

    #[tokio::test]
    async fn revert_claws_back_credits_and_emits_event() {
        let store = InMemoryStore::new();
        let payment = completed_credits(&store).await;

        let result = handler(&store)
            .handle(RevertPaymentCommand {
                payment_id: payment.id,
                reason: "chargeback".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result, RevertPaymentResult::Reverted);
        let stored = store.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert!(stored.reverted);

        let account = store.find(&UserId::new("u1").unwrap()).await.unwrap().unwrap();
        assert_eq!(account.credit_balance, 0);
        assert!(store
            .outbox_entries()
            .await
            .iter()
            .any(|e| e.event.event_type == "payment.reverted.v1"));
    }

    #[tokio::test]
    async fn pending_payment_is_not_reverted() {
        let store = InMemoryStore::new();
        let payment = Payment::create(pro_subscription(Some("u1")), Timestamp::now()).unwrap();
        store.create(&payment).await.unwrap();

        let result = handler(&store)
            .handle(RevertPaymentCommand {
                payment_id: payment.id,
                reason: "admin".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(result, RevertPaymentResult::NotCompleted);
    }

    #[tokio::test]
    async fn second_revert_is_a_no_op() {
        let store = InMemoryStore::new();
        let payment = completed_credits(&store).await;
        let handler = handler(&store);
        let cmd = RevertPaymentCommand {
            payment_id: payment.id,
            reason: "refund".to_string(),
        };

        handler.handle(cmd.clone()).await.unwrap();
        let again = handler.handle(cmd).await.unwrap();

        assert_eq!(again, RevertPaymentResult::NotCompleted);
    }

    #[tokio::test]
    async fn unknown_payment_is_not_found() {
        let store = InMemoryStore::new();
        let err = handler(&store)
            .handle(RevertPaymentCommand {
                payment_id: PaymentId::new(),
                reason: "admin".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentNotFound);
    }
}
