//! WebhookReceiver - processor notifications into activations.
//!
//! Only a bad signature is ever reported back to the processor.
//! Everything after verification is acknowledged, whatever
//! happened internally, so the processor's retry machinery never turns a
//! bug on our side into a request storm. Internal failures are logged and
//! recorded in the webhook event log.

use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;

use crate::domain::foundation::{DomainError, UserId};
use crate::domain::payment::{ActivationMethod, Payment};
use crate::domain::webhook::{ProcessorEvent, ProcessorEventType, WebhookError, WebhookSignatureVerifier};
use crate::ports::{
    PaymentRepository, SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome,
};

use super::activate_payment::ActivationEngine;
use super::revert_payment::{RevertPaymentCommand, RevertPaymentHandler, RevertPaymentResult};

#[derive(Debug, Clone)]
pub struct HandleWebhookCommand {
    /// Raw request body; the signature covers these exact bytes.
    pub payload: Vec<u8>,
    pub signature: Option<String>,
}

/// Acknowledgement returned with HTTP 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WebhookAck {
    /// True when the event changed a payment.
    pub processed: bool,
}

pub struct WebhookReceiver {
    verifier: WebhookSignatureVerifier,
    payments: Arc<dyn PaymentRepository>,
    events: Arc<dyn WebhookEventRepository>,
    engine: Arc<ActivationEngine>,
    reverter: Arc<RevertPaymentHandler>,
}

impl WebhookReceiver {
    pub fn new(
        verifier: WebhookSignatureVerifier,
        payments: Arc<dyn PaymentRepository>,
        events: Arc<dyn WebhookEventRepository>,
        engine: Arc<ActivationEngine>,
        reverter: Arc<RevertPaymentHandler>,
    ) -> Self {
        Self {
            verifier,
            payments,
            events,
            engine,
            reverter,
        }
    }

    /// Verifies and processes one delivery.
    ///
    /// `Err` only for signature failures. A correctly signed body we cannot
    /// parse is acknowledged unprocessed.
    pub async fn handle(&self, cmd: HandleWebhookCommand) -> Result<WebhookAck, WebhookError> {
        let event = match self
            .verifier
            .verify_and_parse(&cmd.payload, cmd.signature.as_deref())
        {
            Ok(event) => event,
            Err(WebhookError::ParseError(reason)) => {
                tracing::warn!(reason = %reason, "signed webhook body could not be parsed");
                return Ok(WebhookAck { processed: false });
            }
            Err(e) => {
                tracing::warn!(error = %e, "webhook rejected");
                return Err(e);
            }
        };

        let event_id = event.id.clone();
        let processed = AssertUnwindSafe(self.process(event, &cmd.payload))
            .catch_unwind()
            .await
            .unwrap_or_else(|_| {
                tracing::error!(event_id = %event_id, "webhook processing panicked");
                false
            });

        Ok(WebhookAck { processed })
    }

    async fn process(&self, event: ProcessorEvent, payload: &[u8]) -> bool {
        match self.events.find_by_event_id(&event.id).await {
            Ok(Some(logged)) if logged.outcome.allows_retry() => {
                tracing::info!(event_id = %event.id, "redelivery of failed webhook; retrying");
            }
            Ok(Some(_)) => {
                tracing::info!(event_id = %event.id, "duplicate webhook delivery");
                return false;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(event_id = %event.id, error = %e, "webhook log lookup failed");
            }
        }

        let outcome = match self.dispatch(&event).await {
            Ok(d) => d,
            Err(e) => {
                tracing::error!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    error = %e,
                    "webhook processing failed"
                );
                WebhookOutcome::Failed(e.to_string())
            }
        };

        let body = serde_json::from_slice(payload).unwrap_or(serde_json::Value::Null);
        let processed = outcome.is_processed();
        let record = WebhookEventRecord::new(&event.id, &event.event_type, outcome, body);
        match self.events.save(record).await {
            Ok(SaveResult::Inserted) | Ok(SaveResult::Replaced) => {}
            Ok(SaveResult::AlreadyExists) => {
                tracing::debug!(event_id = %event.id, "concurrent delivery already recorded");
            }
            Err(e) => tracing::error!(event_id = %event.id, error = %e, "failed to record webhook"),
        }

        processed
    }

    async fn dispatch(&self, event: &ProcessorEvent) -> Result<WebhookOutcome, DomainError> {
        let kind = event.parsed_type();
        if kind == ProcessorEventType::Unknown {
            tracing::debug!(event_type = %event.event_type, "ignoring webhook event type");
            return Ok(WebhookOutcome::Ignored(format!("unhandled type {}", event.event_type)));
        }

        let Some(payment) = self.resolve(event).await? else {
            tracing::warn!(
                event_id = %event.id,
                checkout_id = ?event.data.checkout_id,
                "webhook matched no payment"
            );
            return Ok(WebhookOutcome::Ignored("no matching payment".to_string()));
        };

        if kind == ProcessorEventType::PaymentReversed {
            let result = self
                .reverter
                .handle(RevertPaymentCommand {
                    payment_id: payment.id,
                    reason: event.reversal_reason().to_string(),
                })
                .await?;
            return Ok(match result {
                RevertPaymentResult::Reverted => WebhookOutcome::Processed,
                RevertPaymentResult::NotCompleted => {
                    WebhookOutcome::Ignored(format!("payment is {}", payment.status))
                }
            });
        }

        if let Some(processor_payment_id) = event.data.payment_id.as_deref() {
            if payment.processor_payment_ref.is_none() {
                self.payments
                    .set_processor_payment_ref(payment.id, processor_payment_id)
                    .await?;
            }
        }

        let result = self
            .engine
            .activate_loaded(payment, ActivationMethod::Webhook)
            .await?;

        Ok(if result.success && !result.already_completed {
            WebhookOutcome::Processed
        } else if result.success {
            WebhookOutcome::Ignored("already completed".to_string())
        } else {
            WebhookOutcome::Ignored(format!("payment is {}", result.payment.status))
        })
    }

    /// Checkout reference first; otherwise the owner's pending payment of
    /// exactly the same amount, so a missing reference can never activate
    /// a different plan.
    async fn resolve(&self, event: &ProcessorEvent) -> Result<Option<Payment>, DomainError> {
        if let Some(checkout_id) = event.data.checkout_id.as_deref() {
            if let Some(payment) = self.payments.find_by_checkout_reference(checkout_id).await? {
                return Ok(Some(payment));
            }
        }

        let (Some(user_id), Some(amount)) = (event.metadata_user_id(), event.data.amount) else {
            return Ok(None);
        };
        let Ok(owner) = UserId::new(user_id) else {
            return Ok(None);
        };
        self.payments
            .find_pending_by_owner_and_amount(&owner, amount)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    use crate::adapters::memory::InMemoryStore;
    use crate::domain::account::BillingTerms;
    use crate::domain::foundation::Timestamp;
    use crate::domain::payment::test_support::pro_subscription;
    use crate::domain::payment::PaymentStatus;
    use crate::domain::webhook::compute_test_signature;

    const SECRET: &str = "whsec_test";

    fn receiver(store: &InMemoryStore, secret: Option<&str>) -> WebhookReceiver {
        let engine = Arc::new(ActivationEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            BillingTerms::default(),
        ));
        let reverter = Arc::new(RevertPaymentHandler::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
        ));
        WebhookReceiver::new(
            WebhookSignatureVerifier::new(secret.map(|s| SecretString::new(s.to_string()))),
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            engine,
            reverter,
        )
    }

    fn signed(body: serde_json::Value) -> HandleWebhookCommand {
        let payload = body.to_string();
        let t = chrono::Utc::now().timestamp();
        let sig = compute_test_signature(SECRET, t, &payload);
        HandleWebhookCommand {
            payload: payload.into_bytes(),
            signature: Some(format!("t={},v1={}", t, sig)),
        }
    }

    fn succeeded(event_id: &str, checkout: Option<&str>, user: Option<&str>, amount: i64) -> serde_json::Value {
        let mut metadata = serde_json::Map::new();
        if let Some(user) = user {
            metadata.insert("user_id".to_string(), serde_json::json!(user));
        }
        serde_json::json!({
            "id": event_id,
            "type": "payment.succeeded",
            "created": chrono::Utc::now().timestamp(),
            "data": {
                "checkout_id": checkout,
                "payment_id": "pay_1",
                "amount": amount,
                "metadata": metadata,
            }
        })
    }

    async fn seed(store: &InMemoryStore, owner: Option<&str>) -> Payment {
        let payment = Payment::create(pro_subscription(owner), Timestamp::now()).unwrap();
        store.create(&payment).await.unwrap();
        payment
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Signature
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn unsigned_request_is_rejected() {
        let store = InMemoryStore::new();
        let cmd = HandleWebhookCommand {
            payload: b"{}".to_vec(),
            signature: None,
        };

        let err = receiver(&store, Some(SECRET)).handle(cmd).await.unwrap_err();

        assert_eq!(err, WebhookError::MissingSignature);
    }

    #[tokio::test]
    async fn missing_secret_rejects_everything() {
        let store = InMemoryStore::new();
        seed(&store, Some("u1")).await;

        let err = receiver(&store, None)
            .handle(signed(succeeded("evt_1", Some("chk_pro_1"), None, 34900)))
            .await
            .unwrap_err();

        assert_eq!(err, WebhookError::SecretNotConfigured);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Resolution and Activation
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn success_event_activates_by_checkout_reference() {
        let store = InMemoryStore::new();
        let payment = seed(&store, Some("u1")).await;

        let ack = receiver(&store, Some(SECRET))
            .handle(signed(succeeded("evt_1", Some("chk_pro_1"), None, 34900)))
            .await
            .unwrap();

        assert!(ack.processed);
        let stored = store.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(stored.processor_payment_ref.as_deref(), Some("pay_1"));
    }

    #[tokio::test]
    async fn falls_back_to_owner_and_amount() {
        let store = InMemoryStore::new();
        let payment = seed(&store, Some("u1")).await;

        let ack = receiver(&store, Some(SECRET))
            .handle(signed(succeeded("evt_1", None, Some("u1"), 34900)))
            .await
            .unwrap();

        assert!(ack.processed);
        assert!(store.find_by_id(payment.id).await.unwrap().unwrap().is_completed());
    }

    #[tokio::test]
    async fn fallback_with_wrong_amount_matches_nothing() {
        let store = InMemoryStore::new();
        let payment = seed(&store, Some("u1")).await;

        let ack = receiver(&store, Some(SECRET))
            .handle(signed(succeeded("evt_1", None, Some("u1"), 999)))
            .await
            .unwrap();

        assert!(!ack.processed);
        assert!(store.find_by_id(payment.id).await.unwrap().unwrap().is_pending());
    }

    #[tokio::test]
    async fn duplicate_delivery_is_acknowledged_without_processing() {
        let store = InMemoryStore::new();
        seed(&store, Some("u1")).await;
        let receiver = receiver(&store, Some(SECRET));
        let body = succeeded("evt_dup", Some("chk_pro_1"), None, 34900);

        let first = receiver.handle(signed(body.clone())).await.unwrap();
        let second = receiver.handle(signed(body)).await.unwrap();

        assert!(first.processed);
        assert!(!second.processed);
        assert_eq!(store.outbox_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn unknown_event_type_is_acknowledged() {
        let store = InMemoryStore::new();
        let payment = seed(&store, Some("u1")).await;
        let mut body = succeeded("evt_1", Some("chk_pro_1"), None, 34900);
        body["type"] = serde_json::json!("customer.updated");

        let ack = receiver(&store, Some(SECRET)).handle(signed(body)).await.unwrap();

        assert!(!ack.processed);
        assert!(store.find_by_id(payment.id).await.unwrap().unwrap().is_pending());
        let logged = store.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert!(matches!(logged.outcome, WebhookOutcome::Ignored(_)));
    }

    #[tokio::test]
    async fn storage_failure_is_still_acknowledged() {
        let store = InMemoryStore::new();
        seed(&store, Some("u1")).await;
        store.set_fail_commits(true).await;

        let ack = receiver(&store, Some(SECRET))
            .handle(signed(succeeded("evt_1", Some("chk_pro_1"), None, 34900)))
            .await
            .unwrap();

        assert!(!ack.processed);
        let logged = store.find_by_event_id("evt_1").await.unwrap().unwrap();
        assert!(matches!(logged.outcome, WebhookOutcome::Failed(_)));
    }

    #[tokio::test]
    async fn redelivery_after_storage_failure_is_processed() {
        let store = InMemoryStore::new();
        let payment = seed(&store, Some("u1")).await;
        let receiver = receiver(&store, Some(SECRET));
        let event = succeeded("evt_retry", Some("chk_pro_1"), None, 34900);

        store.set_fail_commits(true).await;
        let first = receiver.handle(signed(event.clone())).await.unwrap();
        store.set_fail_commits(false).await;
        let second = receiver.handle(signed(event.clone())).await.unwrap();
        let third = receiver.handle(signed(event)).await.unwrap();

        assert!(!first.processed);
        assert!(second.processed);
        assert!(!third.processed);
        let stored = store.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        let logged = store.find_by_event_id("evt_retry").await.unwrap().unwrap();
        assert_eq!(logged.outcome, WebhookOutcome::Processed);
    }

    #[tokio::test]
    async fn reversal_event_reverts_completed_payment() {
        let store = InMemoryStore::new();
        let payment = seed(&store, Some("u1")).await;
        let receiver = receiver(&store, Some(SECRET));
        receiver
            .handle(signed(succeeded("evt_1", Some("chk_pro_1"), None, 34900)))
            .await
            .unwrap();

        let mut reversal = succeeded("evt_2", Some("chk_pro_1"), None, 34900);
        reversal["type"] = serde_json::json!("payment.refunded");
        let ack = receiver.handle(signed(reversal)).await.unwrap();

        assert!(ack.processed);
        let stored = store.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Failed);
        assert!(stored.reverted);
        assert!(store
            .outbox_entries()
            .await
            .iter()
            .any(|e| e.event.event_type == "payment.reverted.v1"));
    }

    #[tokio::test]
    async fn signed_garbage_body_is_acknowledged() {
        let store = InMemoryStore::new();
        let payload = "not json";
        let t = chrono::Utc::now().timestamp();
        let cmd = HandleWebhookCommand {
            payload: payload.as_bytes().to_vec(),
            signature: Some(format!("t={},v1={}", t, compute_test_signature(SECRET, t, payload))),
        };

        let ack = receiver(&store, Some(SECRET)).handle(cmd).await.unwrap();

        assert!(!ack.processed);
    }

    #[tokio::test]
    async fn malformed_signature_header_is_rejected() {
        let store = InMemoryStore::new();
        let cmd = HandleWebhookCommand {
            payload: b"{}".to_vec(),
            signature: Some("garbage".to_string()),
        };

        let err = receiver(&store, Some(SECRET)).handle(cmd).await.unwrap_err();

        assert_eq!(err, WebhookError::InvalidSignature);
    }
}
