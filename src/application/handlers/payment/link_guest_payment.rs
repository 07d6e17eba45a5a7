//! LinkGuestPaymentHandler - attaches a guest checkout to a new account.
//!
//! A guest payment can complete before its payer has signed up. Linking
//! sets the owner (compare-and-swap on `owner IS NULL`) and then runs the
//! payment back through the engine, which applies the deferred grant
//! exactly once. A still-pending guest payment is verified first; linking
//! alone is never proof of payment.

use std::sync::Arc;

use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, Timestamp, UserId};
use crate::domain::payment::{ActivationMethod, Payment, PaymentError, PaymentStatus};
use crate::ports::PaymentRepository;

use super::activate_payment::ActivationEngine;
use super::verify_payment::{PaymentVerifier, VerificationPolicy};

#[derive(Debug, Clone)]
pub struct LinkGuestPaymentCommand {
    pub user_id: UserId,
    pub checkout_reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkGuestPaymentResult {
    pub payment_id: PaymentId,
    pub status: PaymentStatus,
    pub grant_applied: bool,
}

impl From<&Payment> for LinkGuestPaymentResult {
    fn from(payment: &Payment) -> Self {
        Self {
            payment_id: payment.id,
            status: payment.status,
            grant_applied: payment.grant_applied,
        }
    }
}

pub struct LinkGuestPaymentHandler {
    payments: Arc<dyn PaymentRepository>,
    engine: Arc<ActivationEngine>,
    verifier: Arc<PaymentVerifier>,
}

impl LinkGuestPaymentHandler {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        engine: Arc<ActivationEngine>,
        verifier: Arc<PaymentVerifier>,
    ) -> Self {
        Self {
            payments,
            engine,
            verifier,
        }
    }

    pub async fn handle(
        &self,
        cmd: LinkGuestPaymentCommand,
    ) -> Result<LinkGuestPaymentResult, DomainError> {
        let payment = self
            .payments
            .find_by_checkout_reference(&cmd.checkout_reference)
            .await?
            .ok_or_else(|| {
                DomainError::new(ErrorCode::PaymentNotFound, "No payment for this checkout")
            })?;

        match &payment.owner {
            Some(owner) if *owner == cmd.user_id => {}
            Some(_) => return Err(PaymentError::OwnerAlreadySet(payment.id).into()),
            None => {
                let linked = self
                    .payments
                    .link_owner(payment.id, &cmd.user_id, Timestamp::now())
                    .await?;
                if linked {
                    tracing::info!(payment_id = %payment.id, user_id = %cmd.user_id, "guest payment linked");
                }
            }
        }

        let payment = self
            .payments
            .find_by_id(payment.id)
            .await?
            .ok_or(PaymentError::NotFound(payment.id))?;
        if payment.owner.as_ref() != Some(&cmd.user_id) {
            return Err(PaymentError::OwnerAlreadySet(payment.id).into());
        }

        let payment = match payment.status {
            PaymentStatus::Completed => {
                self.engine
                    .activate_loaded(payment, ActivationMethod::Link)
                    .await?
                    .payment
            }
            PaymentStatus::Pending => {
                let outcome = self
                    .verifier
                    .verify(&payment, VerificationPolicy::FailClosed)
                    .await;
                if outcome.is_paid() {
                    self.engine
                        .activate_loaded(payment, ActivationMethod::Link)
                        .await?
                        .payment
                } else {
                    tracing::debug!(
                        payment_id = %payment.id,
                        status = outcome.status(),
                        "linked payment not yet paid; left for webhook or sweep"
                    );
                    payment
                }
            }
            PaymentStatus::Expired | PaymentStatus::Failed => payment,
        };

        Ok(LinkGuestPaymentResult::from(&payment))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::adapters::memory::InMemoryStore;
    use crate::adapters::processor::MockProcessorClient;
    use crate::domain::account::BillingTerms;
    use crate::domain::payment::test_support::pro_subscription;
    use crate::ports::AccountRepository;

    struct Fixture {
        store: InMemoryStore,
        processor: MockProcessorClient,
        engine: Arc<ActivationEngine>,
        handler: LinkGuestPaymentHandler,
    }

    fn fixture() -> Fixture {
        let store = InMemoryStore::new();
        let processor = MockProcessorClient::new();
        let engine = Arc::new(ActivationEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            BillingTerms::default(),
        ));
        let verifier = Arc::new(PaymentVerifier::with_default_statuses(
            Arc::new(processor.clone()),
            Duration::from_secs(1),
        ));
        let handler =
            LinkGuestPaymentHandler::new(Arc::new(store.clone()), engine.clone(), verifier);
        Fixture {
            store,
            processor,
            engine,
            handler,
        }
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    fn link(user_id: &str) -> LinkGuestPaymentCommand {
        LinkGuestPaymentCommand {
            user_id: user(user_id),
            checkout_reference: "chk_pro_1".to_string(),
        }
    }

    async fn seed_guest(store: &InMemoryStore) -> Payment {
        let payment = Payment::create(pro_subscription(None), Timestamp::now()).unwrap();
        store.create(&payment).await.unwrap();
        payment
    }

    #[tokio::test]
    async fn linking_completed_guest_payment_applies_grant_once() {
        let f = fixture();
        let payment = seed_guest(&f.store).await;
        f.engine
            .activate(payment.id, ActivationMethod::Webhook)
            .await
            .unwrap();

        let first = f.handler.handle(link("new-user")).await.unwrap();
        let second = f.handler.handle(link("new-user")).await.unwrap();

        assert!(first.grant_applied);
        assert!(second.grant_applied);
        let account = f.store.find(&user("new-user")).await.unwrap().unwrap();
        assert_eq!(account.plan_id.as_deref(), Some("pro"));
        assert_eq!(f.store.outbox_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn linking_pending_payment_activates_only_when_paid() {
        let f = fixture();
        seed_guest(&f.store).await;

        let unpaid = f.handler.handle(link("new-user")).await.unwrap();
        assert_eq!(unpaid.status, PaymentStatus::Pending);

        f.processor
            .set_paid_checkout("chk_pro_1", "pay_1", "successful");
        let paid = f.handler.handle(link("new-user")).await.unwrap();
        assert_eq!(paid.status, PaymentStatus::Completed);
        assert!(paid.grant_applied);
    }

    #[tokio::test]
    async fn payment_owned_by_someone_else_is_refused() {
        let f = fixture();
        seed_guest(&f.store).await;
        f.handler.handle(link("first")).await.unwrap();

        let err = f.handler.handle(link("second")).await.unwrap_err();

        assert_eq!(err.code, ErrorCode::OwnerAlreadySet);
    }

    #[tokio::test]
    async fn unknown_checkout_is_not_found() {
        let f = fixture();
        let err = f.handler.handle(link("new-user")).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::PaymentNotFound);
    }
}
