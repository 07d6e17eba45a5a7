//! CheckoutPoller - the payer's browser asking "is it done yet?".
//!
//! Called repeatedly for a short window after the redirect back from
//! checkout. A redirect proves nothing about the charge, so a pending
//! payment is always verified with the processor before activation.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{DomainError, PaymentId, Timestamp, UserId};
use crate::domain::payment::{ActivationMethod, Payment};
use crate::ports::{AccountRepository, PaymentRepository};

use super::activate_payment::ActivationEngine;
use super::verify_payment::{PaymentVerifier, VerificationOutcome, VerificationPolicy};

#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Attempts after which the client is told to assume success.
    pub max_attempts: u32,
    /// A completion this recent counts as "the webhook got there first".
    pub recent_completion_window_secs: i64,
    /// Treat an unreachable checkout endpoint as "still processing".
    pub checkout_fail_open: bool,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            recent_completion_window_secs: 300,
            checkout_fail_open: true,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PollActivationCommand {
    pub user_id: UserId,
    /// 1-based attempt counter kept by the client.
    pub attempt: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    Activated,
    AlreadyActive,
    Processing,
    NoPendingPayment,
    NotPaid,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollActivationResult {
    pub status: PollStatus,
    /// Stop polling and trust the webhook or sweep to finish.
    pub assume_success: bool,
    pub payment_id: Option<PaymentId>,
    pub plan_id: Option<String>,
    pub credits_added: Option<i64>,
    pub credit_balance: Option<i64>,
}

impl PollActivationResult {
    fn bare(status: PollStatus) -> Self {
        Self {
            status,
            assume_success: false,
            payment_id: None,
            plan_id: None,
            credits_added: None,
            credit_balance: None,
        }
    }
}

pub struct CheckoutPoller {
    payments: Arc<dyn PaymentRepository>,
    accounts: Arc<dyn AccountRepository>,
    engine: Arc<ActivationEngine>,
    verifier: Arc<PaymentVerifier>,
    config: PollerConfig,
}

impl CheckoutPoller {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        accounts: Arc<dyn AccountRepository>,
        engine: Arc<ActivationEngine>,
        verifier: Arc<PaymentVerifier>,
        config: PollerConfig,
    ) -> Self {
        Self {
            payments,
            accounts,
            engine,
            verifier,
            config,
        }
    }

    pub async fn handle(&self, cmd: PollActivationCommand) -> Result<PollActivationResult, DomainError> {
        let now = Timestamp::now();

        let Some(payment) = self.payments.find_latest_pending_for_owner(&cmd.user_id).await? else {
            let since = now.minus_secs(self.config.recent_completion_window_secs);
            return match self
                .payments
                .find_recent_completed_for_owner(&cmd.user_id, since)
                .await?
            {
                Some(done) => self.with_details(PollStatus::AlreadyActive, &done, &cmd.user_id).await,
                None => Ok(PollActivationResult::bare(PollStatus::NoPendingPayment)),
            };
        };

        let policy = if self.config.checkout_fail_open {
            VerificationPolicy::FailOpenOnCheckout
        } else {
            VerificationPolicy::FailClosed
        };

        match self.verifier.verify(&payment, policy).await {
            VerificationOutcome::Paid { .. } => {
                let result = self
                    .engine
                    .activate_loaded(payment, ActivationMethod::ClientPoll)
                    .await?;
                let status = match (result.success, result.already_completed) {
                    (true, false) => PollStatus::Activated,
                    (true, true) => PollStatus::AlreadyActive,
                    (false, _) => PollStatus::NotPaid,
                };
                self.with_details(status, &result.payment, &cmd.user_id).await
            }
            VerificationOutcome::NotPaid { status } => {
                tracing::warn!(
                    payment_id = %payment.id,
                    user_id = %cmd.user_id,
                    processor_status = %status,
                    "poll found payment not paid"
                );
                let mut result = PollActivationResult::bare(PollStatus::NotPaid);
                result.payment_id = Some(payment.id);
                Ok(result)
            }
            VerificationOutcome::AwaitingPayment { .. } | VerificationOutcome::Indeterminate(_) => {
                let mut result = PollActivationResult::bare(PollStatus::Processing);
                result.payment_id = Some(payment.id);
                result.assume_success = cmd.attempt >= self.config.max_attempts;
                if result.assume_success {
                    tracing::info!(
                        payment_id = %payment.id,
                        attempt = cmd.attempt,
                        "poll attempts exhausted; client will assume success"
                    );
                }
                Ok(result)
            }
        }
    }

    async fn with_details(
        &self,
        status: PollStatus,
        payment: &Payment,
        user_id: &UserId,
    ) -> Result<PollActivationResult, DomainError> {
        let account = self.accounts.find(user_id).await?;
        Ok(PollActivationResult {
            status,
            assume_success: false,
            payment_id: Some(payment.id),
            plan_id: payment.kind.plan_id().map(str::to_string),
            credits_added: payment.kind.credits_amount(),
            credit_balance: account.map(|a| a.credit_balance),
        })
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
    use crate::domain::payment::PaymentStatus;
    use crate::ports::ProcessorError;

    struct Fixture {
        store: InMemoryStore,
        processor: MockProcessorClient,
        engine: Arc<ActivationEngine>,
        poller: CheckoutPoller,
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
        let poller = CheckoutPoller::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            engine.clone(),
            verifier,
            PollerConfig::default(),
        );
        Fixture {
            store,
            processor,
            engine,
            poller,
        }
    }

    fn poll(attempt: u32) -> PollActivationCommand {
        PollActivationCommand {
            user_id: UserId::new("u1").unwrap(),
            attempt,
        }
    }

    async fn seed(store: &InMemoryStore) -> Payment {
        let payment = Payment::create(pro_subscription(Some("u1")), Timestamp::now()).unwrap();
        store.create(&payment).await.unwrap();
        payment
    }

    #[tokio::test]
    async fn verified_payment_is_activated() {
        let f = fixture();
        let payment = seed(&f.store).await;
        f.processor.set_paid_checkout("chk_pro_1", "pay_1", "captured");

        let result = f.poller.handle(poll(1)).await.unwrap();

        assert_eq!(result.status, PollStatus::Activated);
        assert_eq!(result.plan_id.as_deref(), Some("pro"));
        let stored = f.store.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(stored.status, PaymentStatus::Completed);
        assert_eq!(
            stored.metadata.activation_method(),
            Some(ActivationMethod::ClientPoll)
        );
    }

    #[tokio::test]
    async fn redirect_alone_never_activates() {
        let f = fixture();
        let payment = seed(&f.store).await;
        f.processor.set_paid_checkout("chk_pro_1", "pay_1", "declined");

        let result = f.poller.handle(poll(1)).await.unwrap();

        assert_eq!(result.status, PollStatus::NotPaid);
        assert!(f.store.find_by_id(payment.id).await.unwrap().unwrap().is_pending());
    }

    #[tokio::test]
    async fn recent_webhook_completion_reports_already_active() {
        let f = fixture();
        let payment = seed(&f.store).await;
        f.engine
            .activate(payment.id, ActivationMethod::Webhook)
            .await
            .unwrap();

        let result = f.poller.handle(poll(1)).await.unwrap();

        assert_eq!(result.status, PollStatus::AlreadyActive);
        assert_eq!(result.payment_id, Some(payment.id));
        assert_eq!(f.processor.checkout_calls(), 0);
    }

    #[tokio::test]
    async fn nothing_pending_reports_no_pending_payment() {
        let f = fixture();
        let result = f.poller.handle(poll(1)).await.unwrap();
        assert_eq!(result.status, PollStatus::NoPendingPayment);
    }

    #[tokio::test]
    async fn checkout_outage_is_processing_then_assume_success() {
        let f = fixture();
        seed(&f.store).await;
        f.processor
            .set_checkout("chk_pro_1", Err(ProcessorError::network("connection refused")));

        let early = f.poller.handle(poll(2)).await.unwrap();
        assert_eq!(early.status, PollStatus::Processing);
        assert!(!early.assume_success);

        let last = f.poller.handle(poll(10)).await.unwrap();
        assert_eq!(last.status, PollStatus::Processing);
        assert!(last.assume_success);
    }
}
