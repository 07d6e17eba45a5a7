//! SweepJob - periodic reconciliation of payments still pending.
//!
//! Catches what the webhook and the poller missed: dropped webhooks,
//! payers who closed the tab. Safe to run concurrently with itself and
//! with a webhook burst; every write is a conditional update.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::application::handlers::payment::{
    ActivationEngine, PaymentVerifier, VerificationOutcome, VerificationPolicy,
};
use crate::domain::foundation::{DomainError, Timestamp};
use crate::domain::payment::{ActivationMethod, Payment};
use crate::ports::PaymentRepository;

#[derive(Debug, Clone)]
pub struct SweepConfig {
    /// Younger payments are left to the webhook.
    pub min_age_secs: i64,
    /// Older payments that do not verify as paid are expired.
    pub expire_after_secs: i64,
    /// Pause between processor calls.
    pub call_delay: Duration,
    /// Max pending payments examined per pass.
    pub batch_limit: u32,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            min_age_secs: 120,
            expire_after_secs: 3600,
            call_delay: Duration::from_millis(500),
            batch_limit: 500,
        }
    }
}

/// Counts from one pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SweepReport {
    pub checked: usize,
    pub activated: usize,
    pub expired: usize,
    pub skipped_young: usize,
    pub still_pending: usize,
    pub errors: usize,
}

enum Step {
    Activated,
    Expired,
    StillPending,
    Nothing,
}

pub struct SweepJob {
    payments: Arc<dyn PaymentRepository>,
    engine: Arc<ActivationEngine>,
    verifier: Arc<PaymentVerifier>,
    config: SweepConfig,
}

impl SweepJob {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        engine: Arc<ActivationEngine>,
        verifier: Arc<PaymentVerifier>,
        config: SweepConfig,
    ) -> Self {
        Self {
            payments,
            engine,
            verifier,
            config,
        }
    }

    /// One pass over every pending payment, as of `now`.
    pub async fn run_once(&self, now: Timestamp) -> Result<SweepReport, DomainError> {
        let pending = self.payments.list_pending(self.config.batch_limit).await?;
        let mut report = SweepReport::default();
        let mut called_processor = false;

        for payment in pending {
            report.checked += 1;

            if payment.age_at(now).num_seconds() < self.config.min_age_secs {
                report.skipped_young += 1;
                continue;
            }

            if called_processor && !self.config.call_delay.is_zero() {
                tokio::time::sleep(self.config.call_delay).await;
            }
            called_processor = true;

            let payment_id = payment.id;
            match self.sweep_one(payment, now).await {
                Ok(Step::Activated) => report.activated += 1,
                Ok(Step::Expired) => report.expired += 1,
                Ok(Step::StillPending) => report.still_pending += 1,
                Ok(Step::Nothing) => {}
                Err(e) => {
                    tracing::error!(payment_id = %payment_id, error = %e, "sweep failed for payment");
                    report.errors += 1;
                }
            }
        }

        tracing::info!(
            checked = report.checked,
            activated = report.activated,
            expired = report.expired,
            skipped_young = report.skipped_young,
            still_pending = report.still_pending,
            errors = report.errors,
            "sweep finished"
        );
        Ok(report)
    }

    async fn sweep_one(&self, payment: Payment, now: Timestamp) -> Result<Step, DomainError> {
        let too_old = payment.age_at(now).num_seconds() >= self.config.expire_after_secs;

        match self.verifier.verify(&payment, VerificationPolicy::FailClosed).await {
            VerificationOutcome::Paid { .. } => {
                let result = self
                    .engine
                    .activate_loaded(payment, ActivationMethod::Sweep)
                    .await?;
                Ok(if result.success && !result.already_completed {
                    Step::Activated
                } else {
                    Step::Nothing
                })
            }
            // A timeout is "try again next pass", never grounds for expiry.
            VerificationOutcome::Indeterminate(reason) => {
                tracing::debug!(payment_id = %payment.id, reason = %reason, "sweep could not verify");
                Ok(Step::StillPending)
            }
            VerificationOutcome::NotPaid { .. } | VerificationOutcome::AwaitingPayment { .. }
                if too_old =>
            {
                if self.payments.expire_if_pending(payment.id, now).await? {
                    tracing::info!(payment_id = %payment.id, "expired stale payment");
                    Ok(Step::Expired)
                } else {
                    Ok(Step::Nothing)
                }
            }
            VerificationOutcome::NotPaid { .. } | VerificationOutcome::AwaitingPayment { .. } => {
                Ok(Step::StillPending)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::adapters::processor::MockProcessorClient;
    use crate::domain::account::BillingTerms;
    use crate::domain::payment::test_support::pro_subscription;
    use crate::domain::payment::PaymentStatus;

    struct Fixture {
        store: InMemoryStore,
        processor: MockProcessorClient,
        job: SweepJob,
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
            Duration::from_millis(200),
        ));
        let config = SweepConfig {
            call_delay: Duration::ZERO,
            ..SweepConfig::default()
        };
        let job = SweepJob::new(Arc::new(store.clone()), engine, verifier, config);
        Fixture {
            store,
            processor,
            job,
        }
    }

    async fn seed(store: &InMemoryStore, reference: &str) -> Payment {
        let mut new = pro_subscription(Some("u1"));
        new.checkout_reference = Some(reference.to_string());
        let payment = Payment::create(new, Timestamp::now()).unwrap();
        store.create(&payment).await.unwrap();
        payment
    }

    async fn status(store: &InMemoryStore, payment: &Payment) -> PaymentStatus {
        store.find_by_id(payment.id).await.unwrap().unwrap().status
    }

    #[tokio::test]
    async fn young_payments_are_left_for_the_webhook() {
        let f = fixture();
        let payment = seed(&f.store, "chk_1").await;
        f.processor.set_paid_checkout("chk_1", "pay_1", "successful");

        let report = f.job.run_once(payment.created_at.plus_secs(60)).await.unwrap();

        assert_eq!(report.skipped_young, 1);
        assert_eq!(f.processor.checkout_calls(), 0);
        assert_eq!(status(&f.store, &payment).await, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn verified_payment_is_activated_by_sweep() {
        let f = fixture();
        let payment = seed(&f.store, "chk_1").await;
        f.processor.set_paid_checkout("chk_1", "pay_1", "successful");

        let report = f.job.run_once(payment.created_at.plus_secs(300)).await.unwrap();

        assert_eq!(report.activated, 1);
        let stored = f.store.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(
            stored.metadata.activation_method(),
            Some(ActivationMethod::Sweep)
        );
    }

    #[tokio::test]
    async fn old_paid_payment_is_activated_not_expired() {
        let f = fixture();
        let payment = seed(&f.store, "chk_1").await;
        f.processor.set_paid_checkout("chk_1", "pay_1", "settled");

        let report = f.job.run_once(payment.created_at.plus_secs(7200)).await.unwrap();

        assert_eq!(report.activated, 1);
        assert_eq!(report.expired, 0);
    }

    #[tokio::test]
    async fn expiry_boundary_is_one_hour() {
        let f = fixture();
        let payment = seed(&f.store, "chk_1").await;

        let at_59 = f.job.run_once(payment.created_at.plus_secs(59 * 60)).await.unwrap();
        assert_eq!(at_59.still_pending, 1);
        assert_eq!(status(&f.store, &payment).await, PaymentStatus::Pending);

        let at_61 = f.job.run_once(payment.created_at.plus_secs(61 * 60)).await.unwrap();
        assert_eq!(at_61.expired, 1);
        assert_eq!(status(&f.store, &payment).await, PaymentStatus::Expired);
    }

    #[tokio::test]
    async fn timeout_never_expires_a_payment() {
        let f = fixture();
        let payment = seed(&f.store, "chk_1").await;
        f.processor.set_paid_checkout("chk_1", "pay_1", "successful");
        f.processor.set_latency(Duration::from_millis(500));

        let report = f.job.run_once(payment.created_at.plus_secs(7200)).await.unwrap();

        assert_eq!(report.still_pending, 1);
        assert_eq!(report.expired, 0);
        assert_eq!(status(&f.store, &payment).await, PaymentStatus::Pending);
    }

    #[tokio::test]
    async fn storage_failure_is_counted_and_sweep_continues() {
        let f = fixture();
        let first = seed(&f.store, "chk_1").await;
        seed(&f.store, "chk_2").await;
        f.processor.set_paid_checkout("chk_1", "pay_1", "successful");
        f.processor.set_paid_checkout("chk_2", "pay_2", "successful");
        f.store.set_fail_commits(true).await;

        let report = f.job.run_once(first.created_at.plus_secs(600)).await.unwrap();

        assert_eq!(report.checked, 2);
        assert_eq!(report.errors, 2);
    }
}
