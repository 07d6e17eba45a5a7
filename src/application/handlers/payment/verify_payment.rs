//! PaymentVerifier - ground truth from the processor's read API.
//!
//! A checkout can report "completed" while the charge behind it was
//! declined, so verification always makes a second call for the payment
//! record and only trusts the payment-level status.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::domain::payment::Payment;
use crate::ports::{ProcessorClient, ProcessorError, ProcessorErrorCode};

/// Payment-level statuses that count as paid when none are configured.
pub const DEFAULT_PAID_STATUSES: [&str; 3] = ["successful", "settled", "captured"];

/// How a checkout-level lookup failure is treated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationPolicy {
    /// Any failure short of a paid verdict is "not paid".
    FailClosed,
    /// An unreachable checkout endpoint yields `Indeterminate` so the
    /// payer is told to wait rather than that payment failed. The
    /// payment-level check stays fail-closed.
    FailOpenOnCheckout,
}

/// Why no verdict could be reached.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Processor call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Checkout lookup failed: {0}")]
    Checkout(ProcessorError),

    #[error("Payment lookup failed: {0}")]
    Payment(ProcessorError),
}

impl VerificationError {
    /// Timeouts, network errors and 5xx; the next attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            VerificationError::Timeout(_) => true,
            VerificationError::Checkout(e) | VerificationError::Payment(e) => e.is_retryable(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    Paid {
        processor_payment_id: String,
        status: String,
    },

    /// The processor says this payment is not (or not provably) paid.
    NotPaid { status: String },

    /// The checkout exists but has not produced a charge yet.
    AwaitingPayment { checkout_status: String },

    /// No verdict; ask again later. Never treated as paid.
    Indeterminate(VerificationError),
}

impl VerificationOutcome {
    pub fn is_paid(&self) -> bool {
        matches!(self, VerificationOutcome::Paid { .. })
    }

    /// Status string reported alongside the verdict.
    pub fn status(&self) -> &str {
        match self {
            VerificationOutcome::Paid { status, .. } => status,
            VerificationOutcome::NotPaid { status } => status,
            VerificationOutcome::AwaitingPayment { checkout_status } => checkout_status,
            VerificationOutcome::Indeterminate(_) => "indeterminate",
        }
    }
}

/// Stateless, side-effect free; safe to call concurrently.
pub struct PaymentVerifier {
    processor: Arc<dyn ProcessorClient>,
    paid_statuses: Vec<String>,
    call_timeout: Duration,
}

impl PaymentVerifier {
    pub fn new(
        processor: Arc<dyn ProcessorClient>,
        paid_statuses: Vec<String>,
        call_timeout: Duration,
    ) -> Self {
        let paid_statuses = paid_statuses
            .into_iter()
            .map(|s| s.trim().to_ascii_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        Self {
            processor,
            paid_statuses,
            call_timeout,
        }
    }

    pub fn with_default_statuses(processor: Arc<dyn ProcessorClient>, call_timeout: Duration) -> Self {
        Self::new(
            processor,
            DEFAULT_PAID_STATUSES.iter().map(|s| s.to_string()).collect(),
            call_timeout,
        )
    }

    fn is_paid_status(&self, status: &str) -> bool {
        let status = status.to_ascii_lowercase();
        self.paid_statuses.iter().any(|s| *s == status)
    }

    /// Verifies `payment` against the processor.
    pub async fn verify(&self, payment: &Payment, policy: VerificationPolicy) -> VerificationOutcome {
        let Some(checkout_ref) = payment.checkout_reference.as_deref() else {
            return VerificationOutcome::NotPaid {
                status: "no_checkout_reference".to_string(),
            };
        };

        let checkout = match self.call(self.processor.get_checkout(checkout_ref)).await {
            Ok(checkout) => checkout,
            Err(e) => return self.checkout_failure(payment, e, policy),
        };

        let processor_payment_id = match checkout.payment_id {
            Some(id) if !id.is_empty() => id,
            _ => {
                return VerificationOutcome::AwaitingPayment {
                    checkout_status: checkout.status,
                }
            }
        };

        let record = match self.call(self.processor.get_payment(&processor_payment_id)).await {
            Ok(record) => record,
            Err(e) => {
                tracing::warn!(
                    payment_id = %payment.id,
                    processor_payment_id = %processor_payment_id,
                    error = %e,
                    "payment-level verification failed"
                );
                return match e {
                    CallError::Timeout(d) => {
                        VerificationOutcome::Indeterminate(VerificationError::Timeout(d))
                    }
                    CallError::Processor(_) => VerificationOutcome::NotPaid {
                        status: "unverifiable".to_string(),
                    },
                };
            }
        };

        if !self.is_paid_status(&record.status) {
            tracing::warn!(
                payment_id = %payment.id,
                processor_status = %record.status,
                "processor reports payment not paid"
            );
            return VerificationOutcome::NotPaid {
                status: record.status,
            };
        }

        if let Some(amount) = record.amount {
            if amount != payment.amount_minor {
                tracing::warn!(
                    payment_id = %payment.id,
                    expected = payment.amount_minor,
                    actual = amount,
                    "processor amount does not match payment"
                );
                return VerificationOutcome::NotPaid {
                    status: "amount_mismatch".to_string(),
                };
            }
        }

        VerificationOutcome::Paid {
            processor_payment_id: record.id,
            status: record.status,
        }
    }

    fn checkout_failure(
        &self,
        payment: &Payment,
        err: CallError,
        policy: VerificationPolicy,
    ) -> VerificationOutcome {
        tracing::warn!(payment_id = %payment.id, error = %err, "checkout verification failed");
        match (err, policy) {
            (CallError::Timeout(d), _) => {
                VerificationOutcome::Indeterminate(VerificationError::Timeout(d))
            }
            (CallError::Processor(e), VerificationPolicy::FailOpenOnCheckout) => {
                VerificationOutcome::Indeterminate(VerificationError::Checkout(e))
            }
            (CallError::Processor(e), VerificationPolicy::FailClosed) => {
                VerificationOutcome::NotPaid {
                    status: format!("checkout_{}", e.code),
                }
            }
        }
    }

    async fn call<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, ProcessorError>>,
    ) -> Result<T, CallError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Err(_) => Err(CallError::Timeout(self.call_timeout)),
            Ok(Err(e)) if e.code == ProcessorErrorCode::Timeout => {
                Err(CallError::Timeout(self.call_timeout))
            }
            Ok(Err(e)) => Err(CallError::Processor(e)),
            Ok(Ok(value)) => Ok(value),
        }
    }
}

#[derive(Debug)]
enum CallError {
    Timeout(Duration),
    Processor(ProcessorError),
}

impl std::fmt::Display for CallError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallError::Timeout(d) => write!(f, "timed out after {:?}", d),
            CallError::Processor(e) => write!(f, "{}", e),
        }
    }
}
