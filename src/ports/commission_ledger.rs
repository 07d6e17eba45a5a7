//! CommissionLedger port - affiliate commissions, at most one per payment.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId};
use crate::domain::ledger::Commission;

/// Result of an idempotent insert.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded,
    /// A commission for this payment already exists; nothing was written.
    Duplicate,
}

#[async_trait]
pub trait CommissionLedger: Send + Sync {
    /// Insert keyed on `payment_id`; a second insert for the same payment is a no-op.
    async fn record(&self, commission: &Commission) -> Result<RecordOutcome, DomainError>;

    async fn find_by_payment(&self, payment_id: PaymentId)
        -> Result<Option<Commission>, DomainError>;
}
