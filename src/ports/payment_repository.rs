//! PaymentRepository port - persistence of payment records.
//!
//! Every state-changing method is a conditional update: it succeeds only
//! if the row is still in the expected state, and reports whether it did.
//! Callers never read-then-write across two round trips.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, PaymentId, Timestamp, UserId};
use crate::domain::payment::Payment;

#[async_trait]
pub trait PaymentRepository: Send + Sync {
    /// Insert a new pending payment.
    async fn create(&self, payment: &Payment) -> Result<(), DomainError>;

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, DomainError>;

    async fn find_by_checkout_reference(
        &self,
        checkout_reference: &str,
    ) -> Result<Option<Payment>, DomainError>;

    /// Most recent pending payment for `owner` with exactly `amount_minor`.
    async fn find_pending_by_owner_and_amount(
        &self,
        owner: &UserId,
        amount_minor: i64,
    ) -> Result<Option<Payment>, DomainError>;

    /// Most recent pending payment for `owner`.
    async fn find_latest_pending_for_owner(
        &self,
        owner: &UserId,
    ) -> Result<Option<Payment>, DomainError>;

    /// Most recent payment for `owner` completed at or after `since`.
    async fn find_recent_completed_for_owner(
        &self,
        owner: &UserId,
        since: Timestamp,
    ) -> Result<Option<Payment>, DomainError>;

    /// All pending payments, oldest first.
    async fn list_pending(&self, limit: u32) -> Result<Vec<Payment>, DomainError>;

    /// Pending to expired. Returns false if the payment was no longer pending.
    async fn expire_if_pending(&self, id: PaymentId, at: Timestamp) -> Result<bool, DomainError>;

    /// Sets the owner of a guest payment. Returns false if it already had one.
    async fn link_owner(
        &self,
        id: PaymentId,
        owner: &UserId,
        at: Timestamp,
    ) -> Result<bool, DomainError>;

    /// Records the processor-side payment id learned from a webhook.
    async fn set_processor_payment_ref(
        &self,
        id: PaymentId,
        processor_payment_ref: &str,
    ) -> Result<(), DomainError>;
}
