//! ActivationStore port - the atomic activation step.
//!
//! Each method is one storage transaction spanning the payment status
//! compare-and-swap, the account mutation, the credit ledger append and
//! the outbox inserts. Either all of it commits or none of it does, so a
//! payment is never `completed` with its grant missing.

use async_trait::async_trait;

use crate::domain::account::{Account, AccountGrant};
use crate::domain::foundation::{DomainError, EventEnvelope, PaymentId, Timestamp, UserId};
use crate::domain::payment::ActivationMethod;

/// Grant destined for a known account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedGrant {
    pub user_id: UserId,
    pub grant: AccountGrant,
}

/// Everything committed when a pending payment is completed.
#[derive(Debug, Clone)]
pub struct ActivationCommit {
    pub payment_id: PaymentId,
    pub method: ActivationMethod,
    pub at: Timestamp,

    /// `None` for guest payments; the grant is deferred until link-up.
    pub grant: Option<OwnedGrant>,

    /// Outbox entries written in the same transaction.
    pub events: Vec<EventEnvelope>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    /// This caller flipped the status. Carries the updated account when a
    /// grant was applied.
    Completed { account: Option<Account> },

    /// The status was no longer pending; another caller won.
    LostRace,
}

/// Deferred grant for a completed guest payment that now has an owner.
#[derive(Debug, Clone)]
pub struct GrantCommit {
    pub payment_id: PaymentId,
    pub grant: OwnedGrant,
    pub at: Timestamp,
    pub events: Vec<EventEnvelope>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GrantOutcome {
    Applied(Account),
    /// Someone else applied it first, or the payment no longer qualifies.
    NotApplied,
}

/// Reversal of a completed payment.
#[derive(Debug, Clone)]
pub struct ReversalCommit {
    pub payment_id: PaymentId,
    pub reason: String,
    pub at: Timestamp,

    /// Credits the payment carries. Clawed back only if the reverted row
    /// shows the grant was applied, read inside the same transaction.
    pub credits_amount: Option<i64>,

    pub events: Vec<EventEnvelope>,
}

/// What `revert_completed` found on the row it flipped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReversalOutcome {
    Reverted {
        owner: Option<UserId>,
        grant_was_applied: bool,
    },
    /// The payment was not completed when the CAS ran.
    NotCompleted,
}

#[async_trait]
pub trait ActivationStore: Send + Sync {
    /// `UPDATE payments SET status = 'completed' WHERE id = ? AND status = 'pending'`
    /// plus the grant and outbox rows, in one transaction.
    async fn complete_pending(
        &self,
        commit: ActivationCommit,
    ) -> Result<CompletionOutcome, DomainError>;

    /// Applies the grant of a completed, linked guest payment exactly once.
    async fn apply_deferred_grant(&self, commit: GrantCommit) -> Result<GrantOutcome, DomainError>;

    /// Completed to failed with `reverted = true`, voiding any commission.
    /// Credits are clawed back from the owner on the row when its grant had
    /// been applied.
    async fn revert_completed(
        &self,
        commit: ReversalCommit,
    ) -> Result<ReversalOutcome, DomainError>;
}
