//! AccountRepository port - read side of the account and credit ledger.
//!
//! Writes happen only inside `ActivationStore` transactions.

use async_trait::async_trait;

use crate::domain::account::Account;
use crate::domain::foundation::{DomainError, UserId};
use crate::domain::ledger::CreditTransaction;

#[async_trait]
pub trait AccountRepository: Send + Sync {
    async fn find(&self, user_id: &UserId) -> Result<Option<Account>, DomainError>;

    /// Ledger entries for a user, oldest first.
    async fn credit_history(&self, user_id: &UserId) -> Result<Vec<CreditTransaction>, DomainError>;
}
