//! Account reads and the commission ledger.

use async_trait::async_trait;

use super::InMemoryStore;
use crate::domain::account::Account;
use crate::domain::foundation::{DomainError, PaymentId, UserId};
use crate::domain::ledger::{Commission, CreditTransaction};
use crate::ports::{AccountRepository, CommissionLedger, RecordOutcome};

#[async_trait]
impl AccountRepository for InMemoryStore {
    async fn find(&self, user_id: &UserId) -> Result<Option<Account>, DomainError> {
        Ok(self.state.read().await.accounts.get(user_id).cloned())
    }

    async fn credit_history(&self, user_id: &UserId) -> Result<Vec<CreditTransaction>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .credit_ledger
            .iter()
            .filter(|tx| &tx.user_id == user_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl CommissionLedger for InMemoryStore {
    async fn record(&self, commission: &Commission) -> Result<RecordOutcome, DomainError> {
        let mut state = self.state.write().await;
        if state.commissions.contains_key(&commission.payment_id) {
            return Ok(RecordOutcome::Duplicate);
        }
        state
            .commissions
            .insert(commission.payment_id, commission.clone());
        Ok(RecordOutcome::Recorded)
    }

    async fn find_by_payment(
        &self,
        payment_id: PaymentId,
    ) -> Result<Option<Commission>, DomainError> {
        Ok(self.state.read().await.commissions.get(&payment_id).cloned())
    }
}
