//! Payment records and the activation step.

use async_trait::async_trait;

use super::InMemoryStore;
use crate::domain::account::Account;
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, Timestamp, UserId};
use crate::domain::ledger::CommissionStatus;
use crate::domain::payment::{Payment, PaymentError};
use crate::ports::{
    ActivationCommit, ActivationStore, CompletionOutcome, GrantCommit, GrantOutcome,
    PaymentRepository, ReversalCommit, ReversalOutcome,
};

#[async_trait]
impl PaymentRepository for InMemoryStore {
    async fn create(&self, payment: &Payment) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        if state.payments.contains_key(&payment.id) {
            return Err(DomainError::new(
                ErrorCode::ValidationFailed,
                format!("Payment {} already exists", payment.id),
            ));
        }
        if let Some(reference) = &payment.checkout_reference {
            let taken = state
                .payments
                .values()
                .any(|p| p.checkout_reference.as_deref() == Some(reference.as_str()));
            if taken {
                return Err(DomainError::validation(
                    "checkout_reference",
                    "checkout reference already in use",
                ));
            }
        }
        state.payments.insert(payment.id, payment.clone());
        Ok(())
    }

    async fn find_by_id(&self, id: PaymentId) -> Result<Option<Payment>, DomainError> {
        Ok(self.state.read().await.payments.get(&id).cloned())
    }

    async fn find_by_checkout_reference(
        &self,
        checkout_reference: &str,
    ) -> Result<Option<Payment>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .find(|p| p.checkout_reference.as_deref() == Some(checkout_reference))
            .cloned())
    }

    async fn find_pending_by_owner_and_amount(
        &self,
        owner: &UserId,
        amount_minor: i64,
    ) -> Result<Option<Payment>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| {
                p.is_pending() && p.owner.as_ref() == Some(owner) && p.amount_minor == amount_minor
            })
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn find_latest_pending_for_owner(
        &self,
        owner: &UserId,
    ) -> Result<Option<Payment>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| p.is_pending() && p.owner.as_ref() == Some(owner))
            .max_by_key(|p| p.created_at)
            .cloned())
    }

    async fn find_recent_completed_for_owner(
        &self,
        owner: &UserId,
        since: Timestamp,
    ) -> Result<Option<Payment>, DomainError> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| {
                p.is_completed()
                    && p.owner.as_ref() == Some(owner)
                    && p.completed_at.map_or(false, |at| !at.is_before(&since))
            })
            .max_by_key(|p| p.completed_at)
            .cloned())
    }

    async fn list_pending(&self, limit: u32) -> Result<Vec<Payment>, DomainError> {
        let state = self.state.read().await;
        let mut pending: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.is_pending())
            .cloned()
            .collect();
        pending.sort_by_key(|p| p.created_at);
        pending.truncate(limit as usize);
        Ok(pending)
    }

    async fn expire_if_pending(&self, id: PaymentId, at: Timestamp) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state.payments.get_mut(&id) {
            Some(payment) if payment.is_pending() => {
                payment.expire(at)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn link_owner(
        &self,
        id: PaymentId,
        owner: &UserId,
        at: Timestamp,
    ) -> Result<bool, DomainError> {
        let mut state = self.state.write().await;
        match state.payments.get_mut(&id) {
            Some(payment) if payment.owner.is_none() => {
                payment.link_owner(owner.clone(), at)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn set_processor_payment_ref(
        &self,
        id: PaymentId,
        processor_payment_ref: &str,
    ) -> Result<(), DomainError> {
        let mut state = self.state.write().await;
        let payment = state
            .payments
            .get_mut(&id)
            .ok_or_else(|| DomainError::from(PaymentError::NotFound(id)))?;
        payment.processor_payment_ref = Some(processor_payment_ref.to_string());
        Ok(())
    }
}

#[async_trait]
impl ActivationStore for InMemoryStore {
    async fn complete_pending(
        &self,
        commit: ActivationCommit,
    ) -> Result<CompletionOutcome, DomainError> {
        let mut state = self.state.write().await;
        state.check_commit("complete_pending")?;

        let mut payment = state
            .payments
            .get(&commit.payment_id)
            .cloned()
            .ok_or_else(|| DomainError::from(PaymentError::NotFound(commit.payment_id)))?;
        if !payment.is_pending() {
            return Ok(CompletionOutcome::LostRace);
        }

        // Stage every change, then write them together.
        let mut staged_account = None;
        let mut ledger_entry = None;
        if let Some(owned) = &commit.grant {
            let mut account = state
                .accounts
                .get(&owned.user_id)
                .cloned()
                .unwrap_or_else(|| Account::new(owned.user_id.clone(), commit.at));
            ledger_entry = account.apply_grant(&owned.grant, commit.payment_id, commit.at);
            staged_account = Some(account);
        }
        payment.complete(commit.method, commit.at, commit.grant.is_some())?;

        state.payments.insert(payment.id, payment);
        if let Some(account) = &staged_account {
            state
                .accounts
                .insert(account.user_id.clone(), account.clone());
        }
        if let Some(entry) = ledger_entry {
            state.credit_ledger.push(entry);
        }
        state.enqueue(commit.events);

        Ok(CompletionOutcome::Completed {
            account: staged_account,
        })
    }

    async fn apply_deferred_grant(&self, commit: GrantCommit) -> Result<GrantOutcome, DomainError> {
        let mut state = self.state.write().await;
        state.check_commit("apply_deferred_grant")?;

        let mut payment = match state.payments.get(&commit.payment_id) {
            Some(p) if p.needs_grant() && p.owner.as_ref() == Some(&commit.grant.user_id) => {
                p.clone()
            }
            Some(_) => return Ok(GrantOutcome::NotApplied),
            None => return Err(PaymentError::NotFound(commit.payment_id).into()),
        };

        let user_id = commit.grant.user_id.clone();
        let mut account = state
            .accounts
            .get(&user_id)
            .cloned()
            .unwrap_or_else(|| Account::new(user_id.clone(), commit.at));
        let ledger_entry = account.apply_grant(&commit.grant.grant, commit.payment_id, commit.at);
        payment.mark_grant_applied(commit.at)?;

        state.payments.insert(payment.id, payment);
        state.accounts.insert(user_id, account.clone());
        if let Some(entry) = ledger_entry {
            state.credit_ledger.push(entry);
        }
        state.enqueue(commit.events);

        Ok(GrantOutcome::Applied(account))
    }

    async fn revert_completed(
        &self,
        commit: ReversalCommit,
    ) -> Result<ReversalOutcome, DomainError> {
        let mut state = self.state.write().await;
        state.check_commit("revert_completed")?;

        let mut payment = match state.payments.get(&commit.payment_id) {
            Some(p) if p.status.can_revert() => p.clone(),
            _ => return Ok(ReversalOutcome::NotCompleted),
        };
        let owner = payment.owner.clone();
        let grant_was_applied = payment.grant_applied;
        payment.revert(&commit.reason, commit.at)?;

        let clawback = owner.as_ref().zip(commit.credits_amount);
        if let (Some((user_id, amount)), true) = (clawback, grant_was_applied) {
            if let Some(account) = state.accounts.get_mut(user_id) {
                let entry = account.reverse_credits(amount, commit.payment_id, commit.at);
                state.credit_ledger.push(entry);
            }
        }
        if let Some(commission) = state.commissions.get_mut(&commit.payment_id) {
            commission.status = CommissionStatus::Voided;
        }
        state.payments.insert(payment.id, payment);
        state.enqueue(commit.events);

        Ok(ReversalOutcome::Reverted {
            owner,
            grant_was_applied,
        })
    }
}
