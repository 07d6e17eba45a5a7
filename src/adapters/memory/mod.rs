//! In-memory storage adapter.
//!
//! One `InMemoryStore` implements every persistence port over a single
//! lock, so the conditional updates and the all-or-nothing activation
//! step behave the way the Postgres adapter's transactions do. Used by
//! tests and local development; nothing here survives a restart.

mod ledgers;
mod outbox;
mod payments;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::domain::account::Account;
use crate::domain::foundation::{DomainError, EventEnvelope, PaymentId, UserId};
use crate::domain::ledger::{Commission, CreditTransaction};
use crate::domain::payment::Payment;
use crate::ports::{OutboxEntry, ReadinessProbe, WebhookEventRecord};

#[derive(Debug, Default)]
struct MemoryState {
    payments: HashMap<PaymentId, Payment>,
    accounts: HashMap<UserId, Account>,
    credit_ledger: Vec<CreditTransaction>,
    commissions: HashMap<PaymentId, Commission>,
    outbox: Vec<OutboxEntry>,
    webhook_events: HashMap<String, WebhookEventRecord>,

    /// When set, every activation-store call fails before writing.
    fail_commits: bool,
}

impl MemoryState {
    fn check_commit(&self, operation: &str) -> Result<(), DomainError> {
        if self.fail_commits {
            return Err(DomainError::database(operation, "simulated storage failure"));
        }
        Ok(())
    }

    fn enqueue(&mut self, events: Vec<EventEnvelope>) {
        self.outbox
            .extend(events.into_iter().map(OutboxEntry::for_event));
    }
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes subsequent activation commits fail, as if the database were down.
    pub async fn set_fail_commits(&self, fail: bool) {
        self.state.write().await.fail_commits = fail;
    }

    /// Seeds an account, replacing any existing one.
    pub async fn put_account(&self, account: Account) {
        self.state
            .write()
            .await
            .accounts
            .insert(account.user_id.clone(), account);
    }

    pub async fn outbox_entries(&self) -> Vec<OutboxEntry> {
        self.state.read().await.outbox.clone()
    }

    pub async fn commission_count(&self) -> usize {
        self.state.read().await.commissions.len()
    }

    pub async fn payment_count(&self) -> usize {
        self.state.read().await.payments.len()
    }
}

#[async_trait]
impl ReadinessProbe for InMemoryStore {
    async fn check(&self) -> Result<(), DomainError> {
        Ok(())
    }
}
