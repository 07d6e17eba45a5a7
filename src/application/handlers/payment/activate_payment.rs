//! ActivationEngine - the single path from a pending payment to a granted
//! account.
//!
//! The webhook, the checkout poller and the sweep all end here. The engine
//! never takes a lock of its own: the status compare-and-swap inside
//! `ActivationStore::complete_pending` decides the one winner, and every
//! other caller gets the idempotent "already completed" answer.

use std::sync::Arc;

use thiserror::Error;

use crate::domain::account::{AccountGrant, BillingTerms};
use crate::domain::foundation::{
    DomainError, ErrorCode, EventEnvelope, EventId, PaymentId, Timestamp, UserId,
};
use crate::domain::payment::{
    ActivationMethod, CommissionRequested, Payment, PaymentActivated, PaymentError,
};
use crate::ports::{
    ActivationCommit, ActivationStore, CompletionOutcome, GrantCommit, GrantOutcome, OwnedGrant,
    PaymentRepository,
};

#[derive(Debug, Clone, Error)]
pub enum ActivationError {
    #[error("Payment {0} not found")]
    NotFound(PaymentId),

    #[error(transparent)]
    Storage(#[from] DomainError),
}

impl From<ActivationError> for DomainError {
    fn from(err: ActivationError) -> Self {
        match err {
            ActivationError::NotFound(id) => PaymentError::NotFound(id).into(),
            ActivationError::Storage(e) => e,
        }
    }
}

/// Outcome of one activation call.
#[derive(Debug, Clone)]
pub struct ActivationResult {
    /// The payment is completed, by this call or an earlier one.
    pub success: bool,

    /// Someone else completed it first; no mutation was applied here.
    pub already_completed: bool,

    /// The payment as this call last saw it.
    pub payment: Payment,
}

impl ActivationResult {
    fn completed_here(payment: Payment) -> Self {
        Self {
            success: true,
            already_completed: false,
            payment,
        }
    }

    fn already_completed(payment: Payment) -> Self {
        Self {
            success: true,
            already_completed: true,
            payment,
        }
    }

    fn refused(payment: Payment) -> Self {
        Self {
            success: false,
            already_completed: false,
            payment,
        }
    }
}

pub struct ActivationEngine {
    payments: Arc<dyn PaymentRepository>,
    store: Arc<dyn ActivationStore>,
    terms: BillingTerms,
}

impl ActivationEngine {
    pub fn new(
        payments: Arc<dyn PaymentRepository>,
        store: Arc<dyn ActivationStore>,
        terms: BillingTerms,
    ) -> Self {
        Self {
            payments,
            store,
            terms,
        }
    }

    /// Activates `payment_id`, tagging the audit trail with `method`.
    ///
    /// Callers are responsible for having established that the payment
    /// was actually paid.
    pub async fn activate(
        &self,
        payment_id: PaymentId,
        method: ActivationMethod,
    ) -> Result<ActivationResult, ActivationError> {
        let payment = self
            .payments
            .find_by_id(payment_id)
            .await?
            .ok_or(ActivationError::NotFound(payment_id))?;
        self.activate_loaded(payment, method).await
    }

    /// Same as `activate` for a payment the caller already loaded.
    pub async fn activate_loaded(
        &self,
        payment: Payment,
        method: ActivationMethod,
    ) -> Result<ActivationResult, ActivationError> {
        if payment.is_completed() {
            return self.finish_completed(payment).await;
        }
        if !payment.is_pending() {
            tracing::warn!(
                payment_id = %payment.id,
                status = %payment.status,
                method = %method,
                "refusing to activate terminal payment"
            );
            return Ok(ActivationResult::refused(payment));
        }

        let at = Timestamp::now();
        let grant = payment.owner.clone().map(|user_id| OwnedGrant {
            user_id,
            grant: AccountGrant::for_payment(&payment.kind, &self.terms),
        });
        let events = match &payment.owner {
            Some(owner) => grant_events(&payment, owner, method, at)?,
            None => Vec::new(),
        };

        let commit = ActivationCommit {
            payment_id: payment.id,
            method,
            at,
            grant: grant.clone(),
            events,
        };

        match self.store.complete_pending(commit).await? {
            CompletionOutcome::Completed { .. } => {
                let mut completed = payment;
                completed
                    .complete(method, at, grant.is_some())
                    .map_err(DomainError::from)?;
                tracing::info!(
                    payment_id = %completed.id,
                    method = %method,
                    kind = completed.kind.as_str(),
                    guest = completed.owner.is_none(),
                    "payment activated"
                );
                Ok(ActivationResult::completed_here(completed))
            }
            CompletionOutcome::LostRace => {
                tracing::debug!(payment_id = %payment.id, method = %method, "lost activation race");
                let current = self
                    .payments
                    .find_by_id(payment.id)
                    .await?
                    .ok_or(ActivationError::NotFound(payment.id))?;
                if current.is_completed() {
                    // The winner may have held a copy from before a link, so
                    // the grant can still be owed to the new owner.
                    self.finish_completed(current).await
                } else {
                    Ok(ActivationResult::refused(current))
                }
            }
        }
    }

    /// Completed payments are a no-op, except that a linked guest payment
    /// whose grant was deferred gets it applied now.
    async fn finish_completed(&self, payment: Payment) -> Result<ActivationResult, ActivationError> {
        if !payment.needs_grant() {
            return Ok(ActivationResult::already_completed(payment));
        }
        let Some(owner) = payment.owner.clone() else {
            return Ok(ActivationResult::already_completed(payment));
        };

        let at = Timestamp::now();
        let commit = GrantCommit {
            payment_id: payment.id,
            grant: OwnedGrant {
                user_id: owner.clone(),
                grant: AccountGrant::for_payment(&payment.kind, &self.terms),
            },
            at,
            events: grant_events(&payment, &owner, ActivationMethod::Link, at)?,
        };

        match self.store.apply_deferred_grant(commit).await? {
            GrantOutcome::Applied(_) => {
                let mut granted = payment;
                granted.mark_grant_applied(at).map_err(DomainError::from)?;
                tracing::info!(payment_id = %granted.id, user_id = %owner, "deferred grant applied");
                Ok(ActivationResult::completed_here(granted))
            }
            GrantOutcome::NotApplied => {
                tracing::debug!(payment_id = %payment.id, "deferred grant already applied");
                Ok(ActivationResult::already_completed(payment))
            }
        }
    }
}

/// Outbox events for a grant landing on `owner`'s account.
fn grant_events(
    payment: &Payment,
    owner: &UserId,
    method: ActivationMethod,
    at: Timestamp,
) -> Result<Vec<EventEnvelope>, DomainError> {
    let activated = PaymentActivated {
        event_id: EventId::new(),
        payment_id: payment.id,
        user_id: owner.clone(),
        kind: payment.kind.clone(),
        amount_minor: payment.amount_minor,
        currency: payment.currency.clone(),
        method,
        activated_at: at,
    };
    let mut events = vec![envelope(&activated, owner)?];

    if let Some(affiliate_id) = &payment.affiliate_id {
        let commission = CommissionRequested {
            event_id: EventId::new(),
            payment_id: payment.id,
            affiliate_id: affiliate_id.clone(),
            referred_user_id: owner.clone(),
            amount_minor: payment.amount_minor,
            currency: payment.currency.clone(),
            requested_at: at,
        };
        events.push(envelope(&commission, owner)?);
    }
    Ok(events)
}

pub(crate) fn envelope<T>(event: &T, owner: &UserId) -> Result<EventEnvelope, DomainError>
where
    T: crate::domain::foundation::DomainEvent + serde::Serialize,
{
    EventEnvelope::from_event(event)
        .map(|e| e.with_user_id(owner.as_str()))
        .map_err(|e| DomainError::new(ErrorCode::SerializationError, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::memory::InMemoryStore;
    use crate::domain::foundation::AffiliateId;
    use crate::domain::payment::test_support::pro_subscription;
    use crate::domain::payment::{NewPayment, PaymentKind, PaymentStatus};
    use crate::ports::AccountRepository;

    fn engine(store: &InMemoryStore) -> ActivationEngine {
        ActivationEngine::new(
            Arc::new(store.clone()),
            Arc::new(store.clone()),
            BillingTerms::default(),
        )
    }

    async fn seed(store: &InMemoryStore, new: NewPayment) -> Payment {
        let payment = Payment::create(new, Timestamp::now()).unwrap();
        store.create(&payment).await.unwrap();
        payment
    }

    fn user(id: &str) -> UserId {
        UserId::new(id).unwrap()
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Happy Path
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn activates_pending_subscription() {
        let store = InMemoryStore::new();
        let payment = seed(&store, pro_subscription(Some("u1"))).await;

        let result = engine(&store)
            .activate(payment.id, ActivationMethod::Webhook)
            .await
            .unwrap();

        assert!(result.success);
        assert!(!result.already_completed);
        assert_eq!(result.payment.status, PaymentStatus::Completed);

        let account = store.find(&user("u1")).await.unwrap().unwrap();
        assert_eq!(account.plan_id.as_deref(), Some("pro"));

        let stored = store.find_by_id(payment.id).await.unwrap().unwrap();
        assert_eq!(
            stored.metadata.activation_method(),
            Some(ActivationMethod::Webhook)
        );
    }

    #[tokio::test]
    async fn credits_payment_adds_balance() {
        let store = InMemoryStore::new();
        let mut new = pro_subscription(Some("u1"));
        new.kind = PaymentKind::Credits { credits_amount: 50 };
        let payment = seed(&store, new).await;

        engine(&store)
            .activate(payment.id, ActivationMethod::Sweep)
            .await
            .unwrap();

        let account = store.find(&user("u1")).await.unwrap().unwrap();
        assert_eq!(account.credit_balance, 50);
        assert_eq!(store.credit_history(&user("u1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn activation_enqueues_notification_and_commission() {
        let store = InMemoryStore::new();
        let mut new = pro_subscription(Some("u1"));
        new.affiliate_id = Some(AffiliateId::new("aff-1").unwrap());
        let payment = seed(&store, new).await;

        engine(&store)
            .activate(payment.id, ActivationMethod::Webhook)
            .await
            .unwrap();

        let types: Vec<String> = store
            .outbox_entries()
            .await
            .into_iter()
            .map(|e| e.event.event_type)
            .collect();
        assert_eq!(
            types,
            vec!["payment.activated.v1", "payment.commission_requested.v1"]
        );
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Idempotency
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn second_call_reports_already_completed() {
        let store = InMemoryStore::new();
        let payment = seed(&store, pro_subscription(Some("u1"))).await;
        let engine = engine(&store);

        engine.activate(payment.id, ActivationMethod::Webhook).await.unwrap();
        let again = engine
            .activate(payment.id, ActivationMethod::ClientPoll)
            .await
            .unwrap();

        assert!(again.success);
        assert!(again.already_completed);
        assert_eq!(store.outbox_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn stale_copy_loses_race_without_second_grant() {
        let store = InMemoryStore::new();
        let mut new = pro_subscription(Some("u1"));
        new.kind = PaymentKind::Credits { credits_amount: 10 };
        let payment = seed(&store, new).await;
        let engine = engine(&store);

        engine
            .activate_loaded(payment.clone(), ActivationMethod::Webhook)
            .await
            .unwrap();
        let stale = engine
            .activate_loaded(payment, ActivationMethod::Sweep)
            .await
            .unwrap();

        assert!(stale.already_completed);
        let account = store.find(&user("u1")).await.unwrap().unwrap();
        assert_eq!(account.credit_balance, 10);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Refusals and Failures
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn expired_payment_is_never_resurrected() {
        let store = InMemoryStore::new();
        let payment = seed(&store, pro_subscription(Some("u1"))).await;
        store.expire_if_pending(payment.id, Timestamp::now()).await.unwrap();

        let result = engine(&store)
            .activate(payment.id, ActivationMethod::Webhook)
            .await
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.payment.status, PaymentStatus::Expired);
        assert!(store.find(&user("u1")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn unknown_payment_is_not_found() {
        let store = InMemoryStore::new();
        let result = engine(&store)
            .activate(PaymentId::new(), ActivationMethod::Webhook)
            .await;
        assert!(matches!(result, Err(ActivationError::NotFound(_))));
    }

    #[tokio::test]
    async fn storage_failure_leaves_payment_pending() {
        let store = InMemoryStore::new();
        let payment = seed(&store, pro_subscription(Some("u1"))).await;
        store.set_fail_commits(true).await;

        let result = engine(&store)
            .activate(payment.id, ActivationMethod::Webhook)
            .await;

        assert!(matches!(result, Err(ActivationError::Storage(_))));
        let stored = store.find_by_id(payment.id).await.unwrap().unwrap();
        assert!(stored.is_pending());
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Guest Payments
    // ════════════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn guest_payment_completes_without_grant_until_linked() {
        let store = InMemoryStore::new();
        let payment = seed(&store, pro_subscription(None)).await;
        let engine = engine(&store);

        let first = engine
            .activate(payment.id, ActivationMethod::Webhook)
            .await
            .unwrap();
        assert!(first.success);
        assert!(!first.payment.grant_applied);
        assert!(store.outbox_entries().await.is_empty());

        store
            .link_owner(payment.id, &user("new-user"), Timestamp::now())
            .await
            .unwrap();
        let linked = engine
            .activate(payment.id, ActivationMethod::Link)
            .await
            .unwrap();
        assert!(!linked.already_completed);
        assert!(linked.payment.grant_applied);

        let again = engine
            .activate(payment.id, ActivationMethod::Link)
            .await
            .unwrap();
        assert!(again.already_completed);

        let account = store.find(&user("new-user")).await.unwrap().unwrap();
        assert_eq!(account.plan_id.as_deref(), Some("pro"));
        assert_eq!(store.outbox_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn link_that_loses_race_to_stale_guest_copy_still_grants() {
        let store = InMemoryStore::new();
        let guest = seed(&store, pro_subscription(None)).await;
        let engine = engine(&store);

        store
            .link_owner(guest.id, &user("new-user"), Timestamp::now())
            .await
            .unwrap();
        let linked = store.find_by_id(guest.id).await.unwrap().unwrap();

        // A webhook still holding the ownerless row wins the status flip.
        let webhook = engine
            .activate_loaded(guest, ActivationMethod::Webhook)
            .await
            .unwrap();
        assert!(!webhook.payment.grant_applied);

        let link = engine
            .activate_loaded(linked, ActivationMethod::Link)
            .await
            .unwrap();

        assert!(link.success);
        assert!(link.payment.grant_applied);
        let account = store.find(&user("new-user")).await.unwrap().unwrap();
        assert_eq!(account.plan_id.as_deref(), Some("pro"));
        let stored = store.find_by_id(link.payment.id).await.unwrap().unwrap();
        assert!(stored.grant_applied);
        assert_eq!(store.outbox_entries().await.len(), 1);
    }

    #[tokio::test]
    async fn concurrent_link_and_webhook_grant_exactly_once() {
        for _ in 0..20 {
            let store = InMemoryStore::new();
            let mut new = pro_subscription(None);
            new.kind = PaymentKind::Credits { credits_amount: 40 };
            let guest = seed(&store, new).await;
            let engine = Arc::new(engine(&store));

            let webhook = {
                let engine = engine.clone();
                let stale = guest.clone();
                tokio::spawn(async move {
                    engine.activate_loaded(stale, ActivationMethod::Webhook).await
                })
            };
            let link = {
                let engine = engine.clone();
                let store = store.clone();
                tokio::spawn(async move {
                    store
                        .link_owner(guest.id, &UserId::new("new-user").unwrap(), Timestamp::now())
                        .await
                        .unwrap();
                    let linked = store.find_by_id(guest.id).await.unwrap().unwrap();
                    engine.activate_loaded(linked, ActivationMethod::Link).await
                })
            };
            webhook.await.unwrap().unwrap();
            let linked = link.await.unwrap().unwrap();

            assert!(linked.payment.grant_applied);
            let account = store.find(&user("new-user")).await.unwrap().unwrap();
            assert_eq!(account.credit_balance, 40);
            assert_eq!(store.credit_history(&user("new-user")).await.unwrap().len(), 1);
        }
    }
}
