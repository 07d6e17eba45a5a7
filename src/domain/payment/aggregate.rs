//! Payment aggregate.
//!
//! # Invariants
//!
//! - `amount_minor` is a positive integer in the currency's minor unit
//! - once `status` leaves `Pending` it never returns
//! - the grant (`kind`) never changes after creation
//! - `grant_applied` flips to true at most once, and only for an owned,
//!   completed payment
//!
//! The methods here mirror the conditional updates the storage adapters
//! run; they are the in-process statement of the same rules.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use super::{ActivationMethod, PaymentError, PaymentKind, PaymentMetadata, PaymentStatus};
use crate::domain::foundation::{
    AffiliateId, PaymentId, StateMachine, Timestamp, UserId, ValidationError,
};

/// Input for starting a checkout.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub owner: Option<UserId>,
    pub kind: PaymentKind,
    pub amount_minor: i64,
    pub currency: String,
    pub checkout_reference: Option<String>,
    pub affiliate_id: Option<AffiliateId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,

    /// Processor checkout session id.
    pub checkout_reference: Option<String>,

    /// Processor-side payment id, once known.
    pub processor_payment_ref: Option<String>,

    pub status: PaymentStatus,

    pub kind: PaymentKind,

    pub amount_minor: i64,

    /// ISO 4217, uppercase.
    pub currency: String,

    /// `None` for guest checkouts until linked.
    pub owner: Option<UserId>,

    pub affiliate_id: Option<AffiliateId>,

    /// Whether the account mutation for this payment has been applied.
    pub grant_applied: bool,

    pub reverted: bool,

    pub metadata: PaymentMetadata,

    pub created_at: Timestamp,

    pub updated_at: Timestamp,

    pub completed_at: Option<Timestamp>,
}

impl Payment {
    /// Creates a pending payment after validating the request.
    pub fn create(new: NewPayment, now: Timestamp) -> Result<Self, PaymentError> {
        if new.amount_minor <= 0 {
            return Err(ValidationError::not_positive("amount_minor", new.amount_minor).into());
        }
        let currency = new.currency.trim().to_ascii_uppercase();
        if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ValidationError::invalid_format(
                "currency",
                "expected a three-letter ISO code",
            )
            .into());
        }
        new.kind.validate()?;
        if let Some(reference) = &new.checkout_reference {
            if reference.trim().is_empty() {
                return Err(ValidationError::empty_field("checkout_reference").into());
            }
        }

        Ok(Self {
            id: PaymentId::new(),
            checkout_reference: new.checkout_reference,
            processor_payment_ref: None,
            status: PaymentStatus::Pending,
            kind: new.kind,
            amount_minor: new.amount_minor,
            currency,
            owner: new.owner,
            affiliate_id: new.affiliate_id,
            grant_applied: false,
            reverted: false,
            metadata: PaymentMetadata::new(),
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == PaymentStatus::Pending
    }

    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }

    /// Time elapsed since checkout started.
    pub fn age_at(&self, now: Timestamp) -> Duration {
        now.duration_since(&self.created_at)
    }

    /// Completed, owned, not reverted, and the account has not been credited yet.
    pub fn needs_grant(&self) -> bool {
        self.is_completed() && !self.grant_applied && !self.reverted && self.owner.is_some()
    }

    /// Pending to completed. `grant_applied` is true when the account
    /// mutation was applied in the same step.
    pub fn complete(
        &mut self,
        method: ActivationMethod,
        at: Timestamp,
        grant_applied: bool,
    ) -> Result<(), PaymentError> {
        self.move_to(PaymentStatus::Completed)?;
        self.metadata.record_activation(method, at);
        if grant_applied {
            self.metadata.record_grant(at);
        }
        self.grant_applied = grant_applied;
        self.completed_at = Some(at);
        self.updated_at = at;
        Ok(())
    }

    /// Pending to expired.
    pub fn expire(&mut self, at: Timestamp) -> Result<(), PaymentError> {
        self.move_to(PaymentStatus::Expired)?;
        self.metadata.record_expiry(at);
        self.updated_at = at;
        Ok(())
    }

    /// Completed to failed, keeping the activation history.
    pub fn revert(&mut self, reason: &str, at: Timestamp) -> Result<(), PaymentError> {
        if !self.status.can_revert() {
            return Err(PaymentError::InvalidTransition {
                from: self.status,
                to: PaymentStatus::Failed,
            });
        }
        self.status = PaymentStatus::Failed;
        self.reverted = true;
        self.metadata.record_reversal(reason, at);
        self.updated_at = at;
        Ok(())
    }

    /// Attaches an owner to a guest payment.
    pub fn link_owner(&mut self, owner: UserId, at: Timestamp) -> Result<(), PaymentError> {
        if self.owner.is_some() {
            return Err(PaymentError::OwnerAlreadySet(self.id));
        }
        self.owner = Some(owner);
        self.metadata.record_link(at);
        self.updated_at = at;
        Ok(())
    }

    /// Records the deferred account mutation for a linked guest payment.
    pub fn mark_grant_applied(&mut self, at: Timestamp) -> Result<(), PaymentError> {
        if !self.needs_grant() {
            return Err(PaymentError::NotPending {
                id: self.id,
                status: self.status,
            });
        }
        self.grant_applied = true;
        self.metadata.record_grant(at);
        self.updated_at = at;
        Ok(())
    }

    fn move_to(&mut self, target: PaymentStatus) -> Result<(), PaymentError> {
        self.status = self
            .status
            .transition_to(target)
            .map_err(|_| PaymentError::InvalidTransition {
                from: self.status,
                to: target,
            })?;
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::domain::payment::BillingPeriod;

    pub fn pro_subscription(owner: Option<&str>) -> NewPayment {
        NewPayment {
            owner: owner.map(|o| UserId::new(o).unwrap()),
            kind: PaymentKind::Subscription {
                plan_id: "pro".to_string(),
                billing_period: BillingPeriod::Monthly,
            },
            amount_minor: 34900,
            currency: "usd".to_string(),
            checkout_reference: Some("chk_pro_1".to_string()),
            affiliate_id: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::pro_subscription;
    use super::*;
    use crate::domain::payment::metadata::{ACTIVATION_METHOD, EXPIRED_AT, LINKED_AT};

    // ══════════════════════════════════════════════════════════════
    // Creation
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn create_starts_pending_with_normalized_currency() {
        let payment = Payment::create(pro_subscription(Some("u1")), Timestamp::now()).unwrap();
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.currency, "USD");
        assert!(!payment.grant_applied);
    }

    #[test]
    fn create_rejects_non_positive_amount() {
        let mut new = pro_subscription(None);
        new.amount_minor = 0;
        assert!(matches!(
            Payment::create(new, Timestamp::now()),
            Err(PaymentError::Validation(_))
        ));
    }

    #[test]
    fn create_rejects_bad_currency() {
        let mut new = pro_subscription(None);
        new.currency = "dollars".to_string();
        assert!(Payment::create(new, Timestamp::now()).is_err());
    }

    #[test]
    fn create_rejects_blank_checkout_reference() {
        let mut new = pro_subscription(None);
        new.checkout_reference = Some("  ".to_string());
        assert!(Payment::create(new, Timestamp::now()).is_err());
    }

    // ══════════════════════════════════════════════════════════════
    // Transitions
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn complete_records_method_and_grant() {
        let mut payment = Payment::create(pro_subscription(Some("u1")), Timestamp::now()).unwrap();
        payment
            .complete(ActivationMethod::Webhook, Timestamp::now(), true)
            .unwrap();

        assert!(payment.is_completed());
        assert!(payment.grant_applied);
        assert!(payment.completed_at.is_some());
        assert_eq!(payment.metadata.get(ACTIVATION_METHOD), Some("webhook"));
    }

    #[test]
    fn complete_twice_is_rejected() {
        let mut payment = Payment::create(pro_subscription(Some("u1")), Timestamp::now()).unwrap();
        payment.complete(ActivationMethod::Webhook, Timestamp::now(), true).unwrap();
        assert!(matches!(
            payment.complete(ActivationMethod::Sweep, Timestamp::now(), true),
            Err(PaymentError::InvalidTransition { .. })
        ));
    }

    #[test]
    fn expired_payment_cannot_complete() {
        let mut payment = Payment::create(pro_subscription(None), Timestamp::now()).unwrap();
        payment.expire(Timestamp::now()).unwrap();
        assert!(payment.metadata.get(EXPIRED_AT).is_some());
        assert!(payment
            .complete(ActivationMethod::ClientPoll, Timestamp::now(), false)
            .is_err());
    }

    #[test]
    fn revert_requires_completed_and_sets_flag() {
        let mut payment = Payment::create(pro_subscription(Some("u1")), Timestamp::now()).unwrap();
        assert!(payment.revert("chargeback", Timestamp::now()).is_err());

        payment.complete(ActivationMethod::Webhook, Timestamp::now(), true).unwrap();
        payment.revert("chargeback", Timestamp::now()).unwrap();

        assert_eq!(payment.status, PaymentStatus::Failed);
        assert!(payment.reverted);
        assert_eq!(payment.metadata.activation_method(), Some(ActivationMethod::Webhook));
    }

    // ══════════════════════════════════════════════════════════════
    // Guest link-up
    // ══════════════════════════════════════════════════════════════

    #[test]
    fn guest_completion_defers_grant_until_linked() {
        let mut payment = Payment::create(pro_subscription(None), Timestamp::now()).unwrap();
        payment.complete(ActivationMethod::Webhook, Timestamp::now(), false).unwrap();
        assert!(!payment.needs_grant());

        payment
            .link_owner(UserId::new("new-user").unwrap(), Timestamp::now())
            .unwrap();
        assert!(payment.metadata.get(LINKED_AT).is_some());
        assert!(payment.needs_grant());

        payment.mark_grant_applied(Timestamp::now()).unwrap();
        assert!(!payment.needs_grant());
        assert!(payment.mark_grant_applied(Timestamp::now()).is_err());
    }

    #[test]
    fn link_owner_refuses_owned_payment() {
        let mut payment = Payment::create(pro_subscription(Some("u1")), Timestamp::now()).unwrap();
        assert!(matches!(
            payment.link_owner(UserId::new("u2").unwrap(), Timestamp::now()),
            Err(PaymentError::OwnerAlreadySet(_))
        ));
    }

    #[test]
    fn age_is_measured_from_creation() {
        let created = Timestamp::now();
        let payment = Payment::create(pro_subscription(None), created).unwrap();
        assert_eq!(payment.age_at(created.plus_secs(59 * 60)).num_minutes(), 59);
    }
}
