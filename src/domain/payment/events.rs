//! Events emitted when a payment changes state.
//!
//! These are written to the outbox in the same transaction as the status
//! change and consumed by the side-effect dispatchers.

use serde::{Deserialize, Serialize};

use super::{ActivationMethod, PaymentKind};
use crate::domain::foundation::{AffiliateId, DomainEvent, EventId, PaymentId, Timestamp, UserId};

/// A payment was activated and its grant applied to `user_id`.
///
/// Consumed by the notification dispatcher.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentActivated {
    pub event_id: EventId,
    pub payment_id: PaymentId,
    pub user_id: UserId,
    pub kind: PaymentKind,
    pub amount_minor: i64,
    pub currency: String,
    pub method: ActivationMethod,
    pub activated_at: Timestamp,
}

impl DomainEvent for PaymentActivated {
    const EVENT_TYPE: &'static str = "payment.activated.v1";

    fn event_id(&self) -> &EventId {
        &self.event_id
    }

    fn payment_id(&self) -> PaymentId {
        self.payment_id
    }

    fn occurred_at(&self) -> Timestamp {
        self.activated_at
    }
}

/// A referred payment owes its affiliate a commission.
///
/// Consumed by the commission dispatcher; recording is keyed on `payment_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommissionRequested {
    pub event_id: EventId,
    pub payment_id: PaymentId,
    pub affiliate_id: AffiliateId,
    pub referred_user_id: UserId,
    pub amount_minor: i64,
    pub currency: String,
    pub requested_at: Timestamp,
}

impl DomainEvent for CommissionRequested {
    const EVENT_TYPE: &'static str = "payment.commission_requested.v1";

    fn event_id(&self) -> &EventId {
        &self.event_id
    }

    fn payment_id(&self) -> PaymentId {
        self.payment_id
    }

    fn occurred_at(&self) -> Timestamp {
        self.requested_at
    }
}

/// A completed payment was reverted (chargeback or admin action).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReverted {
    pub event_id: EventId,
    pub payment_id: PaymentId,
    pub user_id: Option<UserId>,
    pub reason: String,
    pub reverted_at: Timestamp,
}

impl DomainEvent for PaymentReverted {
    const EVENT_TYPE: &'static str = "payment.reverted.v1";

    fn event_id(&self) -> &EventId {
        &self.event_id
    }

    fn payment_id(&self) -> PaymentId {
        self.payment_id
    }

    fn occurred_at(&self) -> Timestamp {
        self.reverted_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::foundation::EventEnvelope;
    use crate::domain::payment::BillingPeriod;

    #[test]
    fn activated_event_envelope_round_trips_payload() {
        let event = PaymentActivated {
            event_id: EventId::new(),
            payment_id: PaymentId::new(),
            user_id: UserId::new("u1").unwrap(),
            kind: PaymentKind::Subscription {
                plan_id: "pro".to_string(),
                billing_period: BillingPeriod::Monthly,
            },
            amount_minor: 34900,
            currency: "USD".to_string(),
            method: ActivationMethod::Webhook,
            activated_at: Timestamp::now(),
        };

        let envelope = EventEnvelope::from_event(&event).unwrap();
        assert_eq!(envelope.event_type, "payment.activated.v1");
        assert_eq!(envelope.aggregate_id, event.payment_id.to_string());
        assert_eq!(envelope.payload_as::<PaymentActivated>().unwrap(), event);
    }

    #[test]
    fn commission_event_is_keyed_on_payment() {
        let payment_id = PaymentId::new();
        let event = CommissionRequested {
            event_id: EventId::new(),
            payment_id,
            affiliate_id: AffiliateId::new("aff-7").unwrap(),
            referred_user_id: UserId::new("u1").unwrap(),
            amount_minor: 1000,
            currency: "USD".to_string(),
            requested_at: Timestamp::now(),
        };
        let envelope = EventEnvelope::from_event(&event).unwrap();
        assert_eq!(envelope.aggregate_id, payment_id.to_string());
        assert_eq!(envelope.event_type, CommissionRequested::EVENT_TYPE);
        assert_eq!(envelope.event_type, "payment.commission_requested.v1");
    }
}
