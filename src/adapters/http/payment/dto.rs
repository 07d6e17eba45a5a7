//! Request and response bodies for the payment routes.

use serde::{Deserialize, Serialize};

use crate::application::handlers::payment::{
    LinkGuestPaymentResult, PollActivationResult, PollStatus, RevertPaymentResult, WebhookAck,
};
use crate::domain::foundation::Timestamp;
use crate::domain::payment::{Payment, PaymentKind, PaymentStatus};

// ════════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Deserialize)]
pub struct CreatePaymentRequest {
    pub kind: PaymentKind,
    pub amount_minor: i64,
    pub currency: String,
    pub checkout_reference: String,
    #[serde(default)]
    pub affiliate_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LinkGuestPaymentRequest {
    pub checkout_reference: String,
}

/// Query string of the activation poll.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PollQuery {
    #[serde(default)]
    pub attempt: Option<u32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RevertPaymentRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

// ════════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentResponse {
    pub id: String,
    pub status: PaymentStatus,
    pub kind: PaymentKind,
    pub amount_minor: i64,
    pub currency: String,
    pub checkout_reference: Option<String>,
    pub created_at: Timestamp,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id.to_string(),
            status: payment.status,
            kind: payment.kind,
            amount_minor: payment.amount_minor,
            currency: payment.currency,
            checkout_reference: payment.checkout_reference,
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollActivationResponse {
    pub status: PollStatus,
    pub assume_success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credits_added: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credit_balance: Option<i64>,
}

impl From<PollActivationResult> for PollActivationResponse {
    fn from(result: PollActivationResult) -> Self {
        Self {
            status: result.status,
            assume_success: result.assume_success,
            payment_id: result.payment_id.map(|id| id.to_string()),
            plan_id: result.plan_id,
            credits_added: result.credits_added,
            credit_balance: result.credit_balance,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkGuestPaymentResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub grant_applied: bool,
}

impl From<LinkGuestPaymentResult> for LinkGuestPaymentResponse {
    fn from(result: LinkGuestPaymentResult) -> Self {
        Self {
            payment_id: result.payment_id.to_string(),
            status: result.status,
            grant_applied: result.grant_applied,
        }
    }
}

/// Always returned with 200 once the signature checks out.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct WebhookResponse {
    pub received: bool,
    pub processed: bool,
}

impl From<WebhookAck> for WebhookResponse {
    fn from(ack: WebhookAck) -> Self {
        Self {
            received: true,
            processed: ack.processed,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevertPaymentResponse {
    pub reverted: bool,
}

impl From<RevertPaymentResult> for RevertPaymentResponse {
    fn from(result: RevertPaymentResult) -> Self {
        Self {
            reverted: matches!(result, RevertPaymentResult::Reverted),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_request_accepts_tagged_kind() {
        let json = r#"{
            "kind": {"type": "credits", "credits_amount": 50},
            "amount_minor": 999,
            "currency": "usd",
            "checkout_reference": "chk_1"
        }"#;
        let request: CreatePaymentRequest = serde_json::from_str(json).unwrap();
        assert_eq!(request.kind, PaymentKind::Credits { credits_amount: 50 });
        assert!(request.affiliate_id.is_none());
    }

    #[test]
    fn poll_response_omits_missing_details() {
        let response = PollActivationResponse {
            status: PollStatus::Processing,
            assume_success: false,
            payment_id: None,
            plan_id: None,
            credits_added: None,
            credit_balance: None,
        };
        let json = serde_json::to_value(response).unwrap();
        assert_eq!(json["status"], "processing");
        assert!(json.get("plan_id").is_none());
    }

    #[test]
    fn webhook_response_always_received() {
        let json = serde_json::to_value(WebhookResponse::from(WebhookAck { processed: false })).unwrap();
        assert_eq!(json, serde_json::json!({"received": true, "processed": false}));
    }
}
