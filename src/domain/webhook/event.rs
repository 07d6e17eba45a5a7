//! Processor webhook payload.
//!
//! Only the fields the activation pipeline reads are modelled; the rest of
//! the processor's schema is ignored.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessorEvent {
    /// Processor event id, used for delivery de-duplication.
    pub id: String,

    #[serde(rename = "type")]
    pub event_type: String,

    /// Unix seconds.
    pub created: i64,

    pub data: ProcessorEventData,

    #[serde(default)]
    pub livemode: bool,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ProcessorEventData {
    /// Checkout session the payment was collected through.
    #[serde(default)]
    pub checkout_id: Option<String>,

    /// Processor-side payment id.
    #[serde(default)]
    pub payment_id: Option<String>,

    /// Minor currency units.
    #[serde(default)]
    pub amount: Option<i64>,

    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    pub status: Option<String>,

    /// Values we attached when creating the checkout.
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// Event types the receiver acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessorEventType {
    PaymentSucceeded,
    CheckoutCompleted,
    /// Refund or chargeback of a settled payment.
    PaymentReversed,
    Unknown,
}

impl ProcessorEventType {
    pub fn parse(s: &str) -> Self {
        match s {
            "payment.succeeded" => Self::PaymentSucceeded,
            "checkout.completed" => Self::CheckoutCompleted,
            "payment.reversed" | "payment.refunded" | "payment.disputed" => Self::PaymentReversed,
            _ => Self::Unknown,
        }
    }

    /// Success-type events are the only ones that lead to activation.
    pub fn is_success(&self) -> bool {
        matches!(self, Self::PaymentSucceeded | Self::CheckoutCompleted)
    }
}

impl ProcessorEvent {
    pub fn parsed_type(&self) -> ProcessorEventType {
        ProcessorEventType::parse(&self.event_type)
    }

    /// Our user id, when the checkout was started by a signed-in user.
    pub fn metadata_user_id(&self) -> Option<&str> {
        self.data
            .metadata
            .get("user_id")
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Free-text reason attached to reversal events.
    pub fn reversal_reason(&self) -> &str {
        self.data
            .metadata
            .get("reason")
            .map(String::as_str)
            .unwrap_or(self.event_type.as_str())
    }
}

#[cfg(test)]
pub(crate) struct ProcessorEventBuilder {
    id: String,
    event_type: String,
    data: ProcessorEventData,
}

#[cfg(test)]
impl ProcessorEventBuilder {
    pub fn new(event_type: &str) -> Self {
        Self {
            id: format!("evt_{}", uuid::Uuid::new_v4().simple()),
            event_type: event_type.to_string(),
            data: ProcessorEventData::default(),
        }
    }

    pub fn id(mut self, id: &str) -> Self {
        self.id = id.to_string();
        self
    }

    pub fn checkout(mut self, checkout_id: &str) -> Self {
        self.data.checkout_id = Some(checkout_id.to_string());
        self
    }

    pub fn amount(mut self, amount: i64) -> Self {
        self.data.amount = Some(amount);
        self
    }

    pub fn user(mut self, user_id: &str) -> Self {
        self.data
            .metadata
            .insert("user_id".to_string(), user_id.to_string());
        self
    }

    pub fn build(self) -> ProcessorEvent {
        ProcessorEvent {
            id: self.id,
            event_type: self.event_type,
            created: chrono::Utc::now().timestamp(),
            data: self.data,
            livemode: false,
        }
    }
}
