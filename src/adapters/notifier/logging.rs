//! Notifier that only logs. Used when no notification service is configured.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::payment::{PaymentActivated, PaymentReverted};
use crate::ports::Notifier;

#[derive(Debug, Clone, Default)]
pub struct LoggingNotifier;

impl LoggingNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LoggingNotifier {
    async fn payment_activated(&self, event: &PaymentActivated) -> Result<(), DomainError> {
        tracing::info!(
            payment_id = %event.payment_id,
            user_id = %event.user_id,
            kind = event.kind.as_str(),
            amount_minor = event.amount_minor,
            currency = %event.currency,
            method = %event.method,
            "payment activation notice"
        );
        Ok(())
    }

    async fn payment_reverted(&self, event: &PaymentReverted) -> Result<(), DomainError> {
        tracing::info!(
            payment_id = %event.payment_id,
            user_id = ?event.user_id.as_ref().map(|u| u.as_str()),
            reason = %event.reason,
            "payment reversal notice"
        );
        Ok(())
    }
}
