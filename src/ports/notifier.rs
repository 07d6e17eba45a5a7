//! Notifier port - outbound notification of payment outcomes.

use async_trait::async_trait;

use crate::domain::foundation::DomainError;
use crate::domain::payment::{PaymentActivated, PaymentReverted};

/// Sends payment outcome notifications (typically email).
///
/// Called from the outbox consumer, never from the activation path, so a
/// failure here only delays the notification.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn payment_activated(&self, event: &PaymentActivated) -> Result<(), DomainError>;

    async fn payment_reverted(&self, event: &PaymentReverted) -> Result<(), DomainError>;
}
