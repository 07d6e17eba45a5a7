//! ReadinessProbe port - can this process serve traffic right now?

use async_trait::async_trait;

use crate::domain::foundation::DomainError;

#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    /// `Ok` when the backing store answers.
    async fn check(&self) -> Result<(), DomainError>;
}
