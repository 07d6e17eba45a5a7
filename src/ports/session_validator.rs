//! SessionValidator port - turns a bearer token into a user.

use async_trait::async_trait;

use crate::domain::foundation::{AuthError, AuthenticatedUser};

#[async_trait]
pub trait SessionValidator: Send + Sync {
    /// Validates a session token.
    ///
    /// Returns `AuthError::InvalidToken` or `AuthError::TokenExpired` for
    /// tokens that will never validate, `ServiceUnavailable` for transient
    /// failures.
    async fn validate(&self, token: &str) -> Result<AuthenticatedUser, AuthError>;
}
