//! Foundation module - Shared domain primitives.
//!
//! Contains value objects, identifiers, error types and the event envelope
//! that form the vocabulary of the payment activation domain.

mod auth;
mod errors;
mod events;
mod ids;
mod state_machine;
mod timestamp;

pub use auth::{AuthError, AuthenticatedUser};
pub use errors::{DomainError, ErrorCode, ValidationError};
pub use events::{DomainEvent, EventEnvelope, EventId, EventMetadata};
pub use ids::{AffiliateId, CommissionId, CreditTransactionId, PaymentId, UserId};
pub use state_machine::StateMachine;
pub use timestamp::Timestamp;
