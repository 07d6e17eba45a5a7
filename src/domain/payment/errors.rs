//! Payment domain errors.

use thiserror::Error;

use super::PaymentStatus;
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, ValidationError};

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Payment {0} not found")]
    NotFound(PaymentId),

    #[error("Payment {id} is {status}, not pending")]
    NotPending { id: PaymentId, status: PaymentStatus },

    #[error("Cannot move payment from {from} to {to}")]
    InvalidTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Payment {0} already has an owner")]
    OwnerAlreadySet(PaymentId),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl PaymentError {
    pub fn code(&self) -> ErrorCode {
        match self {
            PaymentError::NotFound(_) => ErrorCode::PaymentNotFound,
            PaymentError::NotPending { .. } => ErrorCode::PaymentNotPending,
            PaymentError::InvalidTransition { .. } => ErrorCode::InvalidStateTransition,
            PaymentError::OwnerAlreadySet(_) => ErrorCode::OwnerAlreadySet,
            PaymentError::Validation(_) => ErrorCode::ValidationFailed,
        }
    }
}

impl From<PaymentError> for DomainError {
    fn from(err: PaymentError) -> Self {
        DomainError::new(err.code(), err.to_string())
    }
}
