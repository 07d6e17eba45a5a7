//! Payment module - payment attempts and their activation lifecycle.
//!
//! A `Payment` is one attempt to collect money. It starts `Pending` and is
//! moved to a terminal status exactly once, by whichever of the webhook,
//! client poll or sweep paths wins the status compare-and-swap.

mod aggregate;
mod errors;
mod events;
mod kind;
mod metadata;
mod status;

pub use aggregate::{NewPayment, Payment};
pub use errors::PaymentError;
pub use events::{CommissionRequested, PaymentActivated, PaymentReverted};
pub use kind::{ActivationMethod, BillingPeriod, PaymentKind};
pub use metadata::PaymentMetadata;
pub use status::PaymentStatus;

#[cfg(test)]
pub(crate) use aggregate::test_support;
