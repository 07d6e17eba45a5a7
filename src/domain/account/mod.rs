//! Account module - the subscription holder mutated by activations.

mod aggregate;
mod grant;

pub use aggregate::{Account, SubscriptionStatus, UsageCounters};
pub use grant::{AccountGrant, BillingTerms};
