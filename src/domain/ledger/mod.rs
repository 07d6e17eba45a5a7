//! Append-only ledgers: credit movements and affiliate commissions.

mod commission;
mod credit;

pub use commission::{Commission, CommissionStatus, BASIS_POINTS_DENOMINATOR};
pub use credit::{CreditReason, CreditTransaction};
