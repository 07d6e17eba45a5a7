//! Credit ledger entries.
//!
//! The account's `credit_balance` is a cached running sum; these rows are
//! the audit trail it is derived from.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{CreditTransactionId, PaymentId, Timestamp, UserId, ValidationError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreditReason {
    /// Top-up purchase.
    Purchase,
    /// Compensation for a reverted purchase.
    Reversal,
    /// Manual correction.
    Adjustment,
}

impl CreditReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            CreditReason::Purchase => "purchase",
            CreditReason::Reversal => "reversal",
            CreditReason::Adjustment => "adjustment",
        }
    }
}

impl fmt::Display for CreditReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CreditReason {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "purchase" => Ok(CreditReason::Purchase),
            "reversal" => Ok(CreditReason::Reversal),
            "adjustment" => Ok(CreditReason::Adjustment),
            other => Err(ValidationError::invalid_format(
                "reason",
                format!("unknown credit reason '{}'", other),
            )),
        }
    }
}

/// One balance change. `amount` is signed; `balance_after` is the balance
/// once this entry is applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    pub id: CreditTransactionId,
    pub user_id: UserId,
    pub amount: i64,
    pub balance_after: i64,
    pub reason: CreditReason,
    pub payment_id: Option<PaymentId>,
    pub created_at: Timestamp,
}

impl CreditTransaction {
    pub fn new(
        user_id: UserId,
        amount: i64,
        balance_after: i64,
        reason: CreditReason,
        payment_id: Option<PaymentId>,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: CreditTransactionId::new(),
            user_id,
            amount,
            balance_after,
            reason,
            payment_id,
            created_at,
        }
    }

    pub fn is_credit(&self) -> bool {
        self.amount > 0
    }
}
