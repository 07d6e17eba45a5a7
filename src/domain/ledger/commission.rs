//! Affiliate commission records.
//!
//! At most one commission exists per payment; storage enforces this with a
//! unique index on `payment_id`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::{
    AffiliateId, CommissionId, PaymentId, Timestamp, UserId, ValidationError,
};

pub const BASIS_POINTS_DENOMINATOR: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    /// Owed, not yet paid out.
    Pending,
    Paid,
    /// Cancelled because the payment was reverted.
    Voided,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Pending => "pending",
            CommissionStatus::Paid => "paid",
            CommissionStatus::Voided => "voided",
        }
    }
}

impl fmt::Display for CommissionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommissionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(CommissionStatus::Pending),
            "paid" => Ok(CommissionStatus::Paid),
            "voided" => Ok(CommissionStatus::Voided),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown commission status '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commission {
    pub id: CommissionId,
    pub affiliate_id: AffiliateId,
    pub referred_user_id: UserId,
    pub payment_id: PaymentId,
    pub payment_amount_minor: i64,
    pub rate_bps: u32,
    pub amount_minor: i64,
    pub currency: String,
    pub status: CommissionStatus,
    pub created_at: Timestamp,
}

impl Commission {
    /// Computes a pending commission, rounding down to the minor unit.
    pub fn compute(
        affiliate_id: AffiliateId,
        referred_user_id: UserId,
        payment_id: PaymentId,
        payment_amount_minor: i64,
        currency: impl Into<String>,
        rate_bps: u32,
        now: Timestamp,
    ) -> Self {
        // Widened so large amounts cannot overflow before the division.
        let scaled = i128::from(payment_amount_minor) * i128::from(rate_bps)
            / i128::from(BASIS_POINTS_DENOMINATOR);
        let amount_minor = i64::try_from(scaled).unwrap_or(i64::MAX);
        Self {
            id: CommissionId::new(),
            affiliate_id,
            referred_user_id,
            payment_id,
            payment_amount_minor,
            rate_bps,
            amount_minor,
            currency: currency.into(),
            status: CommissionStatus::Pending,
            created_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commission(amount: i64, rate_bps: u32) -> Commission {
        Commission::compute(
            AffiliateId::new("aff-1").unwrap(),
            UserId::new("u1").unwrap(),
            PaymentId::new(),
            amount,
            "USD",
            rate_bps,
            Timestamp::now(),
        )
    }

    #[test]
    fn twenty_percent_of_pro_plan() {
        assert_eq!(commission(34900, 2000).amount_minor, 6980);
    }

    #[test]
    fn rounds_down_fractional_minor_units() {
        assert_eq!(commission(999, 1500).amount_minor, 149);
    }

    #[test]
    fn very_large_amount_does_not_overflow() {
        assert_eq!(commission(i64::MAX, 2000).amount_minor, i64::MAX / 5);
        assert_eq!(commission(1_000_000_000_000_000, 10_000).amount_minor, 1_000_000_000_000_000);
    }

    #[test]
    fn starts_pending() {
        assert_eq!(commission(100, 1000).status, CommissionStatus::Pending);
    }
}
