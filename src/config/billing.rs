//! Billing terms and commission rate

use serde::Deserialize;

use super::error::ValidationError;
use crate::domain::account::BillingTerms;

#[derive(Debug, Clone, Deserialize)]
pub struct BillingConfig {
    #[serde(default = "default_monthly_days")]
    pub monthly_days: i64,

    #[serde(default = "default_annual_days")]
    pub annual_days: i64,

    /// Affiliate commission in basis points of the payment amount
    #[serde(default = "default_commission_rate")]
    pub commission_rate_bps: u32,
}

impl BillingConfig {
    pub fn terms(&self) -> BillingTerms {
        BillingTerms {
            monthly_days: self.monthly_days,
            annual_days: self.annual_days,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.monthly_days <= 0 {
            return Err(ValidationError::MustBePositive("billing.monthly_days"));
        }
        if self.annual_days <= 0 {
            return Err(ValidationError::MustBePositive("billing.annual_days"));
        }
        if self.commission_rate_bps > 10_000 {
            return Err(ValidationError::InvalidCommissionRate);
        }
        Ok(())
    }
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            monthly_days: default_monthly_days(),
            annual_days: default_annual_days(),
            commission_rate_bps: default_commission_rate(),
        }
    }
}

fn default_monthly_days() -> i64 {
    30
}

fn default_annual_days() -> i64 {
    365
}

fn default_commission_rate() -> u32 {
    2000
}
