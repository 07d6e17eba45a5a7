//! Translation from what a payment bought to what the account receives.

use serde::{Deserialize, Serialize};

use crate::domain::payment::{BillingPeriod, PaymentKind};

/// Subscription term lengths in days.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingTerms {
    pub monthly_days: i64,
    pub annual_days: i64,
}

impl BillingTerms {
    pub fn days_for(&self, period: BillingPeriod) -> i64 {
        match period {
            BillingPeriod::Monthly => self.monthly_days,
            BillingPeriod::Annual => self.annual_days,
        }
    }
}

impl Default for BillingTerms {
    fn default() -> Self {
        Self {
            monthly_days: 30,
            annual_days: 365,
        }
    }
}

/// The account mutation one activation applies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AccountGrant {
    Subscription { plan_id: String, period_days: i64 },
    Credits { amount: i64 },
}

impl AccountGrant {
    pub fn for_payment(kind: &PaymentKind, terms: &BillingTerms) -> Self {
        match kind {
            PaymentKind::Subscription {
                plan_id,
                billing_period,
            } => AccountGrant::Subscription {
                plan_id: plan_id.clone(),
                period_days: terms.days_for(*billing_period),
            },
            PaymentKind::Credits { credits_amount } => AccountGrant::Credits {
                amount: *credits_amount,
            },
        }
    }
}
