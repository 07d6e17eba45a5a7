//! Account aggregate.
//!
//! Only activations (and their reversals) touch the fields here. Usage
//! resets on a schedule belong to another service.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::AccountGrant;
use crate::domain::foundation::{PaymentId, Timestamp, UserId, ValidationError};
use crate::domain::ledger::{CreditReason, CreditTransaction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Inactive,
    Active,
    Expired,
    Cancelled,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Inactive => "inactive",
            SubscriptionStatus::Active => "active",
            SubscriptionStatus::Expired => "expired",
            SubscriptionStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "inactive" => Ok(SubscriptionStatus::Inactive),
            "active" => Ok(SubscriptionStatus::Active),
            "expired" => Ok(SubscriptionStatus::Expired),
            "cancelled" => Ok(SubscriptionStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "subscription_status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

/// Per-period usage, zeroed whenever a new subscription term starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageCounters {
    pub analyses_used: i32,
    pub period_started_at: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub user_id: UserId,
    pub plan_id: Option<String>,
    pub subscription_status: SubscriptionStatus,
    pub subscription_expires_at: Option<Timestamp>,
    pub usage: UsageCounters,
    pub credit_balance: i64,
    pub updated_at: Timestamp,
}

impl Account {
    /// A fresh account with no plan and no credits.
    pub fn new(user_id: UserId, now: Timestamp) -> Self {
        Self {
            user_id,
            plan_id: None,
            subscription_status: SubscriptionStatus::Inactive,
            subscription_expires_at: None,
            usage: UsageCounters::default(),
            credit_balance: 0,
            updated_at: now,
        }
    }

    pub fn has_active_subscription(&self, now: Timestamp) -> bool {
        self.subscription_status == SubscriptionStatus::Active
            && self.subscription_expires_at.map_or(false, |exp| exp.is_after(&now))
    }

    /// Applies one activation's grant.
    ///
    /// A subscription term stacks onto an unexpired active term; otherwise
    /// it starts now. Credit grants return the ledger entry to append.
    pub fn apply_grant(
        &mut self,
        grant: &AccountGrant,
        payment_id: PaymentId,
        now: Timestamp,
    ) -> Option<CreditTransaction> {
        self.updated_at = now;
        match grant {
            AccountGrant::Subscription {
                plan_id,
                period_days,
            } => {
                let base = match self.subscription_expires_at {
                    Some(exp) if self.has_active_subscription(now) => exp,
                    _ => now,
                };
                self.plan_id = Some(plan_id.clone());
                self.subscription_status = SubscriptionStatus::Active;
                self.subscription_expires_at = Some(base.add_days(*period_days));
                self.usage = UsageCounters {
                    analyses_used: 0,
                    period_started_at: Some(now),
                };
                None
            }
            AccountGrant::Credits { amount } => {
                self.credit_balance += amount;
                Some(CreditTransaction::new(
                    self.user_id.clone(),
                    *amount,
                    self.credit_balance,
                    CreditReason::Purchase,
                    Some(payment_id),
                    now,
                ))
            }
        }
    }

    /// Takes back up to `amount` credits granted by a reverted payment.
    ///
    /// Credits already spent cannot be recovered, so the debit is capped
    /// at the current balance.
    pub fn reverse_credits(
        &mut self,
        amount: i64,
        payment_id: PaymentId,
        now: Timestamp,
    ) -> CreditTransaction {
        let debit = amount.min(self.credit_balance).max(0);
        self.credit_balance -= debit;
        self.updated_at = now;
        CreditTransaction::new(
            self.user_id.clone(),
            -debit,
            self.credit_balance,
            CreditReason::Reversal,
            Some(payment_id),
            now,
        )
    }
}
