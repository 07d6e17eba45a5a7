//! What a payment buys and how it got activated.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::foundation::ValidationError;

/// Length of a subscription term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BillingPeriod {
    Monthly,
    Annual,
}

impl BillingPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            BillingPeriod::Monthly => "monthly",
            BillingPeriod::Annual => "annual",
        }
    }
}

impl FromStr for BillingPeriod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(BillingPeriod::Monthly),
            "annual" | "yearly" => Ok(BillingPeriod::Annual),
            other => Err(ValidationError::invalid_format(
                "billing_period",
                format!("unknown billing period '{}'", other),
            )),
        }
    }
}

/// The entitlement a payment grants once activated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PaymentKind {
    /// Upgrade to `plan_id` for one billing period.
    Subscription {
        plan_id: String,
        billing_period: BillingPeriod,
    },

    /// Add `credits_amount` to the standing top-up balance.
    #[serde(alias = "topup")]
    Credits { credits_amount: i64 },
}

impl PaymentKind {
    /// Stored in the `payments.kind` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentKind::Subscription { .. } => "subscription",
            PaymentKind::Credits { .. } => "credits",
        }
    }

    pub fn plan_id(&self) -> Option<&str> {
        match self {
            PaymentKind::Subscription { plan_id, .. } => Some(plan_id),
            PaymentKind::Credits { .. } => None,
        }
    }

    pub fn credits_amount(&self) -> Option<i64> {
        match self {
            PaymentKind::Credits { credits_amount } => Some(*credits_amount),
            PaymentKind::Subscription { .. } => None,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ValidationError> {
        match self {
            PaymentKind::Subscription { plan_id, .. } if plan_id.trim().is_empty() => {
                Err(ValidationError::empty_field("plan_id"))
            }
            PaymentKind::Credits { credits_amount } if *credits_amount <= 0 => {
                Err(ValidationError::not_positive("credits_amount", *credits_amount))
            }
            _ => Ok(()),
        }
    }
}

/// Which entry path performed an activation. Recorded for audit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivationMethod {
    Webhook,
    ClientPoll,
    Sweep,
    /// Guest payment linked to a freshly created account.
    Link,
}

impl ActivationMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationMethod::Webhook => "webhook",
            ActivationMethod::ClientPoll => "client_poll",
            ActivationMethod::Sweep => "sweep",
            ActivationMethod::Link => "link",
        }
    }
}

impl fmt::Display for ActivationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActivationMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "webhook" => Ok(ActivationMethod::Webhook),
            "client_poll" => Ok(ActivationMethod::ClientPoll),
            "sweep" => Ok(ActivationMethod::Sweep),
            "link" => Ok(ActivationMethod::Link),
            other => Err(ValidationError::invalid_format(
                "activation_method",
                format!("unknown activation method '{}'", other),
            )),
        }
    }
}
