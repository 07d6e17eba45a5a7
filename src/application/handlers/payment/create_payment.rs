//! CreatePaymentHandler - records a pending payment when checkout starts.

use std::sync::Arc;

use crate::domain::foundation::{AffiliateId, DomainError, Timestamp, UserId};
use crate::domain::payment::{NewPayment, Payment, PaymentKind};
use crate::ports::PaymentRepository;

#[derive(Debug, Clone)]
pub struct CreatePaymentCommand {
    /// `None` for guest checkout.
    pub owner: Option<UserId>,
    pub kind: PaymentKind,
    pub amount_minor: i64,
    pub currency: String,
    pub checkout_reference: String,
    pub affiliate_id: Option<AffiliateId>,
}

pub struct CreatePaymentHandler {
    payments: Arc<dyn PaymentRepository>,
}

impl CreatePaymentHandler {
    pub fn new(payments: Arc<dyn PaymentRepository>) -> Self {
        Self { payments }
    }

    pub async fn handle(&self, cmd: CreatePaymentCommand) -> Result<Payment, DomainError> {
        let payment = Payment::create(
            NewPayment {
                owner: cmd.owner,
                kind: cmd.kind,
                amount_minor: cmd.amount_minor,
                currency: cmd.currency,
                checkout_reference: Some(cmd.checkout_reference),
                affiliate_id: cmd.affiliate_id,
            },
            Timestamp::now(),
        )?;

        self.payments.create(&payment).await?;

        tracing::info!(
            payment_id = %payment.id,
            kind = payment.kind.as_str(),
            amount_minor = payment.amount_minor,
            guest = payment.owner.is_none(),
            "payment created"
        );
        Ok(payment)
    }
}
