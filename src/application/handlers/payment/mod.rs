//! Payment activation handlers.
//!
//! ## Commands
//! - Creating a pending payment when checkout starts
//! - Activating a payment (the engine every entry path calls)
//! - Receiving processor webhooks
//! - Answering the checkout-success poll
//! - Linking guest payments to a new account
//! - Reverting completed payments
//!
//! ## Queries
//! - Verifying a payment with the processor

mod activate_payment;
mod create_payment;
mod handle_webhook;
mod link_guest_payment;
mod poll_activation;
mod revert_payment;
mod verify_payment;

pub use activate_payment::{ActivationEngine, ActivationError, ActivationResult};
pub use create_payment::{CreatePaymentCommand, CreatePaymentHandler};
pub use handle_webhook::{HandleWebhookCommand, WebhookAck, WebhookReceiver};
pub use link_guest_payment::{
    LinkGuestPaymentCommand, LinkGuestPaymentHandler, LinkGuestPaymentResult,
};
pub use poll_activation::{
    CheckoutPoller, PollActivationCommand, PollActivationResult, PollStatus, PollerConfig,
};
pub use revert_payment::{RevertPaymentCommand, RevertPaymentHandler, RevertPaymentResult};
pub use verify_payment::{
    PaymentVerifier, VerificationError, VerificationOutcome, VerificationPolicy,
    DEFAULT_PAID_STATUSES,
};
