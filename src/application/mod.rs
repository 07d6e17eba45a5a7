//! Application layer - Commands, Queries, Handlers and scheduled jobs.
//!
//! This layer orchestrates domain operations and coordinates between ports.

pub mod handlers;
pub mod jobs;
mod services;

pub use handlers::payment::{
    ActivationEngine, ActivationError, ActivationResult, CheckoutPoller, CreatePaymentCommand,
    CreatePaymentHandler, HandleWebhookCommand, LinkGuestPaymentCommand, LinkGuestPaymentHandler,
    LinkGuestPaymentResult, PaymentVerifier, PollActivationCommand, PollActivationResult,
    PollStatus, PollerConfig, RevertPaymentCommand, RevertPaymentHandler, RevertPaymentResult,
    VerificationError, VerificationOutcome, VerificationPolicy, WebhookAck, WebhookReceiver,
};
pub use jobs::{SweepConfig, SweepJob, SweepReport, SweepScheduler};
pub use services::{PaymentPorts, PaymentServices, ServiceSettings};
