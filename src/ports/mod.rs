//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Persistence Ports
//!
//! - `PaymentRepository` - Payment records and their conditional updates
//! - `ActivationStore` - The single-transaction activation step
//! - `AccountRepository` - Account and credit ledger reads
//! - `CommissionLedger` - Affiliate commissions, unique per payment
//! - `WebhookEventRepository` - Processor webhook idempotency tracking
//!
//! ## Side Effect Ports
//!
//! - `OutboxWriter` - Durable queue of side-effect events
//! - `EventPublisher` - Delivery target for outbox entries
//! - `Notifier` - Payment outcome notifications
//!
//! ## External Service Ports
//!
//! - `ProcessorClient` - Payment processor lookups
//! - `SessionValidator` - Bearer token validation
//! - `RateLimiter` - Shared request counters
//! - `ReadinessProbe` - Dependency health for the readiness endpoint

mod account_repository;
mod activation_store;
mod commission_ledger;
mod event_publisher;
mod notifier;
mod outbox_writer;
mod payment_repository;
mod processor_client;
mod rate_limiter;
mod readiness_probe;
mod session_validator;
mod webhook_event_repository;

pub use account_repository::AccountRepository;
pub use activation_store::{
    ActivationCommit, ActivationStore, CompletionOutcome, GrantCommit, GrantOutcome, OwnedGrant,
    ReversalCommit, ReversalOutcome,
};
pub use commission_ledger::{CommissionLedger, RecordOutcome};
pub use event_publisher::EventPublisher;
pub use notifier::Notifier;
pub use outbox_writer::{OutboxEntry, OutboxStatus, OutboxWriter};
pub use payment_repository::PaymentRepository;
pub use processor_client::{
    CheckoutSnapshot, ProcessorClient, ProcessorError, ProcessorErrorCode, ProcessorPayment,
};
pub use rate_limiter::{
    RateLimitDecision, RateLimitError, RateLimitKey, RateLimitQuota, RateLimitScope, RateLimiter,
};
pub use readiness_probe::ReadinessProbe;
pub use session_validator::SessionValidator;
pub use webhook_event_repository::{
    SaveResult, WebhookEventRecord, WebhookEventRepository, WebhookOutcome,
};
