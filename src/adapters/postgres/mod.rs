//! PostgreSQL adapters - Database implementations for repository ports.
//!
//! - `PostgresPaymentRepository` - payment rows and their conditional updates
//! - `PostgresActivationStore` - the transactional activation step
//! - `PostgresAccountRepository` - account and credit ledger reads
//! - `PostgresCommissionLedger` - commissions, unique per payment
//! - `PostgresOutboxWriter` - side-effect outbox
//! - `PostgresWebhookEventRepository` - webhook de-duplication log
//! - `PostgresReadinessProbe` - connection check for `/ready`

mod account_repository;
mod activation_store;
mod commission_ledger;
mod outbox_writer;
mod payment_repository;
mod readiness;
mod webhook_event_repository;

pub use account_repository::PostgresAccountRepository;
pub use activation_store::PostgresActivationStore;
pub use commission_ledger::PostgresCommissionLedger;
pub use outbox_writer::PostgresOutboxWriter;
pub use payment_repository::PostgresPaymentRepository;
pub use readiness::PostgresReadinessProbe;
pub use webhook_event_repository::PostgresWebhookEventRepository;
