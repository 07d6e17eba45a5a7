//! Side-effect delivery adapters.
//!
//! - `OutboxPublisher` - Background service draining the outbox
//! - `SideEffectDispatcher` - Routes each outbox event to its consumer

mod outbox_publisher;
mod side_effect_dispatcher;

pub use outbox_publisher::{BatchReport, OutboxPublisher, OutboxPublisherConfig};
pub use side_effect_dispatcher::SideEffectDispatcher;
