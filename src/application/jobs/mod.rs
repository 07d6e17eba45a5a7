//! Background jobs.
//!
//! - `SweepJob` - Reconciles pending payments with the processor
//! - `SweepScheduler` - Runs the sweep on an interval

mod scheduler;
mod sweep;

pub use scheduler::SweepScheduler;
pub use sweep::{SweepConfig, SweepJob, SweepReport};
