//! Domain layer containing business logic and domain types.
//!
//! # Module Organization
//!
//! - `foundation` - Shared primitives (IDs, timestamps, errors, events)
//! - `payment` - Payment attempts and their status lifecycle
//! - `account` - Subscription holder mutated by activations
//! - `ledger` - Credit transactions and affiliate commissions
//! - `webhook` - Processor notifications and signature verification

pub mod account;
pub mod foundation;
pub mod ledger;
pub mod payment;
pub mod webhook;
