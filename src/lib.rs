//! Payment activation service
//!
//! Turns processor payments into account grants exactly once. Three paths
//! race to activate a pending payment: the signed processor webhook, the
//! checkout-success poller and a periodic reconciliation sweep. All of them
//! verify with the processor first and go through one compare-and-set on
//! the payment status, so a payment is granted once however many paths
//! see it.

pub mod adapters;
pub mod application;
pub mod config;
pub mod domain;
pub mod ports;
