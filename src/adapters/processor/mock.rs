//! Mock processor client for testing.
//!
//! Responses are scripted per checkout and per payment id. Anything not
//! scripted answers `NotFound`. Supports error injection and call counting.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::ports::{CheckoutSnapshot, ProcessorClient, ProcessorError, ProcessorPayment};

#[derive(Clone, Default)]
pub struct MockProcessorClient {
    inner: Arc<Mutex<MockState>>,
}

#[derive(Default)]
struct MockState {
    checkouts: HashMap<String, Result<CheckoutSnapshot, ProcessorError>>,
    payments: HashMap<String, Result<ProcessorPayment, ProcessorError>>,
    latency: Option<Duration>,
    checkout_calls: usize,
    payment_calls: usize,
}

impl MockProcessorClient {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Scripting
    // ════════════════════════════════════════════════════════════════════════════

    /// A completed checkout whose payment has `payment_status`.
    pub fn set_paid_checkout(&self, checkout_id: &str, payment_id: &str, payment_status: &str) {
        self.set_checkout(
            checkout_id,
            Ok(CheckoutSnapshot {
                id: checkout_id.to_string(),
                status: "completed".to_string(),
                payment_id: Some(payment_id.to_string()),
            }),
        );
        self.set_payment(
            payment_id,
            Ok(ProcessorPayment {
                id: payment_id.to_string(),
                status: payment_status.to_string(),
                amount: None,
            }),
        );
    }

    pub fn set_checkout(
        &self,
        checkout_id: &str,
        response: Result<CheckoutSnapshot, ProcessorError>,
    ) {
        self.state()
            .checkouts
            .insert(checkout_id.to_string(), response);
    }

    pub fn set_payment(&self, payment_id: &str, response: Result<ProcessorPayment, ProcessorError>) {
        self.state().payments.insert(payment_id.to_string(), response);
    }

    /// Delay applied to every call, for timeout tests.
    pub fn set_latency(&self, latency: Duration) {
        self.state().latency = Some(latency);
    }

    // ════════════════════════════════════════════════════════════════════════════
    // Call Tracking
    // ════════════════════════════════════════════════════════════════════════════

    pub fn checkout_calls(&self) -> usize {
        self.state().checkout_calls
    }

    pub fn payment_calls(&self) -> usize {
        self.state().payment_calls
    }

    async fn simulate_latency(&self) {
        let latency = self.state().latency;
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
    }
}

#[async_trait]
impl ProcessorClient for MockProcessorClient {
    async fn get_checkout(&self, checkout_id: &str) -> Result<CheckoutSnapshot, ProcessorError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.checkout_calls += 1;
        state
            .checkouts
            .get(checkout_id)
            .cloned()
            .unwrap_or_else(|| Err(ProcessorError::not_found("checkout")))
    }

    async fn get_payment(&self, payment_id: &str) -> Result<ProcessorPayment, ProcessorError> {
        self.simulate_latency().await;
        let mut state = self.state();
        state.payment_calls += 1;
        state
            .payments
            .get(payment_id)
            .cloned()
            .unwrap_or_else(|| Err(ProcessorError::not_found("payment")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn scripted_checkout_and_payment_are_returned() {
        let mock = MockProcessorClient::new();
        mock.set_paid_checkout("chk_1", "pay_1", "successful");

        let checkout = mock.get_checkout("chk_1").await.unwrap();
        assert_eq!(checkout.payment_id.as_deref(), Some("pay_1"));
        let payment = mock.get_payment("pay_1").await.unwrap();
        assert_eq!(payment.status, "successful");

        assert_eq!(mock.checkout_calls(), 1);
        assert_eq!(mock.payment_calls(), 1);
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() {
        let mock = MockProcessorClient::new();
        let err = mock.get_checkout("missing").await.unwrap_err();
        assert_eq!(err.code, crate::ports::ProcessorErrorCode::NotFound);
    }
}
