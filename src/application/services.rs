//! Wiring of the payment handlers over a set of ports.
//!
//! The binary builds this once over the Postgres adapters; tests build it
//! over `InMemoryStore` and `MockProcessorClient`.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;

use crate::domain::account::BillingTerms;
use crate::domain::webhook::WebhookSignatureVerifier;
use crate::ports::{
    AccountRepository, ActivationStore, PaymentRepository, ProcessorClient, WebhookEventRepository,
};

use super::handlers::payment::{
    ActivationEngine, CheckoutPoller, CreatePaymentHandler, LinkGuestPaymentHandler,
    PaymentVerifier, PollerConfig, RevertPaymentHandler, WebhookReceiver, DEFAULT_PAID_STATUSES,
};
use super::jobs::{SweepConfig, SweepJob};

/// Everything the handlers read from or write to.
#[derive(Clone)]
pub struct PaymentPorts {
    pub payments: Arc<dyn PaymentRepository>,
    pub store: Arc<dyn ActivationStore>,
    pub accounts: Arc<dyn AccountRepository>,
    pub webhook_events: Arc<dyn WebhookEventRepository>,
    pub processor: Arc<dyn ProcessorClient>,
}

#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub billing: BillingTerms,
    pub paid_statuses: Vec<String>,
    /// Upper bound on each processor lookup.
    pub processor_timeout: Duration,
    pub poller: PollerConfig,
    pub sweep: SweepConfig,
    pub webhook_secret: Option<SecretString>,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            billing: BillingTerms::default(),
            paid_statuses: DEFAULT_PAID_STATUSES.iter().map(|s| s.to_string()).collect(),
            processor_timeout: Duration::from_secs(10),
            poller: PollerConfig::default(),
            sweep: SweepConfig::default(),
            webhook_secret: None,
        }
    }
}

/// The three activation paths plus creation, linking and reversal, sharing
/// one engine and one verifier.
#[derive(Clone)]
pub struct PaymentServices {
    pub engine: Arc<ActivationEngine>,
    pub verifier: Arc<PaymentVerifier>,
    pub create_payment: Arc<CreatePaymentHandler>,
    pub link_guest_payment: Arc<LinkGuestPaymentHandler>,
    pub poller: Arc<CheckoutPoller>,
    pub webhook: Arc<WebhookReceiver>,
    pub reverter: Arc<RevertPaymentHandler>,
    pub sweep: Arc<SweepJob>,
}

impl PaymentServices {
    pub fn build(ports: PaymentPorts, settings: ServiceSettings) -> Self {
        let engine = Arc::new(ActivationEngine::new(
            ports.payments.clone(),
            ports.store.clone(),
            settings.billing,
        ));
        let verifier = Arc::new(PaymentVerifier::new(
            ports.processor.clone(),
            settings.paid_statuses,
            settings.processor_timeout,
        ));
        let reverter = Arc::new(RevertPaymentHandler::new(
            ports.payments.clone(),
            ports.store.clone(),
        ));

        let webhook_verifier = WebhookSignatureVerifier::new(settings.webhook_secret);
        if !webhook_verifier.is_configured() {
            tracing::warn!("webhook secret not configured; every webhook will be rejected");
        }

        Self {
            create_payment: Arc::new(CreatePaymentHandler::new(ports.payments.clone())),
            link_guest_payment: Arc::new(LinkGuestPaymentHandler::new(
                ports.payments.clone(),
                engine.clone(),
                verifier.clone(),
            )),
            poller: Arc::new(CheckoutPoller::new(
                ports.payments.clone(),
                ports.accounts.clone(),
                engine.clone(),
                verifier.clone(),
                settings.poller,
            )),
            webhook: Arc::new(WebhookReceiver::new(
                webhook_verifier,
                ports.payments.clone(),
                ports.webhook_events,
                engine.clone(),
                reverter.clone(),
            )),
            sweep: Arc::new(SweepJob::new(
                ports.payments,
                engine.clone(),
                verifier.clone(),
                settings.sweep,
            )),
            reverter,
            engine,
            verifier,
        }
    }
}
