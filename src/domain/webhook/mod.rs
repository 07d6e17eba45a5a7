//! Webhook module - signed notifications pushed by the payment processor.

mod errors;
mod event;
mod verifier;

pub use errors::WebhookError;
pub use event::{ProcessorEvent, ProcessorEventData, ProcessorEventType};
pub use verifier::{SignatureHeader, WebhookSignatureVerifier, SIGNATURE_HEADER};

#[cfg(test)]
pub use verifier::compute_test_signature;
