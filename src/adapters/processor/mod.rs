//! Payment processor adapters.
//!
//! - `HttpProcessorClient` - the processor's read-only REST API
//! - `MockProcessorClient` - scripted responses for tests

mod http_client;
mod mock;

pub use http_client::{HttpProcessorClient, ProcessorClientConfig};
pub use mock::MockProcessorClient;
