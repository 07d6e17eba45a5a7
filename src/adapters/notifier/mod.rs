//! Notifier adapters.
//!
//! - `LoggingNotifier` - writes notifications to the trace log
//! - `HttpNotifier` - posts them to the notification service

mod http;
mod logging;

pub use http::HttpNotifier;
pub use logging::LoggingNotifier;
