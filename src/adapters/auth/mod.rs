//! Authentication adapters behind the `SessionValidator` port.
//!
//! - `jwt` - HS256 session tokens signed by the session provider
//! - `mock` - fixed token table for tests and local runs

mod jwt;
mod mock;

pub use jwt::{JwtSessionValidator, JwtValidatorConfig};
pub use mock::MockSessionValidator;
