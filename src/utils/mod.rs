//! Utility functions and helper modules.
//!
//! Request metadata extraction, HMAC primitives and input validation.

pub mod hmac;
pub mod http;
pub mod validation;

pub use hmac::*;
pub use http::*;
pub use validation::*;
