//! Data models and schemas.
//!
//! Wire-level request/response bodies (camelCase JSON), the stored lead
//! record and the audit event type.

pub mod api;
pub mod audit;
pub mod lead;
pub mod otp;

pub use api::*;
pub use audit::*;
pub use lead::*;
pub use otp::*;
