//! Business logic and service layer modules.
//!
//! This module contains the verification protocol, the rate limiter and
//! its counter stores, lead acceptance and metrics collection.

pub mod clock;
pub mod lead;
pub mod metrics;
pub mod otp;
pub mod rate_limit;
pub mod rest_store;

pub use clock::*;
pub use lead::*;
pub use metrics::*;
pub use otp::*;
pub use rate_limit::*;
pub use rest_store::*;
