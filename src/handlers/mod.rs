//! HTTP request handlers for API endpoints.
//!
//! This module contains all the HTTP request handlers that process
//! incoming requests and generate responses.

pub mod health;
pub mod leads;
pub mod metrics;
pub mod openapi;
pub mod otp;
pub mod version;

pub use health::*;
pub use leads::*;
pub use metrics::*;
pub use openapi::*;
pub use otp::*;
pub use version::*;

use crate::{error::ApiError, state::AppState};
use actix_web::{HttpRequest, web};

/// Shared state registered by the app factory
pub(crate) fn app_state(req: &HttpRequest) -> Result<&web::Data<AppState>, ApiError> {
    req.app_data::<web::Data<AppState>>()
        .ok_or_else(|| ApiError::Internal("Application state not configured".to_string()))
}
