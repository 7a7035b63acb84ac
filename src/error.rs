//! Error types shared across services and the HTTP mapping.

use crate::{
    config::ConfigError,
    models::api::ErrorResponse,
    services::rate_limit::{RateLimitExceeded, RateLimitPolicy},
};
use actix_web::{
    HttpResponse, ResponseError,
    http::{StatusCode, header},
};
use thiserror::Error;

/// Failure of a backing store (counters, ledger or leads)
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),
    #[error("unexpected store response: {0}")]
    Protocol(String),
}

/// Errors returned to API clients.
///
/// Every variant renders as a JSON body with a short actionable message.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    Verification(String),
    #[error("{message}")]
    RateLimited {
        message: String,
        /// Epoch milliseconds at which the budget resets
        retry_after: i64,
        retry_after_seconds: i64,
    },
    #[error("{message}")]
    Duplicate { message: String, lead_id: String },
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Internal(String),
}

/// Failure while assembling the application at startup
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to register metrics: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("failed to build rate limit store client: {0}")]
    StoreClient(#[from] reqwest::Error),
}

impl ApiError {
    /// 429 response for an exhausted budget, phrased for the policy that denied it
    pub fn rate_limited(exceeded: RateLimitExceeded, now_ms: i64) -> Self {
        let minutes = exceeded.decision.minutes_until_reset(now_ms).max(1);
        let message = match exceeded.policy {
            RateLimitPolicy::OtpSendByIp => {
                format!("Too many OTP requests. Please try again in {minutes} minutes.")
            }
            RateLimitPolicy::OtpSendByPhone => format!(
                "OTP already sent to this number. Please wait {minutes} minutes before requesting again."
            ),
            RateLimitPolicy::OtpVerifyByPhone => format!(
                "Too many verification attempts. Please request a new OTP in {minutes} minutes."
            ),
            RateLimitPolicy::LeadSubmitByIp => {
                "Too many submissions. Please try again later.".to_string()
            }
        };

        Self::RateLimited {
            message,
            retry_after: exceeded.decision.reset_at,
            retry_after_seconds: exceeded.decision.seconds_until_reset(now_ms),
        }
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::Verification(_) => StatusCode::BAD_REQUEST,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Duplicate { .. } => StatusCode::CONFLICT,
            Self::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let mut body = ErrorResponse::new(self.to_string());
        let mut builder = HttpResponse::build(self.status_code());

        match self {
            Self::RateLimited {
                retry_after,
                retry_after_seconds,
                ..
            } => {
                body.retry_after = Some(*retry_after);
                builder.insert_header((header::RETRY_AFTER, retry_after_seconds.to_string()));
            }
            Self::Duplicate { lead_id, .. } => body.lead_id = Some(lead_id.clone()),
            _ => {}
        }

        builder.json(body)
    }
}

impl From<crate::utils::ValidationError> for ApiError {
    fn from(e: crate::utils::ValidationError) -> Self {
        Self::Validation(e.to_string())
    }
}
