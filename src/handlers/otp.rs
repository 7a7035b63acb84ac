//! Phone verification endpoint handlers.

use crate::{
    error::ApiError,
    handlers::app_state,
    middleware::request_id,
    models::{
        api::ErrorResponse,
        audit::{VerificationAuditEvent, VerificationEventType, VerificationOutcome},
        otp::{SendOtpRequest, SendOtpResponse, VerifyOtpRequest, VerifyOtpResponse},
    },
    services::{OtpError, VerifyError},
    utils::{extract_client_ip, mask_phone},
};
use actix_web::{Error, HttpRequest, Result, web};
use paperclip::actix::api_v2_operation;
use tracing::{debug, info};

/// Issue a verification code
///
/// Signs a fresh 6-digit code for the phone number. The client keeps the
/// returned signature and timestamp and sends them back with the code.
#[api_v2_operation(
    summary = "Send OTP",
    description = "Issue a signed one-time code for an Indian mobile number.",
    tags("Verification"),
    responses(
        (status = 200, description = "Code issued", body = SendOtpResponse),
        (status = 400, description = "Invalid phone number", body = ErrorResponse),
        (status = 429, description = "Send budget exhausted for this IP or phone", body = ErrorResponse)
    )
)]
pub async fn send_otp(
    req: HttpRequest,
    payload: web::Json<SendOtpRequest>,
) -> Result<web::Json<SendOtpResponse>, Error> {
    let state = app_state(&req)?;
    let ip_address = extract_client_ip(&req);
    let endpoint = req.uri().path().to_string();

    payload.validate().map_err(ApiError::from)?;

    let issued = match state.otp.send(&payload.phone, &ip_address).await {
        Ok(issued) => issued,
        Err(exceeded) => {
            VerificationAuditEvent::new(
                VerificationEventType::RateLimitExceeded,
                VerificationOutcome::Failure,
                ip_address,
                endpoint,
            )
            .with_phone(&payload.phone)
            .with_request_id(request_id(&req))
            .with_reason(exceeded.policy.name())
            .log();

            return Err(ApiError::rate_limited(exceeded, state.clock.now_ms()).into());
        }
    };

    // SMS delivery is handled outside this service
    if state.echo_codes() {
        debug!(phone = %mask_phone(&payload.phone), code = %issued.code, "Development OTP");
    }
    info!(phone = %mask_phone(&payload.phone), remaining = issued.remaining, "OTP issued");

    VerificationAuditEvent::new(
        VerificationEventType::OtpSent,
        VerificationOutcome::Success,
        ip_address,
        endpoint,
    )
    .with_phone(&payload.phone)
    .with_request_id(request_id(&req))
    .log();

    Ok(web::Json(SendOtpResponse {
        success: true,
        message: "OTP sent successfully".to_string(),
        timestamp: issued.issued_at,
        signature: issued.signature,
        remaining: issued.remaining,
        otp: state.echo_codes().then_some(issued.code),
    }))
}

/// Check a verification code
///
/// On success returns a verification token that the lead endpoint accepts
/// as proof of phone ownership for a limited time.
#[api_v2_operation(
    summary = "Verify OTP",
    description = "Check a code against its signature and return a verification token.",
    tags("Verification"),
    responses(
        (status = 200, description = "Phone verified", body = VerifyOtpResponse),
        (status = 400, description = "Invalid or expired code", body = ErrorResponse),
        (status = 429, description = "Too many attempts for this phone", body = ErrorResponse)
    )
)]
pub async fn verify_otp(
    req: HttpRequest,
    payload: web::Json<VerifyOtpRequest>,
) -> Result<web::Json<VerifyOtpResponse>, Error> {
    let state = app_state(&req)?;
    let ip_address = extract_client_ip(&req);
    let endpoint = req.uri().path().to_string();

    payload.validate().map_err(ApiError::from)?;

    let result = state
        .otp
        .verify(
            &payload.phone,
            &payload.otp,
            &payload.signature,
            payload.timestamp,
        )
        .await;

    match result {
        Ok(token) => {
            VerificationAuditEvent::new(
                VerificationEventType::OtpVerified,
                VerificationOutcome::Success,
                ip_address,
                endpoint,
            )
            .with_phone(&payload.phone)
            .with_request_id(request_id(&req))
            .log();

            Ok(web::Json(VerifyOtpResponse {
                success: true,
                message: "Phone verified successfully".to_string(),
                verification_token: token.token,
                timestamp: token.verified_at,
            }))
        }
        Err(VerifyError::RateLimited(exceeded)) => {
            VerificationAuditEvent::new(
                VerificationEventType::RateLimitExceeded,
                VerificationOutcome::Failure,
                ip_address,
                endpoint,
            )
            .with_phone(&payload.phone)
            .with_request_id(request_id(&req))
            .with_reason(exceeded.policy.name())
            .log();

            Err(ApiError::rate_limited(exceeded, state.clock.now_ms()).into())
        }
        Err(VerifyError::Rejected(e)) => {
            VerificationAuditEvent::new(
                VerificationEventType::OtpRejected,
                VerificationOutcome::Failure,
                ip_address,
                endpoint,
            )
            .with_phone(&payload.phone)
            .with_request_id(request_id(&req))
            .with_reason(match e {
                OtpError::Expired => "expired",
                OtpError::InvalidCode => "invalid_code",
            })
            .log();

            Err(ApiError::Verification(e.to_string()).into())
        }
    }
}
