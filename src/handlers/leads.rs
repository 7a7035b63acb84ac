//! Lead submission and call-back request handlers.

use crate::{
    error::ApiError,
    handlers::app_state,
    middleware::request_id,
    models::{
        api::ErrorResponse,
        audit::{VerificationAuditEvent, VerificationEventType, VerificationOutcome},
        lead::{CallbackRequest, CallbackResponse, LeadRequest, LeadResponse},
    },
    services::{CallbackOutcome, ClientInfo, LeadError, LeadOutcome, USER_AGENT_MAX_CHARS},
    utils::{extract_client_ip, extract_user_agent},
};
use actix_web::{Error, HttpRequest, Result, web};
use paperclip::actix::api_v2_operation;
use tracing::error;

const DUPLICATE_MESSAGE: &str =
    "You have already submitted an application. Our team will contact you soon.";
const CALLBACK_MESSAGE: &str = "Callback request received";

fn client_info(req: &HttpRequest) -> ClientInfo {
    ClientInfo {
        ip: extract_client_ip(req),
        user_agent: extract_user_agent(req, USER_AGENT_MAX_CHARS),
    }
}

/// Map a guard failure onto its HTTP error
fn lead_error(e: LeadError, now_ms: i64) -> ApiError {
    match e {
        LeadError::Invalid(e) => e.into(),
        LeadError::VerificationRequired
        | LeadError::VerificationExpired
        | LeadError::VerificationAlreadyUsed => ApiError::Verification(e.to_string()),
        LeadError::RateLimited(exceeded) => ApiError::rate_limited(exceeded, now_ms),
        LeadError::Storage(e) => {
            error!(error = %e, "Lead storage unavailable");
            ApiError::Unavailable("Database temporarily unavailable. Please try again.".to_string())
        }
    }
}

/// Submit a lead
///
/// Requires a verification token from `/api/otp/verify` that is at most
/// 30 minutes old. Each token creates at most one lead; resubmitting the
/// same application within an hour returns 409 with the existing lead id.
#[api_v2_operation(
    summary = "Submit Lead",
    description = "Create a loan application lead for a verified phone number.",
    tags("Leads"),
    responses(
        (status = 200, description = "Lead created", body = LeadResponse),
        (status = 400, description = "Invalid input or missing verification", body = ErrorResponse),
        (status = 409, description = "Already submitted", body = ErrorResponse),
        (status = 429, description = "Submission budget exhausted", body = ErrorResponse),
        (status = 503, description = "Lead storage unavailable", body = ErrorResponse)
    )
)]
pub async fn submit_lead(
    req: HttpRequest,
    payload: web::Json<LeadRequest>,
) -> Result<web::Json<LeadResponse>, Error> {
    let state = app_state(&req)?;
    let client = client_info(&req);
    let endpoint = req.uri().path().to_string();

    match state.leads.accept(&payload, &client).await {
        Ok(LeadOutcome::Created(lead)) => {
            VerificationAuditEvent::new(
                VerificationEventType::LeadAccepted,
                VerificationOutcome::Success,
                client.ip,
                endpoint,
            )
            .with_phone(&lead.phone)
            .with_request_id(request_id(&req))
            .with_lead_id(&lead.id)
            .log();

            Ok(web::Json(LeadResponse {
                success: true,
                message: "Application submitted successfully".to_string(),
                reference_number: lead.reference_number(),
                lead_id: lead.id,
            }))
        }
        Ok(LeadOutcome::Duplicate(existing)) => {
            VerificationAuditEvent::new(
                VerificationEventType::LeadDuplicate,
                VerificationOutcome::Failure,
                client.ip,
                endpoint,
            )
            .with_phone(&payload.phone)
            .with_request_id(request_id(&req))
            .with_lead_id(&existing.id)
            .with_reason("duplicate")
            .log();

            Err(ApiError::Duplicate {
                message: DUPLICATE_MESSAGE.to_string(),
                lead_id: existing.id,
            }
            .into())
        }
        Err(e) => {
            VerificationAuditEvent::new(
                VerificationEventType::LeadRejected,
                VerificationOutcome::Failure,
                client.ip,
                endpoint,
            )
            .with_phone(&payload.phone)
            .with_request_id(request_id(&req))
            .with_reason(e.reason())
            .log();

            Err(lead_error(e, state.clock.now_ms()).into())
        }
    }
}

/// Request a call back
///
/// Records an unverified lead asking for a phone call. Repeated requests
/// for the same number within a day are acknowledged without a new lead.
#[api_v2_operation(
    summary = "Request Callback",
    description = "Record an unverified call-back request for a phone number.",
    tags("Leads"),
    responses(
        (status = 200, description = "Request received", body = CallbackResponse),
        (status = 400, description = "Invalid phone number", body = ErrorResponse),
        (status = 429, description = "Submission budget exhausted", body = ErrorResponse),
        (status = 503, description = "Lead storage unavailable", body = ErrorResponse)
    )
)]
pub async fn request_callback(
    req: HttpRequest,
    payload: web::Json<CallbackRequest>,
) -> Result<web::Json<CallbackResponse>, Error> {
    let state = app_state(&req)?;
    let client = client_info(&req);
    let endpoint = req.uri().path().to_string();

    match state.leads.request_callback(&payload, &client).await {
        Ok(outcome) => {
            let mut event = VerificationAuditEvent::new(
                VerificationEventType::CallbackRequested,
                VerificationOutcome::Success,
                client.ip,
                endpoint,
            )
            .with_phone(&payload.phone)
            .with_request_id(request_id(&req));
            if let CallbackOutcome::Created(lead) = &outcome {
                event = event.with_lead_id(&lead.id);
            }
            event.log();

            Ok(web::Json(CallbackResponse {
                success: true,
                message: CALLBACK_MESSAGE.to_string(),
            }))
        }
        Err(LeadError::RateLimited(exceeded)) => Err(ApiError::RateLimited {
            message: "Too many requests. Please try again later.".to_string(),
            retry_after: exceeded.decision.reset_at,
            retry_after_seconds: exceeded
                .decision
                .seconds_until_reset(state.clock.now_ms()),
        }
        .into()),
        Err(e) => Err(lead_error(e, state.clock.now_ms()).into()),
    }
}
