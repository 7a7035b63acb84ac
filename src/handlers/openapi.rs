//! OpenAPI specification generation and app factory.

use crate::{
    error::ApiError,
    handlers::{get_metrics, health, request_callback, send_otp, submit_lead, verify_otp, version},
    middleware::{MetricsMiddleware, RequestIdMiddleware, SecurityHeaders},
    state::AppState,
};
use actix_web::App;
use paperclip::actix::{OpenApiExt, web};
use paperclip::v2::models::{DefaultApiRaw, Info};
use tracing::debug;

/// Largest accepted JSON body
const JSON_LIMIT_BYTES: usize = 16 * 1024;

/// Creates the shared OpenAPI specification for the API
pub fn create_openapi_spec() -> DefaultApiRaw {
    DefaultApiRaw {
        info: Info {
            title: "Lead Verify API".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            description: Some(
                "Phone verification and lead capture for loan applications.\n\n\
                ## Verification flow\n\
                1. `POST /api/otp/send` returns a `signature` and `timestamp` for a 6-digit code \
                sent to the phone. Nothing is stored server side.\n\
                2. `POST /api/otp/verify` with the code, signature and timestamp returns a \
                `verificationToken` and a new `timestamp`.\n\
                3. `POST /api/leads` with `otpSignature` set to the verification token and \
                `otpTimestamp` set to its timestamp. A token is valid for 30 minutes and \
                creates at most one lead.\n\
                \n\
                ## Rate limits\n\
                Sliding windows per client IP and per phone number. A `429` response carries \
                `retryAfter` (epoch milliseconds at which the window resets) and a standard \
                `Retry-After` header in seconds.\n\
                \n\
                ## Errors\n\
                Every error body is `{\"error\": \"...\"}`; duplicates add `leadId`."
                    .into(),
            ),
            ..Default::default()
        },
        ..Default::default()
    }
}

/// Creates the application around shared state
///
/// The state is built once outside the server factory so every worker
/// shares the same counters and stores. Used both by `main` and by tests.
pub fn create_app(
    state: web::Data<AppState>,
) -> App<
    impl actix_web::dev::ServiceFactory<
        actix_web::dev::ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let security_config = state.config.security.clone();
    let json_config = actix_web::web::JsonConfig::default()
        .limit(JSON_LIMIT_BYTES)
        .error_handler(|err, _req| {
            debug!(error = %err, "Rejected request body");
            ApiError::Validation("Validation failed".to_string()).into()
        });

    App::new()
        .wrap(SecurityHeaders::new(security_config))
        .wrap(MetricsMiddleware)
        .wrap(RequestIdMiddleware)
        .wrap_api_with_spec(create_openapi_spec())
        .app_data(state)
        .app_data(json_config)
        .service(web::resource("/api/otp/send").route(web::post().to(send_otp)))
        .service(web::resource("/api/otp/verify").route(web::post().to(verify_otp)))
        .service(web::resource("/api/leads").route(web::post().to(submit_lead)))
        .service(web::resource("/api/callback").route(web::post().to(request_callback)))
        .service(web::resource("/api/health").route(web::get().to(health)))
        .service(web::resource("/api/version").route(web::get().to(version)))
        .service(web::resource("/api/metrics").route(web::get().to(get_metrics)))
        .with_json_spec_at("/api/spec/v2")
        .build()
}
