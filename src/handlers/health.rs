//! Health check endpoint handler.

use crate::{handlers::app_state, models::HealthResponse};
use actix_web::{Error, HttpRequest, Result, web};
use paperclip::actix::api_v2_operation;

/// Health check endpoint
///
/// Returns the current health status of the API and the counter store in
/// use. This endpoint can be used by load balancers and health probes.
#[api_v2_operation(
    summary = "Health Check Endpoint",
    description = "Returns the current health status of the API in JSON format.",
    tags("Health"),
    responses(
        (status = 200, description = "Successful response", body = HealthResponse)
    )
)]
pub async fn health(req: HttpRequest) -> Result<web::Json<HealthResponse>, Error> {
    let state = app_state(&req)?;

    Ok(web::Json(HealthResponse {
        status: "healthy".to_string(),
        rate_limit_store: state.limiter.backend_name().to_string(),
    }))
}
