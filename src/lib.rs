//! Lead Verify API - phone verification and lead capture over Actix Web
//!
//! The service issues HMAC-signed one-time codes without storing them,
//! turns a correct code into a short-lived verification token, and accepts
//! loan application leads only when they carry such a token. Sliding window
//! rate limits protect every step.
//!
//! ## Architecture
//!
//! The codebase is organized into focused modules:
//! - `models/` - Request, response and lead data structures
//! - `handlers/` - HTTP request handlers for each endpoint
//! - `middleware/` - Request IDs, metrics and security headers
//! - `services/` - Verification protocol, rate limiting and lead acceptance
//! - `utils/` - HMAC, client identification and input validation
//! - `config/` - Configuration structures and environment loading
//! - `state` - Shared state handed to every worker
//!
//! ## Quick Start
//!
//! ```no_run
//! use actix_web::{HttpServer, web};
//! use lead_verify_api::{AppConfig, AppState, create_app};
//!
//! #[actix_web::main]
//! async fn main() -> std::io::Result<()> {
//!     let config = AppConfig::from_env().expect("invalid configuration");
//!     let state = web::Data::new(AppState::from_config(config).expect("startup failed"));
//!     HttpServer::new(move || create_app(state.clone()))
//!         .bind(("127.0.0.1", 8080))?
//!         .run()
//!         .await
//! }
//! ```

// Core modules
pub mod config;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

// Re-export commonly used types and functions for convenience
pub use config::{
    AppConfig, AppEnvironment, ConfigError, LogFormat, MetricsConfig, OtpConfig, PolicyLimit,
    RateLimitBackend, RateLimitConfig, SecurityHeadersConfig, ServerConfig,
};
pub use error::{ApiError, StartupError, StoreError};
pub use handlers::{
    create_app, create_openapi_spec, get_metrics, health, request_callback, send_otp,
    submit_lead, verify_otp, version,
};
pub use middleware::{MetricsMiddleware, RequestIdMiddleware, SecurityHeaders};
pub use models::{
    CallbackRequest, CallbackResponse, ErrorResponse, HealthResponse, Lead, LeadRequest,
    LeadResponse, SendOtpRequest, SendOtpResponse, VerificationAuditEvent, VerifyOtpRequest,
    VerifyOtpResponse, VersionResponse,
};
pub use services::{
    AppMetrics, Clock, LeadGuard, LeadStore, ManualClock, MemoryLeadStore, MemoryRateLimitStore,
    MemoryTokenLedger, OtpService, OtpSigner, RateLimitDecision, RateLimitPolicy,
    RateLimitStore, RateLimiter, RestRateLimitStore, SystemClock, TokenLedger,
};
pub use state::{AppState, Stores};
pub use utils::{extract_client_ip, extract_user_agent, mask_phone};
