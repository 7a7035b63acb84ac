//! Configuration structures and loading utilities.
//!
//! Each concern reads its own environment variables through a `from_env`
//! constructor; [`AppConfig`] bundles them for the application factory.

pub mod environment;
pub mod metrics;
pub mod otp;
pub mod rate_limit;
pub mod security;
pub mod server;

pub use environment::*;
pub use metrics::*;
pub use otp::*;
pub use rate_limit::*;
pub use security::*;
pub use server::*;

use thiserror::Error;

/// Errors raised while loading configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("OTP_SECRET environment variable is required in production")]
    MissingSigningSecret,
    #[error("the development signing secret cannot be used in production")]
    DevelopmentSecretInProduction,
    #[error("invalid value for {name}: {reason}")]
    InvalidValue { name: &'static str, reason: String },
}

/// Complete application configuration
#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub otp: OtpConfig,
    pub rate_limit: RateLimitConfig,
    pub security: SecurityHeadersConfig,
    pub metrics: MetricsConfig,
    pub server: ServerConfig,
}

impl AppConfig {
    /// Load every configuration section from the environment.
    ///
    /// Fails when `APP_ENV` names no known environment, or when the
    /// deployment is production and no signing secret is set.
    pub fn from_env() -> Result<Self, ConfigError> {
        let environment = AppEnvironment::from_env()?;

        Ok(Self {
            environment,
            otp: OtpConfig::from_env(environment)?,
            rate_limit: RateLimitConfig::from_env()?,
            security: SecurityHeadersConfig::from_env()?,
            metrics: MetricsConfig::from_env(),
            server: ServerConfig::from_env(),
        })
    }
}

/// Parse an optional numeric environment variable, keeping the default when unset
pub(crate) fn env_number<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
