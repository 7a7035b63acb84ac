//! Security headers configuration.

use super::{ConfigError, env_number};
use actix_web::http::header::HeaderValue;
use std::env;

/// Tunable parts of the response security headers.
///
/// The rest of the header set is fixed for a JSON-only API; see
/// [`crate::middleware::SecurityHeaders`].
#[derive(Clone, Debug)]
pub struct SecurityHeadersConfig {
    /// `Strict-Transport-Security` max-age in seconds; zero omits the header
    pub hsts_max_age: u32,
    /// Sent unless the handler already set `Cache-Control`
    pub cache_control: String,
}

impl Default for SecurityHeadersConfig {
    fn default() -> Self {
        Self {
            hsts_max_age: 31_536_000,
            cache_control: "no-store".to_string(),
        }
    }
}

impl SecurityHeadersConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let cache_control = env::var("CACHE_CONTROL").unwrap_or(defaults.cache_control);
        if HeaderValue::from_str(&cache_control).is_err() {
            return Err(ConfigError::InvalidValue {
                name: "CACHE_CONTROL",
                reason: "not a valid header value".to_string(),
            });
        }

        Ok(Self {
            hsts_max_age: env_number("HSTS_MAX_AGE", defaults.hsts_max_age),
            cache_control,
        })
    }
}
