//! Signing secret provisioning and OTP lifetimes.

use super::{AppEnvironment, ConfigError, env_number};
use std::{env, fmt};
use tracing::warn;

/// Fallback secret for local development only
pub const DEVELOPMENT_SIGNING_SECRET: &str = "dev-only-secret-do-not-use-in-production";

/// Configuration for the phone verification protocol
#[derive(Clone)]
pub struct OtpConfig {
    pub signing_secret: String,
    pub code_validity_minutes: i64,
    pub verification_validity_minutes: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            signing_secret: DEVELOPMENT_SIGNING_SECRET.to_string(),
            code_validity_minutes: 10,
            verification_validity_minutes: 30,
        }
    }
}

impl fmt::Debug for OtpConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OtpConfig")
            .field("signing_secret", &"[REDACTED]")
            .field("code_validity_minutes", &self.code_validity_minutes)
            .field(
                "verification_validity_minutes",
                &self.verification_validity_minutes,
            )
            .finish()
    }
}

impl OtpConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env(environment: AppEnvironment) -> Result<Self, ConfigError> {
        let signing_secret =
            resolve_signing_secret(environment, env::var("OTP_SECRET").ok().as_deref())?;

        Ok(Self {
            signing_secret,
            code_validity_minutes: env_number("OTP_VALIDITY_MINUTES", 10),
            verification_validity_minutes: env_number("VERIFICATION_VALIDITY_MINUTES", 30),
        })
    }

    pub fn code_validity_ms(&self) -> i64 {
        self.code_validity_minutes * 60 * 1000
    }

    pub fn verification_validity_ms(&self) -> i64 {
        self.verification_validity_minutes * 60 * 1000
    }
}

/// Pick the signing secret for the given environment.
///
/// Production refuses to start without one. Other environments fall back to
/// [`DEVELOPMENT_SIGNING_SECRET`] and log a warning.
pub fn resolve_signing_secret(
    environment: AppEnvironment,
    configured: Option<&str>,
) -> Result<String, ConfigError> {
    match configured.map(str::trim).filter(|s| !s.is_empty()) {
        Some(secret) => Ok(secret.to_string()),
        None if environment.is_production() => Err(ConfigError::MissingSigningSecret),
        None => {
            warn!(
                environment = environment.as_str(),
                "Using the development OTP signing secret; set OTP_SECRET before deploying"
            );
            Ok(DEVELOPMENT_SIGNING_SECRET.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_production_requires_secret() {
        let result = resolve_signing_secret(AppEnvironment::Production, None);
        assert!(matches!(result, Err(ConfigError::MissingSigningSecret)));

        let result = resolve_signing_secret(AppEnvironment::Production, Some("   "));
        assert!(matches!(result, Err(ConfigError::MissingSigningSecret)));
    }

    #[test]
    fn test_development_falls_back() {
        let secret = resolve_signing_secret(AppEnvironment::Development, None).unwrap();
        assert_eq!(secret, DEVELOPMENT_SIGNING_SECRET);
    }

    #[test]
    fn test_configured_secret_wins() {
        let secret =
            resolve_signing_secret(AppEnvironment::Production, Some("s3cr3t-value")).unwrap();
        assert_eq!(secret, "s3cr3t-value");
    }

    #[test]
    fn test_debug_redacts_secret() {
        let config = OtpConfig {
            signing_secret: "very-private".to_string(),
            ..Default::default()
        };
        let printed = format!("{config:?}");
        assert!(!printed.contains("very-private"));
        assert_eq!(config.code_validity_ms(), 600_000);
        assert_eq!(config.verification_validity_ms(), 1_800_000);
    }
}
