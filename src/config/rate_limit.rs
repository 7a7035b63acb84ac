//! Rate limiting configuration.

use super::{ConfigError, env_number};
use std::{env, fmt};
use url::Url;

/// Budget of one rate limit policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PolicyLimit {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl PolicyLimit {
    pub const fn new(max_requests: u32, window_seconds: u64) -> Self {
        Self {
            max_requests,
            window_seconds,
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window_seconds as i64 * 1000
    }

    /// Read `RATE_LIMIT_{prefix}_MAX` and `RATE_LIMIT_{prefix}_WINDOW_SECS`
    fn from_env(prefix: &str, default: PolicyLimit) -> Self {
        Self {
            max_requests: env_number(&format!("RATE_LIMIT_{prefix}_MAX"), default.max_requests),
            window_seconds: env_number(
                &format!("RATE_LIMIT_{prefix}_WINDOW_SECS"),
                default.window_seconds,
            ),
        }
    }
}

/// Where sliding window counters are kept
#[derive(Clone, Default)]
pub enum RateLimitBackend {
    /// Process-local counters; only correct for a single instance
    #[default]
    Memory,
    /// Redis REST endpoint (Upstash compatible)
    Rest {
        url: Url,
        token: String,
        timeout_ms: u64,
    },
}

impl fmt::Debug for RateLimitBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Memory => f.write_str("Memory"),
            Self::Rest {
                url, timeout_ms, ..
            } => f
                .debug_struct("Rest")
                .field("url", &url.as_str())
                .field("token", &"[REDACTED]")
                .field("timeout_ms", timeout_ms)
                .finish(),
        }
    }
}

/// Configuration for rate limiting
#[derive(Clone, Debug)]
pub struct RateLimitConfig {
    pub backend: RateLimitBackend,
    pub otp_send_by_ip: PolicyLimit,
    pub otp_send_by_phone: PolicyLimit,
    pub otp_verify_by_phone: PolicyLimit,
    pub lead_submit_by_ip: PolicyLimit,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            backend: RateLimitBackend::Memory,
            otp_send_by_ip: PolicyLimit::new(3, 10 * 60),
            otp_send_by_phone: PolicyLimit::new(3, 10 * 60),
            otp_verify_by_phone: PolicyLimit::new(5, 5 * 60),
            lead_submit_by_ip: PolicyLimit::new(5, 60 * 60),
        }
    }
}

impl RateLimitConfig {
    /// Load configuration from environment variables, falling back to defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let url = first_var(&["RATE_LIMIT_STORE_URL", "UPSTASH_REDIS_REST_URL"]);
        let token = first_var(&["RATE_LIMIT_STORE_TOKEN", "UPSTASH_REDIS_REST_TOKEN"]);

        let backend = match (url, token) {
            (Some(url), Some(token)) => RateLimitBackend::Rest {
                url: Url::parse(&url).map_err(|e| ConfigError::InvalidValue {
                    name: "RATE_LIMIT_STORE_URL",
                    reason: e.to_string(),
                })?,
                token,
                timeout_ms: env_number("RATE_LIMIT_STORE_TIMEOUT_MS", 1000),
            },
            (Some(_), None) => {
                return Err(ConfigError::InvalidValue {
                    name: "RATE_LIMIT_STORE_TOKEN",
                    reason: "a token is required when a store URL is set".to_string(),
                });
            }
            _ => RateLimitBackend::Memory,
        };

        Ok(Self {
            backend,
            otp_send_by_ip: PolicyLimit::from_env("OTP_SEND_IP", defaults.otp_send_by_ip),
            otp_send_by_phone: PolicyLimit::from_env("OTP_SEND_PHONE", defaults.otp_send_by_phone),
            otp_verify_by_phone: PolicyLimit::from_env(
                "OTP_VERIFY_PHONE",
                defaults.otp_verify_by_phone,
            ),
            lead_submit_by_ip: PolicyLimit::from_env("LEAD_SUBMIT_IP", defaults.lead_submit_by_ip),
        })
    }
}

fn first_var(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Mutex to synchronize tests that modify environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "RATE_LIMIT_STORE_URL",
        "RATE_LIMIT_STORE_TOKEN",
        "UPSTASH_REDIS_REST_URL",
        "UPSTASH_REDIS_REST_TOKEN",
        "RATE_LIMIT_OTP_SEND_IP_MAX",
        "RATE_LIMIT_OTP_SEND_IP_WINDOW_SECS",
    ];

    fn clear() {
        for var in VARS {
            unsafe { env::remove_var(var) };
        }
    }

    #[test]
    fn test_defaults_match_policy_table() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear();

        let config = RateLimitConfig::from_env().unwrap();
        assert!(matches!(config.backend, RateLimitBackend::Memory));
        assert_eq!(config.otp_send_by_ip, PolicyLimit::new(3, 600));
        assert_eq!(config.otp_send_by_phone, PolicyLimit::new(3, 600));
        assert_eq!(config.otp_verify_by_phone, PolicyLimit::new(5, 300));
        assert_eq!(config.lead_submit_by_ip, PolicyLimit::new(5, 3600));
    }

    #[test]
    fn test_policy_override_and_rest_backend() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear();

        unsafe {
            env::set_var("UPSTASH_REDIS_REST_URL", "https://example.upstash.io");
            env::set_var("UPSTASH_REDIS_REST_TOKEN", "token-123");
            env::set_var("RATE_LIMIT_OTP_SEND_IP_MAX", "10");
            env::set_var("RATE_LIMIT_OTP_SEND_IP_WINDOW_SECS", "60");
        }

        let config = RateLimitConfig::from_env().unwrap();
        assert_eq!(config.otp_send_by_ip, PolicyLimit::new(10, 60));
        match &config.backend {
            RateLimitBackend::Rest { url, token, .. } => {
                assert_eq!(url.host_str(), Some("example.upstash.io"));
                assert_eq!(token, "token-123");
            }
            other => panic!("expected REST backend, got {other:?}"),
        }
        assert!(!format!("{:?}", config.backend).contains("token-123"));

        clear();
    }

    #[test]
    fn test_url_without_token_is_rejected() {
        let _lock = ENV_MUTEX.lock().unwrap();
        clear();

        unsafe { env::set_var("RATE_LIMIT_STORE_URL", "https://example.upstash.io") };
        assert!(RateLimitConfig::from_env().is_err());

        clear();
    }
}
