//! Sliding window rate limiting keyed by policy and identifier.
//!
//! Counters live behind [`RateLimitStore`]. Each store performs the
//! check-and-increment as one atomic operation so concurrent requests for
//! the same identifier can never overshoot a budget. A store that cannot be
//! reached fails open.

use crate::{
    config::{PolicyLimit, RateLimitConfig},
    error::StoreError,
    services::{clock::Clock, metrics::AppMetrics},
};
use async_trait::async_trait;
use std::{collections::HashMap, fmt, sync::Arc};
use tokio::sync::Mutex;
use tracing::warn;

/// The budgets enforced by the service
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RateLimitPolicy {
    OtpSendByIp,
    OtpSendByPhone,
    OtpVerifyByPhone,
    LeadSubmitByIp,
}

impl RateLimitPolicy {
    pub fn name(self) -> &'static str {
        match self {
            Self::OtpSendByIp => "otp-send-by-ip",
            Self::OtpSendByPhone => "otp-send-by-phone",
            Self::OtpVerifyByPhone => "otp-verify-by-phone",
            Self::LeadSubmitByIp => "lead-submit-by-ip",
        }
    }

    /// Namespace of the counter keys in the store
    pub fn key_prefix(self) -> &'static str {
        match self {
            Self::OtpSendByIp => "ratelimit:otp:ip",
            Self::OtpSendByPhone => "ratelimit:otp:mobile",
            Self::OtpVerifyByPhone => "ratelimit:otp:verify",
            Self::LeadSubmitByIp => "ratelimit:lead",
        }
    }
}

impl fmt::Display for RateLimitPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Outcome of one rate limit check
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    /// Requests still available right now, or [`Self::REMAINING_UNKNOWN`]
    pub remaining: i64,
    /// Epoch milliseconds at which the current bucket rolls over, 0 if unknown
    pub reset_at: i64,
}

impl RateLimitDecision {
    pub const REMAINING_UNKNOWN: i64 = -1;

    /// Decision used when the counter store could not be consulted
    pub fn unknown() -> Self {
        Self {
            allowed: true,
            remaining: Self::REMAINING_UNKNOWN,
            reset_at: 0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.remaining == Self::REMAINING_UNKNOWN
    }

    pub fn seconds_until_reset(&self, now_ms: i64) -> i64 {
        ((self.reset_at - now_ms).max(0) + 999) / 1000
    }

    pub fn minutes_until_reset(&self, now_ms: i64) -> i64 {
        ((self.reset_at - now_ms).max(0) + 59_999) / 60_000
    }
}

/// A request rejected by one policy
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitExceeded {
    pub policy: RateLimitPolicy,
    pub decision: RateLimitDecision,
}

/// Atomic sliding window counter storage
#[async_trait]
pub trait RateLimitStore: Send + Sync {
    /// Count one request against `key` if the budget allows it.
    ///
    /// Checking and incrementing must happen as a single atomic step.
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window_ms: i64,
        now_ms: i64,
    ) -> Result<RateLimitDecision, StoreError>;

    /// Short backend name reported by the health endpoint
    fn backend_name(&self) -> &'static str;
}

/// Two fixed buckets approximating a sliding window.
///
/// The previous bucket's count is weighted by how much of it still overlaps
/// the window ending now.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct SlidingWindow {
    bucket: i64,
    window_ms: i64,
    current: u32,
    previous: u32,
}

impl SlidingWindow {
    fn hit(&mut self, limit: u32, window_ms: i64, now_ms: i64) -> RateLimitDecision {
        let bucket = now_ms.div_euclid(window_ms);

        if self.window_ms != window_ms || bucket > self.bucket + 1 {
            *self = Self {
                bucket,
                window_ms,
                ..Self::default()
            };
        } else if bucket == self.bucket + 1 {
            self.previous = self.current;
            self.current = 0;
            self.bucket = bucket;
        }

        let elapsed_fraction = now_ms.rem_euclid(window_ms) as f64 / window_ms as f64;
        let weighted_previous = ((1.0 - elapsed_fraction) * self.previous as f64).floor() as i64;
        let reset_at = (bucket + 1) * window_ms;

        if weighted_previous + i64::from(self.current) >= i64::from(limit) {
            return RateLimitDecision {
                allowed: false,
                remaining: 0,
                reset_at,
            };
        }

        self.current += 1;
        RateLimitDecision {
            allowed: true,
            remaining: i64::from(limit) - (i64::from(self.current) + weighted_previous),
            reset_at,
        }
    }

    fn is_stale(&self, now_ms: i64) -> bool {
        now_ms.div_euclid(self.window_ms) > self.bucket + 1
    }
}

/// In-process counter store.
///
/// Counters are shared by every worker of one process. Deployments running
/// several instances need a shared store such as
/// [`RestRateLimitStore`](crate::services::rest_store::RestRateLimitStore).
#[derive(Default)]
pub struct MemoryRateLimitStore {
    windows: Mutex<HashMap<String, SlidingWindow>>,
}

impl MemoryRateLimitStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RateLimitStore for MemoryRateLimitStore {
    async fn hit(
        &self,
        key: &str,
        limit: u32,
        window_ms: i64,
        now_ms: i64,
    ) -> Result<RateLimitDecision, StoreError> {
        if window_ms <= 0 {
            return Err(StoreError::Protocol(format!(
                "window must be positive, got {window_ms}ms"
            )));
        }

        let mut windows = self.windows.lock().await;
        windows.retain(|_, window| !window.is_stale(now_ms));

        let window = windows.entry(key.to_string()).or_default();
        Ok(window.hit(limit, window_ms, now_ms))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// Applies the configured policies against a counter store
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    metrics: AppMetrics,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn RateLimitStore>,
        config: RateLimitConfig,
        clock: Arc<dyn Clock>,
        metrics: AppMetrics,
    ) -> Self {
        Self {
            store,
            config,
            clock,
            metrics,
        }
    }

    pub fn limit_for(&self, policy: RateLimitPolicy) -> PolicyLimit {
        match policy {
            RateLimitPolicy::OtpSendByIp => self.config.otp_send_by_ip,
            RateLimitPolicy::OtpSendByPhone => self.config.otp_send_by_phone,
            RateLimitPolicy::OtpVerifyByPhone => self.config.otp_verify_by_phone,
            RateLimitPolicy::LeadSubmitByIp => self.config.lead_submit_by_ip,
        }
    }

    pub fn backend_name(&self) -> &'static str {
        self.store.backend_name()
    }

    /// Count one request against `policy` for `identifier`.
    ///
    /// Never fails: store errors are logged and answered with
    /// [`RateLimitDecision::unknown`].
    pub async fn check(&self, policy: RateLimitPolicy, identifier: &str) -> RateLimitDecision {
        let limit = self.limit_for(policy);
        let key = format!("{}:{}", policy.key_prefix(), identifier);
        let now = self.clock.now_ms();

        match self
            .store
            .hit(&key, limit.max_requests, limit.window_ms(), now)
            .await
        {
            Ok(decision) => {
                if !decision.allowed {
                    self.metrics.record_rate_limited(policy.name());
                }
                decision
            }
            Err(e) => {
                warn!(
                    policy = policy.name(),
                    backend = self.store.backend_name(),
                    error = %e,
                    "Rate limiting unavailable, allowing request"
                );
                self.metrics.record_rate_limit_store_failure();
                RateLimitDecision::unknown()
            }
        }
    }

    /// Like [`check`](Self::check) but turns a denial into an error
    pub async fn enforce(
        &self,
        policy: RateLimitPolicy,
        identifier: &str,
    ) -> Result<RateLimitDecision, RateLimitExceeded> {
        let decision = self.check(policy, identifier).await;
        if decision.allowed {
            Ok(decision)
        } else {
            Err(RateLimitExceeded { policy, decision })
        }
    }

    /// Both send budgets must allow the request.
    ///
    /// The IP budget is consulted first and a denial there leaves the phone
    /// budget untouched. The returned decision carries the smaller of the two
    /// remaining counts.
    pub async fn check_send(
        &self,
        client_ip: &str,
        phone: &str,
    ) -> Result<RateLimitDecision, RateLimitExceeded> {
        let by_ip = self.enforce(RateLimitPolicy::OtpSendByIp, client_ip).await?;
        let by_phone = self.enforce(RateLimitPolicy::OtpSendByPhone, phone).await?;

        Ok(RateLimitDecision {
            allowed: true,
            remaining: by_ip.remaining.min(by_phone.remaining),
            reset_at: by_ip.reset_at.max(by_phone.reset_at),
        })
    }

    pub fn now_ms(&self) -> i64 {
        self.clock.now_ms()
    }
}
