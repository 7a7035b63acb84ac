//! Stateless phone verification.
//!
//! A code is never stored. The server hands the client an HMAC over
//! `phone:code:issuedAt` and later recomputes it from what the client sends
//! back. A successful check yields a second HMAC over
//! `verified:phone:verifiedAt` which the lead endpoint accepts as proof of
//! verification.

use crate::{
    config::{ConfigError, OtpConfig},
    services::{
        clock::Clock,
        metrics::AppMetrics,
        rate_limit::{RateLimitExceeded, RateLimitPolicy, RateLimiter},
    },
    utils::{HmacKey, mask_phone},
};
use rand::Rng;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

/// Inclusive range of generated codes
pub const CODE_RANGE: std::ops::RangeInclusive<u32> = 100_000..=999_999;

/// Attempts left at which low-budget warnings are logged
const LOW_ATTEMPTS_THRESHOLD: i64 = 2;

/// A uniformly distributed 6-digit code
pub fn generate_code() -> String {
    rand::rng().random_range(CODE_RANGE).to_string()
}

/// Why a code was not accepted.
///
/// Only expiry is distinguished from every other failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum OtpError {
    #[error("OTP has expired. Please request a new one.")]
    Expired,
    #[error("Invalid OTP. Please check and try again.")]
    InvalidCode,
}

/// Computes and checks the HMACs of the verification protocol
#[derive(Clone, Debug)]
pub struct OtpSigner {
    key: HmacKey,
    code_validity_ms: i64,
}

impl OtpSigner {
    pub fn new(secret: &str, code_validity_ms: i64) -> Result<Self, ConfigError> {
        let key = HmacKey::new(secret.as_bytes()).map_err(|e| ConfigError::InvalidValue {
            name: "OTP_SECRET",
            reason: e.to_string(),
        })?;

        Ok(Self {
            key,
            code_validity_ms,
        })
    }

    pub fn from_config(config: &OtpConfig) -> Result<Self, ConfigError> {
        Self::new(&config.signing_secret, config.code_validity_ms())
    }

    pub fn sign(&self, phone: &str, code: &str, issued_at: i64) -> String {
        self.key.sign_hex(&format!("{phone}:{code}:{issued_at}"))
    }

    /// Check a code against the signature issued with it.
    ///
    /// Age is checked before any HMAC work; it is not secret.
    pub fn verify(
        &self,
        phone: &str,
        code: &str,
        signature: &str,
        issued_at: i64,
        now_ms: i64,
    ) -> Result<(), OtpError> {
        if now_ms - issued_at > self.code_validity_ms {
            return Err(OtpError::Expired);
        }

        if self
            .key
            .verify_hex(&format!("{phone}:{code}:{issued_at}"), signature)
        {
            Ok(())
        } else {
            Err(OtpError::InvalidCode)
        }
    }

    pub fn sign_verification(&self, phone: &str, verified_at: i64) -> String {
        self.key.sign_hex(&format!("verified:{phone}:{verified_at}"))
    }

    /// Constant-time check of a verification token; malformed hex is `false`
    pub fn verify_verification_token(&self, phone: &str, token: &str, verified_at: i64) -> bool {
        self.key
            .verify_hex(&format!("verified:{phone}:{verified_at}"), token)
    }
}

/// Payload handed to the client after a code is issued
#[derive(Clone, Debug)]
pub struct IssuedCode {
    pub code: String,
    pub issued_at: i64,
    pub signature: String,
    /// Smaller of the IP and phone send budgets, -1 when unknown
    pub remaining: i64,
}

/// Proof that a phone number was verified at `verified_at`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerificationToken {
    pub token: String,
    pub verified_at: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum VerifyError {
    #[error("verification attempts exhausted ({})", .0.policy)]
    RateLimited(RateLimitExceeded),
    #[error(transparent)]
    Rejected(#[from] OtpError),
}

/// Sequences issue and verify against the rate limiter
#[derive(Clone)]
pub struct OtpService {
    signer: OtpSigner,
    limiter: RateLimiter,
    clock: Arc<dyn Clock>,
    metrics: AppMetrics,
}

impl OtpService {
    pub fn new(
        signer: OtpSigner,
        limiter: RateLimiter,
        clock: Arc<dyn Clock>,
        metrics: AppMetrics,
    ) -> Self {
        Self {
            signer,
            limiter,
            clock,
            metrics,
        }
    }

    pub fn signer(&self) -> &OtpSigner {
        &self.signer
    }

    /// Issue a signed code once both send budgets allow it
    pub async fn send(&self, phone: &str, client_ip: &str) -> Result<IssuedCode, RateLimitExceeded> {
        let decision = self.limiter.check_send(client_ip, phone).await?;

        let code = generate_code();
        let issued_at = self.clock.now_ms();
        let signature = self.signer.sign(phone, &code, issued_at);
        self.metrics.record_otp_sent();

        Ok(IssuedCode {
            code,
            issued_at,
            signature,
            remaining: decision.remaining,
        })
    }

    /// Check a code and mint a verification token.
    ///
    /// Every attempt is counted against the phone's verify budget before the
    /// code is looked at, so an exhausted budget rejects even a correct code.
    pub async fn verify(
        &self,
        phone: &str,
        code: &str,
        signature: &str,
        issued_at: i64,
    ) -> Result<VerificationToken, VerifyError> {
        let decision = self
            .limiter
            .enforce(RateLimitPolicy::OtpVerifyByPhone, phone)
            .await
            .map_err(VerifyError::RateLimited)?;

        if !decision.is_unknown() && decision.remaining <= LOW_ATTEMPTS_THRESHOLD {
            info!(
                target: "security",
                phone = %mask_phone(phone),
                remaining = decision.remaining,
                "Low verify attempts remaining"
            );
        }

        let now = self.clock.now_ms();
        if let Err(e) = self.signer.verify(phone, code, signature, issued_at, now) {
            self.metrics.record_verification(match e {
                OtpError::Expired => "expired",
                OtpError::InvalidCode => "invalid",
            });
            return Err(e.into());
        }

        self.metrics.record_verification("verified");
        let verified_at = self.clock.now_ms();
        Ok(VerificationToken {
            token: self.signer.sign_verification(phone, verified_at),
            verified_at,
        })
    }
}
