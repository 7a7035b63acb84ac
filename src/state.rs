//! Shared application state built once per process.

use crate::{
    config::{AppConfig, ConfigError, DEVELOPMENT_SIGNING_SECRET, RateLimitBackend},
    error::StartupError,
    services::{
        AppMetrics, Clock, LeadGuard, LeadStore, MemoryLeadStore, MemoryRateLimitStore,
        MemoryTokenLedger, OtpService, OtpSigner, RateLimitStore, RateLimiter,
        RestRateLimitStore, SystemClock, TokenLedger,
    },
};
use std::sync::Arc;
use tracing::info;

/// Backing stores used by the rate limiter and lead guard
#[derive(Clone)]
pub struct Stores {
    pub counters: Arc<dyn RateLimitStore>,
    pub ledger: Arc<dyn TokenLedger>,
    pub leads: Arc<dyn LeadStore>,
}

impl Stores {
    /// Process-local stores
    pub fn memory() -> Self {
        Self {
            counters: Arc::new(MemoryRateLimitStore::new()),
            ledger: Arc::new(MemoryTokenLedger::new()),
            leads: Arc::new(MemoryLeadStore::new()),
        }
    }

    /// Counters and ledger share the REST store when one is configured
    pub fn from_backend(backend: &RateLimitBackend) -> Result<Self, StartupError> {
        match backend {
            RateLimitBackend::Memory => Ok(Self::memory()),
            RateLimitBackend::Rest {
                url,
                token,
                timeout_ms,
            } => {
                let store = Arc::new(RestRateLimitStore::new(
                    url.clone(),
                    token.clone(),
                    *timeout_ms,
                )?);
                Ok(Self {
                    counters: store.clone(),
                    ledger: store,
                    leads: Arc::new(MemoryLeadStore::new()),
                })
            }
        }
    }
}

/// Everything handlers need, shared by all workers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub otp: OtpService,
    pub leads: LeadGuard,
    pub limiter: RateLimiter,
    pub metrics: AppMetrics,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        config: AppConfig,
        clock: Arc<dyn Clock>,
        stores: Stores,
    ) -> Result<Self, StartupError> {
        if config.environment.is_production()
            && config.otp.signing_secret == DEVELOPMENT_SIGNING_SECRET
        {
            return Err(ConfigError::DevelopmentSecretInProduction.into());
        }

        let metrics = AppMetrics::new()?;
        let signer = OtpSigner::from_config(&config.otp)?;
        let limiter = RateLimiter::new(
            stores.counters,
            config.rate_limit.clone(),
            Arc::clone(&clock),
            metrics.clone(),
        );
        let otp = OtpService::new(
            signer.clone(),
            limiter.clone(),
            Arc::clone(&clock),
            metrics.clone(),
        );
        let leads = LeadGuard::new(
            signer,
            limiter.clone(),
            stores.leads,
            stores.ledger,
            Arc::clone(&clock),
            metrics.clone(),
            config.otp.verification_validity_ms(),
        );

        info!(
            environment = config.environment.as_str(),
            rate_limit_store = limiter.backend_name(),
            "Application state initialized"
        );

        Ok(Self {
            config: Arc::new(config),
            otp,
            leads,
            limiter,
            metrics,
            clock,
        })
    }

    /// Wall clock time and the stores selected by the configuration
    pub fn from_config(config: AppConfig) -> Result<Self, StartupError> {
        let stores = Stores::from_backend(&config.rate_limit.backend)?;
        Self::new(config, Arc::new(SystemClock), stores)
    }

    /// Whether the raw code is returned by the send endpoint
    pub fn echo_codes(&self) -> bool {
        self.config.environment.is_development()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppEnvironment;

    #[test]
    fn test_production_rejects_development_secret() {
        let config = AppConfig {
            environment: AppEnvironment::Production,
            ..Default::default()
        };
        let err = AppState::new(config, Arc::new(SystemClock), Stores::memory())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            StartupError::Config(ConfigError::DevelopmentSecretInProduction)
        ));
    }

    #[test]
    fn test_development_echoes_codes() {
        let state = AppState::from_config(AppConfig::default()).unwrap();
        assert!(state.echo_codes());
        assert_eq!(state.limiter.backend_name(), "memory");

        let mut config = AppConfig::default();
        config.environment = AppEnvironment::Production;
        config.otp.signing_secret = "a-real-production-secret".to_string();
        let state = AppState::from_config(config).unwrap();
        assert!(!state.echo_codes());
    }

    #[test]
    fn test_only_development_echoes_codes() {
        let config = AppConfig {
            environment: AppEnvironment::Test,
            ..Default::default()
        };
        let state = AppState::new(config, Arc::new(SystemClock), Stores::memory()).unwrap();
        assert!(!state.echo_codes());
    }
}
