//! Lead acceptance gated on a redeemed verification token.

use crate::{
    error::StoreError,
    models::{
        CallbackRequest, Lead, LeadAttribution, LeadEngagement, LeadRequest, LeadTier, NewLead,
    },
    services::{
        clock::Clock,
        metrics::AppMetrics,
        otp::OtpSigner,
        rate_limit::{RateLimitExceeded, RateLimitPolicy, RateLimiter},
    },
    utils::{self, UNKNOWN_CLIENT, ValidationError},
};
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tracing::info;
use uuid::Uuid;

/// Same phone and product within this window is treated as a resubmission
pub const DUPLICATE_WINDOW_MS: i64 = 60 * 60 * 1000;
/// Callback requests are de-duplicated per phone over a day
pub const CALLBACK_DUPLICATE_WINDOW_MS: i64 = 24 * 60 * 60 * 1000;
pub const USER_AGENT_MAX_CHARS: usize = 500;

/// Persistence sink for leads
#[async_trait]
pub trait LeadStore: Send + Sync {
    /// Most recent lead for `phone` created at or after `since_ms`,
    /// restricted to `product` when given
    async fn find_recent(
        &self,
        phone: &str,
        product: Option<&str>,
        since_ms: i64,
    ) -> Result<Option<Lead>, StoreError>;

    async fn create(&self, lead: NewLead, created_at: i64) -> Result<Lead, StoreError>;
}

/// Single-use record of redeemed verification tokens
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Mark `token` as used until `expires_at_ms`.
    ///
    /// Returns `false` when the token was already redeemed. Must be atomic.
    async fn redeem(
        &self,
        token: &str,
        expires_at_ms: i64,
        now_ms: i64,
    ) -> Result<bool, StoreError>;
}

/// Process-local lead store
#[derive(Default)]
pub struct MemoryLeadStore {
    leads: RwLock<Vec<Lead>>,
}

impl MemoryLeadStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn leads(&self) -> Vec<Lead> {
        self.leads.read().await.clone()
    }
}

#[async_trait]
impl LeadStore for MemoryLeadStore {
    async fn find_recent(
        &self,
        phone: &str,
        product: Option<&str>,
        since_ms: i64,
    ) -> Result<Option<Lead>, StoreError> {
        let leads = self.leads.read().await;
        Ok(leads
            .iter()
            .rev()
            .find(|lead| {
                lead.phone == phone
                    && lead.created_at >= since_ms
                    && product.is_none_or(|p| lead.product_key() == p)
            })
            .cloned())
    }

    async fn create(&self, lead: NewLead, created_at: i64) -> Result<Lead, StoreError> {
        let lead = Lead::from_new(Uuid::new_v4().to_string(), lead, created_at);
        self.leads.write().await.push(lead.clone());
        Ok(lead)
    }
}

/// Process-local token ledger
#[derive(Default)]
pub struct MemoryTokenLedger {
    redeemed: Mutex<HashMap<String, i64>>,
}

impl MemoryTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenLedger for MemoryTokenLedger {
    async fn redeem(
        &self,
        token: &str,
        expires_at_ms: i64,
        now_ms: i64,
    ) -> Result<bool, StoreError> {
        let mut redeemed = self.redeemed.lock().await;
        redeemed.retain(|_, expires_at| *expires_at > now_ms);

        if redeemed.contains_key(token) {
            return Ok(false);
        }
        redeemed.insert(token.to_string(), expires_at_ms);
        Ok(true)
    }
}

/// Network identity of the submitting client
#[derive(Clone, Debug)]
pub struct ClientInfo {
    pub ip: String,
    pub user_agent: Option<String>,
}

impl ClientInfo {
    fn stored_ip(&self) -> Option<String> {
        (self.ip != UNKNOWN_CLIENT).then(|| self.ip.clone())
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum LeadOutcome {
    Created(Lead),
    /// An equivalent lead already exists; nothing was written
    Duplicate(Lead),
}

#[derive(Clone, Debug, PartialEq)]
pub enum CallbackOutcome {
    Created(Lead),
    AlreadyRequested,
}

#[derive(Debug, Error)]
pub enum LeadError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("Phone verification required. Please verify your phone number.")]
    VerificationRequired,
    #[error("Phone verification expired. Please verify again.")]
    VerificationExpired,
    #[error("Phone verification already used. Please verify again.")]
    VerificationAlreadyUsed,
    #[error("submission budget exhausted ({})", .0.policy)]
    RateLimited(RateLimitExceeded),
    #[error(transparent)]
    Storage(#[from] StoreError),
}

impl LeadError {
    /// Short label for metrics and audit logs
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Invalid(_) => "invalid",
            Self::VerificationRequired => "verification_required",
            Self::VerificationExpired => "verification_expired",
            Self::VerificationAlreadyUsed => "verification_reused",
            Self::RateLimited(_) => "rate_limited",
            Self::Storage(_) => "storage_unavailable",
        }
    }
}

/// Per-key locks held from the duplicate check until the lead is written
#[derive(Clone, Default)]
struct SubmissionLocks {
    slots: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
}

impl SubmissionLocks {
    async fn acquire(&self, key: String) -> OwnedMutexGuard<()> {
        let slot = {
            let mut slots = self.slots.lock().await;
            // Only the map holds an idle slot
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(key).or_default())
        };
        slot.lock_owned().await
    }
}

/// Decides whether a lead is written
#[derive(Clone)]
pub struct LeadGuard {
    signer: OtpSigner,
    limiter: RateLimiter,
    leads: Arc<dyn LeadStore>,
    ledger: Arc<dyn TokenLedger>,
    clock: Arc<dyn Clock>,
    metrics: AppMetrics,
    verification_validity_ms: i64,
    submissions: SubmissionLocks,
}

impl LeadGuard {
    pub fn new(
        signer: OtpSigner,
        limiter: RateLimiter,
        leads: Arc<dyn LeadStore>,
        ledger: Arc<dyn TokenLedger>,
        clock: Arc<dyn Clock>,
        metrics: AppMetrics,
        verification_validity_ms: i64,
    ) -> Self {
        Self {
            signer,
            limiter,
            leads,
            ledger,
            clock,
            metrics,
            verification_validity_ms,
            submissions: SubmissionLocks::default(),
        }
    }

    /// Accept a verified lead.
    ///
    /// Checks run in order: fields, token, freshness, IP budget, duplicate,
    /// single-use redemption. A resubmission of the same phone and product
    /// inside [`DUPLICATE_WINDOW_MS`] returns the existing lead, including
    /// when both requests arrive at once.
    pub async fn accept(
        &self,
        request: &LeadRequest,
        client: &ClientInfo,
    ) -> Result<LeadOutcome, LeadError> {
        let result = self.try_accept(request, client).await;
        self.metrics.record_lead(match &result {
            Ok(LeadOutcome::Created(_)) => "created",
            Ok(LeadOutcome::Duplicate(_)) => "duplicate",
            Err(e) => e.reason(),
        });
        result
    }

    async fn try_accept(
        &self,
        request: &LeadRequest,
        client: &ClientInfo,
    ) -> Result<LeadOutcome, LeadError> {
        request.validate()?;

        let verified_at = request.otp_timestamp;
        if !self
            .signer
            .verify_verification_token(&request.phone, &request.otp_signature, verified_at)
        {
            return Err(LeadError::VerificationRequired);
        }
        if self.clock.now_ms() - verified_at > self.verification_validity_ms {
            return Err(LeadError::VerificationExpired);
        }

        self.limiter
            .enforce(RateLimitPolicy::LeadSubmitByIp, &client.ip)
            .await
            .map_err(LeadError::RateLimited)?;

        let _submission = self
            .submissions
            .acquire(format!("{}:{}", request.phone, request.product_key()))
            .await;

        if let Some(existing) = self.find_duplicate(request).await? {
            return Ok(LeadOutcome::Duplicate(existing));
        }

        let expires_at = verified_at + self.verification_validity_ms;
        let first_use = self
            .ledger
            .redeem(&request.otp_signature, expires_at, self.clock.now_ms())
            .await?;
        if !first_use {
            // Another instance sharing the ledger may have written the lead
            return match self.find_duplicate(request).await? {
                Some(existing) => Ok(LeadOutcome::Duplicate(existing)),
                None => Err(LeadError::VerificationAlreadyUsed),
            };
        }

        let new_lead = NewLead {
            name: request.name.trim().to_string(),
            phone: request.phone.clone(),
            pincode: request.pincode.clone(),
            loan_type: request.loan_type.clone(),
            city: request.city.clone(),
            product_slug: request.product_slug.clone(),
            verified: true,
            attribution: request.attribution(),
            engagement: request.engagement(),
            ip_address: client.stored_ip(),
            user_agent: client.user_agent.clone(),
        };
        let lead = self.leads.create(new_lead, self.clock.now_ms()).await?;

        info!(
            target: "leads",
            lead_id = %lead.id,
            phone = %utils::mask_phone(&lead.phone),
            loan_type = %lead.loan_type,
            lead_tier = ?lead.engagement.lead_tier,
            source = lead.attribution.utm_source.as_deref().unwrap_or("direct"),
            gclid = lead.attribution.gclid.is_some(),
            "Lead created"
        );

        Ok(LeadOutcome::Created(lead))
    }

    async fn find_duplicate(&self, request: &LeadRequest) -> Result<Option<Lead>, StoreError> {
        let since = self.clock.now_ms() - DUPLICATE_WINDOW_MS;
        self.leads
            .find_recent(&request.phone, Some(request.product_key()), since)
            .await
    }

    /// Record an unverified call-back request.
    ///
    /// A phone that already produced a lead in the last day is acknowledged
    /// without writing anything.
    pub async fn request_callback(
        &self,
        request: &CallbackRequest,
        client: &ClientInfo,
    ) -> Result<CallbackOutcome, LeadError> {
        utils::validate_phone(&request.phone)
            .map_err(|_| ValidationError("Please enter a valid phone number"))?;

        self.limiter
            .enforce(RateLimitPolicy::LeadSubmitByIp, &client.ip)
            .await
            .map_err(LeadError::RateLimited)?;

        let since = self.clock.now_ms() - CALLBACK_DUPLICATE_WINDOW_MS;
        if self
            .leads
            .find_recent(&request.phone, None, since)
            .await?
            .is_some()
        {
            self.metrics.record_lead("callback_duplicate");
            return Ok(CallbackOutcome::AlreadyRequested);
        }

        let new_lead = NewLead {
            name: "Callback Request".to_string(),
            phone: request.phone.clone(),
            pincode: "000000".to_string(),
            loan_type: request
                .product_slug
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| "general-enquiry".to_string()),
            city: request.city.clone(),
            product_slug: request.product_slug.clone(),
            verified: false,
            attribution: LeadAttribution {
                utm_source: Some(
                    request
                        .source
                        .clone()
                        .unwrap_or_else(|| "exit_intent".to_string()),
                ),
                ..Default::default()
            },
            engagement: LeadEngagement {
                lead_tier: Some(LeadTier::Warm),
                ..Default::default()
            },
            ip_address: client.stored_ip(),
            user_agent: client.user_agent.clone(),
        };
        let lead = self.leads.create(new_lead, self.clock.now_ms()).await?;
        self.metrics.record_lead("callback");

        info!(
            target: "leads",
            lead_id = %lead.id,
            phone = %utils::mask_phone(&lead.phone),
            source = ?lead.attribution.utm_source,
            "Callback request created"
        );

        Ok(CallbackOutcome::Created(lead))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RateLimitConfig,
        services::{clock::ManualClock, rate_limit::MemoryRateLimitStore},
    };

    const PHONE: &str = "9876543210";
    const T: i64 = 1_700_000_000_000;
    const MINUTE: i64 = 60_000;

    struct Harness {
        guard: LeadGuard,
        signer: OtpSigner,
        clock: ManualClock,
        leads: Arc<MemoryLeadStore>,
    }

    struct DownStore;

    #[async_trait]
    impl LeadStore for DownStore {
        async fn find_recent(
            &self,
            _: &str,
            _: Option<&str>,
            _: i64,
        ) -> Result<Option<Lead>, StoreError> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }

        async fn create(&self, _: NewLead, _: i64) -> Result<Lead, StoreError> {
            Err(StoreError::Unavailable("connection reset".to_string()))
        }
    }

    /// Memory store whose writes take a while to land
    struct SlowStore {
        inner: Arc<MemoryLeadStore>,
    }

    #[async_trait]
    impl LeadStore for SlowStore {
        async fn find_recent(
            &self,
            phone: &str,
            product: Option<&str>,
            since_ms: i64,
        ) -> Result<Option<Lead>, StoreError> {
            self.inner.find_recent(phone, product, since_ms).await
        }

        async fn create(&self, lead: NewLead, created_at: i64) -> Result<Lead, StoreError> {
            tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            self.inner.create(lead, created_at).await
        }
    }

    fn harness_with(leads: Arc<dyn LeadStore>, memory: Arc<MemoryLeadStore>) -> Harness {
        let clock = ManualClock::new(T);
        let shared_clock: Arc<dyn Clock> = Arc::new(clock.clone());
        let metrics = AppMetrics::new().unwrap();
        let signer = OtpSigner::new("lead-test-secret", 10 * MINUTE).unwrap();
        let limiter = RateLimiter::new(
            Arc::new(MemoryRateLimitStore::new()),
            RateLimitConfig::default(),
            Arc::clone(&shared_clock),
            metrics.clone(),
        );
        let guard = LeadGuard::new(
            signer.clone(),
            limiter,
            leads,
            Arc::new(MemoryTokenLedger::new()),
            shared_clock,
            metrics,
            30 * MINUTE,
        );
        Harness {
            guard,
            signer,
            clock,
            leads: memory,
        }
    }

    fn harness() -> Harness {
        let memory = Arc::new(MemoryLeadStore::new());
        harness_with(memory.clone(), memory)
    }

    fn client() -> ClientInfo {
        ClientInfo {
            ip: "203.0.113.7".to_string(),
            user_agent: Some("test-agent".to_string()),
        }
    }

    fn verified_request(signer: &OtpSigner, verified_at: i64) -> LeadRequest {
        LeadRequest {
            name: "Ravi Kumar".to_string(),
            phone: PHONE.to_string(),
            pincode: "110001".to_string(),
            loan_type: "home-loan".to_string(),
            otp_signature: signer.sign_verification(PHONE, verified_at),
            otp_timestamp: verified_at,
            gclid: Some("gclid-123".to_string()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_accepts_verified_lead() {
        let h = harness();
        let request = verified_request(&h.signer, T);

        let outcome = h.guard.accept(&request, &client()).await.unwrap();
        let LeadOutcome::Created(lead) = outcome else {
            panic!("expected a new lead");
        };
        assert!(lead.verified);
        assert_eq!(lead.ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(lead.attribution.gclid.as_deref(), Some("gclid-123"));
        assert_eq!(h.leads.leads().await.len(), 1);
    }

    #[tokio::test]
    async fn test_rejects_forged_token() {
        let h = harness();
        let mut request = verified_request(&h.signer, T);
        request.otp_signature = "00".repeat(32);

        let err = h.guard.accept(&request, &client()).await.unwrap_err();
        assert!(matches!(err, LeadError::VerificationRequired));

        let mut request = verified_request(&h.signer, T);
        request.otp_signature = "not hex at all".to_string();
        let err = h.guard.accept(&request, &client()).await.unwrap_err();
        assert!(matches!(err, LeadError::VerificationRequired));
    }

    #[tokio::test]
    async fn test_rejects_stale_verification() {
        let h = harness();
        let request = verified_request(&h.signer, T - 31 * MINUTE);

        let err = h.guard.accept(&request, &client()).await.unwrap_err();
        assert!(matches!(err, LeadError::VerificationExpired));
        assert_eq!(
            err.to_string(),
            "Phone verification expired. Please verify again."
        );
    }

    #[tokio::test]
    async fn test_resubmission_returns_existing_lead() {
        let h = harness();
        let request = verified_request(&h.signer, T);

        let LeadOutcome::Created(first) = h.guard.accept(&request, &client()).await.unwrap() else {
            panic!("expected a new lead");
        };
        h.clock.advance_minutes(1);
        let second = h.guard.accept(&request, &client()).await.unwrap();
        assert_eq!(second, LeadOutcome::Duplicate(first));
        assert_eq!(h.leads.leads().await.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_double_submit_returns_existing_lead() {
        let memory = Arc::new(MemoryLeadStore::new());
        let slow = Arc::new(SlowStore {
            inner: memory.clone(),
        });
        let h = harness_with(slow, memory);
        let request = verified_request(&h.signer, T);
        let client = client();

        let (first, second) = tokio::join!(
            h.guard.accept(&request, &client),
            h.guard.accept(&request, &client)
        );

        let mut outcomes = [first.unwrap(), second.unwrap()];
        outcomes.sort_by_key(|o| matches!(o, LeadOutcome::Duplicate(_)));
        let [LeadOutcome::Created(created), LeadOutcome::Duplicate(existing)] = outcomes else {
            panic!("expected one new lead and one duplicate");
        };
        assert_eq!(created.id, existing.id);
        assert_eq!(h.leads.leads().await.len(), 1);
    }

    #[tokio::test]
    async fn test_token_cannot_be_replayed_for_another_product() {
        let h = harness();
        let request = verified_request(&h.signer, T);
        h.guard.accept(&request, &client()).await.unwrap();

        let mut replay = request.clone();
        replay.loan_type = "car-loan".to_string();
        let err = h.guard.accept(&replay, &client()).await.unwrap_err();
        assert!(matches!(err, LeadError::VerificationAlreadyUsed));
        assert_eq!(h.leads.leads().await.len(), 1);
    }

    #[tokio::test]
    async fn test_submission_budget_per_ip() {
        let h = harness();
        for i in 0..5 {
            let mut request = verified_request(&h.signer, T + i);
            request.loan_type = format!("loan-{i}");
            h.guard.accept(&request, &client()).await.unwrap();
        }

        let request = verified_request(&h.signer, T + 10);
        let err = h.guard.accept(&request, &client()).await.unwrap_err();
        assert!(matches!(err, LeadError::RateLimited(e) if e.policy == RateLimitPolicy::LeadSubmitByIp));
    }

    #[tokio::test]
    async fn test_storage_failure_surfaces() {
        let memory = Arc::new(MemoryLeadStore::new());
        let h = harness_with(Arc::new(DownStore), memory);
        let request = verified_request(&h.signer, T);

        let err = h.guard.accept(&request, &client()).await.unwrap_err();
        assert!(matches!(err, LeadError::Storage(_)));
    }

    #[tokio::test]
    async fn test_callback_is_deduplicated_for_a_day() {
        let h = harness();
        let request = CallbackRequest {
            phone: PHONE.to_string(),
            product_slug: None,
            city: Some("delhi".to_string()),
            source: None,
        };
        let unknown = ClientInfo {
            ip: UNKNOWN_CLIENT.to_string(),
            user_agent: None,
        };

        let CallbackOutcome::Created(lead) =
            h.guard.request_callback(&request, &unknown).await.unwrap()
        else {
            panic!("expected a callback lead");
        };
        assert!(!lead.verified);
        assert_eq!(lead.loan_type, "general-enquiry");
        assert_eq!(lead.attribution.utm_source.as_deref(), Some("exit_intent"));
        assert_eq!(lead.engagement.lead_tier, Some(LeadTier::Warm));
        assert_eq!(lead.ip_address, None);

        h.clock.advance_minutes(60 * 23);
        assert_eq!(
            h.guard.request_callback(&request, &unknown).await.unwrap(),
            CallbackOutcome::AlreadyRequested
        );

        h.clock.advance_minutes(61);
        assert!(matches!(
            h.guard.request_callback(&request, &unknown).await.unwrap(),
            CallbackOutcome::Created(_)
        ));
    }

    #[tokio::test]
    async fn test_ledger_is_single_use_until_expiry() {
        let ledger = MemoryTokenLedger::new();
        assert!(ledger.redeem("tok", T + MINUTE, T).await.unwrap());
        assert!(!ledger.redeem("tok", T + MINUTE, T + 1).await.unwrap());
        // Expired entries are pruned; the token itself is stale by then
        assert!(ledger.redeem("tok", T + 3 * MINUTE, T + 2 * MINUTE).await.unwrap());
    }
}
