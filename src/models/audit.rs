//! Structured audit events for the verification funnel.

use crate::utils::mask_phone;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Audited steps of the verification funnel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationEventType {
    OtpSent,
    OtpVerified,
    OtpRejected,
    LeadAccepted,
    LeadDuplicate,
    LeadRejected,
    CallbackRequested,
    RateLimitExceeded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationOutcome {
    Success,
    Failure,
}

/// One audit log entry.
///
/// Phone numbers are masked on construction and never logged in full.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationAuditEvent {
    pub event_type: VerificationEventType,
    pub outcome: VerificationOutcome,
    pub timestamp: DateTime<Utc>,
    pub ip_address: String,
    pub phone: Option<String>,
    pub endpoint: String,
    pub request_id: Option<String>,
    pub lead_id: Option<String>,
    pub reason: Option<String>,
}

impl VerificationAuditEvent {
    pub fn new(
        event_type: VerificationEventType,
        outcome: VerificationOutcome,
        ip_address: impl Into<String>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            event_type,
            outcome,
            timestamp: Utc::now(),
            ip_address: ip_address.into(),
            phone: None,
            endpoint: endpoint.into(),
            request_id: None,
            lead_id: None,
            reason: None,
        }
    }

    pub fn with_phone(mut self, phone: &str) -> Self {
        self.phone = Some(mask_phone(phone));
        self
    }

    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    pub fn with_lead_id(mut self, lead_id: impl Into<String>) -> Self {
        self.lead_id = Some(lead_id.into());
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    pub fn log(&self) {
        match self.outcome {
            VerificationOutcome::Success => info!(
                target: "verification_audit",
                event_type = ?self.event_type,
                outcome = ?self.outcome,
                timestamp = %self.timestamp,
                ip_address = %self.ip_address,
                phone = ?self.phone,
                endpoint = %self.endpoint,
                request_id = ?self.request_id,
                lead_id = ?self.lead_id,
                "Verification audit event"
            ),
            VerificationOutcome::Failure => warn!(
                target: "verification_audit",
                event_type = ?self.event_type,
                outcome = ?self.outcome,
                timestamp = %self.timestamp,
                ip_address = %self.ip_address,
                phone = ?self.phone,
                endpoint = %self.endpoint,
                request_id = ?self.request_id,
                lead_id = ?self.lead_id,
                reason = ?self.reason,
                "Verification audit event"
            ),
        }
    }
}
