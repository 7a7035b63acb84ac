//! Lead submission bodies and the stored lead record.

use crate::utils::{self, ValidationError};
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

/// Sales priority assigned by the client-side lead scorer
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "lowercase")]
pub enum LeadTier {
    Hot,
    Warm,
    Cold,
}

/// Body of `POST /api/leads`
#[derive(Clone, Debug, Default, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct LeadRequest {
    pub name: String,
    pub phone: String,
    pub pincode: String,
    pub loan_type: String,
    pub city: Option<String>,
    pub product_slug: Option<String>,
    /// Verification token from `/api/otp/verify`
    pub otp_signature: String,
    /// Verification time from `/api/otp/verify`
    pub otp_timestamp: i64,

    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub gclid: Option<String>,
    pub fbclid: Option<String>,
    pub referrer: Option<String>,
    pub landing_page: Option<String>,
    pub session_id: Option<String>,

    pub lead_score: Option<f64>,
    pub lead_tier: Option<LeadTier>,
    pub time_on_page: Option<f64>,
    pub scroll_depth: Option<f64>,
    pub emi_calculator_used: Option<bool>,
}

impl LeadRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        utils::validate_name(&self.name)?;
        utils::validate_phone(&self.phone)?;
        utils::validate_pincode(&self.pincode)?;
        utils::require_non_empty(&self.loan_type, "Please select a loan type")?;
        utils::require_non_empty(&self.otp_signature, "Phone verification required")?;
        utils::require_positive(self.otp_timestamp, "Invalid verification timestamp")?;

        if let Some(score) = self.lead_score {
            utils::require_range(score, 0.0, 100.0, "Lead score must be between 0 and 100")?;
        }
        if let Some(depth) = self.scroll_depth {
            utils::require_range(depth, 0.0, 100.0, "Scroll depth must be between 0 and 100")?;
        }
        if let Some(seconds) = self.time_on_page {
            utils::require_range(seconds, 0.0, f64::MAX, "Time on page cannot be negative")?;
        }
        Ok(())
    }

    /// Product used for duplicate detection
    pub fn product_key(&self) -> &str {
        self.product_slug
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.loan_type)
    }

    pub fn attribution(&self) -> LeadAttribution {
        LeadAttribution {
            utm_source: self.utm_source.clone(),
            utm_medium: self.utm_medium.clone(),
            utm_campaign: self.utm_campaign.clone(),
            utm_term: self.utm_term.clone(),
            utm_content: self.utm_content.clone(),
            gclid: self.gclid.clone(),
            fbclid: self.fbclid.clone(),
            referrer: self.referrer.clone(),
            landing_page: self.landing_page.clone(),
            session_id: self.session_id.clone(),
        }
    }

    pub fn engagement(&self) -> LeadEngagement {
        LeadEngagement {
            lead_score: self.lead_score,
            lead_tier: self.lead_tier,
            time_on_page: self.time_on_page,
            scroll_depth: self.scroll_depth,
            emi_calculator_used: self.emi_calculator_used,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct LeadResponse {
    pub success: bool,
    pub message: String,
    pub lead_id: String,
    pub reference_number: String,
}

/// Body of `POST /api/callback`
#[derive(Clone, Debug, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct CallbackRequest {
    pub phone: String,
    pub product_slug: Option<String>,
    pub city: Option<String>,
    /// Which widget asked for the call, e.g. `exit_intent`
    pub source: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Apiv2Schema)]
pub struct CallbackResponse {
    pub success: bool,
    pub message: String,
}

/// Marketing attribution captured with a lead (first touch)
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadAttribution {
    pub utm_source: Option<String>,
    pub utm_medium: Option<String>,
    pub utm_campaign: Option<String>,
    pub utm_term: Option<String>,
    pub utm_content: Option<String>,
    pub gclid: Option<String>,
    pub fbclid: Option<String>,
    pub referrer: Option<String>,
    pub landing_page: Option<String>,
    pub session_id: Option<String>,
}

/// On-page behaviour reported by the form
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeadEngagement {
    pub lead_score: Option<f64>,
    pub lead_tier: Option<LeadTier>,
    pub time_on_page: Option<f64>,
    pub scroll_depth: Option<f64>,
    pub emi_calculator_used: Option<bool>,
}

/// A lead ready to be written
#[derive(Clone, Debug, PartialEq)]
pub struct NewLead {
    pub name: String,
    pub phone: String,
    pub pincode: String,
    pub loan_type: String,
    pub city: Option<String>,
    pub product_slug: Option<String>,
    pub verified: bool,
    pub attribution: LeadAttribution,
    pub engagement: LeadEngagement,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl NewLead {
    /// Product used for duplicate detection
    pub fn product_key(&self) -> &str {
        self.product_slug
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.loan_type)
    }
}

/// A stored lead
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Lead {
    pub id: String,
    pub name: String,
    pub phone: String,
    pub pincode: String,
    pub loan_type: String,
    pub city: Option<String>,
    pub product_slug: Option<String>,
    pub verified: bool,
    pub attribution: LeadAttribution,
    pub engagement: LeadEngagement,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: i64,
}

impl Lead {
    pub fn from_new(id: String, lead: NewLead, created_at: i64) -> Self {
        Self {
            id,
            name: lead.name,
            phone: lead.phone,
            pincode: lead.pincode,
            loan_type: lead.loan_type,
            city: lead.city,
            product_slug: lead.product_slug,
            verified: lead.verified,
            attribution: lead.attribution,
            engagement: lead.engagement,
            ip_address: lead.ip_address,
            user_agent: lead.user_agent,
            created_at,
        }
    }

    pub fn product_key(&self) -> &str {
        self.product_slug
            .as_deref()
            .filter(|s| !s.is_empty())
            .unwrap_or(&self.loan_type)
    }

    /// Customer-facing reference: `CRED` plus the id's last eight characters
    pub fn reference_number(&self) -> String {
        let tail: String = {
            let chars: Vec<char> = self.id.chars().collect();
            chars[chars.len().saturating_sub(8)..].iter().collect()
        };
        format!("CRED{}", tail.to_uppercase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> LeadRequest {
        LeadRequest {
            name: "Ravi Kumar".to_string(),
            phone: "9876543210".to_string(),
            pincode: "110001".to_string(),
            loan_type: "home-loan".to_string(),
            otp_signature: "ab".repeat(32),
            otp_timestamp: 1_700_000_000_000,
            ..Default::default()
        }
    }

    #[test]
    fn test_valid_request() {
        assert!(request().validate().is_ok());
    }

    #[test]
    fn test_field_rules() {
        let mut req = request();
        req.pincode = "000001".to_string();
        assert!(req.validate().is_err());

        let mut req = request();
        req.otp_signature = String::new();
        assert_eq!(
            req.validate(),
            Err(ValidationError("Phone verification required"))
        );

        let mut req = request();
        req.lead_score = Some(101.0);
        assert!(req.validate().is_err());

        let mut req = request();
        req.time_on_page = Some(-1.0);
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_product_key_prefers_slug() {
        let mut req = request();
        assert_eq!(req.product_key(), "home-loan");
        req.product_slug = Some("e-rickshaw-loan".to_string());
        assert_eq!(req.product_key(), "e-rickshaw-loan");
        req.product_slug = Some(String::new());
        assert_eq!(req.product_key(), "home-loan");
    }

    #[test]
    fn test_optional_fields_deserialize_to_defaults() {
        let json = r#"{
            "name": "Ravi Kumar", "phone": "9876543210", "pincode": "110001",
            "loanType": "home-loan", "otpSignature": "abcd", "otpTimestamp": 1700000000000,
            "utmSource": "google", "leadTier": "hot"
        }"#;
        let req: LeadRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.attribution().utm_source.as_deref(), Some("google"));
        assert_eq!(req.attribution().gclid, None);
        assert_eq!(req.engagement().lead_tier, Some(LeadTier::Hot));
        assert_eq!(req.engagement().scroll_depth, None);
    }

    #[test]
    fn test_reference_number() {
        let lead = Lead::from_new(
            "3f2a9c1e-0b7d-4e5f-9a8b-1c2d3e4f5a6b".to_string(),
            NewLead {
                name: "Ravi Kumar".to_string(),
                phone: "9876543210".to_string(),
                pincode: "110001".to_string(),
                loan_type: "home-loan".to_string(),
                city: None,
                product_slug: None,
                verified: true,
                attribution: LeadAttribution::default(),
                engagement: LeadEngagement::default(),
                ip_address: None,
                user_agent: None,
            },
            0,
        );
        assert_eq!(lead.reference_number(), "CRED3E4F5A6B");
    }
}
