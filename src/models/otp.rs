//! Request and response bodies of the OTP endpoints.

use crate::utils::{self, ValidationError};
use paperclip::actix::Apiv2Schema;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Serialize, Deserialize, Apiv2Schema)]
pub struct SendOtpRequest {
    /// Ten digit Indian mobile number
    pub phone: String,
}

impl SendOtpRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        utils::validate_phone(&self.phone)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub success: bool,
    pub message: String,
    /// Issue time in epoch milliseconds; echo it back on verify
    pub timestamp: i64,
    /// HMAC binding phone, code and timestamp; echo it back on verify
    pub signature: String,
    /// Sends left in the tighter of the IP and phone budgets, -1 if unknown
    pub remaining: i64,
    /// The raw code, only outside production
    #[serde(skip_serializing_if = "Option::is_none")]
    pub otp: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, Apiv2Schema)]
pub struct VerifyOtpRequest {
    pub phone: String,
    pub otp: String,
    pub signature: String,
    pub timestamp: i64,
}

impl VerifyOtpRequest {
    pub fn validate(&self) -> Result<(), ValidationError> {
        utils::validate_phone(&self.phone)?;
        utils::validate_otp(&self.otp)?;
        utils::require_non_empty(&self.signature, "Signature is required")?;
        utils::require_positive(self.timestamp, "Invalid timestamp")
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Apiv2Schema)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOtpResponse {
    pub success: bool,
    pub message: String,
    pub verification_token: String,
    /// Verification time in epoch milliseconds; submit it as `otpTimestamp`
    pub timestamp: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn verify_request() -> VerifyOtpRequest {
        VerifyOtpRequest {
            phone: "9876543210".to_string(),
            otp: "123456".to_string(),
            signature: "ab".repeat(32),
            timestamp: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_verify_request_rules() {
        assert!(verify_request().validate().is_ok());

        let mut req = verify_request();
        req.otp = "12a456".to_string();
        assert_eq!(
            req.validate(),
            Err(ValidationError("OTP must contain only numbers"))
        );

        let mut req = verify_request();
        req.signature = String::new();
        assert_eq!(req.validate(), Err(ValidationError("Signature is required")));

        let mut req = verify_request();
        req.timestamp = 0;
        assert_eq!(req.validate(), Err(ValidationError("Invalid timestamp")));
    }

    #[test]
    fn test_code_is_omitted_when_absent() {
        let response = SendOtpResponse {
            success: true,
            message: "OTP sent successfully".to_string(),
            timestamp: 1,
            signature: "sig".to_string(),
            remaining: 2,
            otp: None,
        };
        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("otp").is_none());
        assert_eq!(json["remaining"], 2);
    }
}
