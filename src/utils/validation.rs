//! Input validation for phone numbers, codes and lead fields.
//!
//! Messages are user-facing and returned verbatim in 400 responses.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

static PHONE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[6-9][0-9]{9}$").unwrap());
static OTP_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[0-9]{6}$").unwrap());
static PINCODE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[1-9][0-9]{5}$").unwrap());
static NAME_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-zA-Z\s.'-]+$").unwrap());
static MARKUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<script|javascript:|on\w+=").unwrap());

/// A rejected input field
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub &'static str);

type Result<T = ()> = std::result::Result<T, ValidationError>;

/// Indian mobile number: ten digits starting with 6-9
pub fn validate_phone(phone: &str) -> Result {
    if phone.chars().count() != 10 {
        return Err(ValidationError("Phone number must be exactly 10 digits"));
    }
    if !PHONE_RE.is_match(phone) {
        return Err(ValidationError("Please enter a valid Indian mobile number"));
    }
    Ok(())
}

pub fn validate_otp(otp: &str) -> Result {
    if otp.chars().count() != 6 {
        return Err(ValidationError("OTP must be exactly 6 digits"));
    }
    if !OTP_RE.is_match(otp) {
        return Err(ValidationError("OTP must contain only numbers"));
    }
    Ok(())
}

pub fn validate_pincode(pincode: &str) -> Result {
    if pincode.chars().count() != 6 {
        return Err(ValidationError("Pincode must be exactly 6 digits"));
    }
    if !PINCODE_RE.is_match(pincode) {
        return Err(ValidationError("Please enter a valid Indian pincode"));
    }
    Ok(())
}

pub fn validate_name(name: &str) -> Result {
    let len = name.chars().count();
    if len < 2 {
        return Err(ValidationError("Name must be at least 2 characters"));
    }
    if len > 100 {
        return Err(ValidationError("Name must be less than 100 characters"));
    }
    if !NAME_RE.is_match(name) {
        return Err(ValidationError(
            "Name can only contain letters, spaces, dots, hyphens",
        ));
    }
    if contains_markup(name) {
        return Err(ValidationError("Invalid characters in name"));
    }
    Ok(())
}

/// Script tags, `javascript:` URLs and inline event handlers
pub fn contains_markup(value: &str) -> bool {
    MARKUP_RE.is_match(value)
}

pub fn require_non_empty(value: &str, message: &'static str) -> Result {
    if value.trim().is_empty() {
        return Err(ValidationError(message));
    }
    Ok(())
}

pub fn require_positive(value: i64, message: &'static str) -> Result {
    if value <= 0 {
        return Err(ValidationError(message));
    }
    Ok(())
}

pub fn require_range(value: f64, min: f64, max: f64, message: &'static str) -> Result {
    if !(min..=max).contains(&value) {
        return Err(ValidationError(message));
    }
    Ok(())
}

/// Mask a phone number for logs, e.g. `98****3210`
///
/// Anything that is not ten ASCII digits is replaced entirely.
pub fn mask_phone(phone: &str) -> String {
    if phone.len() != 10 || !phone.bytes().all(|b| b.is_ascii_digit()) {
        return "**********".to_string();
    }
    format!("{}****{}", &phone[..2], &phone[6..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phone_rules() {
        assert!(validate_phone("9876543210").is_ok());
        assert!(validate_phone("6000000000").is_ok());
        assert_eq!(
            validate_phone("987654321"),
            Err(ValidationError("Phone number must be exactly 10 digits"))
        );
        assert_eq!(
            validate_phone("5876543210"),
            Err(ValidationError("Please enter a valid Indian mobile number"))
        );
        assert!(validate_phone("98765a3210").is_err());
    }

    #[test]
    fn test_phone_rejects_non_ascii_digits() {
        // Devanagari and Arabic-Indic digits
        for phone in ["9१२३४५६७८९", "٩٨٧٦٥٤٣٢١٠", "98765४3210"] {
            assert_eq!(
                validate_phone(phone),
                Err(ValidationError("Please enter a valid Indian mobile number")),
                "{phone} should be rejected"
            );
        }
    }

    #[test]
    fn test_otp_rules() {
        assert!(validate_otp("123456").is_ok());
        assert!(validate_otp("000000").is_ok());
        assert_eq!(
            validate_otp("12345"),
            Err(ValidationError("OTP must be exactly 6 digits"))
        );
        assert_eq!(
            validate_otp("12a456"),
            Err(ValidationError("OTP must contain only numbers"))
        );
        assert_eq!(
            validate_otp("१२३४५६"),
            Err(ValidationError("OTP must contain only numbers"))
        );
    }

    #[test]
    fn test_pincode_rules() {
        assert!(validate_pincode("110001").is_ok());
        assert!(validate_pincode("010001").is_err());
        assert!(validate_pincode("11001").is_err());
    }

    #[test]
    fn test_name_rules() {
        assert!(validate_name("Ravi Kumar").is_ok());
        assert!(validate_name("D'Souza-Menon Jr.").is_ok());
        assert!(validate_name("R").is_err());
        assert!(validate_name(&"a".repeat(101)).is_err());
        assert!(validate_name("<script>alert(1)</script>").is_err());
        assert!(validate_name("Ravi123").is_err());
    }

    #[test]
    fn test_markup_detection() {
        assert!(contains_markup("<SCRIPT src=x>"));
        assert!(contains_markup("javascript:alert(1)"));
        assert!(contains_markup("img onerror=alert(1)"));
        assert!(!contains_markup("Ravi Kumar"));
    }

    #[test]
    fn test_mask_phone() {
        assert_eq!(mask_phone("9876543210"), "98****3210");
        assert_eq!(mask_phone("12345"), "**********");
        assert_eq!(mask_phone("9१२३४५६७८९"), "**********");
    }
}
