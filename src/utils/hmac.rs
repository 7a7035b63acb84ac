//! HMAC-SHA256 signing and constant-time verification.

use hmac::{Hmac, Mac, digest::InvalidLength};
use sha2::Sha256;
use std::fmt;

type HmacSha256 = Hmac<Sha256>;

/// An HMAC-SHA256 key, keyed once and cloned per message
#[derive(Clone)]
pub struct HmacKey {
    mac: HmacSha256,
}

impl fmt::Debug for HmacKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("HmacKey([REDACTED])")
    }
}

impl HmacKey {
    pub fn new(secret: &[u8]) -> Result<Self, InvalidLength> {
        Ok(Self {
            mac: HmacSha256::new_from_slice(secret)?,
        })
    }

    /// Hex-encoded HMAC-SHA256 of `message`
    pub fn sign_hex(&self, message: &str) -> String {
        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Check a hex signature against `message`.
    ///
    /// The comparison runs in constant time. Malformed hex or a signature of
    /// the wrong length is reported as a mismatch.
    pub fn verify_hex(&self, message: &str, signature: &str) -> bool {
        let Ok(signature_bytes) = hex::decode(signature) else {
            return false;
        };

        let mut mac = self.mac.clone();
        mac.update(message.as_bytes());
        mac.verify_slice(&signature_bytes).is_ok()
    }
}
