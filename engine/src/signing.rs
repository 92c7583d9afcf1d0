//! Credential code generation and HMAC signing.
//!
//! Codes are 128 random bits from the OS CSPRNG; signatures are HMAC-SHA256 over the
//! encoded code. Both are URL-safe base64 without padding, so neither ever contains
//! the `.` separator used by the compact scan payload.

use crate::config::{ConfigError, SigningKey};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use fulfillment_core::types::{CredentialCode, Signature};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Random bytes per credential code.
pub const CODE_BYTES: usize = 16;

/// Generate a fresh, unguessable credential code.
#[must_use]
pub fn generate_code() -> CredentialCode {
    let mut bytes = [0u8; CODE_BYTES];
    OsRng.fill_bytes(&mut bytes);
    CredentialCode::new(URL_SAFE_NO_PAD.encode(bytes))
}

/// Signs and verifies credential codes with the process-wide key.
#[derive(Clone)]
pub struct CredentialSigner {
    mac: HmacSha256,
}

impl CredentialSigner {
    /// Key a signer.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] if the MAC rejects the key.
    pub fn new(key: &SigningKey) -> Result<Self, ConfigError> {
        let mac = HmacSha256::new_from_slice(key.as_bytes()).map_err(|e| {
            ConfigError::InvalidValue {
                key: "signing_key",
                reason: e.to_string(),
            }
        })?;
        Ok(Self { mac })
    }

    /// `MAC(secret, code)`
    #[must_use]
    pub fn sign(&self, code: &CredentialCode) -> Signature {
        let mut mac = self.mac.clone();
        mac.update(code.as_str().as_bytes());
        Signature::new(URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes()))
    }

    /// Re-derive the MAC for `code` and compare it to `signature` in constant time.
    #[must_use]
    pub fn verify(&self, code: &CredentialCode, signature: &Signature) -> bool {
        let Ok(presented) = URL_SAFE_NO_PAD.decode(signature.as_str()) else {
            return false;
        };
        let mut mac = self.mac.clone();
        mac.update(code.as_str().as_bytes());
        mac.verify_slice(&presented).is_ok()
    }
}

impl std::fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("CredentialSigner(<keyed>)")
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn signer(secret: &str) -> CredentialSigner {
        CredentialSigner::new(&SigningKey::new(secret).unwrap()).unwrap()
    }

    #[test]
    fn codes_are_compact_and_distinct() {
        let codes: HashSet<_> = (0..1_000).map(|_| generate_code()).collect();
        assert_eq!(codes.len(), 1_000);
        for code in &codes {
            // 16 bytes -> 22 base64 chars without padding
            assert_eq!(code.as_str().len(), 22);
            assert!(!code.as_str().contains('.'));
        }
    }

    #[test]
    fn signature_is_deterministic_per_key() {
        let code = CredentialCode::new("AAAAAAAAAAAAAAAAAAAAAA");
        assert_eq!(signer("k1").sign(&code), signer("k1").sign(&code));
        assert_ne!(signer("k1").sign(&code), signer("k2").sign(&code));
    }

    #[test]
    fn verify_accepts_own_signature_only() {
        let signer = signer("venue-secret");
        let code = generate_code();
        let signature = signer.sign(&code);

        assert!(signer.verify(&code, &signature));
        assert!(!signer.verify(&generate_code(), &signature));
        assert!(!signer.verify(&code, &Signature::new("not base64 !!")));
        assert!(!self::signer("rotated").verify(&code, &signature));
    }
}
