//! Visual encodings of a credential.
//!
//! Rendering is a pure function of `(code, signature)`: the same pair always produces
//! the same bytes, so a lost screen can be re-rendered from the stored credential.

use fulfillment_core::types::{CredentialCode, Signature};
use serde::{Deserialize, Serialize};

/// Separator between code and signature in the compact payload.
pub const PAYLOAD_SEPARATOR: char = '.';

/// Bytes ready to hand to a display or print collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedCode {
    /// Media type of `payload`
    pub media_type: String,
    /// Encoded bytes
    pub payload: Vec<u8>,
}

/// Turns a credential into something scannable.
pub trait CodeRenderer: Send + Sync {
    /// Render `(code, signature)`.
    fn render(&self, code: &CredentialCode, signature: &Signature) -> RenderedCode;
}

/// Default renderer: `"<code>.<signature>"` as UTF-8 text, the string a QR or barcode
/// printer encodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompactPayloadRenderer;

impl CompactPayloadRenderer {
    /// Media type of the compact payload.
    pub const MEDIA_TYPE: &'static str = "text/plain; charset=utf-8";

    /// The payload string for `(code, signature)`.
    #[must_use]
    pub fn payload(code: &CredentialCode, signature: &Signature) -> String {
        format!("{code}{PAYLOAD_SEPARATOR}{signature}")
    }

    /// Split a scanned payload back into `(code, signature)`.
    ///
    /// Returns `None` unless the payload is exactly two non-empty parts.
    #[must_use]
    pub fn parse(scanned: &str) -> Option<(CredentialCode, Signature)> {
        let (code, signature) = scanned.trim().split_once(PAYLOAD_SEPARATOR)?;
        if code.is_empty() || signature.is_empty() || signature.contains(PAYLOAD_SEPARATOR) {
            return None;
        }
        Some((CredentialCode::new(code), Signature::new(signature)))
    }
}

impl CodeRenderer for CompactPayloadRenderer {
    fn render(&self, code: &CredentialCode, signature: &Signature) -> RenderedCode {
        RenderedCode {
            media_type: Self::MEDIA_TYPE.to_string(),
            payload: Self::payload(code, signature).into_bytes(),
        }
    }
}
