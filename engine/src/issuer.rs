//! Credential issuance.

use crate::metrics::CredentialMetrics;
use crate::render::{CodeRenderer, RenderedCode};
use crate::signing::{CredentialSigner, generate_code};
use chrono::Duration;
use fulfillment_core::environment::Clock;
use fulfillment_core::error::{FulfillmentError, Result};
use fulfillment_core::store::StoreTransaction;
use fulfillment_core::types::{
    Credential, CredentialId, CredentialKind, CredentialState, ReferenceId,
};
use std::sync::Arc;

/// Mints signed credentials inside a caller's transaction.
#[derive(Clone)]
pub struct CredentialIssuer {
    signer: CredentialSigner,
    renderer: Arc<dyn CodeRenderer>,
    default_ttl: Option<Duration>,
    clock: Arc<dyn Clock>,
}

impl CredentialIssuer {
    /// Create an issuer.
    #[must_use]
    pub fn new(
        signer: CredentialSigner,
        renderer: Arc<dyn CodeRenderer>,
        default_ttl: Option<Duration>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            signer,
            renderer,
            default_ttl,
            clock,
        }
    }

    /// Issue and persist a credential for `reference` through `tx`.
    ///
    /// The credential is written as `active`, expiring at `now + ttl` where `ttl` is the
    /// override if given, else the configured default, else never.
    ///
    /// # Errors
    ///
    /// - [`FulfillmentError::InvalidReference`] if `reference` is nil
    /// - [`FulfillmentError::InvalidQuantity`] if the TTL pushes expiry out of range
    /// - [`FulfillmentError::Store`] if persisting fails
    pub async fn issue<T: StoreTransaction>(
        &self,
        tx: &mut T,
        kind: CredentialKind,
        reference: ReferenceId,
        ttl: Option<Duration>,
    ) -> Result<Credential> {
        if reference.is_nil() {
            return Err(FulfillmentError::InvalidReference);
        }

        let now = self.clock.now();
        let expires_at = match ttl.or(self.default_ttl) {
            Some(ttl) => Some(now.checked_add_signed(ttl).ok_or_else(|| {
                FulfillmentError::InvalidQuantity(format!("credential ttl {ttl} out of range"))
            })?),
            None => None,
        };

        let code = generate_code();
        let signature = self.signer.sign(&code);
        let credential = Credential {
            id: CredentialId::new(),
            kind,
            reference_id: reference,
            code,
            signature,
            state: CredentialState::Active,
            issued_at: now,
            expires_at,
            redeemed_at: None,
            redeemed_by: None,
        };

        tx.insert_credential(&credential).await?;

        CredentialMetrics::record_issued(kind);
        tracing::debug!(
            credential_id = %credential.id,
            kind = %kind,
            reference_id = %reference,
            expires_at = ?credential.expires_at,
            "Credential issued"
        );

        Ok(credential)
    }

    /// Render a credential with the configured renderer.
    #[must_use]
    pub fn render(&self, credential: &Credential) -> RenderedCode {
        self.renderer.render(&credential.code, &credential.signature)
    }

    /// Current time as seen by the issuer.
    #[must_use]
    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }
}

impl std::fmt::Debug for CredentialIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialIssuer")
            .field("default_ttl", &self.default_ttl)
            .finish_non_exhaustive()
    }
}
