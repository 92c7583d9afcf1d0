//! Redemption state machine.
//!
//! ```text
//!            claim (atomic filter-and-set)
//! active ──────────────────────────────────► redeemed
//!    │                                           │
//!    │ expires_at <= now (read-time only)        └─► cascade by kind
//!    ▼                                               order  → served
//! expired                                            ticket → redeemed
//!                                                    pass   → used
//! ```
//!
//! The claim and the cascade are separate units of work. Once the claim commits the
//! credential stays redeemed even if the cascade fails; that case surfaces as
//! [`FulfillmentError::CascadeFailed`] for an operator to resolve.

use crate::metrics::CredentialMetrics;
use crate::signing::CredentialSigner;
use fulfillment_core::environment::Clock;
use fulfillment_core::error::{FulfillmentError, Result};
use fulfillment_core::store::{FulfillmentStore, StoreTransaction};
use fulfillment_core::types::{
    Credential, CredentialClaim, CredentialCode, CredentialKind, CredentialState, OrderId,
    OrderStatus, PassId, PassStatus, Signature, StaffId, TicketId, TicketStatus,
};
use std::sync::Arc;

/// Tracing target for the distinguishing cause of a rejected scan.
pub const AUDIT_TARGET: &str = "fulfillment::redemption::audit";

/// Secondary update applied to the referenced entity after a successful claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cascade {
    /// `paid | ready → served`
    Order,
    /// `paid → redeemed`
    Ticket,
    /// `active → used`
    EntrancePass,
}

impl Cascade {
    /// The cascade for a credential kind.
    #[must_use]
    pub const fn for_kind(kind: CredentialKind) -> Self {
        match kind {
            CredentialKind::Order => Self::Order,
            CredentialKind::Ticket => Self::Ticket,
            CredentialKind::EntrancePass => Self::EntrancePass,
        }
    }

    /// Apply the cascade for `credential` through `tx`.
    ///
    /// # Errors
    ///
    /// Returns the not-found, status or store error that prevented the update.
    pub async fn apply<T: StoreTransaction>(
        self,
        tx: &mut T,
        credential: &Credential,
    ) -> Result<()> {
        let reference = *credential.reference_id.as_uuid();
        match self {
            Self::Order => {
                let id = OrderId::from_uuid(reference);
                let mut order = tx
                    .load_order(id)
                    .await?
                    .ok_or(FulfillmentError::OrderNotFound(id))?;
                transition(
                    "order",
                    order.status,
                    OrderStatus::Served,
                    order.status.can_transition_to(OrderStatus::Served),
                )?;
                order.status = OrderStatus::Served;
                tx.update_order(&order).await?;
            }
            Self::Ticket => {
                let id = TicketId::from_uuid(reference);
                let mut ticket = tx
                    .load_ticket(id)
                    .await?
                    .ok_or(FulfillmentError::TicketNotFound(id))?;
                transition(
                    "ticket",
                    ticket.status,
                    TicketStatus::Redeemed,
                    ticket.status.can_transition_to(TicketStatus::Redeemed),
                )?;
                ticket.status = TicketStatus::Redeemed;
                tx.update_ticket(&ticket).await?;
            }
            Self::EntrancePass => {
                let mut pass = tx
                    .load_entrance_pass_by_credential(credential.id)
                    .await?
                    .ok_or_else(|| {
                        FulfillmentError::EntrancePassNotFound(PassId::from_uuid(reference))
                    })?;
                transition(
                    "entrance_pass",
                    pass.status,
                    PassStatus::Used,
                    pass.status == PassStatus::Active,
                )?;
                pass.status = PassStatus::Used;
                pass.used_at = credential.redeemed_at;
                pass.used_by.clone_from(&credential.redeemed_by);
                tx.update_entrance_pass(&pass).await?;
            }
        }
        Ok(())
    }
}

fn transition(
    entity: &'static str,
    from: impl ToString,
    to: impl ToString,
    allowed: bool,
) -> Result<()> {
    if allowed {
        Ok(())
    } else {
        Err(FulfillmentError::InvalidStatus {
            entity,
            from: from.to_string(),
            to: to.to_string(),
        })
    }
}

/// Claims credentials and applies their cascades.
pub struct RedemptionMachine<S: FulfillmentStore> {
    store: Arc<S>,
    signer: CredentialSigner,
    verify_signatures: bool,
    clock: Arc<dyn Clock>,
}

impl<S: FulfillmentStore> RedemptionMachine<S> {
    /// Create a machine over `store`.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        signer: CredentialSigner,
        verify_signatures: bool,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            signer,
            verify_signatures,
            clock,
        }
    }

    /// Redeem a scanned credential for `staff_id`.
    ///
    /// # Errors
    ///
    /// - [`FulfillmentError::InvalidOrUsed`] for unknown codes, wrong signatures,
    ///   already-redeemed or expired credentials (indistinguishable to the caller)
    /// - [`FulfillmentError::CascadeFailed`] when the claim succeeded but the
    ///   referenced entity could not be updated; the credential stays redeemed
    /// - [`FulfillmentError::Store`] if the claim itself could not be executed
    pub async fn redeem(
        &self,
        code: &CredentialCode,
        signature: &Signature,
        staff_id: &StaffId,
    ) -> Result<Credential> {
        let now = self.clock.now();

        if self.verify_signatures && !self.signer.verify(code, signature) {
            CredentialMetrics::record_redemption("rejected");
            tracing::warn!(
                target: AUDIT_TARGET,
                cause = "signature_mismatch",
                staff_id = %staff_id,
                "Redemption rejected before claim"
            );
            return Err(FulfillmentError::InvalidOrUsed);
        }

        let claim = CredentialClaim {
            code: code.clone(),
            signature: signature.clone(),
            staff_id: staff_id.clone(),
            at: now,
        };

        let Some(credential) = self.store.claim_credential(&claim).await? else {
            CredentialMetrics::record_redemption("rejected");
            self.audit_rejection(&claim).await;
            return Err(FulfillmentError::InvalidOrUsed);
        };

        tracing::info!(
            credential_id = %credential.id,
            kind = %credential.kind,
            reference_id = %credential.reference_id,
            staff_id = %staff_id,
            "Credential redeemed"
        );

        if let Err(error) = self.cascade(&credential).await {
            CredentialMetrics::record_redemption("cascade_failed");
            CredentialMetrics::record_cascade_failure(credential.kind);
            tracing::error!(
                credential_id = %credential.id,
                kind = %credential.kind,
                reference_id = %credential.reference_id,
                error = %error,
                "Cascade failed after redemption; credential stays redeemed"
            );
            return Err(FulfillmentError::CascadeFailed {
                credential_id: credential.id,
                reason: error.to_string(),
            });
        }

        CredentialMetrics::record_redemption("redeemed");
        Ok(credential)
    }

    async fn cascade(&self, credential: &Credential) -> Result<()> {
        let mut tx = self.store.begin().await?;
        match Cascade::for_kind(credential.kind).apply(&mut tx, credential).await {
            Ok(()) => Ok(tx.commit().await?),
            Err(error) => {
                if let Err(rollback_error) = tx.rollback().await {
                    tracing::warn!(
                        error = %rollback_error,
                        "Rollback after cascade failure failed"
                    );
                }
                Err(error)
            }
        }
    }

    /// Work out why a claim matched nothing and log it to the audit target.
    async fn audit_rejection(&self, claim: &CredentialClaim) {
        let cause = match self.store.find_credential(&claim.code).await {
            Ok(None) => "unknown_code",
            Ok(Some(stored)) => rejection_cause(&stored, claim),
            Err(error) => {
                tracing::debug!(error = %error, "Credential lookup for audit failed");
                "lookup_failed"
            }
        };

        tracing::warn!(
            target: AUDIT_TARGET,
            cause,
            staff_id = %claim.staff_id,
            "Redemption rejected"
        );
    }
}

fn rejection_cause(stored: &Credential, claim: &CredentialClaim) -> &'static str {
    if !constant_time_eq::constant_time_eq(
        stored.signature.as_str().as_bytes(),
        claim.signature.as_str().as_bytes(),
    ) {
        return "signature_mismatch";
    }
    match stored.effective_state(claim.at) {
        CredentialState::Redeemed => "already_redeemed",
        CredentialState::Expired => "expired",
        CredentialState::Active => "unclaimable",
    }
}

impl<S: FulfillmentStore> std::fmt::Debug for RedemptionMachine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedemptionMachine")
            .field("verify_signatures", &self.verify_signatures)
            .finish_non_exhaustive()
    }
}
