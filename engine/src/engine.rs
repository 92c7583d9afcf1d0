//! The engine facade wiring ledger, issuer, orchestrator and redemption over one store.

use crate::config::{ConfigError, EngineConfig};
use crate::issuer::CredentialIssuer;
use crate::ledger::InventoryLedger;
use crate::orchestrator::{FulfillmentOrchestrator, PassBatch, PaymentReceipt, settle};
use crate::redemption::{AUDIT_TARGET, RedemptionMachine};
use crate::render::{CodeRenderer, CompactPayloadRenderer};
use crate::signing::CredentialSigner;
use chrono::{DateTime, Utc};
use fulfillment_core::environment::Clock;
use fulfillment_core::error::{FulfillmentError, Result};
use fulfillment_core::store::FulfillmentStore;
use fulfillment_core::types::{
    Credential, CredentialCode, CredentialId, CredentialKind, CredentialState, EntrancePass,
    InventoryCount, ItemId, LocationId, Order, OrderId, PassId, PaymentMethod, ReferenceId,
    Signature, StaffId, StandaloneTicket, TicketId, UserId,
};
use serde::Serialize;
use std::sync::Arc;

/// Read-only view of a credential. Carries no signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialInfo {
    /// Credential identifier
    pub id: CredentialId,
    /// Kind of object it authorizes
    pub kind: CredentialKind,
    /// The order/ticket/pass it authorizes
    pub reference_id: ReferenceId,
    /// State at lookup time, with expiry applied
    pub state: CredentialState,
    /// Issuance time
    pub issued_at: DateTime<Utc>,
    /// Expiry, if any
    pub expires_at: Option<DateTime<Utc>>,
    /// Redemption time
    pub redeemed_at: Option<DateTime<Utc>>,
    /// Redeeming staff member
    pub redeemed_by: Option<StaffId>,
}

impl CredentialInfo {
    fn observe(credential: Credential, now: DateTime<Utc>) -> Self {
        Self {
            state: credential.effective_state(now),
            id: credential.id,
            kind: credential.kind,
            reference_id: credential.reference_id,
            issued_at: credential.issued_at,
            expires_at: credential.expires_at,
            redeemed_at: credential.redeemed_at,
            redeemed_by: credential.redeemed_by,
        }
    }
}

/// Payment-to-fulfillment engine.
///
/// # Example
///
/// ```ignore
/// let engine = FulfillmentEngine::new(store, Arc::new(SystemClock), config)?;
/// engine.register_item(&"lager".into(), &["bar".into()], &[24]).await?;
/// let receipt = engine.pay_order(order_id, Some(PaymentMethod::Cash)).await?;
/// let credential = engine
///     .redeem(&receipt.credential.code, &receipt.credential.signature, &"staff1".into())
///     .await?;
/// ```
pub struct FulfillmentEngine<S: FulfillmentStore> {
    store: Arc<S>,
    orchestrator: FulfillmentOrchestrator<S>,
    redemption: RedemptionMachine<S>,
    ledger: InventoryLedger,
    clock: Arc<dyn Clock>,
}

impl<S: FulfillmentStore> FulfillmentEngine<S> {
    /// Build an engine rendering credentials as compact payloads.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the signing key cannot key the MAC.
    pub fn new(
        store: S,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> std::result::Result<Self, ConfigError> {
        Self::with_renderer(store, clock, config, Arc::new(CompactPayloadRenderer))
    }

    /// Build an engine with a custom [`CodeRenderer`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the signing key cannot key the MAC.
    pub fn with_renderer(
        store: S,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
        renderer: Arc<dyn CodeRenderer>,
    ) -> std::result::Result<Self, ConfigError> {
        let store = Arc::new(store);
        let signer = CredentialSigner::new(&config.signing_key)?;
        let issuer = CredentialIssuer::new(
            signer.clone(),
            renderer,
            config.default_credential_ttl,
            Arc::clone(&clock),
        );

        Ok(Self {
            orchestrator: FulfillmentOrchestrator::new(
                Arc::clone(&store),
                issuer,
                config.pass_catalog,
            )
            .with_max_passes_per_purchase(config.max_passes_per_purchase),
            redemption: RedemptionMachine::new(
                Arc::clone(&store),
                signer,
                config.verify_signatures,
                Arc::clone(&clock),
            ),
            ledger: InventoryLedger::new(),
            store,
            clock,
        })
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    // ═══════════════════════════════════════════════════════════
    // Payment
    // ═══════════════════════════════════════════════════════════

    /// Pay a pending order. See [`FulfillmentOrchestrator::pay_order`].
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `InvalidStatus`, `InsufficientStock`, `StockNotTracked` or a
    /// store error; nothing is written in any of those cases.
    #[tracing::instrument(skip(self, payment_method))]
    pub async fn pay_order(
        &self,
        order_id: OrderId,
        payment_method: Option<PaymentMethod>,
    ) -> Result<PaymentReceipt> {
        self.orchestrator.pay_order(order_id, payment_method).await
    }

    /// Pay an issued standalone ticket.
    ///
    /// # Errors
    ///
    /// `TicketNotFound`, `InvalidStatus`, `InsufficientStock`, `StockNotTracked` or a
    /// store error.
    #[tracing::instrument(skip(self, payment_method))]
    pub async fn pay_ticket(
        &self,
        ticket_id: TicketId,
        payment_method: Option<PaymentMethod>,
    ) -> Result<PaymentReceipt> {
        self.orchestrator.pay_ticket(ticket_id, payment_method).await
    }

    /// Buy `quantity` entrance passes of `pass_type` for `holder`.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity`, `InvalidType`, or the first unit error if none was issued.
    #[tracing::instrument(skip(self))]
    pub async fn pay_entrance_passes(
        &self,
        holder: UserId,
        pass_type: &str,
        quantity: u32,
    ) -> Result<PassBatch> {
        self.orchestrator
            .pay_entrance_passes(holder, pass_type, quantity)
            .await
    }

    // ═══════════════════════════════════════════════════════════
    // Redemption
    // ═══════════════════════════════════════════════════════════

    /// Redeem a credential presented as `(code, signature)`.
    ///
    /// # Errors
    ///
    /// `InvalidOrUsed`, `CascadeFailed` or a store error.
    #[tracing::instrument(skip(self, code, signature))]
    pub async fn redeem(
        &self,
        code: &CredentialCode,
        signature: &Signature,
        staff_id: &StaffId,
    ) -> Result<Credential> {
        self.redemption.redeem(code, signature, staff_id).await
    }

    /// Redeem a scanned compact payload (`"<code>.<signature>"`).
    ///
    /// # Errors
    ///
    /// As [`redeem`](Self::redeem); an unparseable payload is `InvalidOrUsed`.
    #[tracing::instrument(skip(self, scanned))]
    pub async fn redeem_scan(&self, scanned: &str, staff_id: &StaffId) -> Result<Credential> {
        let Some((code, signature)) = CompactPayloadRenderer::parse(scanned) else {
            tracing::warn!(
                target: AUDIT_TARGET,
                cause = "malformed_payload",
                staff_id = %staff_id,
                "Redemption rejected before claim"
            );
            return Err(FulfillmentError::InvalidOrUsed);
        };
        self.redemption.redeem(&code, &signature, staff_id).await
    }

    /// Look up a credential without changing it.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    pub async fn get_credential_info(
        &self,
        code: &CredentialCode,
    ) -> Result<Option<CredentialInfo>> {
        let now = self.clock.now();
        Ok(self
            .store
            .find_credential(code)
            .await?
            .map(|credential| CredentialInfo::observe(credential, now)))
    }

    // ═══════════════════════════════════════════════════════════
    // Inventory
    // ═══════════════════════════════════════════════════════════

    /// Every stock counter, ordered by item then location.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    pub async fn list_stock(&self) -> Result<Vec<InventoryCount>> {
        Ok(self.store.list_stock().await?)
    }

    /// Register `item_id` at `locations`. Idempotent.
    ///
    /// # Errors
    ///
    /// `InvalidQuantity` on mismatched lengths, or a store error.
    #[tracing::instrument(skip(self))]
    pub async fn register_item(
        &self,
        item_id: &ItemId,
        locations: &[LocationId],
        initial_amounts: &[u32],
    ) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let result = self
            .ledger
            .ensure(&mut tx, item_id, locations, initial_amounts)
            .await;
        settle(tx, result).await
    }

    /// Register one counter with its advisory threshold. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    pub async fn register_counter(&self, seed: &InventoryCount) -> Result<()> {
        let mut tx = self.store.begin().await?;
        let result = self.ledger.ensure_seeded(&mut tx, seed).await;
        settle(tx, result).await
    }

    /// Add `amount` units to a registered counter, returning the new quantity.
    ///
    /// # Errors
    ///
    /// `StockNotTracked`, `InvalidQuantity` or a store error.
    #[tracing::instrument(skip(self))]
    pub async fn restock(
        &self,
        item_id: &ItemId,
        location: &LocationId,
        amount: u32,
    ) -> Result<u32> {
        let mut tx = self.store.begin().await?;
        let result = self.ledger.increment(&mut tx, item_id, location, amount).await;
        let quantity = settle(tx, result).await?;
        tracing::info!(quantity, "Restocked");
        Ok(quantity)
    }

    // ═══════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════

    /// Persist a pending order from order intake.
    ///
    /// # Errors
    ///
    /// `InvalidStatus`, `InvalidQuantity` or a store error.
    pub async fn place_order(&self, order: &Order) -> Result<OrderId> {
        self.orchestrator.place_order(order).await
    }

    /// Persist an issued standalone ticket.
    ///
    /// # Errors
    ///
    /// `InvalidStatus`, `InvalidQuantity` or a store error.
    pub async fn issue_ticket(&self, ticket: &StandaloneTicket) -> Result<TicketId> {
        self.orchestrator.issue_ticket(ticket).await
    }

    /// `paid → ready`.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `InvalidStatus` or a store error.
    #[tracing::instrument(skip(self))]
    pub async fn mark_order_ready(&self, order_id: OrderId) -> Result<Order> {
        self.orchestrator.mark_order_ready(order_id).await
    }

    /// Cancel an order, restocking it if it was paid.
    ///
    /// # Errors
    ///
    /// `OrderNotFound`, `InvalidStatus`, a ledger error or a store error.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        self.orchestrator.cancel_order(order_id).await
    }

    /// `active → cancelled` for an entrance pass.
    ///
    /// # Errors
    ///
    /// `EntrancePassNotFound`, `InvalidStatus` or a store error.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_entrance_pass(&self, pass_id: PassId) -> Result<EntrancePass> {
        self.orchestrator.cancel_entrance_pass(pass_id).await
    }

    // ═══════════════════════════════════════════════════════════
    // Readers
    // ═══════════════════════════════════════════════════════════

    /// Current state of an order. Never waits on a payment in flight.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    pub async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        Ok(self.store.find_order(order_id).await?)
    }

    /// Current state of a standalone ticket.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    pub async fn get_ticket(&self, ticket_id: TicketId) -> Result<Option<StandaloneTicket>> {
        Ok(self.store.find_ticket(ticket_id).await?)
    }

    /// Current state of an entrance pass.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    pub async fn get_entrance_pass(&self, pass_id: PassId) -> Result<Option<EntrancePass>> {
        Ok(self.store.find_entrance_pass(pass_id).await?)
    }
}

impl<S: FulfillmentStore> std::fmt::Debug for FulfillmentEngine<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulfillmentEngine")
            .field("orchestrator", &self.orchestrator)
            .field("redemption", &self.redemption)
            .finish_non_exhaustive()
    }
}
