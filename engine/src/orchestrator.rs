//! Payment orchestration.
//!
//! A payment is one unit of work: load and lock the order, decrement every line, flip
//! the status, issue the credential, commit. Any error in between drops the transaction
//! and with it every write.

use crate::config::DEFAULT_MAX_PASSES_PER_PURCHASE;
use crate::issuer::CredentialIssuer;
use crate::ledger::InventoryLedger;
use crate::metrics::PaymentMetrics;
use crate::passes::PassCatalog;
use crate::render::RenderedCode;
use chrono::Duration;
use fulfillment_core::error::{FulfillmentError, Result};
use fulfillment_core::store::{FulfillmentStore, StoreTransaction};
use fulfillment_core::types::{
    Credential, CredentialKind, EntrancePass, Money, OrderId, OrderStatus, PassId, PassStatus,
    PaymentMethod, TicketId, TicketStatus, UserId,
};
use std::sync::Arc;
use std::time::Instant;

/// Outcome of a successful order or ticket payment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentReceipt {
    /// The credential issued for the paid unit
    pub credential: Credential,
    /// Its visual encoding
    pub rendered_code: RenderedCode,
}

/// One entrance pass issued in a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuedPass {
    /// The persisted pass
    pub pass: EntrancePass,
    /// The credential that admits its holder
    pub credential: Credential,
    /// Its visual encoding
    pub rendered_code: RenderedCode,
}

/// Result of a multi-unit pass purchase. Each unit commits independently.
#[derive(Debug, Clone, Default)]
pub struct PassBatch {
    /// Units that committed
    pub issued: Vec<IssuedPass>,
    /// Units that failed, in attempt order
    pub failures: Vec<FulfillmentError>,
}

impl PassBatch {
    /// `true` when every requested unit was issued.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Coordinates ledger, issuer and store for the payment paths.
pub struct FulfillmentOrchestrator<S: FulfillmentStore> {
    pub(crate) store: Arc<S>,
    pub(crate) ledger: InventoryLedger,
    pub(crate) issuer: CredentialIssuer,
    catalog: PassCatalog,
    max_passes_per_purchase: u32,
}

impl<S: FulfillmentStore> FulfillmentOrchestrator<S> {
    /// Create an orchestrator.
    #[must_use]
    pub fn new(store: Arc<S>, issuer: CredentialIssuer, catalog: PassCatalog) -> Self {
        Self {
            store,
            ledger: InventoryLedger::new(),
            issuer,
            catalog,
            max_passes_per_purchase: DEFAULT_MAX_PASSES_PER_PURCHASE,
        }
    }

    /// Cap the number of passes one purchase may request.
    #[must_use]
    pub fn with_max_passes_per_purchase(mut self, max: u32) -> Self {
        self.max_passes_per_purchase = max;
        self
    }

    /// Pay a pending order.
    ///
    /// # Errors
    ///
    /// - [`FulfillmentError::OrderNotFound`] if the order does not exist
    /// - [`FulfillmentError::InvalidStatus`] if it is not `pending`
    /// - [`FulfillmentError::InsufficientStock`] / [`FulfillmentError::StockNotTracked`]
    ///   if any line cannot be covered
    /// - [`FulfillmentError::Store`] on storage failure
    ///
    /// Every error leaves stock, order and credentials exactly as they were.
    pub async fn pay_order(
        &self,
        order_id: OrderId,
        payment_method: Option<PaymentMethod>,
    ) -> Result<PaymentReceipt> {
        let started = Instant::now();
        let mut tx = self.store.begin().await?;
        let result = self.pay_order_in(&mut tx, order_id, payment_method).await;
        let result = settle(tx, result).await;

        record_payment("order", &result, started);
        if let Ok(receipt) = &result {
            tracing::info!(
                order_id = %order_id,
                credential_id = %receipt.credential.id,
                "Order paid"
            );
        }
        result
    }

    async fn pay_order_in(
        &self,
        tx: &mut S::Transaction,
        order_id: OrderId,
        payment_method: Option<PaymentMethod>,
    ) -> Result<PaymentReceipt> {
        let mut order = tx
            .load_order(order_id)
            .await?
            .ok_or(FulfillmentError::OrderNotFound(order_id))?;

        if order.status != OrderStatus::Pending {
            return Err(FulfillmentError::InvalidStatus {
                entity: "order",
                from: order.status.to_string(),
                to: OrderStatus::Paid.to_string(),
            });
        }

        self.ledger
            .decrement_lines(tx, &order.location, &order.line_items)
            .await?;

        let credential = self
            .issuer
            .issue(tx, CredentialKind::Order, order.id.into(), None)
            .await?;

        order.status = OrderStatus::Paid;
        order.credential_id = Some(credential.id);
        order.payment_method = payment_method;
        order.paid_at = Some(credential.issued_at);
        tx.update_order(&order).await?;

        Ok(PaymentReceipt {
            rendered_code: self.issuer.render(&credential),
            credential,
        })
    }

    /// Pay an issued standalone ticket.
    ///
    /// # Errors
    ///
    /// As [`pay_order`](Self::pay_order), with [`FulfillmentError::TicketNotFound`] and
    /// the ticket requiring status `issued`.
    pub async fn pay_ticket(
        &self,
        ticket_id: TicketId,
        payment_method: Option<PaymentMethod>,
    ) -> Result<PaymentReceipt> {
        let started = Instant::now();
        let mut tx = self.store.begin().await?;
        let result = self.pay_ticket_in(&mut tx, ticket_id, payment_method).await;
        let result = settle(tx, result).await;

        record_payment("ticket", &result, started);
        if let Ok(receipt) = &result {
            tracing::info!(
                ticket_id = %ticket_id,
                credential_id = %receipt.credential.id,
                "Ticket paid"
            );
        }
        result
    }

    async fn pay_ticket_in(
        &self,
        tx: &mut S::Transaction,
        ticket_id: TicketId,
        payment_method: Option<PaymentMethod>,
    ) -> Result<PaymentReceipt> {
        let mut ticket = tx
            .load_ticket(ticket_id)
            .await?
            .ok_or(FulfillmentError::TicketNotFound(ticket_id))?;

        if ticket.status != TicketStatus::Issued {
            return Err(FulfillmentError::InvalidStatus {
                entity: "ticket",
                from: ticket.status.to_string(),
                to: TicketStatus::Paid.to_string(),
            });
        }

        self.ledger
            .decrement_lines(tx, &ticket.location, &ticket.line_items)
            .await?;

        let credential = self
            .issuer
            .issue(tx, CredentialKind::Ticket, ticket.id.into(), None)
            .await?;

        ticket.status = TicketStatus::Paid;
        ticket.credential_id = Some(credential.id);
        ticket.payment_method = payment_method;
        ticket.paid_at = Some(credential.issued_at);
        tx.update_ticket(&ticket).await?;

        Ok(PaymentReceipt {
            rendered_code: self.issuer.render(&credential),
            credential,
        })
    }

    /// Issue `quantity` passes of `pass_type` to `holder`.
    ///
    /// Each pass commits on its own; the batch reports what was issued and what failed.
    ///
    /// # Errors
    ///
    /// - [`FulfillmentError::InvalidQuantity`] if `quantity` is zero or above the
    ///   per-purchase cap
    /// - [`FulfillmentError::InvalidType`] if the type is not in the catalog
    /// - the first unit's error when no unit could be issued at all
    pub async fn pay_entrance_passes(
        &self,
        holder: UserId,
        pass_type: &str,
        quantity: u32,
    ) -> Result<PassBatch> {
        if quantity == 0 {
            return Err(FulfillmentError::InvalidQuantity(
                "entrance pass quantity must be at least 1".to_string(),
            ));
        }
        if quantity > self.max_passes_per_purchase {
            return Err(FulfillmentError::InvalidQuantity(format!(
                "at most {} entrance passes per purchase, requested {quantity}",
                self.max_passes_per_purchase
            )));
        }
        let tier = self.catalog.get(pass_type)?;

        let mut batch = PassBatch::default();
        for _ in 0..quantity {
            let started = Instant::now();
            let result = match self.store.begin().await {
                Ok(mut tx) => {
                    let result = self
                        .issue_pass_in(&mut tx, holder, &tier.name, tier.validity, tier.price)
                        .await;
                    settle(tx, result).await
                }
                Err(error) => Err(error.into()),
            };
            record_payment("entrance_pass", &result, started);

            match result {
                Ok(issued) => {
                    PaymentMetrics::record_pass(&issued.pass.pass_type);
                    batch.issued.push(issued);
                }
                Err(error) => {
                    tracing::warn!(
                        holder = %holder,
                        pass_type,
                        error = %error,
                        "Entrance pass unit failed"
                    );
                    batch.failures.push(error);
                }
            }
        }

        tracing::info!(
            holder = %holder,
            pass_type,
            issued = batch.issued.len(),
            failed = batch.failures.len(),
            "Entrance passes paid"
        );

        if batch.issued.is_empty() && !batch.failures.is_empty() {
            return Err(batch.failures.remove(0));
        }
        Ok(batch)
    }

    async fn issue_pass_in(
        &self,
        tx: &mut S::Transaction,
        holder: UserId,
        pass_type: &str,
        validity: Duration,
        price: Money,
    ) -> Result<IssuedPass> {
        let pass_id = PassId::new();
        let credential = self
            .issuer
            .issue(tx, CredentialKind::EntrancePass, pass_id.into(), Some(validity))
            .await?;

        let pass = EntrancePass {
            id: pass_id,
            holder,
            pass_type: pass_type.to_string(),
            price,
            status: PassStatus::Active,
            valid_until: credential
                .expires_at
                .unwrap_or(credential.issued_at + validity),
            credential_id: credential.id,
            purchased_at: credential.issued_at,
            used_at: None,
            used_by: None,
        };
        tx.insert_entrance_pass(&pass).await?;

        Ok(IssuedPass {
            rendered_code: self.issuer.render(&credential),
            pass,
            credential,
        })
    }
}

/// Commit on success, roll back on failure, keeping the original error.
pub(crate) async fn settle<T: StoreTransaction, R>(tx: T, result: Result<R>) -> Result<R> {
    match result {
        Ok(value) => {
            tx.commit().await?;
            Ok(value)
        }
        Err(error) => {
            if let Err(rollback_error) = tx.rollback().await {
                tracing::error!(
                    error = %rollback_error,
                    original = %error,
                    "Rollback failed"
                );
            }
            Err(error)
        }
    }
}

fn record_payment<R>(target: &'static str, result: &Result<R>, started: Instant) {
    let outcome = match result {
        Ok(_) => "paid",
        Err(error) => error.label(),
    };
    PaymentMetrics::record(target, outcome, started.elapsed());
}

impl<S: FulfillmentStore> std::fmt::Debug for FulfillmentOrchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FulfillmentOrchestrator")
            .field("issuer", &self.issuer)
            .field("catalog", &self.catalog)
            .field("max_passes_per_purchase", &self.max_passes_per_purchase)
            .finish_non_exhaustive()
    }
}
