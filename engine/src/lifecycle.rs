//! Status changes outside the payment path: intake, preparation and cancellation.

use crate::orchestrator::{FulfillmentOrchestrator, settle};
use fulfillment_core::error::{FulfillmentError, Result};
use fulfillment_core::store::{FulfillmentStore, StoreTransaction};
use fulfillment_core::types::{
    EntrancePass, LineItem, Order, OrderId, OrderStatus, PassId, PassStatus, StandaloneTicket,
    TicketId, TicketStatus,
};

impl<S: FulfillmentStore> FulfillmentOrchestrator<S> {
    /// Persist a `pending` order handed over by order intake.
    ///
    /// # Errors
    ///
    /// - [`FulfillmentError::InvalidStatus`] if the order is not `pending`
    /// - [`FulfillmentError::InvalidQuantity`] if there are no lines or any line has zero
    ///   quantity
    /// - [`FulfillmentError::Store`] on storage failure (including a duplicate id)
    pub async fn place_order(&self, order: &Order) -> Result<OrderId> {
        if order.status != OrderStatus::Pending {
            return Err(FulfillmentError::InvalidStatus {
                entity: "order",
                from: order.status.to_string(),
                to: OrderStatus::Pending.to_string(),
            });
        }
        check_lines(&order.line_items)?;

        let mut tx = self.store.begin().await?;
        let result = tx.insert_order(order).await.map_err(FulfillmentError::from);
        settle(tx, result).await?;

        tracing::info!(order_id = %order.id, location = %order.location, "Order placed");
        Ok(order.id)
    }

    /// Persist an `issued` standalone ticket.
    ///
    /// # Errors
    ///
    /// As [`place_order`](Self::place_order), requiring status `issued`.
    pub async fn issue_ticket(&self, ticket: &StandaloneTicket) -> Result<TicketId> {
        if ticket.status != TicketStatus::Issued {
            return Err(FulfillmentError::InvalidStatus {
                entity: "ticket",
                from: ticket.status.to_string(),
                to: TicketStatus::Issued.to_string(),
            });
        }
        check_lines(&ticket.line_items)?;

        let mut tx = self.store.begin().await?;
        let result = tx.insert_ticket(ticket).await.map_err(FulfillmentError::from);
        settle(tx, result).await?;

        tracing::info!(ticket_id = %ticket.id, location = %ticket.location, "Ticket issued");
        Ok(ticket.id)
    }

    /// Move a paid order to `ready`.
    ///
    /// # Errors
    ///
    /// [`FulfillmentError::OrderNotFound`] or [`FulfillmentError::InvalidStatus`].
    pub async fn mark_order_ready(&self, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut order = load_order(&mut tx, order_id).await?;
            require_order_transition(&order, OrderStatus::Ready)?;
            order.status = OrderStatus::Ready;
            tx.update_order(&order).await?;
            Ok::<_, FulfillmentError>(order)
        }
        .await;
        let order = settle(tx, result).await?;

        tracing::info!(order_id = %order_id, "Order ready");
        Ok(order)
    }

    /// Cancel an order.
    ///
    /// A `paid` order returns every line to stock in the same transaction.
    ///
    /// # Errors
    ///
    /// [`FulfillmentError::OrderNotFound`], [`FulfillmentError::InvalidStatus`], or a
    /// ledger error while restocking.
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut order = load_order(&mut tx, order_id).await?;
            require_order_transition(&order, OrderStatus::Cancelled)?;

            let restock = order.status == OrderStatus::Paid;
            if restock {
                self.ledger
                    .increment_lines(&mut tx, &order.location, &order.line_items)
                    .await?;
            }

            order.status = OrderStatus::Cancelled;
            tx.update_order(&order).await?;
            Ok::<_, FulfillmentError>((order, restock))
        }
        .await;
        let (order, restocked) = settle(tx, result).await?;

        tracing::info!(order_id = %order_id, restocked, "Order cancelled");
        Ok(order)
    }

    /// Cancel an active entrance pass.
    ///
    /// Its credential stays in the store; a later scan claims it and reports
    /// [`FulfillmentError::CascadeFailed`].
    ///
    /// # Errors
    ///
    /// [`FulfillmentError::EntrancePassNotFound`] or [`FulfillmentError::InvalidStatus`].
    pub async fn cancel_entrance_pass(&self, pass_id: PassId) -> Result<EntrancePass> {
        let mut tx = self.store.begin().await?;
        let result = async {
            let mut pass = tx
                .load_entrance_pass(pass_id)
                .await?
                .ok_or(FulfillmentError::EntrancePassNotFound(pass_id))?;
            if pass.status != PassStatus::Active {
                return Err(FulfillmentError::InvalidStatus {
                    entity: "entrance_pass",
                    from: pass.status.to_string(),
                    to: PassStatus::Cancelled.to_string(),
                });
            }
            pass.status = PassStatus::Cancelled;
            tx.update_entrance_pass(&pass).await?;
            Ok::<_, FulfillmentError>(pass)
        }
        .await;
        let pass = settle(tx, result).await?;

        tracing::info!(pass_id = %pass_id, "Entrance pass cancelled");
        Ok(pass)
    }
}

async fn load_order<T: StoreTransaction>(tx: &mut T, order_id: OrderId) -> Result<Order> {
    tx.load_order(order_id)
        .await?
        .ok_or(FulfillmentError::OrderNotFound(order_id))
}

fn require_order_transition(order: &Order, next: OrderStatus) -> Result<()> {
    if order.status.can_transition_to(next) {
        Ok(())
    } else {
        Err(FulfillmentError::InvalidStatus {
            entity: "order",
            from: order.status.to_string(),
            to: next.to_string(),
        })
    }
}

fn check_lines(lines: &[LineItem]) -> Result<()> {
    if lines.is_empty() {
        return Err(FulfillmentError::InvalidQuantity(
            "at least one line item is required".to_string(),
        ));
    }
    match lines.iter().find(|line| line.quantity == 0) {
        Some(line) => Err(FulfillmentError::InvalidQuantity(format!(
            "line for {} has zero quantity",
            line.item_id
        ))),
        None => Ok(()),
    }
}
