//! Inventory ledger: per-(item, location) counters that never go negative.
//!
//! Every write goes through the caller's [`StoreTransaction`] so a decrement commits or
//! rolls back together with the payment it belongs to. Counters exist only after
//! [`InventoryLedger::ensure`]; touching an unregistered pair is an error rather than an
//! implicit zero row.

use crate::metrics::LedgerMetrics;
use fulfillment_core::error::{FulfillmentError, Result};
use fulfillment_core::store::StoreTransaction;
use fulfillment_core::types::{InventoryCount, ItemId, LineItem, LocationId, StockUpdate};
use std::collections::BTreeMap;

/// Stateless ledger operations over a transaction.
#[derive(Debug, Clone, Copy, Default)]
pub struct InventoryLedger;

impl InventoryLedger {
    /// Create a ledger.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Take `amount` units, returning the new quantity.
    ///
    /// # Errors
    ///
    /// - [`FulfillmentError::InvalidQuantity`] if `amount` is zero
    /// - [`FulfillmentError::InsufficientStock`] if fewer than `amount` units are on hand
    /// - [`FulfillmentError::StockNotTracked`] if the pair was never registered
    pub async fn decrement<T: StoreTransaction>(
        &self,
        tx: &mut T,
        item_id: &ItemId,
        location: &LocationId,
        amount: u32,
    ) -> Result<u32> {
        if amount == 0 {
            return Err(FulfillmentError::InvalidQuantity(format!(
                "cannot decrement {item_id} at {location} by zero"
            )));
        }

        match tx.decrement_stock(item_id, location, amount).await? {
            StockUpdate::Applied(count) => {
                LedgerMetrics::record_decrement("applied");
                LedgerMetrics::record_level(item_id.as_str(), location.as_str(), count.quantity);
                if count.is_below_threshold() {
                    LedgerMetrics::record_low_stock(item_id.as_str(), location.as_str());
                    tracing::warn!(
                        item_id = %item_id,
                        location = %location,
                        quantity = count.quantity,
                        threshold = ?count.threshold,
                        "Stock at or below threshold"
                    );
                }
                Ok(count.quantity)
            }
            StockUpdate::Insufficient { available } => {
                LedgerMetrics::record_decrement("insufficient");
                tracing::warn!(
                    item_id = %item_id,
                    location = %location,
                    requested = amount,
                    available,
                    "Insufficient stock"
                );
                Err(FulfillmentError::InsufficientStock {
                    item_id: item_id.clone(),
                    location: location.clone(),
                    requested: amount,
                    available,
                })
            }
            StockUpdate::Untracked => {
                LedgerMetrics::record_decrement("untracked");
                Err(not_tracked(item_id, location))
            }
        }
    }

    /// Return `amount` units, returning the new quantity.
    ///
    /// # Errors
    ///
    /// - [`FulfillmentError::InvalidQuantity`] if `amount` is zero
    /// - [`FulfillmentError::StockNotTracked`] if the pair was never registered
    /// - [`FulfillmentError::Store`] on overflow or storage failure
    pub async fn increment<T: StoreTransaction>(
        &self,
        tx: &mut T,
        item_id: &ItemId,
        location: &LocationId,
        amount: u32,
    ) -> Result<u32> {
        if amount == 0 {
            return Err(FulfillmentError::InvalidQuantity(format!(
                "cannot increment {item_id} at {location} by zero"
            )));
        }

        match tx.increment_stock(item_id, location, amount).await? {
            StockUpdate::Applied(count) => {
                LedgerMetrics::record_increment();
                LedgerMetrics::record_level(item_id.as_str(), location.as_str(), count.quantity);
                Ok(count.quantity)
            }
            // Increments are unconditional on quantity.
            StockUpdate::Insufficient { .. } | StockUpdate::Untracked => {
                Err(not_tracked(item_id, location))
            }
        }
    }

    /// Register `item_id` at every location, seeding with `initial_amounts`.
    ///
    /// Idempotent: existing counters are left untouched. An empty `initial_amounts`
    /// seeds every location at zero.
    ///
    /// # Errors
    ///
    /// Returns [`FulfillmentError::InvalidQuantity`] when `initial_amounts` is non-empty
    /// and its length differs from `locations`.
    pub async fn ensure<T: StoreTransaction>(
        &self,
        tx: &mut T,
        item_id: &ItemId,
        locations: &[LocationId],
        initial_amounts: &[u32],
    ) -> Result<()> {
        if !initial_amounts.is_empty() && initial_amounts.len() != locations.len() {
            return Err(FulfillmentError::InvalidQuantity(format!(
                "{} initial amounts for {} locations",
                initial_amounts.len(),
                locations.len()
            )));
        }

        for (index, location) in locations.iter().enumerate() {
            let quantity = initial_amounts.get(index).copied().unwrap_or(0);
            let seed = InventoryCount::new(item_id.clone(), location.clone(), quantity);
            self.ensure_seeded(tx, &seed).await?;
        }
        Ok(())
    }

    /// Register a single counter from a full seed (including its threshold).
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    pub async fn ensure_seeded<T: StoreTransaction>(
        &self,
        tx: &mut T,
        seed: &InventoryCount,
    ) -> Result<()> {
        if tx.ensure_stock(seed).await? {
            tracing::info!(
                item_id = %seed.item_id,
                location = %seed.location,
                quantity = seed.quantity,
                "Stock counter registered"
            );
        }
        Ok(())
    }

    /// Decrement every line of an order or ticket at `location`.
    ///
    /// Lines are merged per item and applied in item order, so concurrent payments
    /// always touch counters in the same sequence.
    ///
    /// # Errors
    ///
    /// The first [`decrement`](Self::decrement) failure, or
    /// [`FulfillmentError::InvalidQuantity`] for an empty line list or a zero-quantity line.
    pub async fn decrement_lines<T: StoreTransaction>(
        &self,
        tx: &mut T,
        location: &LocationId,
        lines: &[LineItem],
    ) -> Result<()> {
        for (item_id, amount) in merge_lines(lines)? {
            self.decrement(tx, &item_id, location, amount).await?;
        }
        Ok(())
    }

    /// Return every line of an order or ticket to `location`.
    ///
    /// # Errors
    ///
    /// The first [`increment`](Self::increment) failure.
    pub async fn increment_lines<T: StoreTransaction>(
        &self,
        tx: &mut T,
        location: &LocationId,
        lines: &[LineItem],
    ) -> Result<()> {
        for (item_id, amount) in merge_lines(lines)? {
            self.increment(tx, &item_id, location, amount).await?;
        }
        Ok(())
    }
}

fn not_tracked(item_id: &ItemId, location: &LocationId) -> FulfillmentError {
    FulfillmentError::StockNotTracked {
        item_id: item_id.clone(),
        location: location.clone(),
    }
}

/// Sum line quantities per item, ordered by item id.
fn merge_lines(lines: &[LineItem]) -> Result<BTreeMap<ItemId, u32>> {
    if lines.is_empty() {
        return Err(FulfillmentError::InvalidQuantity("no line items".to_string()));
    }
    let mut merged: BTreeMap<ItemId, u32> = BTreeMap::new();
    for line in lines {
        if line.quantity == 0 {
            return Err(FulfillmentError::InvalidQuantity(format!(
                "line for {} has zero quantity",
                line.item_id
            )));
        }
        let total = merged.entry(line.item_id.clone()).or_insert(0);
        *total = total.checked_add(line.quantity).ok_or_else(|| {
            FulfillmentError::InvalidQuantity(format!("quantity overflow for {}", line.item_id))
        })?;
    }
    Ok(merged)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use fulfillment_core::store::FulfillmentStore;
    use fulfillment_core::types::Money;
    use fulfillment_testing::InMemoryStore;
    use fulfillment_testing::fixtures::{BAR, line, stock};
    use proptest::prelude::*;

    fn bar() -> LocationId {
        LocationId::new(BAR)
    }

    #[test]
    fn merges_duplicate_lines_in_item_order() {
        let merged = merge_lines(&[line("stout", 1), line("lager", 2), line("stout", 3)]).unwrap();
        let merged: Vec<_> = merged.into_iter().collect();
        assert_eq!(
            merged,
            vec![(ItemId::new("lager"), 2), (ItemId::new("stout"), 4)]
        );
    }

    #[test]
    fn empty_line_list_is_rejected() {
        assert!(matches!(
            merge_lines(&[]),
            Err(FulfillmentError::InvalidQuantity(_))
        ));
    }

    #[test]
    fn zero_quantity_line_is_rejected() {
        let lines = [LineItem::new("lager", 0, Money::from_cents(500))];
        assert!(matches!(
            merge_lines(&lines),
            Err(FulfillmentError::InvalidQuantity(_))
        ));
    }

    #[tokio::test]
    async fn decrement_and_increment() {
        let store = InMemoryStore::new();
        let ledger = InventoryLedger::new();
        let mut tx = store.begin().await.unwrap();
        ledger.ensure_seeded(&mut tx, &stock("lager", 5)).await.unwrap();

        let item = ItemId::new("lager");
        assert_eq!(ledger.decrement(&mut tx, &item, &bar(), 2).await, Ok(3));
        assert_eq!(ledger.increment(&mut tx, &item, &bar(), 4).await, Ok(7));
        tx.commit().await.unwrap();

        assert_eq!(store.stock_level("lager", BAR).await, Some(7));
    }

    #[tokio::test]
    async fn insufficient_stock_leaves_counter() {
        let store = InMemoryStore::new();
        let ledger = InventoryLedger::new();
        let mut tx = store.begin().await.unwrap();
        ledger.ensure_seeded(&mut tx, &stock("lager", 1)).await.unwrap();

        let result = ledger
            .decrement(&mut tx, &ItemId::new("lager"), &bar(), 2)
            .await;
        tx.commit().await.unwrap();

        assert!(matches!(
            result,
            Err(FulfillmentError::InsufficientStock { requested: 2, available: 1, .. })
        ));
        assert_eq!(store.stock_level("lager", BAR).await, Some(1));
    }

    #[tokio::test]
    async fn untracked_pair_is_an_error() {
        let store = InMemoryStore::new();
        let ledger = InventoryLedger::new();
        let mut tx = store.begin().await.unwrap();
        let item = ItemId::new("ghost");

        assert!(matches!(
            ledger.decrement(&mut tx, &item, &bar(), 1).await,
            Err(FulfillmentError::StockNotTracked { .. })
        ));
        assert!(matches!(
            ledger.increment(&mut tx, &item, &bar(), 1).await,
            Err(FulfillmentError::StockNotTracked { .. })
        ));
        tx.commit().await.unwrap();
        assert_eq!(store.stock_level("ghost", BAR).await, None);
    }

    #[tokio::test]
    async fn zero_amounts_are_rejected() {
        let store = InMemoryStore::new();
        let ledger = InventoryLedger::new();
        let mut tx = store.begin().await.unwrap();
        ledger.ensure_seeded(&mut tx, &stock("lager", 1)).await.unwrap();

        let item = ItemId::new("lager");
        assert!(matches!(
            ledger.decrement(&mut tx, &item, &bar(), 0).await,
            Err(FulfillmentError::InvalidQuantity(_))
        ));
        assert!(matches!(
            ledger.increment(&mut tx, &item, &bar(), 0).await,
            Err(FulfillmentError::InvalidQuantity(_))
        ));
    }

    #[tokio::test]
    async fn ensure_is_idempotent_and_validates_lengths() {
        let store = InMemoryStore::new();
        let ledger = InventoryLedger::new();
        let item = ItemId::new("cola");
        let locations = [LocationId::new("bar"), LocationId::new("terrace")];

        let mut tx = store.begin().await.unwrap();
        ledger.ensure(&mut tx, &item, &locations, &[10, 4]).await.unwrap();
        ledger.ensure(&mut tx, &item, &locations, &[99, 99]).await.unwrap();
        assert!(matches!(
            ledger.ensure(&mut tx, &item, &locations, &[1]).await,
            Err(FulfillmentError::InvalidQuantity(_))
        ));
        ledger
            .ensure(&mut tx, &ItemId::new("water"), &locations, &[])
            .await
            .unwrap();
        tx.commit().await.unwrap();

        assert_eq!(store.stock_level("cola", "bar").await, Some(10));
        assert_eq!(store.stock_level("cola", "terrace").await, Some(4));
        assert_eq!(store.stock_level("water", "terrace").await, Some(0));
    }

    proptest! {
        #[test]
        fn stock_never_goes_negative(
            initial in 0u32..50,
            requests in proptest::collection::vec(1u32..10, 0..20),
        ) {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .build()
                .unwrap();

            runtime.block_on(async {
                let store = InMemoryStore::new();
                let ledger = InventoryLedger::new();
                let item = ItemId::new("lager");
                let mut tx = store.begin().await.unwrap();
                ledger.ensure_seeded(&mut tx, &stock("lager", initial)).await.unwrap();

                let mut expected = initial;
                for amount in requests {
                    match ledger.decrement(&mut tx, &item, &bar(), amount).await {
                        Ok(remaining) => {
                            prop_assert!(amount <= expected);
                            expected -= amount;
                            prop_assert_eq!(remaining, expected);
                        }
                        Err(FulfillmentError::InsufficientStock { available, .. }) => {
                            prop_assert!(amount > expected);
                            prop_assert_eq!(available, expected);
                        }
                        Err(other) => prop_assert!(false, "unexpected error: {other}"),
                    }
                }
                tx.commit().await.unwrap();
                prop_assert_eq!(store.stock_level("lager", BAR).await, Some(expected));
                Ok(())
            })?;
        }
    }
}
