//! Administrative operations: intake, preparation, cancellation and restocking.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use fulfillment_core::types::{
    InventoryCount, ItemId, LineItem, LocationId, Money, Order, OrderStatus, PassStatus,
    PaymentMethod, UserId,
};
use fulfillment_core::FulfillmentError;
use fulfillment_engine::{EngineConfig, FulfillmentEngine, SigningKey};
use fulfillment_testing::fixtures::{BAR, order, stock, ticket};
use fulfillment_testing::{InMemoryStore, test_clock, test_epoch};
use std::sync::Arc;

fn engine(store: &InMemoryStore) -> FulfillmentEngine<InMemoryStore> {
    let config = EngineConfig::new(SigningKey::new("lifecycle-secret").unwrap());
    FulfillmentEngine::new(store.clone(), Arc::new(test_clock()), config).unwrap()
}

#[tokio::test]
async fn test_cancel_paid_order_restocks() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    engine.register_counter(&stock("lager", 5)).await.unwrap();
    engine.register_counter(&stock("crisps", 5)).await.unwrap();

    let pending = order(&[("lager", 2), ("crisps", 3)], test_epoch());
    engine.place_order(&pending).await.unwrap();
    engine.pay_order(pending.id, Some(PaymentMethod::Cash)).await.unwrap();
    assert_eq!(store.stock_level("lager", BAR).await, Some(3));

    let cancelled = engine.cancel_order(pending.id).await.unwrap();

    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(store.stock_level("lager", BAR).await, Some(5));
    assert_eq!(store.stock_level("crisps", BAR).await, Some(5));
}

#[tokio::test]
async fn test_cancel_pending_order_leaves_stock() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    engine.register_counter(&stock("lager", 5)).await.unwrap();

    let pending = order(&[("lager", 2)], test_epoch());
    engine.place_order(&pending).await.unwrap();
    engine.cancel_order(pending.id).await.unwrap();

    assert_eq!(store.stock_level("lager", BAR).await, Some(5));
    assert!(matches!(
        engine.pay_order(pending.id, None).await,
        Err(FulfillmentError::InvalidStatus { .. })
    ));
}

#[tokio::test]
async fn test_served_order_cannot_be_cancelled() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    engine.register_counter(&stock("lager", 5)).await.unwrap();

    let pending = order(&[("lager", 1)], test_epoch());
    engine.place_order(&pending).await.unwrap();
    let receipt = engine.pay_order(pending.id, None).await.unwrap();
    engine
        .redeem(
            &receipt.credential.code,
            &receipt.credential.signature,
            &"staff1".into(),
        )
        .await
        .unwrap();

    assert!(matches!(
        engine.cancel_order(pending.id).await,
        Err(FulfillmentError::InvalidStatus { entity: "order", .. })
    ));
    assert_eq!(store.stock_level("lager", BAR).await, Some(4));
}

#[tokio::test]
async fn test_mark_ready_requires_paid() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    engine.register_counter(&stock("lager", 5)).await.unwrap();

    let pending = order(&[("lager", 1)], test_epoch());
    engine.place_order(&pending).await.unwrap();

    assert!(matches!(
        engine.mark_order_ready(pending.id).await,
        Err(FulfillmentError::InvalidStatus { .. })
    ));

    engine.pay_order(pending.id, None).await.unwrap();
    let ready = engine.mark_order_ready(pending.id).await.unwrap();
    assert_eq!(ready.status, OrderStatus::Ready);
    assert_eq!(
        engine.get_order(pending.id).await.unwrap().unwrap().status,
        OrderStatus::Ready
    );
}

#[tokio::test]
async fn test_place_order_validation() {
    let store = InMemoryStore::new();
    let engine = engine(&store);

    let mut paid = order(&[("lager", 1)], test_epoch());
    paid.status = OrderStatus::Paid;
    assert!(matches!(
        engine.place_order(&paid).await,
        Err(FulfillmentError::InvalidStatus { .. })
    ));

    let empty_line = Order::new(
        BAR,
        vec![LineItem::new("lager", 0, Money::from_cents(500))],
        test_epoch(),
    );
    assert!(matches!(
        engine.place_order(&empty_line).await,
        Err(FulfillmentError::InvalidQuantity(_))
    ));

    let pending = order(&[("lager", 1)], test_epoch());
    engine.place_order(&pending).await.unwrap();
    assert!(matches!(
        engine.place_order(&pending).await,
        Err(FulfillmentError::Store(_))
    ));
}

#[tokio::test]
async fn test_intake_requires_line_items() {
    let store = InMemoryStore::new();
    let engine = engine(&store);

    assert!(matches!(
        engine.place_order(&order(&[], test_epoch())).await,
        Err(FulfillmentError::InvalidQuantity(_))
    ));
    assert!(matches!(
        engine.issue_ticket(&ticket(&[], test_epoch())).await,
        Err(FulfillmentError::InvalidQuantity(_))
    ));
}

#[tokio::test]
async fn test_cancel_entrance_pass_once() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    let batch = engine
        .pay_entrance_passes(UserId::new(), "season", 1)
        .await
        .unwrap();
    let pass_id = batch.issued[0].pass.id;

    let cancelled = engine.cancel_entrance_pass(pass_id).await.unwrap();
    assert_eq!(cancelled.status, PassStatus::Cancelled);
    assert!(matches!(
        engine.cancel_entrance_pass(pass_id).await,
        Err(FulfillmentError::InvalidStatus { entity: "entrance_pass", .. })
    ));
    assert_eq!(
        engine.get_entrance_pass(pass_id).await.unwrap().unwrap().status,
        PassStatus::Cancelled
    );
}

#[tokio::test]
async fn test_restock() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    let lager = ItemId::new("lager");
    let bar = LocationId::new(BAR);

    assert!(matches!(
        engine.restock(&lager, &bar, 10).await,
        Err(FulfillmentError::StockNotTracked { .. })
    ));

    engine.register_item(&lager, &[bar.clone()], &[]).await.unwrap();
    assert_eq!(engine.restock(&lager, &bar, 10).await, Ok(10));
    assert_eq!(engine.restock(&lager, &bar, 2).await, Ok(12));
    assert!(matches!(
        engine.restock(&lager, &bar, 0).await,
        Err(FulfillmentError::InvalidQuantity(_))
    ));
}

#[tokio::test]
async fn test_register_item_keeps_existing_counts() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    engine
        .register_counter(&InventoryCount::new("cola", BAR, 3).with_threshold(1))
        .await
        .unwrap();

    engine
        .register_item(&"cola".into(), &[BAR.into()], &[50])
        .await
        .unwrap();

    let listed = engine.list_stock().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].quantity, 3);
    assert_eq!(listed[0].threshold, Some(1));

    assert!(matches!(
        engine
            .register_item(&"cola".into(), &[BAR.into(), "terrace".into()], &[1])
            .await,
        Err(FulfillmentError::InvalidQuantity(_))
    ));
}
