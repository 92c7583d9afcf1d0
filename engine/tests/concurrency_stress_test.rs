//! Concurrency stress tests for scarce-stock scenarios.
//!
//! Many payments race for fewer units than they need; the ledger must never go
//! negative and exactly the coverable payments must succeed.
//!
//! Run with: `cargo test --test concurrency_stress_test -- --nocapture`

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use fulfillment_core::FulfillmentError;
use fulfillment_core::types::{OrderId, OrderStatus};
use fulfillment_engine::{EngineConfig, FulfillmentEngine, SigningKey};
use fulfillment_testing::fixtures::{BAR, order, stock};
use fulfillment_testing::{InMemoryStore, test_clock, test_epoch};
use std::sync::Arc;

fn engine(store: &InMemoryStore) -> Arc<FulfillmentEngine<InMemoryStore>> {
    let config = EngineConfig::new(SigningKey::new("stress-secret").unwrap());
    Arc::new(FulfillmentEngine::new(store.clone(), Arc::new(test_clock()), config).unwrap())
}

async fn race(
    engine: &Arc<FulfillmentEngine<InMemoryStore>>,
    order_ids: Vec<OrderId>,
) -> (usize, usize) {
    let handles: Vec<_> = order_ids
        .into_iter()
        .map(|order_id| {
            let engine = Arc::clone(engine);
            tokio::spawn(async move { engine.pay_order(order_id, None).await })
        })
        .collect();

    let mut paid = 0;
    let mut insufficient = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => paid += 1,
            Err(FulfillmentError::InsufficientStock { .. }) => insufficient += 1,
            Err(other) => unreachable!("unexpected error: {other}"),
        }
    }
    (paid, insufficient)
}

/// 100 single-unit orders for 10 units.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_last_units_concurrency_100_requests() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    engine.register_counter(&stock("lager", 10)).await.unwrap();

    let mut order_ids = Vec::new();
    for _ in 0..100 {
        let pending = order(&[("lager", 1)], test_epoch());
        engine.place_order(&pending).await.unwrap();
        order_ids.push(pending.id);
    }

    let (paid, insufficient) = race(&engine, order_ids.clone()).await;

    assert_eq!(paid, 10);
    assert_eq!(insufficient, 90);
    assert_eq!(store.stock_level("lager", BAR).await, Some(0));
    assert_eq!(store.credential_count().await, 10);

    let mut paid_orders = 0;
    for id in order_ids {
        if store.order(id).await.unwrap().status == OrderStatus::Paid {
            paid_orders += 1;
        }
    }
    assert_eq!(paid_orders, 10);
}

/// Multi-item orders listing their lines in opposite orders still settle cleanly.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_multi_item_orders_in_opposite_line_order() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    engine.register_counter(&stock("burger", 6)).await.unwrap();
    engine.register_counter(&stock("fries", 6)).await.unwrap();

    let mut order_ids = Vec::new();
    for i in 0..20 {
        let lines: &[(&str, u32)] = if i % 2 == 0 {
            &[("burger", 1), ("fries", 1)]
        } else {
            &[("fries", 1), ("burger", 1)]
        };
        let pending = order(lines, test_epoch());
        engine.place_order(&pending).await.unwrap();
        order_ids.push(pending.id);
    }

    let (paid, insufficient) = race(&engine, order_ids).await;

    assert_eq!(paid, 6);
    assert_eq!(insufficient, 14);
    assert_eq!(store.stock_level("burger", BAR).await, Some(0));
    assert_eq!(store.stock_level("fries", BAR).await, Some(0));
}
