//! Redemption tests: one-time claims, expiry, forged signatures and cascades.

#![allow(clippy::expect_used, clippy::unwrap_used)] // Test code can use unwrap/expect

use chrono::Duration;
use fulfillment_core::environment::Clock;
use fulfillment_core::store::FulfillmentStore;
use fulfillment_core::types::{
    CredentialCode, CredentialState, OrderStatus, PassStatus, Signature, StaffId, TicketStatus,
    UserId,
};
use fulfillment_core::FulfillmentError;
use fulfillment_engine::{EngineConfig, FulfillmentEngine, PaymentReceipt, SigningKey};
use fulfillment_testing::fixtures::{order, stock, ticket};
use fulfillment_testing::{InMemoryStore, MutableClock, test_clock, test_epoch};
use std::sync::Arc;

const SECRET: &str = "redemption-secret";

fn engine_with(
    store: &InMemoryStore,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
) -> FulfillmentEngine<InMemoryStore> {
    FulfillmentEngine::new(store.clone(), clock, config).unwrap()
}

fn config() -> EngineConfig {
    EngineConfig::new(SigningKey::new(SECRET).unwrap())
}

fn engine(store: &InMemoryStore) -> FulfillmentEngine<InMemoryStore> {
    engine_with(store, Arc::new(test_clock()), config())
}

/// Place and pay a one-line order, returning its receipt.
async fn paid_order(engine: &FulfillmentEngine<InMemoryStore>) -> PaymentReceipt {
    engine.register_counter(&stock("lager", 10)).await.unwrap();
    let pending = order(&[("lager", 1)], test_epoch());
    engine.place_order(&pending).await.unwrap();
    engine.pay_order(pending.id, None).await.unwrap()
}

fn staff(name: &str) -> StaffId {
    StaffId::new(name)
}

#[tokio::test]
async fn test_second_scan_is_rejected() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    let receipt = paid_order(&engine).await;
    let code = &receipt.credential.code;
    let signature = &receipt.credential.signature;

    let first = engine.redeem(code, signature, &staff("staff1")).await.unwrap();
    assert_eq!(first.state, CredentialState::Redeemed);
    assert_eq!(first.redeemed_by, Some(staff("staff1")));
    assert_eq!(first.redeemed_at, Some(test_epoch()));

    let second = engine.redeem(code, signature, &staff("staff2")).await;
    assert_eq!(second, Err(FulfillmentError::InvalidOrUsed));

    let info = engine.get_credential_info(code).await.unwrap().unwrap();
    assert_eq!(info.redeemed_by, Some(staff("staff1")));
    assert_eq!(info.state, CredentialState::Redeemed);
}

#[tokio::test]
async fn test_redeeming_order_serves_it() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    let receipt = paid_order(&engine).await;
    let order_id =
        fulfillment_core::types::OrderId::from_uuid(*receipt.credential.reference_id.as_uuid());

    engine
        .redeem(&receipt.credential.code, &receipt.credential.signature, &staff("bar-1"))
        .await
        .unwrap();

    assert_eq!(store.order(order_id).await.unwrap().status, OrderStatus::Served);
}

#[tokio::test]
async fn test_ready_order_can_be_served() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    let receipt = paid_order(&engine).await;
    let order_id =
        fulfillment_core::types::OrderId::from_uuid(*receipt.credential.reference_id.as_uuid());

    engine.mark_order_ready(order_id).await.unwrap();
    engine
        .redeem(&receipt.credential.code, &receipt.credential.signature, &staff("bar-1"))
        .await
        .unwrap();

    assert_eq!(store.order(order_id).await.unwrap().status, OrderStatus::Served);
}

#[tokio::test]
async fn test_redeeming_ticket_marks_it_redeemed() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    engine.register_counter(&stock("hotdog", 3)).await.unwrap();
    let issued = ticket(&[("hotdog", 1)], test_epoch());
    engine.issue_ticket(&issued).await.unwrap();
    let receipt = engine.pay_ticket(issued.id, None).await.unwrap();

    engine
        .redeem(&receipt.credential.code, &receipt.credential.signature, &staff("grill"))
        .await
        .unwrap();

    assert_eq!(store.ticket(issued.id).await.unwrap().status, TicketStatus::Redeemed);
}

#[tokio::test]
async fn test_redeeming_pass_marks_it_used() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    let batch = engine
        .pay_entrance_passes(UserId::new(), "day", 1)
        .await
        .unwrap();
    let issued = &batch.issued[0];

    engine
        .redeem(&issued.credential.code, &issued.credential.signature, &staff("door"))
        .await
        .unwrap();

    let pass = store.entrance_pass(issued.pass.id).await.unwrap();
    assert_eq!(pass.status, PassStatus::Used);
    assert_eq!(pass.used_by, Some(staff("door")));
    assert_eq!(pass.used_at, Some(test_epoch()));
}

#[tokio::test]
async fn test_concurrent_scans_claim_once() {
    let store = InMemoryStore::new();
    let engine = Arc::new(engine(&store));
    let receipt = paid_order(&engine).await;

    let mut handles = Vec::new();
    for i in 0..32 {
        let engine = Arc::clone(&engine);
        let code = receipt.credential.code.clone();
        let signature = receipt.credential.signature.clone();
        handles.push(tokio::spawn(async move {
            engine
                .redeem(&code, &signature, &StaffId::new(format!("staff{i}")))
                .await
        }));
    }

    let results = futures::future::join_all(handles).await;
    let successes = results
        .iter()
        .filter(|result| matches!(result, Ok(Ok(_))))
        .count();
    let rejected = results
        .iter()
        .filter(|result| matches!(result, Ok(Err(FulfillmentError::InvalidOrUsed))))
        .count();

    assert_eq!(successes, 1);
    assert_eq!(rejected, 31);
}

#[tokio::test]
async fn test_zero_ttl_is_expired_but_stays_active() {
    let store = InMemoryStore::new();
    let engine = engine_with(
        &store,
        Arc::new(test_clock()),
        config().with_default_ttl(Some(Duration::zero())),
    );
    let receipt = paid_order(&engine).await;
    let code = &receipt.credential.code;

    let result = engine
        .redeem(code, &receipt.credential.signature, &staff("staff1"))
        .await;
    assert_eq!(result, Err(FulfillmentError::InvalidOrUsed));

    let stored = store.find_credential(code).await.unwrap().unwrap();
    assert_eq!(stored.state, CredentialState::Active);
    assert!(stored.redeemed_by.is_none());

    let info = engine.get_credential_info(code).await.unwrap().unwrap();
    assert_eq!(info.state, CredentialState::Expired);
}

#[tokio::test]
async fn test_credential_expires_with_time() {
    let store = InMemoryStore::new();
    let clock = MutableClock::new(test_epoch());
    let engine = engine_with(
        &store,
        Arc::new(clock.clone()),
        config().with_default_ttl(Some(Duration::minutes(10))),
    );
    let first = paid_order(&engine).await;
    let second = {
        let pending = order(&[("lager", 1)], test_epoch());
        engine.place_order(&pending).await.unwrap();
        engine.pay_order(pending.id, None).await.unwrap()
    };

    clock.advance(Duration::minutes(9));
    engine
        .redeem(&first.credential.code, &first.credential.signature, &staff("s"))
        .await
        .unwrap();

    clock.advance(Duration::minutes(1));
    assert_eq!(
        engine
            .redeem(&second.credential.code, &second.credential.signature, &staff("s"))
            .await,
        Err(FulfillmentError::InvalidOrUsed)
    );
}

#[tokio::test]
async fn test_forged_signature_is_rejected_without_claim() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    let receipt = paid_order(&engine).await;
    let code = &receipt.credential.code;

    let result = engine
        .redeem(code, &Signature::new("AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"), &staff("s"))
        .await;

    assert_eq!(result, Err(FulfillmentError::InvalidOrUsed));
    let stored = store.find_credential(code).await.unwrap().unwrap();
    assert_eq!(stored.state, CredentialState::Active);

    // The genuine signature still works.
    engine
        .redeem(code, &receipt.credential.signature, &staff("s"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_forged_signature_rejected_by_claim_filter() {
    let store = InMemoryStore::new();
    let engine = engine_with(
        &store,
        Arc::new(test_clock()),
        config().with_verify_signatures(false),
    );
    let receipt = paid_order(&engine).await;

    let result = engine
        .redeem(&receipt.credential.code, &Signature::new("forged"), &staff("s"))
        .await;

    assert_eq!(result, Err(FulfillmentError::InvalidOrUsed));
    let stored = store
        .find_credential(&receipt.credential.code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.state, CredentialState::Active);
}

#[tokio::test]
async fn test_rotated_key_invalidates_outstanding_credentials() {
    let store = InMemoryStore::new();
    let receipt = paid_order(&engine(&store)).await;

    let rotated = engine_with(
        &store,
        Arc::new(test_clock()),
        EngineConfig::new(SigningKey::new("rotated-secret").unwrap()),
    );

    assert_eq!(
        rotated
            .redeem(&receipt.credential.code, &receipt.credential.signature, &staff("s"))
            .await,
        Err(FulfillmentError::InvalidOrUsed)
    );
}

#[tokio::test]
async fn test_unknown_code_is_rejected() {
    let store = InMemoryStore::new();
    let engine = engine_with(
        &store,
        Arc::new(test_clock()),
        config().with_verify_signatures(false),
    );

    assert_eq!(
        engine
            .redeem(&CredentialCode::new("nope"), &Signature::new("nope"), &staff("s"))
            .await,
        Err(FulfillmentError::InvalidOrUsed)
    );
    assert!(
        engine
            .get_credential_info(&CredentialCode::new("nope"))
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn test_cancelled_pass_reports_cascade_failure() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    let batch = engine
        .pay_entrance_passes(UserId::new(), "weekend", 1)
        .await
        .unwrap();
    let issued = &batch.issued[0];
    engine.cancel_entrance_pass(issued.pass.id).await.unwrap();

    let result = engine
        .redeem(&issued.credential.code, &issued.credential.signature, &staff("door"))
        .await;

    assert!(matches!(
        result,
        Err(FulfillmentError::CascadeFailed { credential_id, .. })
            if credential_id == issued.credential.id
    ));
    let info = engine
        .get_credential_info(&issued.credential.code)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(info.state, CredentialState::Redeemed);
    assert_eq!(
        store.entrance_pass(issued.pass.id).await.unwrap().status,
        PassStatus::Cancelled
    );
}

#[tokio::test]
async fn test_cancelled_order_reports_cascade_failure() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    let receipt = paid_order(&engine).await;
    let order_id =
        fulfillment_core::types::OrderId::from_uuid(*receipt.credential.reference_id.as_uuid());
    engine.cancel_order(order_id).await.unwrap();

    let result = engine
        .redeem(&receipt.credential.code, &receipt.credential.signature, &staff("bar"))
        .await;

    assert!(matches!(result, Err(FulfillmentError::CascadeFailed { .. })));
    assert_eq!(store.order(order_id).await.unwrap().status, OrderStatus::Cancelled);
}

#[tokio::test]
async fn test_redeem_scanned_payload() {
    let store = InMemoryStore::new();
    let engine = engine(&store);
    let receipt = paid_order(&engine).await;
    let scanned = String::from_utf8(receipt.rendered_code.payload.clone()).unwrap();

    assert_eq!(
        engine.redeem_scan("garbage", &staff("s")).await,
        Err(FulfillmentError::InvalidOrUsed)
    );
    let credential = engine.redeem_scan(&scanned, &staff("s")).await.unwrap();
    assert_eq!(credential.id, receipt.credential.id);
}
