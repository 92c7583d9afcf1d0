//! Venue Fulfillment Demo
//!
//! Walks through the payment-to-fulfillment flow against a live database:
//! - Stock registration at the bar
//! - Order payment (stock decrement + credential issuance)
//! - Staff redemption and a rejected second scan
//! - Refused payment on insufficient stock
//! - Entrance pass purchase and gate scan
//!
//! # Usage
//!
//! ```bash
//! # Start PostgreSQL
//! docker run -d -p 5432:5432 -e POSTGRES_PASSWORD=postgres -e POSTGRES_DB=venue postgres:16
//!
//! # Run demo
//! CREDENTIAL_SIGNING_SECRET=dev-secret cargo run -p venue --bin demo
//! ```

use chrono::Utc;
use fulfillment_core::types::{
    InventoryCount, LineItem, Money, Order, PaymentMethod, StaffId, UserId,
};
use venue::{Config, VenueApp, init_tracing};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    init_tracing(&config.server.log_level);

    println!("\n============================================");
    println!("   Venue Fulfillment - Live Demo");
    println!("============================================\n");

    println!("Initializing application...");
    let app = VenueApp::new(config).await?;
    let engine = app.engine();
    println!("Application ready\n");

    // ========== Stock ==========

    // Fresh location per run so reruns start from known stock.
    let location = format!("bar-{}", Utc::now().timestamp());
    let bar = location.as_str();
    println!("Registering stock at {bar}...");
    engine
        .register_counter(&InventoryCount::new("lager", bar, 5).with_threshold(2))
        .await?;
    engine.register_counter(&InventoryCount::new("crisps", bar, 1)).await?;
    for count in engine.list_stock().await?.iter().filter(|c| c.location.as_str() == bar) {
        println!("  {} @ {}: {}", count.item_id, count.location, count.quantity);
    }

    // ========== Order payment ==========

    println!("\nPaying an order for 2 lager + 1 crisps...");
    let order = Order::new(
        bar,
        vec![
            LineItem::new("lager", 2, Money::from_cents(650)),
            LineItem::new("crisps", 1, Money::from_cents(200)),
        ],
        Utc::now(),
    );
    engine.place_order(&order).await?;
    let receipt = engine
        .pay_order(order.id, Some(PaymentMethod::Card { last_four: "4242".into() }))
        .await?;
    println!("  Credential issued: {}", receipt.credential.code);

    // ========== Redemption ==========

    let scanned = String::from_utf8_lossy(&receipt.rendered_code.payload).into_owned();
    let staff = StaffId::new("bartender-1");

    println!("\nScanning the order code at the bar...");
    let redeemed = engine.redeem_scan(&scanned, &staff).await?;
    println!("  Redeemed by {:?} at {:?}", redeemed.redeemed_by, redeemed.redeemed_at);

    println!("Scanning the same code again...");
    match engine.redeem_scan(&scanned, &staff).await {
        Ok(_) => println!("  Unexpectedly accepted"),
        Err(error) => println!("  Rejected: {error}"),
    }

    if let Some(served) = engine.get_order(order.id).await? {
        println!("  Order status: {}", served.status);
    }

    // ========== Insufficient stock ==========

    println!("\nPaying an order for more crisps than remain...");
    let greedy = Order::new(
        bar,
        vec![
            LineItem::new("lager", 1, Money::from_cents(650)),
            LineItem::new("crisps", 1, Money::from_cents(200)),
        ],
        Utc::now(),
    );
    engine.place_order(&greedy).await?;
    match engine.pay_order(greedy.id, Some(PaymentMethod::Cash)).await {
        Ok(_) => println!("  Unexpectedly paid"),
        Err(error) => println!("  Refused: {error}"),
    }
    for count in engine.list_stock().await?.iter().filter(|c| c.location.as_str() == bar) {
        println!("  {} @ {}: {}", count.item_id, count.location, count.quantity);
    }

    // ========== Entrance passes ==========

    println!("\nBuying two day passes...");
    let batch = engine.pay_entrance_passes(UserId::new(), "day", 2).await?;
    for issued in &batch.issued {
        println!(
            "  Pass {} valid until {}",
            issued.pass.id, issued.pass.valid_until
        );
    }

    if let Some(first) = batch.issued.first() {
        println!("Scanning the first pass at the gate...");
        engine
            .redeem(
                &first.credential.code,
                &first.credential.signature,
                &StaffId::new("gate-1"),
            )
            .await?;
        if let Some(pass) = engine.get_entrance_pass(first.pass.id).await? {
            println!("  Pass status: {}", pass.status);
        }
    }

    // ========== Metrics ==========

    if let Some(rendered) = app.render_metrics() {
        println!("\nMetrics snapshot:");
        for line in rendered
            .lines()
            .filter(|line| line.starts_with("fulfillment_") && !line.contains("_bucket"))
        {
            println!("  {line}");
        }
    }

    println!("\n============================================");
    println!("   Demo complete");
    println!("============================================\n");

    Ok(())
}
