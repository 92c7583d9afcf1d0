//! # Fulfillment Engine
//!
//! Turns a payment event into a committed fulfillment obligation and lets venue staff
//! discharge it exactly once.
//!
//! ## Components
//!
//! - [`InventoryLedger`](ledger::InventoryLedger): per-(item, location) counters with a
//!   conditional decrement that can never go negative
//! - [`CredentialIssuer`](issuer::CredentialIssuer): random codes signed with
//!   HMAC-SHA256, persisted with an optional TTL
//! - [`RedemptionMachine`](redemption::RedemptionMachine): atomic `active → redeemed`
//!   claim followed by a cascade on the referenced order, ticket or pass
//! - [`FulfillmentOrchestrator`](orchestrator::FulfillmentOrchestrator): the
//!   all-or-nothing payment unit of work
//! - [`FulfillmentEngine`]: facade over all of the above
//!
//! ## Payment flow
//!
//! ```text
//! begin ─► load order (locked) ─► status == pending? ─► decrement each line
//!                                                            │
//!        commit ◄─ attach credential ◄─ issue credential ◄─ set paid
//! ```
//!
//! Any error between `begin` and `commit` drops the transaction, which rolls back
//! every decrement and the status flip.
//!
//! ## Example
//!
//! ```ignore
//! use fulfillment_engine::{EngineConfig, FulfillmentEngine, SigningKey};
//! use fulfillment_core::SystemClock;
//! use std::sync::Arc;
//!
//! let config = EngineConfig::new(SigningKey::new("venue-secret")?);
//! let engine = FulfillmentEngine::new(store, Arc::new(SystemClock), config)?;
//! let receipt = engine.pay_order(order_id, None).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod engine;
pub mod issuer;
pub mod ledger;
mod lifecycle;
pub mod metrics;
pub mod orchestrator;
pub mod passes;
pub mod redemption;
pub mod render;
pub mod signing;

pub use config::{ConfigError, DEFAULT_MAX_PASSES_PER_PURCHASE, EngineConfig, SigningKey};
pub use engine::{CredentialInfo, FulfillmentEngine};
pub use orchestrator::{IssuedPass, PassBatch, PaymentReceipt};
pub use passes::{PassCatalog, PassType};
pub use redemption::Cascade;
pub use render::{CodeRenderer, CompactPayloadRenderer, RenderedCode};
