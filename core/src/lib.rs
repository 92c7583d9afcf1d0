//! # Fulfillment Core
//!
//! Domain types, error taxonomy and store traits for the venue payment-to-fulfillment
//! engine.
//!
//! A paid order, standalone ticket or entrance pass must produce exactly one inventory
//! deduction and exactly one credential, and that credential must be redeemable exactly
//! once. This crate holds the vocabulary shared by every layer:
//!
//! - **[`types`]**: identifiers, money, orders/tickets/passes, inventory counters, credentials
//! - **[`error`]**: [`FulfillmentError`] (what callers see) and [`StoreError`] (what stores raise)
//! - **[`store`]**: [`FulfillmentStore`] / [`StoreTransaction`], the only path to persistence
//! - **[`environment`]**: [`Clock`], injected so expiry is testable
//!
//! ## Architecture Principles
//!
//! - No I/O in this crate; stores and the engine live downstream
//! - Consistency is delegated to store transactions plus two atomic conditional writes
//!   (stock decrement and credential claim)
//! - Expiry is a read-time predicate, never a stored transition

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod environment;
pub mod error;
pub mod store;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use environment::{Clock, SystemClock};
pub use error::{FulfillmentError, Result, StoreError, StoreResult};
pub use store::{FulfillmentStore, StoreTransaction};
pub use types::*;
