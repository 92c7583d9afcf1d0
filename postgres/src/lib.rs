//! `PostgreSQL` store for the venue fulfillment engine.
//!
//! Implements [`FulfillmentStore`](fulfillment_core::store::FulfillmentStore) on top of
//! a sqlx connection pool:
//!
//! - Row locks (`SELECT ... FOR UPDATE`) for order, ticket and pass transitions
//! - Conditional `UPDATE ... RETURNING` for stock decrements and credential claims
//! - A per-transaction `lock_timeout`
//! - Bundled schema migrations
//!
//! # Example
//!
//! ```ignore
//! use fulfillment_postgres::PostgresStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresStore::new("postgres://localhost/venue").await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod store;

pub use store::{DEFAULT_LOCK_TIMEOUT, PostgresStore, PostgresTransaction};
