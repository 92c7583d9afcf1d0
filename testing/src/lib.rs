//! # Fulfillment Testing
//!
//! Testing utilities for the venue fulfillment engine.
//!
//! This crate provides:
//! - [`InMemoryStore`]: a serializable in-memory [`FulfillmentStore`] with fault injection
//! - [`FixedClock`] / [`MutableClock`]: deterministic time
//! - [`fixtures`]: small builders for orders, tickets and stock seeds
//!
//! ## Example
//!
//! ```ignore
//! use fulfillment_testing::{InMemoryStore, test_clock};
//!
//! #[tokio::test]
//! async fn pays_an_order() {
//!     let store = InMemoryStore::new();
//!     let engine = FulfillmentEngine::new(store.clone(), Arc::new(test_clock()), config);
//!     // ...
//! }
//! ```
//!
//! [`FulfillmentStore`]: fulfillment_core::store::FulfillmentStore

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use chrono::{DateTime, Utc};
use fulfillment_core::environment::Clock;

pub mod memory_store;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use fulfillment_testing::mocks::FixedClock;
    /// use fulfillment_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// let time2 = clock.now();
    /// assert_eq!(time1, time2); // Always the same!
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Clock that only moves when a test advances it.
    ///
    /// Clones share the same instant, so a test can keep a handle while the engine
    /// owns another.
    #[derive(Debug, Clone)]
    pub struct MutableClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl MutableClock {
        /// Create a clock starting at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward by `by`
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }
    }

    impl Clock for MutableClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    /// The instant [`test_clock`] is pinned to.
    #[must_use]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }
}

/// Builders for common test records.
pub mod fixtures {
    use super::{DateTime, Utc};
    use fulfillment_core::types::{
        InventoryCount, LineItem, Money, Order, StandaloneTicket,
    };

    /// Default location used by fixtures.
    pub const BAR: &str = "bar";

    /// Line item priced at 5.00 per unit.
    #[must_use]
    pub fn line(item: &str, quantity: u32) -> LineItem {
        LineItem::new(item, quantity, Money::from_cents(500))
    }

    /// Pending order at [`BAR`] with the given `(item, quantity)` lines.
    #[must_use]
    pub fn order(lines: &[(&str, u32)], now: DateTime<Utc>) -> Order {
        Order::new(
            BAR,
            lines.iter().map(|(item, qty)| line(item, *qty)).collect(),
            now,
        )
    }

    /// Issued standalone ticket at [`BAR`] with the given `(item, quantity)` lines.
    #[must_use]
    pub fn ticket(lines: &[(&str, u32)], now: DateTime<Utc>) -> StandaloneTicket {
        StandaloneTicket::new(
            BAR,
            lines.iter().map(|(item, qty)| line(item, *qty)).collect(),
            now,
        )
    }

    /// Stock seed at [`BAR`].
    #[must_use]
    pub fn stock(item: &str, quantity: u32) -> InventoryCount {
        InventoryCount::new(item, BAR, quantity)
    }
}

// Re-export commonly used items
pub use memory_store::{InMemoryStore, InMemoryTransaction};
pub use mocks::{FixedClock, MutableClock, test_clock, test_epoch};

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        let time1 = clock.now();
        let time2 = clock.now();
        assert_eq!(time1, time2);
        assert_eq!(time1.to_rfc3339(), "2025-01-01T00:00:00+00:00");
    }

    #[test]
    fn mutable_clock_clones_share_time() {
        let clock = MutableClock::new(test_epoch());
        let handle = clock.clone();
        handle.advance(chrono::Duration::minutes(5));
        assert_eq!(clock.now(), test_epoch() + chrono::Duration::minutes(5));
    }
}
