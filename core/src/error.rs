//! Error types for the fulfillment engine and its stores.

use crate::types::{CredentialId, ItemId, LocationId, OrderId, PassId, TicketId};
use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, FulfillmentError>;

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Errors raised by a [`FulfillmentStore`](crate::store::FulfillmentStore) implementation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Database connection or query failed.
    #[error("Database error: {0}")]
    Database(String),

    /// A row lock could not be acquired within the configured timeout.
    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    /// The transaction lost a serialization race or deadlocked.
    #[error("Transaction conflict: {0}")]
    Conflict(String),

    /// A stored row could not be decoded into a domain value.
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl StoreError {
    /// Returns `true` if the caller may retry the whole operation.
    ///
    /// The engine itself never retries.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout(_) | Self::Conflict(_))
    }
}

/// Error taxonomy surfaced by the engine.
///
/// Every variant raised inside a payment transaction aborts and rolls back that
/// transaction before it reaches the caller.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FulfillmentError {
    // ═══════════════════════════════════════════════════════════
    // Not found
    // ═══════════════════════════════════════════════════════════

    /// Order does not exist.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// Standalone ticket does not exist.
    #[error("Ticket not found: {0}")]
    TicketNotFound(TicketId),

    /// Entrance pass does not exist.
    #[error("Entrance pass not found: {0}")]
    EntrancePassNotFound(PassId),

    /// No counter was ever registered for this (item, location) pair.
    #[error("Stock not tracked for item {item_id} at {location}")]
    StockNotTracked {
        /// Item that was referenced
        item_id: ItemId,
        /// Location that was referenced
        location: LocationId,
    },

    // ═══════════════════════════════════════════════════════════
    // Business rule violations
    // ═══════════════════════════════════════════════════════════

    /// Status transition not permitted from the current state.
    #[error("Invalid {entity} status transition: {from} -> {to}")]
    InvalidStatus {
        /// Entity kind (`order`, `ticket`, `entrance_pass`)
        entity: &'static str,
        /// Current status
        from: String,
        /// Requested status
        to: String,
    },

    /// Ledger guard triggered: not enough units on hand.
    #[error("Insufficient stock for item {item_id} at {location}: requested {requested}, available {available}")]
    InsufficientStock {
        /// Item being decremented
        item_id: ItemId,
        /// Location being decremented
        location: LocationId,
        /// Units requested
        requested: u32,
        /// Units on hand
        available: u32,
    },

    /// Credential issuance attempted without a business object to anchor it.
    #[error("Invalid credential reference")]
    InvalidReference,

    /// Unknown entrance pass type.
    #[error("Invalid pass type: {0}")]
    InvalidType(String),

    /// Zero or otherwise unusable quantity.
    #[error("Invalid quantity: {0}")]
    InvalidQuantity(String),

    // ═══════════════════════════════════════════════════════════
    // Redemption
    // ═══════════════════════════════════════════════════════════

    /// Redemption claim failed (unknown code, wrong signature, already redeemed
    /// or expired). The causes are deliberately indistinguishable.
    #[error("Credential invalid or already used")]
    InvalidOrUsed,

    /// The credential was claimed but the referenced entity could not be updated.
    #[error("Credential {credential_id} redeemed but cascade failed: {reason}")]
    CascadeFailed {
        /// The credential that is now redeemed
        credential_id: CredentialId,
        /// What went wrong with the referenced entity
        reason: String,
    },

    // ═══════════════════════════════════════════════════════════
    // System
    // ═══════════════════════════════════════════════════════════

    /// Store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl FulfillmentError {
    /// Returns `true` if the caller may retry the operation unchanged.
    ///
    /// # Examples
    ///
    /// ```
    /// # use fulfillment_core::error::{FulfillmentError, StoreError};
    /// assert!(FulfillmentError::Store(StoreError::LockTimeout("stock".into())).is_retryable());
    /// assert!(!FulfillmentError::InvalidOrUsed.is_retryable());
    /// ```
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Store(error) => error.is_retryable(),
            _ => false,
        }
    }

    /// Short machine-readable label, used as a metrics dimension.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            Self::OrderNotFound(_) => "order_not_found",
            Self::TicketNotFound(_) => "ticket_not_found",
            Self::EntrancePassNotFound(_) => "entrance_pass_not_found",
            Self::StockNotTracked { .. } => "stock_not_tracked",
            Self::InvalidStatus { .. } => "invalid_status",
            Self::InsufficientStock { .. } => "insufficient_stock",
            Self::InvalidReference => "invalid_reference",
            Self::InvalidType(_) => "invalid_type",
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::InvalidOrUsed => "invalid_or_used",
            Self::CascadeFailed { .. } => "cascade_failed",
            Self::Store(_) => "store",
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn insufficient_stock_display() {
        let error = FulfillmentError::InsufficientStock {
            item_id: ItemId::new("lager"),
            location: LocationId::new("bar"),
            requested: 3,
            available: 1,
        };

        let display = format!("{error}");
        assert!(display.contains("lager"));
        assert!(display.contains("requested 3"));
        assert!(display.contains("available 1"));
    }

    #[test]
    fn invalid_or_used_leaks_no_cause() {
        assert_eq!(
            FulfillmentError::InvalidOrUsed.to_string(),
            "Credential invalid or already used"
        );
    }

    #[test]
    fn store_errors_convert_and_classify() {
        let error: FulfillmentError = StoreError::Conflict("deadlock".into()).into();
        assert!(error.is_retryable());
        assert_eq!(error.label(), "store");
        assert!(!FulfillmentError::from(StoreError::Database("down".into())).is_retryable());
    }
}
