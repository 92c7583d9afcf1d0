//! Store traits for the fulfillment engine.
//!
//! The engine never talks to a database directly. It opens a [`StoreTransaction`]
//! from a [`FulfillmentStore`], performs every write of one unit of work through it,
//! and either commits or drops it. Dropping a transaction without committing rolls
//! back every write made through it.
//!
//! # Implementations
//!
//! - `PostgresStore` (in `fulfillment-postgres` crate): Production implementation
//! - `InMemoryStore` (in `fulfillment-testing` crate): Fast, deterministic testing
//!
//! # Isolation requirements
//!
//! 1. **Conditional stock writes**: [`StoreTransaction::decrement_stock`] must check and
//!    write in one step so two transactions can never both observe sufficient stock.
//! 2. **Row locks**: loading an order, ticket or pass inside a transaction must prevent a
//!    concurrent transaction from acting on the same row until commit/rollback.
//! 3. **Atomic claim**: [`FulfillmentStore::claim_credential`] must be a single
//!    filter-and-set; of N concurrent claims for one credential at most one succeeds.

use crate::error::StoreResult;
use crate::types::{
    Credential, CredentialClaim, CredentialCode, CredentialId, EntrancePass, InventoryCount,
    ItemId, LocationId, Order, OrderId, PassId, StandaloneTicket, StockUpdate, TicketId,
};
use std::future::Future;

/// One unit of work against the store.
///
/// All methods take `&mut self` so a transaction is used by exactly one task at a time.
pub trait StoreTransaction: Send {
    /// Load an order, locking it for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn load_order(
        &mut self,
        id: OrderId,
    ) -> impl Future<Output = StoreResult<Option<Order>>> + Send;

    /// Persist a new order.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails or the id already exists.
    fn insert_order(&mut self, order: &Order) -> impl Future<Output = StoreResult<()>> + Send;

    /// Write an order's mutable fields (status, credential, payment).
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails or the order does not exist.
    fn update_order(&mut self, order: &Order) -> impl Future<Output = StoreResult<()>> + Send;

    /// Load a standalone ticket, locking it for the rest of the transaction.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn load_ticket(
        &mut self,
        id: TicketId,
    ) -> impl Future<Output = StoreResult<Option<StandaloneTicket>>> + Send;

    /// Persist a new standalone ticket.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails or the id already exists.
    fn insert_ticket(
        &mut self,
        ticket: &StandaloneTicket,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Write a ticket's mutable fields (status, credential, payment).
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails or the ticket does not exist.
    fn update_ticket(
        &mut self,
        ticket: &StandaloneTicket,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Load an entrance pass by id, locking it.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn load_entrance_pass(
        &mut self,
        id: PassId,
    ) -> impl Future<Output = StoreResult<Option<EntrancePass>>> + Send;

    /// Load the entrance pass that owns `credential_id`, locking it.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn load_entrance_pass_by_credential(
        &mut self,
        credential_id: CredentialId,
    ) -> impl Future<Output = StoreResult<Option<EntrancePass>>> + Send;

    /// Persist a new entrance pass.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails or the id already exists.
    fn insert_entrance_pass(
        &mut self,
        pass: &EntrancePass,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Write a pass's mutable fields (status, usage).
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails or the pass does not exist.
    fn update_entrance_pass(
        &mut self,
        pass: &EntrancePass,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Subtract `amount` from a counter if and only if it holds at least `amount`.
    ///
    /// Check and write are a single conditional update; the counter is never
    /// read-then-blind-written.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails. Insufficient or untracked stock
    /// is reported through [`StockUpdate`], not as an error.
    fn decrement_stock(
        &mut self,
        item_id: &ItemId,
        location: &LocationId,
        amount: u32,
    ) -> impl Future<Output = StoreResult<StockUpdate>> + Send;

    /// Add `amount` to an existing counter.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails or the counter would overflow.
    fn increment_stock(
        &mut self,
        item_id: &ItemId,
        location: &LocationId,
        amount: u32,
    ) -> impl Future<Output = StoreResult<StockUpdate>> + Send;

    /// Create the counter described by `seed` unless one already exists.
    ///
    /// # Returns
    ///
    /// `true` if a counter was created, `false` if it already existed (left untouched).
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn ensure_stock(
        &mut self,
        seed: &InventoryCount,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// Persist a newly issued credential.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails or the code is already taken.
    fn insert_credential(
        &mut self,
        credential: &Credential,
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// Make every write of this transaction durable.
    ///
    /// # Errors
    ///
    /// Returns error if the commit fails; nothing was applied in that case.
    fn commit(self) -> impl Future<Output = StoreResult<()>> + Send;

    /// Discard every write of this transaction.
    ///
    /// Equivalent to dropping the transaction, but reports backend errors.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails while rolling back.
    fn rollback(self) -> impl Future<Output = StoreResult<()>> + Send;
}

/// Shared transactional store.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` so one store can serve many concurrent
/// payment and scan tasks.
pub trait FulfillmentStore: Send + Sync + 'static {
    /// Transaction handle produced by [`FulfillmentStore::begin`].
    type Transaction: StoreTransaction + 'static;

    /// Open a transactional scope.
    ///
    /// # Errors
    ///
    /// Returns error if no connection is available or the backend refuses the transaction.
    fn begin(&self) -> impl Future<Output = StoreResult<Self::Transaction>> + Send;

    /// Atomically move a credential from `active` to `redeemed`.
    ///
    /// The write applies only when the stored credential matches `claim.code` and
    /// `claim.signature`, is `active`, and has no expiry or `expires_at > claim.at`.
    /// It sets `redeemed_at = claim.at` and `redeemed_by = claim.staff_id`.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(credential))`: this caller won the claim; the redeemed record
    /// - `Ok(None)`: no row matched the filter
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn claim_credential(
        &self,
        claim: &CredentialClaim,
    ) -> impl Future<Output = StoreResult<Option<Credential>>> + Send;

    /// Read-only lookup of a credential by code.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn find_credential(
        &self,
        code: &CredentialCode,
    ) -> impl Future<Output = StoreResult<Option<Credential>>> + Send;

    /// Read-only lookup of an order. Takes no row lock.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn find_order(&self, id: OrderId) -> impl Future<Output = StoreResult<Option<Order>>> + Send;

    /// Read-only lookup of a standalone ticket. Takes no row lock.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn find_ticket(
        &self,
        id: TicketId,
    ) -> impl Future<Output = StoreResult<Option<StandaloneTicket>>> + Send;

    /// Read-only lookup of an entrance pass. Takes no row lock.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn find_entrance_pass(
        &self,
        id: PassId,
    ) -> impl Future<Output = StoreResult<Option<EntrancePass>>> + Send;

    /// Snapshot of every counter, ordered by item then location.
    ///
    /// # Errors
    ///
    /// Returns error if the storage operation fails.
    fn list_stock(&self) -> impl Future<Output = StoreResult<Vec<InventoryCount>>> + Send;
}
