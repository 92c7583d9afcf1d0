//! In-memory [`FulfillmentStore`] for tests.
//!
//! Transactions are serializable: [`InMemoryStore::begin`] takes an owned async mutex
//! guard over the whole state and works on a copy of it. `commit` swaps the copy in;
//! dropping the transaction (or calling `rollback`) throws it away. Concurrent payment
//! tasks therefore queue behind each other exactly as they would behind row locks.
//!
//! Faults can be scheduled with [`InMemoryStore::fail_next_credential_insert`] and
//! [`InMemoryStore::fail_next_commit`] to exercise rollback paths.

use fulfillment_core::error::{StoreError, StoreResult};
use fulfillment_core::store::{FulfillmentStore, StoreTransaction};
use fulfillment_core::types::{
    Credential, CredentialClaim, CredentialCode, CredentialId, CredentialState, EntrancePass,
    InventoryCount, ItemId, LocationId, Order, OrderId, PassId, StandaloneTicket, StockUpdate,
    TicketId,
};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::{Mutex, OwnedMutexGuard};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    orders: HashMap<OrderId, Order>,
    tickets: HashMap<TicketId, StandaloneTicket>,
    passes: HashMap<PassId, EntrancePass>,
    credentials: HashMap<CredentialCode, Credential>,
    stock: BTreeMap<(ItemId, LocationId), InventoryCount>,
}

#[derive(Debug, Default)]
struct FaultPlan {
    credential_inserts: AtomicUsize,
    commits: AtomicUsize,
}

impl FaultPlan {
    /// Consume one scheduled fault from `counter`, returning whether it fired.
    fn take(counter: &AtomicUsize) -> bool {
        counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

/// In-memory store with serializable transactions and fault injection.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    faults: Arc<FaultPlan>,
}

impl InMemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next `insert_credential` call fail with a database error.
    pub fn fail_next_credential_insert(&self) {
        self.faults.credential_inserts.fetch_add(1, Ordering::SeqCst);
    }

    /// Make the next `commit` call fail (nothing is applied).
    pub fn fail_next_commit(&self) {
        self.faults.commits.fetch_add(1, Ordering::SeqCst);
    }

    /// Current quantity for a counter (for assertions).
    pub async fn stock_level(&self, item_id: &str, location: &str) -> Option<u32> {
        let state = self.state.lock().await;
        state
            .stock
            .get(&(ItemId::new(item_id), LocationId::new(location)))
            .map(|count| count.quantity)
    }

    /// Committed order (for assertions).
    pub async fn order(&self, id: OrderId) -> Option<Order> {
        self.state.lock().await.orders.get(&id).cloned()
    }

    /// Committed ticket (for assertions).
    pub async fn ticket(&self, id: TicketId) -> Option<StandaloneTicket> {
        self.state.lock().await.tickets.get(&id).cloned()
    }

    /// Committed entrance pass (for assertions).
    pub async fn entrance_pass(&self, id: PassId) -> Option<EntrancePass> {
        self.state.lock().await.passes.get(&id).cloned()
    }

    /// Number of committed credentials (for assertions).
    pub async fn credential_count(&self) -> usize {
        self.state.lock().await.credentials.len()
    }

    /// Number of committed entrance passes (for assertions).
    pub async fn entrance_pass_count(&self) -> usize {
        self.state.lock().await.passes.len()
    }
}

/// Transaction over an [`InMemoryStore`].
///
/// Holds the store lock until committed or dropped.
#[derive(Debug)]
pub struct InMemoryTransaction {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
    faults: Arc<FaultPlan>,
}

fn missing(entity: &str, id: impl std::fmt::Display) -> StoreError {
    StoreError::Database(format!("{entity} {id} does not exist"))
}

fn duplicate(entity: &str, id: impl std::fmt::Display) -> StoreError {
    StoreError::Database(format!("duplicate {entity} {id}"))
}

impl StoreTransaction for InMemoryTransaction {
    async fn load_order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.working.orders.get(&id).cloned())
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        if self.working.orders.contains_key(&order.id) {
            return Err(duplicate("order", order.id));
        }
        self.working.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> StoreResult<()> {
        let stored = self
            .working
            .orders
            .get_mut(&order.id)
            .ok_or_else(|| missing("order", order.id))?;
        *stored = order.clone();
        Ok(())
    }

    async fn load_ticket(&mut self, id: TicketId) -> StoreResult<Option<StandaloneTicket>> {
        Ok(self.working.tickets.get(&id).cloned())
    }

    async fn insert_ticket(&mut self, ticket: &StandaloneTicket) -> StoreResult<()> {
        if self.working.tickets.contains_key(&ticket.id) {
            return Err(duplicate("ticket", ticket.id));
        }
        self.working.tickets.insert(ticket.id, ticket.clone());
        Ok(())
    }

    async fn update_ticket(&mut self, ticket: &StandaloneTicket) -> StoreResult<()> {
        let stored = self
            .working
            .tickets
            .get_mut(&ticket.id)
            .ok_or_else(|| missing("ticket", ticket.id))?;
        *stored = ticket.clone();
        Ok(())
    }

    async fn load_entrance_pass(&mut self, id: PassId) -> StoreResult<Option<EntrancePass>> {
        Ok(self.working.passes.get(&id).cloned())
    }

    async fn load_entrance_pass_by_credential(
        &mut self,
        credential_id: CredentialId,
    ) -> StoreResult<Option<EntrancePass>> {
        Ok(self
            .working
            .passes
            .values()
            .find(|pass| pass.credential_id == credential_id)
            .cloned())
    }

    async fn insert_entrance_pass(&mut self, pass: &EntrancePass) -> StoreResult<()> {
        if self.working.passes.contains_key(&pass.id) {
            return Err(duplicate("entrance pass", pass.id));
        }
        self.working.passes.insert(pass.id, pass.clone());
        Ok(())
    }

    async fn update_entrance_pass(&mut self, pass: &EntrancePass) -> StoreResult<()> {
        let stored = self
            .working
            .passes
            .get_mut(&pass.id)
            .ok_or_else(|| missing("entrance pass", pass.id))?;
        *stored = pass.clone();
        Ok(())
    }

    async fn decrement_stock(
        &mut self,
        item_id: &ItemId,
        location: &LocationId,
        amount: u32,
    ) -> StoreResult<StockUpdate> {
        let Some(count) = self
            .working
            .stock
            .get_mut(&(item_id.clone(), location.clone()))
        else {
            return Ok(StockUpdate::Untracked);
        };

        match count.quantity.checked_sub(amount) {
            Some(quantity) => {
                count.quantity = quantity;
                Ok(StockUpdate::Applied(count.clone()))
            }
            None => Ok(StockUpdate::Insufficient {
                available: count.quantity,
            }),
        }
    }

    async fn increment_stock(
        &mut self,
        item_id: &ItemId,
        location: &LocationId,
        amount: u32,
    ) -> StoreResult<StockUpdate> {
        let Some(count) = self
            .working
            .stock
            .get_mut(&(item_id.clone(), location.clone()))
        else {
            return Ok(StockUpdate::Untracked);
        };

        let quantity = count.quantity.checked_add(amount).ok_or_else(|| {
            StoreError::Database(format!("stock counter overflow for {item_id} at {location}"))
        })?;
        count.quantity = quantity;
        Ok(StockUpdate::Applied(count.clone()))
    }

    async fn ensure_stock(&mut self, seed: &InventoryCount) -> StoreResult<bool> {
        let key = (seed.item_id.clone(), seed.location.clone());
        if self.working.stock.contains_key(&key) {
            return Ok(false);
        }
        self.working.stock.insert(key, seed.clone());
        Ok(true)
    }

    async fn insert_credential(&mut self, credential: &Credential) -> StoreResult<()> {
        if FaultPlan::take(&self.faults.credential_inserts) {
            return Err(StoreError::Database(
                "injected credential insert failure".to_string(),
            ));
        }
        if self.working.credentials.contains_key(&credential.code) {
            return Err(duplicate("credential code", &credential.code));
        }
        self.working
            .credentials
            .insert(credential.code.clone(), credential.clone());
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        if FaultPlan::take(&self.faults.commits) {
            return Err(StoreError::Database("injected commit failure".to_string()));
        }
        let Self {
            mut guard, working, ..
        } = self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self) -> StoreResult<()> {
        Ok(())
    }
}

impl FulfillmentStore for InMemoryStore {
    type Transaction = InMemoryTransaction;

    async fn begin(&self) -> StoreResult<InMemoryTransaction> {
        let guard = Arc::clone(&self.state).lock_owned().await;
        let working = guard.clone();
        Ok(InMemoryTransaction {
            guard,
            working,
            faults: Arc::clone(&self.faults),
        })
    }

    async fn claim_credential(&self, claim: &CredentialClaim) -> StoreResult<Option<Credential>> {
        let mut state = self.state.lock().await;

        // Filter and set under one lock acquisition.
        let Some(credential) = state.credentials.get_mut(&claim.code) else {
            return Ok(None);
        };
        let signature_matches = constant_time_eq::constant_time_eq(
            credential.signature.as_str().as_bytes(),
            claim.signature.as_str().as_bytes(),
        );
        if !signature_matches || !credential.is_redeemable_at(claim.at) {
            return Ok(None);
        }

        credential.state = CredentialState::Redeemed;
        credential.redeemed_at = Some(claim.at);
        credential.redeemed_by = Some(claim.staff_id.clone());
        Ok(Some(credential.clone()))
    }

    async fn find_credential(&self, code: &CredentialCode) -> StoreResult<Option<Credential>> {
        Ok(self.state.lock().await.credentials.get(code).cloned())
    }

    async fn find_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&id).cloned())
    }

    async fn find_ticket(&self, id: TicketId) -> StoreResult<Option<StandaloneTicket>> {
        Ok(self.state.lock().await.tickets.get(&id).cloned())
    }

    async fn find_entrance_pass(&self, id: PassId) -> StoreResult<Option<EntrancePass>> {
        Ok(self.state.lock().await.passes.get(&id).cloned())
    }

    async fn list_stock(&self) -> StoreResult<Vec<InventoryCount>> {
        Ok(self.state.lock().await.stock.values().cloned().collect())
    }
}
