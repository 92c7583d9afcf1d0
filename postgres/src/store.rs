//! `PostgreSQL` implementation of [`FulfillmentStore`].
//!
//! Transactions run at `READ COMMITTED`. Isolation comes from row locks and
//! conditional writes:
//!
//! - orders, tickets and passes are loaded with `SELECT ... FOR UPDATE`
//! - stock decrements are `UPDATE ... WHERE quantity >= $n RETURNING ...`
//! - redemption is a single `UPDATE ... WHERE state = 'active' ... RETURNING ...`
//!
//! Each transaction sets a local `lock_timeout`; a lock wait that exceeds it surfaces
//! as [`StoreError::LockTimeout`].

use chrono::{DateTime, Utc};
use fulfillment_core::error::{StoreError, StoreResult};
use fulfillment_core::store::{FulfillmentStore, StoreTransaction};
use fulfillment_core::types::{
    Credential, CredentialClaim, CredentialCode, CredentialId, CredentialKind, CredentialState,
    EntrancePass, InventoryCount, ItemId, LineItem, LocationId, Money, Order, OrderId,
    OrderStatus, PassId, PassStatus, PaymentMethod, ReferenceId, Signature, StaffId,
    StandaloneTicket, StockUpdate, TicketId, TicketStatus, UserId,
};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use std::time::Duration;
use uuid::Uuid;

/// Default per-transaction lock wait.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

const CREDENTIAL_COLUMNS: &str = "id, kind, reference_id, code, signature, state, \
     issued_at, expires_at, redeemed_at, redeemed_by";

const ORDER_COLUMNS: &str =
    "id, location, status, line_items, credential_id, payment_method, created_at, paid_at";

const PASS_COLUMNS: &str = "id, holder, pass_type, price_cents, status, valid_until, \
     credential_id, purchased_at, used_at, used_by";

/// `PostgreSQL`-backed store.
///
/// # Example
///
/// ```no_run
/// use fulfillment_postgres::PostgresStore;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let store = PostgresStore::new("postgres://localhost/venue").await?;
/// store.migrate().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    /// Connect to `database_url` with a default pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;
        Ok(Self::from_pool(pool))
    }

    /// Wrap an existing pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
        }
    }

    /// Override the per-transaction lock wait.
    #[must_use]
    pub const fn with_lock_timeout(mut self, lock_timeout: Duration) -> Self {
        self.lock_timeout = lock_timeout;
        self
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Apply the bundled schema migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }
}

/// A `PostgreSQL` transaction. Dropping it without commit rolls back.
pub struct PostgresTransaction {
    tx: Transaction<'static, Postgres>,
}

impl std::fmt::Debug for PostgresTransaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresTransaction").finish_non_exhaustive()
    }
}

impl FulfillmentStore for PostgresStore {
    type Transaction = PostgresTransaction;

    async fn begin(&self) -> StoreResult<PostgresTransaction> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx("begin transaction", e))?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx("set lock_timeout", e))?;

        Ok(PostgresTransaction { tx })
    }

    async fn claim_credential(&self, claim: &CredentialClaim) -> StoreResult<Option<Credential>> {
        let row = sqlx::query(&format!(
            r"
            UPDATE credentials
            SET state = 'redeemed', redeemed_at = $3, redeemed_by = $4
            WHERE code = $1
              AND signature = $2
              AND state = 'active'
              AND (expires_at IS NULL OR expires_at > $3)
            RETURNING {CREDENTIAL_COLUMNS}
            "
        ))
        .bind(claim.code.as_str())
        .bind(claim.signature.as_str())
        .bind(claim.at)
        .bind(claim.staff_id.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("claim credential", e))?;

        row.as_ref().map(row_to_credential).transpose()
    }

    async fn find_credential(&self, code: &CredentialCode) -> StoreResult<Option<Credential>> {
        let row = sqlx::query(&format!(
            "SELECT {CREDENTIAL_COLUMNS} FROM credentials WHERE code = $1"
        ))
        .bind(code.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("find credential", e))?;

        row.as_ref().map(row_to_credential).transpose()
    }

    async fn find_order(&self, id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(*id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx("find order", e))?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn find_ticket(&self, id: TicketId) -> StoreResult<Option<StandaloneTicket>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM standalone_tickets WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("find ticket", e))?;

        row.as_ref().map(row_to_ticket).transpose()
    }

    async fn find_entrance_pass(&self, id: PassId) -> StoreResult<Option<EntrancePass>> {
        let row = sqlx::query(&format!(
            "SELECT {PASS_COLUMNS} FROM entrance_passes WHERE id = $1"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx("find entrance pass", e))?;

        row.as_ref().map(row_to_pass).transpose()
    }

    async fn list_stock(&self) -> StoreResult<Vec<InventoryCount>> {
        let rows = sqlx::query(
            r#"
            SELECT item_id, location, quantity, threshold
            FROM inventory_counts
            ORDER BY item_id COLLATE "C", location COLLATE "C"
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx("list stock", e))?;

        rows.iter().map(row_to_count).collect()
    }
}

impl StoreTransaction for PostgresTransaction {
    async fn load_order(&mut self, id: OrderId) -> StoreResult<Option<Order>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("load order", e))?;

        row.as_ref().map(row_to_order).transpose()
    }

    async fn insert_order(&mut self, order: &Order) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO orders ({ORDER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(*order.id.as_uuid())
        .bind(order.location.as_str())
        .bind(order.status.as_str())
        .bind(Json(&order.line_items))
        .bind(order.credential_id.map(|id| *id.as_uuid()))
        .bind(order.payment_method.as_ref().map(Json))
        .bind(order.created_at)
        .bind(order.paid_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("insert order", e))?;
        Ok(())
    }

    async fn update_order(&mut self, order: &Order) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            UPDATE orders
            SET status = $2, credential_id = $3, payment_method = $4, paid_at = $5
            WHERE id = $1
            ",
        )
        .bind(*order.id.as_uuid())
        .bind(order.status.as_str())
        .bind(order.credential_id.map(|id| *id.as_uuid()))
        .bind(order.payment_method.as_ref().map(Json))
        .bind(order.paid_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("update order", e))?;

        require_one_row(result.rows_affected(), "order", order.id)
    }

    async fn load_ticket(&mut self, id: TicketId) -> StoreResult<Option<StandaloneTicket>> {
        let row = sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM standalone_tickets WHERE id = $1 FOR UPDATE"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("load ticket", e))?;

        row.as_ref().map(row_to_ticket).transpose()
    }

    async fn insert_ticket(&mut self, ticket: &StandaloneTicket) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO standalone_tickets ({ORDER_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(*ticket.id.as_uuid())
        .bind(ticket.location.as_str())
        .bind(ticket.status.as_str())
        .bind(Json(&ticket.line_items))
        .bind(ticket.credential_id.map(|id| *id.as_uuid()))
        .bind(ticket.payment_method.as_ref().map(Json))
        .bind(ticket.created_at)
        .bind(ticket.paid_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("insert ticket", e))?;
        Ok(())
    }

    async fn update_ticket(&mut self, ticket: &StandaloneTicket) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            UPDATE standalone_tickets
            SET status = $2, credential_id = $3, payment_method = $4, paid_at = $5
            WHERE id = $1
            ",
        )
        .bind(*ticket.id.as_uuid())
        .bind(ticket.status.as_str())
        .bind(ticket.credential_id.map(|id| *id.as_uuid()))
        .bind(ticket.payment_method.as_ref().map(Json))
        .bind(ticket.paid_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("update ticket", e))?;

        require_one_row(result.rows_affected(), "ticket", ticket.id)
    }

    async fn load_entrance_pass(&mut self, id: PassId) -> StoreResult<Option<EntrancePass>> {
        let row = sqlx::query(&format!(
            "SELECT {PASS_COLUMNS} FROM entrance_passes WHERE id = $1 FOR UPDATE"
        ))
        .bind(*id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("load entrance pass", e))?;

        row.as_ref().map(row_to_pass).transpose()
    }

    async fn load_entrance_pass_by_credential(
        &mut self,
        credential_id: CredentialId,
    ) -> StoreResult<Option<EntrancePass>> {
        let row = sqlx::query(&format!(
            "SELECT {PASS_COLUMNS} FROM entrance_passes WHERE credential_id = $1 FOR UPDATE"
        ))
        .bind(*credential_id.as_uuid())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("load entrance pass by credential", e))?;

        row.as_ref().map(row_to_pass).transpose()
    }

    async fn insert_entrance_pass(&mut self, pass: &EntrancePass) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO entrance_passes ({PASS_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(*pass.id.as_uuid())
        .bind(*pass.holder.as_uuid())
        .bind(&pass.pass_type)
        .bind(money_to_db(pass.price)?)
        .bind(pass.status.as_str())
        .bind(pass.valid_until)
        .bind(*pass.credential_id.as_uuid())
        .bind(pass.purchased_at)
        .bind(pass.used_at)
        .bind(pass.used_by.as_ref().map(StaffId::as_str))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("insert entrance pass", e))?;
        Ok(())
    }

    async fn update_entrance_pass(&mut self, pass: &EntrancePass) -> StoreResult<()> {
        let result = sqlx::query(
            r"
            UPDATE entrance_passes
            SET status = $2, used_at = $3, used_by = $4
            WHERE id = $1
            ",
        )
        .bind(*pass.id.as_uuid())
        .bind(pass.status.as_str())
        .bind(pass.used_at)
        .bind(pass.used_by.as_ref().map(StaffId::as_str))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("update entrance pass", e))?;

        require_one_row(result.rows_affected(), "entrance pass", pass.id)
    }

    async fn decrement_stock(
        &mut self,
        item_id: &ItemId,
        location: &LocationId,
        amount: u32,
    ) -> StoreResult<StockUpdate> {
        let row = sqlx::query(
            r"
            UPDATE inventory_counts
            SET quantity = quantity - $3, updated_at = now()
            WHERE item_id = $1 AND location = $2 AND quantity >= $3
            RETURNING item_id, location, quantity, threshold
            ",
        )
        .bind(item_id.as_str())
        .bind(location.as_str())
        .bind(i64::from(amount))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("decrement stock", e))?;

        if let Some(row) = row {
            return Ok(StockUpdate::Applied(row_to_count(&row)?));
        }

        // Nothing matched: tell "too few" apart from "no counter".
        let available: Option<i64> = sqlx::query_scalar(
            "SELECT quantity FROM inventory_counts WHERE item_id = $1 AND location = $2",
        )
        .bind(item_id.as_str())
        .bind(location.as_str())
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("read stock", e))?;

        match available {
            Some(quantity) => Ok(StockUpdate::Insufficient {
                available: quantity_from_db(quantity)?,
            }),
            None => Ok(StockUpdate::Untracked),
        }
    }

    async fn increment_stock(
        &mut self,
        item_id: &ItemId,
        location: &LocationId,
        amount: u32,
    ) -> StoreResult<StockUpdate> {
        let row = sqlx::query(
            r"
            UPDATE inventory_counts
            SET quantity = quantity + $3, updated_at = now()
            WHERE item_id = $1 AND location = $2
            RETURNING item_id, location, quantity, threshold
            ",
        )
        .bind(item_id.as_str())
        .bind(location.as_str())
        .bind(i64::from(amount))
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("increment stock", e))?;

        match row {
            Some(row) => Ok(StockUpdate::Applied(row_to_count(&row)?)),
            None => Ok(StockUpdate::Untracked),
        }
    }

    async fn ensure_stock(&mut self, seed: &InventoryCount) -> StoreResult<bool> {
        let result = sqlx::query(
            r"
            INSERT INTO inventory_counts (item_id, location, quantity, threshold)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (item_id, location) DO NOTHING
            ",
        )
        .bind(seed.item_id.as_str())
        .bind(seed.location.as_str())
        .bind(i64::from(seed.quantity))
        .bind(seed.threshold.map(i64::from))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("ensure stock", e))?;

        Ok(result.rows_affected() == 1)
    }

    async fn insert_credential(&mut self, credential: &Credential) -> StoreResult<()> {
        sqlx::query(&format!(
            "INSERT INTO credentials ({CREDENTIAL_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)"
        ))
        .bind(*credential.id.as_uuid())
        .bind(credential.kind.as_str())
        .bind(*credential.reference_id.as_uuid())
        .bind(credential.code.as_str())
        .bind(credential.signature.as_str())
        .bind(credential.state.as_str())
        .bind(credential.issued_at)
        .bind(credential.expires_at)
        .bind(credential.redeemed_at)
        .bind(credential.redeemed_by.as_ref().map(StaffId::as_str))
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx("insert credential", e))?;
        Ok(())
    }

    async fn commit(self) -> StoreResult<()> {
        self.tx
            .commit()
            .await
            .map_err(|e| map_sqlx("commit", e))
    }

    async fn rollback(self) -> StoreResult<()> {
        self.tx
            .rollback()
            .await
            .map_err(|e| map_sqlx("rollback", e))
    }
}

// ============================================================================
// Error mapping
// ============================================================================

/// Map a sqlx error, classifying lock timeouts and serialization conflicts.
fn map_sqlx(context: &str, error: sqlx::Error) -> StoreError {
    let code = match &error {
        sqlx::Error::Database(db) => db.code().map(|code| code.into_owned()),
        _ => None,
    };

    let mapped = match code.as_deref() {
        Some("55P03") => StoreError::LockTimeout(format!("{context}: {error}")),
        Some("40001" | "40P01") => StoreError::Conflict(format!("{context}: {error}")),
        _ => StoreError::Database(format!("{context}: {error}")),
    };

    let kind = match &mapped {
        StoreError::LockTimeout(_) => "lock_timeout",
        StoreError::Conflict(_) => "conflict",
        StoreError::Database(_) | StoreError::Corrupt(_) => "database",
    };
    metrics::counter!("fulfillment_store_errors_total", "kind" => kind).increment(1);
    if mapped.is_retryable() {
        tracing::warn!(context, error = %error, kind, "Retryable store error");
    } else {
        tracing::error!(context, error = %error, "Store error");
    }

    mapped
}

fn require_one_row(rows: u64, entity: &str, id: impl std::fmt::Display) -> StoreResult<()> {
    if rows == 1 {
        Ok(())
    } else {
        Err(StoreError::Database(format!("{entity} {id} does not exist")))
    }
}

// ============================================================================
// Row decoding
// ============================================================================

fn column<'r, T>(row: &'r PgRow, name: &str) -> StoreResult<T>
where
    T: sqlx::Decode<'r, Postgres> + sqlx::Type<Postgres>,
{
    row.try_get(name)
        .map_err(|e| StoreError::Corrupt(format!("column {name}: {e}")))
}

fn quantity_from_db(value: i64) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("quantity out of range: {value}")))
}

fn money_to_db(money: Money) -> StoreResult<i64> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::Database(format!("amount out of range: {money}")))
}

fn row_to_count(row: &PgRow) -> StoreResult<InventoryCount> {
    let quantity: i64 = column(row, "quantity")?;
    let threshold: Option<i64> = column(row, "threshold")?;
    Ok(InventoryCount {
        item_id: ItemId::new(column::<String>(row, "item_id")?),
        location: LocationId::new(column::<String>(row, "location")?),
        quantity: quantity_from_db(quantity)?,
        threshold: threshold.map(quantity_from_db).transpose()?,
    })
}

fn row_to_credential(row: &PgRow) -> StoreResult<Credential> {
    let kind: String = column(row, "kind")?;
    let state: String = column(row, "state")?;
    let redeemed_by: Option<String> = column(row, "redeemed_by")?;
    Ok(Credential {
        id: CredentialId::from_uuid(column(row, "id")?),
        kind: CredentialKind::parse(&kind)?,
        reference_id: ReferenceId::from_uuid(column(row, "reference_id")?),
        code: CredentialCode::new(column::<String>(row, "code")?),
        signature: Signature::new(column::<String>(row, "signature")?),
        state: CredentialState::parse(&state)?,
        issued_at: column(row, "issued_at")?,
        expires_at: column(row, "expires_at")?,
        redeemed_at: column(row, "redeemed_at")?,
        redeemed_by: redeemed_by.map(StaffId::new),
    })
}

/// Columns shared by orders and standalone tickets.
struct OrderRow {
    location: LocationId,
    status: String,
    line_items: Vec<LineItem>,
    credential_id: Option<CredentialId>,
    payment_method: Option<PaymentMethod>,
    created_at: DateTime<Utc>,
    paid_at: Option<DateTime<Utc>>,
    id: Uuid,
}

impl OrderRow {
    fn decode(row: &PgRow) -> StoreResult<Self> {
        let Json(line_items): Json<Vec<LineItem>> = column(row, "line_items")?;
        let payment_method: Option<Json<PaymentMethod>> = column(row, "payment_method")?;
        let credential_id: Option<Uuid> = column(row, "credential_id")?;
        Ok(Self {
            id: column(row, "id")?,
            location: LocationId::new(column::<String>(row, "location")?),
            status: column(row, "status")?,
            line_items,
            credential_id: credential_id.map(CredentialId::from_uuid),
            payment_method: payment_method.map(|Json(method)| method),
            created_at: column(row, "created_at")?,
            paid_at: column(row, "paid_at")?,
        })
    }
}

fn row_to_order(row: &PgRow) -> StoreResult<Order> {
    let decoded = OrderRow::decode(row)?;
    Ok(Order {
        id: OrderId::from_uuid(decoded.id),
        location: decoded.location,
        status: OrderStatus::parse(&decoded.status)?,
        line_items: decoded.line_items,
        credential_id: decoded.credential_id,
        payment_method: decoded.payment_method,
        created_at: decoded.created_at,
        paid_at: decoded.paid_at,
    })
}

fn row_to_ticket(row: &PgRow) -> StoreResult<StandaloneTicket> {
    let decoded = OrderRow::decode(row)?;
    Ok(StandaloneTicket {
        id: TicketId::from_uuid(decoded.id),
        location: decoded.location,
        status: TicketStatus::parse(&decoded.status)?,
        line_items: decoded.line_items,
        credential_id: decoded.credential_id,
        payment_method: decoded.payment_method,
        created_at: decoded.created_at,
        paid_at: decoded.paid_at,
    })
}

fn row_to_pass(row: &PgRow) -> StoreResult<EntrancePass> {
    let status: String = column(row, "status")?;
    let price: i64 = column(row, "price_cents")?;
    let used_by: Option<String> = column(row, "used_by")?;
    Ok(EntrancePass {
        id: PassId::from_uuid(column(row, "id")?),
        holder: UserId::from_uuid(column(row, "holder")?),
        pass_type: column(row, "pass_type")?,
        price: Money::from_cents(
            u64::try_from(price)
                .map_err(|_| StoreError::Corrupt(format!("negative price: {price}")))?,
        ),
        status: PassStatus::parse(&status)?,
        valid_until: column(row, "valid_until")?,
        credential_id: CredentialId::from_uuid(column(row, "credential_id")?),
        purchased_at: column(row, "purchased_at")?,
        used_at: column(row, "used_at")?,
        used_by: used_by.map(StaffId::new),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn quantities_outside_u32_are_corrupt() {
        assert_eq!(quantity_from_db(7), Ok(7));
        assert!(matches!(quantity_from_db(-1), Err(StoreError::Corrupt(_))));
        assert!(matches!(
            quantity_from_db(i64::from(u32::MAX) + 1),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn missing_rows_are_reported() {
        assert_eq!(require_one_row(1, "order", "x"), Ok(()));
        assert!(matches!(
            require_one_row(0, "order", "x"),
            Err(StoreError::Database(message)) if message.contains("order x")
        ));
    }

    #[test]
    fn non_database_errors_map_to_database() {
        let mapped = map_sqlx("begin", sqlx::Error::PoolTimedOut);
        assert!(matches!(mapped, StoreError::Database(message) if message.starts_with("begin")));
    }

    #[test]
    fn money_fits_bigint() {
        assert_eq!(money_to_db(Money::from_cents(1_234)), Ok(1_234));
        assert!(money_to_db(Money::from_cents(u64::MAX)).is_err());
    }
}
