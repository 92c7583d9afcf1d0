//! Domain types for the venue fulfillment engine.
//!
//! Value objects (identifiers, money), the business entities the engine writes to
//! (orders, standalone tickets, entrance passes, inventory counters) and the
//! credential record that ties a paid unit to a one-time scan.

use crate::error::StoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

macro_rules! string_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a `", stringify!($name), "` from any string-like value")]
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw identifier
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

uuid_identifier!(
    /// Unique identifier for an order
    OrderId
);
uuid_identifier!(
    /// Unique identifier for a standalone ticket
    TicketId
);
uuid_identifier!(
    /// Unique identifier for an entrance pass
    PassId
);
uuid_identifier!(
    /// Unique identifier for a credential record
    CredentialId
);
uuid_identifier!(
    /// Unique identifier for a purchasing user
    UserId
);

string_identifier!(
    /// Catalog item identifier (menu item, merchandise SKU, ...)
    ItemId
);
string_identifier!(
    /// Stock location (bar, kitchen, kiosk) an item is drawn from
    LocationId
);
string_identifier!(
    /// Staff identity supplied by the authentication collaborator
    StaffId
);

/// Identifier of the business object a credential authorizes.
///
/// A nil reference means "no anchor" and is rejected at issuance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ReferenceId(Uuid);

impl ReferenceId {
    /// Create a `ReferenceId` from a `Uuid`
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The nil reference
    #[must_use]
    pub const fn nil() -> Self {
        Self(Uuid::nil())
    }

    /// Get the inner UUID
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// `true` when the reference does not point at anything
    #[must_use]
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }
}

impl fmt::Display for ReferenceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<OrderId> for ReferenceId {
    fn from(id: OrderId) -> Self {
        Self(id.0)
    }
}

impl From<TicketId> for ReferenceId {
    fn from(id: TicketId) -> Self {
        Self(id.0)
    }
}

impl From<PassId> for ReferenceId {
    fn from(id: PassId) -> Self {
        Self(id.0)
    }
}

// ============================================================================
// Money Value Object (cents-based to avoid floating point errors)
// ============================================================================

/// Represents money in cents to avoid floating-point arithmetic errors
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Money(u64);

impl Money {
    /// Zero amount
    pub const ZERO: Self = Self(0);

    /// Creates a `Money` value from cents
    #[must_use]
    pub const fn from_cents(cents: u64) -> Self {
        Self(cents)
    }

    /// Returns the amount in cents
    #[must_use]
    pub const fn cents(&self) -> u64 {
        self.0
    }

    /// Adds two money amounts with overflow checking
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }

    /// Multiplies money by a quantity with overflow checking
    #[must_use]
    pub const fn checked_multiply(self, quantity: u32) -> Option<Self> {
        match self.0.checked_mul(quantity as u64) {
            Some(result) => Some(Self(result)),
            None => None,
        }
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}.{:02}", self.0 / 100, self.0 % 100)
    }
}

// ============================================================================
// Payment
// ============================================================================

/// How a payment event was settled before it reached the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Cash taken at the counter
    Cash,
    /// Card terminal payment
    Card {
        /// Last four digits of the card
        last_four: String,
    },
    /// Confirmed by an external payment provider
    External {
        /// Provider-side payment reference
        reference: String,
    },
}

// ============================================================================
// Line items
// ============================================================================

/// One line of an order or standalone ticket.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    /// Catalog item
    pub item_id: ItemId,
    /// Units ordered
    pub quantity: u32,
    /// Price per unit at order time
    pub unit_price: Money,
}

impl LineItem {
    /// Create a new line item
    #[must_use]
    pub fn new(item_id: impl Into<ItemId>, quantity: u32, unit_price: Money) -> Self {
        Self {
            item_id: item_id.into(),
            quantity,
            unit_price,
        }
    }

    /// `quantity * unit_price`, `None` on overflow
    #[must_use]
    pub const fn subtotal(&self) -> Option<Money> {
        self.unit_price.checked_multiply(self.quantity)
    }
}

fn total_of(items: &[LineItem]) -> Option<Money> {
    items
        .iter()
        .try_fold(Money::ZERO, |acc, item| acc.checked_add(item.subtotal()?))
}

// ============================================================================
// Status enums
// ============================================================================

/// Lifecycle of an order.
///
/// ```text
/// pending ──► paid ──► ready ──► served
///    │          │  └─────────────▲
///    └──────────┴──► cancelled
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, not yet paid; has not touched the ledger
    Pending,
    /// Paid; stock deducted and credential issued
    Paid,
    /// Prepared and waiting for pickup
    Ready,
    /// Handed over (credential redeemed)
    Served,
    /// Cancelled before being served
    Cancelled,
}

impl OrderStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Ready => "ready",
            Self::Served => "served",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "ready" => Ok(Self::Ready),
            "served" => Ok(Self::Served),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(StoreError::Corrupt(format!("Invalid order status: {s}"))),
        }
    }

    /// Whether `self → next` is an edge of the order lifecycle.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Paid | Self::Cancelled)
                | (Self::Paid, Self::Ready | Self::Served | Self::Cancelled)
                | (Self::Ready, Self::Served)
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a standalone ticket: `issued → paid → redeemed`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    /// Issued, awaiting payment
    Issued,
    /// Paid; credential issued
    Paid,
    /// Credential redeemed at the door/counter
    Redeemed,
}

impl TicketStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Issued => "issued",
            Self::Paid => "paid",
            Self::Redeemed => "redeemed",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "issued" => Ok(Self::Issued),
            "paid" => Ok(Self::Paid),
            "redeemed" => Ok(Self::Redeemed),
            _ => Err(StoreError::Corrupt(format!("Invalid ticket status: {s}"))),
        }
    }

    /// Whether `self → next` is an edge of the ticket lifecycle.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Issued, Self::Paid) | (Self::Paid, Self::Redeemed)
        )
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of an entrance pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PassStatus {
    /// Valid for admission
    Active,
    /// Admission granted
    Used,
    /// Invalidated by staff
    Cancelled,
}

impl PassStatus {
    /// Convert status to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Used => "used",
            Self::Cancelled => "cancelled",
        }
    }

    /// Parse status from database string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the string doesn't match a known status.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "active" => Ok(Self::Active),
            "used" => Ok(Self::Used),
            "cancelled" => Ok(Self::Cancelled),
            _ => Err(StoreError::Corrupt(format!("Invalid pass status: {s}"))),
        }
    }
}

impl fmt::Display for PassStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Entities
// ============================================================================

/// A customer order drawn from one stock location.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Order identifier
    pub id: OrderId,
    /// Location whose stock the line items are drawn from
    pub location: LocationId,
    /// Current lifecycle status
    pub status: OrderStatus,
    /// Ordered line items
    pub line_items: Vec<LineItem>,
    /// Credential issued when the order was paid
    pub credential_id: Option<CredentialId>,
    /// Payment method recorded at payment time
    pub payment_method: Option<PaymentMethod>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Payment time
    pub paid_at: Option<DateTime<Utc>>,
}

impl Order {
    /// Create a new `pending` order.
    #[must_use]
    pub fn new(
        location: impl Into<LocationId>,
        line_items: Vec<LineItem>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: OrderId::new(),
            location: location.into(),
            status: OrderStatus::Pending,
            line_items,
            credential_id: None,
            payment_method: None,
            created_at: now,
            paid_at: None,
        }
    }

    /// Sum of all line item subtotals, `None` on overflow
    #[must_use]
    pub fn total(&self) -> Option<Money> {
        total_of(&self.line_items)
    }
}

/// A standalone ticket (the order analog sold without a table/counter order).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandaloneTicket {
    /// Ticket identifier
    pub id: TicketId,
    /// Location whose stock the line items are drawn from
    pub location: LocationId,
    /// Current lifecycle status
    pub status: TicketStatus,
    /// Ticketed line items
    pub line_items: Vec<LineItem>,
    /// Credential issued when the ticket was paid
    pub credential_id: Option<CredentialId>,
    /// Payment method recorded at payment time
    pub payment_method: Option<PaymentMethod>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Payment time
    pub paid_at: Option<DateTime<Utc>>,
}

impl StandaloneTicket {
    /// Create a new `issued` ticket.
    #[must_use]
    pub fn new(
        location: impl Into<LocationId>,
        line_items: Vec<LineItem>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: TicketId::new(),
            location: location.into(),
            status: TicketStatus::Issued,
            line_items,
            credential_id: None,
            payment_method: None,
            created_at: now,
            paid_at: None,
        }
    }

    /// Sum of all line item subtotals, `None` on overflow
    #[must_use]
    pub fn total(&self) -> Option<Money> {
        total_of(&self.line_items)
    }
}

/// A pre-paid admission pass. Owns exactly one credential.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrancePass {
    /// Pass identifier
    pub id: PassId,
    /// Purchasing user
    pub holder: UserId,
    /// Pricing/benefit tier name
    pub pass_type: String,
    /// Unit price paid for the tier
    pub price: Money,
    /// Current lifecycle status
    pub status: PassStatus,
    /// End of the validity window
    pub valid_until: DateTime<Utc>,
    /// The credential that admits the holder
    pub credential_id: CredentialId,
    /// Purchase time
    pub purchased_at: DateTime<Utc>,
    /// Admission time
    pub used_at: Option<DateTime<Utc>>,
    /// Staff member who admitted the holder
    pub used_by: Option<StaffId>,
}

/// Per-(item, location) stock counter.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryCount {
    /// Catalog item
    pub item_id: ItemId,
    /// Stock location
    pub location: LocationId,
    /// Units on hand; never negative
    pub quantity: u32,
    /// Advisory low-stock threshold (not enforced)
    pub threshold: Option<u32>,
}

impl InventoryCount {
    /// Create a counter seeded with `quantity`.
    #[must_use]
    pub fn new(item_id: impl Into<ItemId>, location: impl Into<LocationId>, quantity: u32) -> Self {
        Self {
            item_id: item_id.into(),
            location: location.into(),
            quantity,
            threshold: None,
        }
    }

    /// Attach an advisory threshold.
    #[must_use]
    pub const fn with_threshold(mut self, threshold: u32) -> Self {
        self.threshold = Some(threshold);
        self
    }

    /// `true` when a threshold is set and stock is at or below it
    #[must_use]
    pub fn is_below_threshold(&self) -> bool {
        self.threshold.is_some_and(|t| self.quantity <= t)
    }
}

/// Result of a conditional stock write as reported by the store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StockUpdate {
    /// The write was applied; carries the counter as written
    Applied(InventoryCount),
    /// Decrement refused: the counter holds fewer units than requested
    Insufficient {
        /// Quantity currently on hand
        available: u32,
    },
    /// No counter exists for the (item, location) pair
    Untracked,
}

// ============================================================================
// Credentials
// ============================================================================

/// What kind of business object a credential authorizes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialKind {
    /// Backs an [`Order`]
    Order,
    /// Backs a [`StandaloneTicket`]
    Ticket,
    /// Backs an [`EntrancePass`]
    EntrancePass,
}

impl CredentialKind {
    /// Convert kind to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Order => "order",
            Self::Ticket => "ticket",
            Self::EntrancePass => "entrance_pass",
        }
    }

    /// Parse kind from database string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the string doesn't match a known kind.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "order" => Ok(Self::Order),
            "ticket" => Ok(Self::Ticket),
            "entrance_pass" => Ok(Self::EntrancePass),
            _ => Err(StoreError::Corrupt(format!("Invalid credential kind: {s}"))),
        }
    }
}

impl fmt::Display for CredentialKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Stored credential state. `Expired` is never written; it is only reported by
/// [`Credential::effective_state`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    /// Redeemable (subject to expiry)
    Active,
    /// Consumed by a scan
    Redeemed,
    /// Past its TTL
    Expired,
}

impl CredentialState {
    /// Convert state to database string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Redeemed => "redeemed",
            Self::Expired => "expired",
        }
    }

    /// Parse state from database string.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Corrupt`] if the string doesn't match a known state.
    pub fn parse(s: &str) -> Result<Self, StoreError> {
        match s {
            "active" => Ok(Self::Active),
            "redeemed" => Ok(Self::Redeemed),
            "expired" => Ok(Self::Expired),
            _ => Err(StoreError::Corrupt(format!("Invalid credential state: {s}"))),
        }
    }
}

impl fmt::Display for CredentialState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque random credential code.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CredentialCode(String);

impl CredentialCode {
    /// Wrap an encoded code
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the encoded code
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CredentialCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Keyed integrity tag over a [`CredentialCode`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Signature(String);

impl Signature {
    /// Wrap an encoded signature
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the encoded signature
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A scannable, one-time-redeemable token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    /// Credential identifier
    pub id: CredentialId,
    /// Kind of object it authorizes
    pub kind: CredentialKind,
    /// The order/ticket/pass it authorizes
    pub reference_id: ReferenceId,
    /// Random code
    pub code: CredentialCode,
    /// MAC over `code`
    pub signature: Signature,
    /// Stored state (`active` or `redeemed`)
    pub state: CredentialState,
    /// Issuance time
    pub issued_at: DateTime<Utc>,
    /// Expiry, if a TTL applied
    pub expires_at: Option<DateTime<Utc>>,
    /// Redemption time
    pub redeemed_at: Option<DateTime<Utc>>,
    /// Staff member who redeemed it
    pub redeemed_by: Option<StaffId>,
}

impl Credential {
    /// `true` once `now` has reached `expires_at`.
    ///
    /// A credential is redeemable only while `expires_at > now`, so the boundary
    /// instant already counts as expired.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at <= now)
    }

    /// Whether a scan at `now` could claim this credential.
    #[must_use]
    pub fn is_redeemable_at(&self, now: DateTime<Utc>) -> bool {
        self.state == CredentialState::Active && !self.is_expired_at(now)
    }

    /// State as observed at `now`, folding the expiry predicate in.
    #[must_use]
    pub fn effective_state(&self, now: DateTime<Utc>) -> CredentialState {
        match self.state {
            CredentialState::Active if self.is_expired_at(now) => CredentialState::Expired,
            state => state,
        }
    }
}

/// Filter-and-set arguments for the atomic redemption claim.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CredentialClaim {
    /// Presented code
    pub code: CredentialCode,
    /// Presented signature
    pub signature: Signature,
    /// Staff member scanning
    pub staff_id: StaffId,
    /// Claim time; also the expiry reference point
    pub at: DateTime<Utc>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::Duration;

    fn credential(expires_at: Option<DateTime<Utc>>) -> Credential {
        Credential {
            id: CredentialId::new(),
            kind: CredentialKind::Order,
            reference_id: OrderId::new().into(),
            code: CredentialCode::new("code"),
            signature: Signature::new("sig"),
            state: CredentialState::Active,
            issued_at: Utc::now(),
            expires_at,
            redeemed_at: None,
            redeemed_by: None,
        }
    }

    #[test]
    fn order_lifecycle_edges() {
        use OrderStatus::{Cancelled, Paid, Pending, Ready, Served};

        assert!(Pending.can_transition_to(Paid));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Paid.can_transition_to(Ready));
        assert!(Paid.can_transition_to(Served));
        assert!(Paid.can_transition_to(Cancelled));
        assert!(Ready.can_transition_to(Served));

        assert!(!Paid.can_transition_to(Paid));
        assert!(!Paid.can_transition_to(Pending));
        assert!(!Ready.can_transition_to(Cancelled));
        assert!(!Served.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Paid));
        assert!(!Pending.can_transition_to(Served));
    }

    #[test]
    fn ticket_lifecycle_edges() {
        assert!(TicketStatus::Issued.can_transition_to(TicketStatus::Paid));
        assert!(TicketStatus::Paid.can_transition_to(TicketStatus::Redeemed));
        assert!(!TicketStatus::Issued.can_transition_to(TicketStatus::Redeemed));
        assert!(!TicketStatus::Redeemed.can_transition_to(TicketStatus::Paid));
    }

    #[test]
    fn status_strings_parse_back() {
        for status in [
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Ready,
            OrderStatus::Served,
            OrderStatus::Cancelled,
        ] {
            assert_eq!(OrderStatus::parse(status.as_str()), Ok(status));
        }
        assert_eq!(
            CredentialKind::parse("entrance_pass"),
            Ok(CredentialKind::EntrancePass)
        );
        assert!(matches!(
            PassStatus::parse("lost"),
            Err(StoreError::Corrupt(_))
        ));
    }

    #[test]
    fn expiry_is_derived_from_expires_at() {
        let now = Utc::now();

        let open_ended = credential(None);
        assert!(open_ended.is_redeemable_at(now + Duration::days(365)));

        let boundary = credential(Some(now));
        assert!(boundary.is_expired_at(now));
        assert!(!boundary.is_redeemable_at(now));
        assert_eq!(boundary.effective_state(now), CredentialState::Expired);
        assert_eq!(boundary.state, CredentialState::Active);

        let future = credential(Some(now + Duration::minutes(5)));
        assert!(future.is_redeemable_at(now));
        assert_eq!(future.effective_state(now), CredentialState::Active);
    }

    #[test]
    fn redeemed_credential_reports_redeemed_even_after_expiry() {
        let now = Utc::now();
        let mut redeemed = credential(Some(now - Duration::minutes(1)));
        redeemed.state = CredentialState::Redeemed;
        assert_eq!(redeemed.effective_state(now), CredentialState::Redeemed);
    }

    #[test]
    fn order_total_sums_line_items() {
        let order = Order::new(
            "bar",
            vec![
                LineItem::new("lager", 3, Money::from_cents(650)),
                LineItem::new("nachos", 1, Money::from_cents(1_200)),
            ],
            Utc::now(),
        );
        assert_eq!(order.total(), Some(Money::from_cents(3_150)));
        assert_eq!(order.status, OrderStatus::Pending);
        assert_eq!(Money::from_cents(3_150).to_string(), "$31.50");
    }

    #[test]
    fn order_total_reports_overflow() {
        let order = Order::new(
            "bar",
            vec![LineItem::new("gold", u32::MAX, Money::from_cents(u64::MAX))],
            Utc::now(),
        );
        assert_eq!(order.total(), None);
    }

    #[test]
    fn threshold_is_advisory() {
        let count = InventoryCount::new("lager", "bar", 4).with_threshold(5);
        assert!(count.is_below_threshold());
        assert!(!InventoryCount::new("lager", "bar", 4).is_below_threshold());
    }

    #[test]
    fn nil_reference_is_detected() {
        assert!(ReferenceId::nil().is_nil());
        assert!(!ReferenceId::from(PassId::new()).is_nil());
    }

    #[test]
    fn payment_method_serializes_with_tag() {
        let json = serde_json::to_value(PaymentMethod::Card {
            last_four: "4242".to_string(),
        })
        .unwrap_or_default();
        assert_eq!(json["method"], "card");
        assert_eq!(json["last_four"], "4242");
    }
}
