//! Ledger records: the immutable, versioned units of shared state.
//!
//! A record instance is created only as an output of a committed transition
//! and consumed at most once, as an input of a later committed transition.
//!
//! ## Order lifecycle
//!
//! ```text
//!   ┌────────┐  OrderDelivered  ┌───────────┐
//!   │ PLACED ├─────────────────▶│ DELIVERED │
//!   └────────┘                  └───────────┘
//! ```
//!
//! Transitions are **monotonic**: a delivered order never returns to placed.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::{OrderId, PartyId, RecordRef};

// ---------------------------------------------------------------------------
// BalanceRecord
// ---------------------------------------------------------------------------

/// A claim of `amount` units backed by `issuer`, currently held by `owner`.
///
/// Balance records have no identity across versions; a transfer consumes one
/// and produces one or two new ones whose amounts add up.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BalanceRecord {
    pub issuer: PartyId,
    pub owner: PartyId,
    pub amount: i64,
}

impl BalanceRecord {
    #[must_use]
    pub fn new(issuer: PartyId, owner: PartyId, amount: i64) -> Self {
        Self {
            issuer,
            owner,
            amount,
        }
    }

    /// The same claim re-assigned to a new owner with a new amount.
    #[must_use]
    pub fn reassigned(&self, owner: PartyId, amount: i64) -> Self {
        Self::new(self.issuer, owner, amount)
    }

    #[must_use]
    pub fn participants(&self) -> Vec<PartyId> {
        vec![self.issuer, self.owner]
    }
}

// ---------------------------------------------------------------------------
// OrderStatus
// ---------------------------------------------------------------------------

/// Lifecycle status of an order. Only `Placed → Delivered` is allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum OrderStatus {
    Placed,
    Delivered,
}

impl OrderStatus {
    /// Can an order in this status be replaced by one in `target`?
    #[must_use]
    pub fn can_transition_to(&self, target: Self) -> bool {
        matches!((self, target), (Self::Placed, Self::Delivered))
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Placed => write!(f, "PLACED"),
            Self::Delivered => write!(f, "DELIVERED"),
        }
    }
}

// ---------------------------------------------------------------------------
// OrderRecord
// ---------------------------------------------------------------------------

/// A tracked good/service exchanged between `buyer` and `seller`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OrderRecord {
    /// Stable across every version of this order.
    pub logical_id: OrderId,
    pub description: String,
    pub buyer: PartyId,
    pub seller: PartyId,
    pub price: Decimal,
    /// Share of `price` paid when the order is placed, within `0..=1`.
    pub down_payment_fraction: Decimal,
    pub status: OrderStatus,
}

impl OrderRecord {
    /// A freshly placed order.
    #[must_use]
    pub fn new_placed(
        logical_id: OrderId,
        description: impl Into<String>,
        buyer: PartyId,
        seller: PartyId,
        price: Decimal,
        down_payment_fraction: Decimal,
    ) -> Self {
        Self {
            logical_id,
            description: description.into(),
            buyer,
            seller,
            price,
            down_payment_fraction,
            status: OrderStatus::Placed,
        }
    }

    /// The next version of this order with status `Delivered`.
    #[must_use]
    pub fn delivered(&self) -> Self {
        Self {
            status: OrderStatus::Delivered,
            ..self.clone()
        }
    }

    /// Units paid at placement: `floor(price × fraction)`.
    ///
    /// Returns `None` if the amount does not fit in an `i64`.
    #[must_use]
    pub fn down_payment(&self) -> Option<i64> {
        self.price
            .checked_mul(self.down_payment_fraction)?
            .floor()
            .to_i64()
    }

    /// Units paid at delivery: `ceil(price) − down_payment`.
    ///
    /// Rounding up means the seller is never paid less than `price` overall.
    #[must_use]
    pub fn balance_due(&self) -> Option<i64> {
        self.price.ceil().to_i64()?.checked_sub(self.down_payment()?)
    }

    /// Whether every field except `status` matches `other`.
    #[must_use]
    pub fn same_terms(&self, other: &Self) -> bool {
        self.logical_id == other.logical_id
            && self.description == other.description
            && self.buyer == other.buyer
            && self.seller == other.seller
            && self.price == other.price
            && self.down_payment_fraction == other.down_payment_fraction
    }

    #[must_use]
    pub fn participants(&self) -> Vec<PartyId> {
        vec![self.buyer, self.seller]
    }
}

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// The kind of a record, used to scope holdings queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordKind {
    Balance,
    Order,
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Balance => write!(f, "BALANCE"),
            Self::Order => write!(f, "ORDER"),
        }
    }
}

/// Closed set of record kinds stored on the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Record {
    Balance(BalanceRecord),
    Order(OrderRecord),
}

impl Record {
    #[must_use]
    pub fn kind(&self) -> RecordKind {
        match self {
            Self::Balance(_) => RecordKind::Balance,
            Self::Order(_) => RecordKind::Order,
        }
    }

    #[must_use]
    pub fn as_balance(&self) -> Option<&BalanceRecord> {
        match self {
            Self::Balance(b) => Some(b),
            Self::Order(_) => None,
        }
    }

    #[must_use]
    pub fn as_order(&self) -> Option<&OrderRecord> {
        match self {
            Self::Order(o) => Some(o),
            Self::Balance(_) => None,
        }
    }

    /// Parties with a stake in this record.
    #[must_use]
    pub fn participants(&self) -> Vec<PartyId> {
        match self {
            Self::Balance(b) => b.participants(),
            Self::Order(o) => o.participants(),
        }
    }

    /// Whether `party` should track this record in its own holdings.
    ///
    /// Balances are tracked by their owner only; issuers do not hold them.
    #[must_use]
    pub fn is_relevant_to(&self, party: &PartyId) -> bool {
        match self {
            Self::Balance(b) => b.owner == *party,
            Self::Order(o) => o.buyer == *party || o.seller == *party,
        }
    }

    /// Append the canonical encoding used for transition hashing.
    ///
    /// Format: `tag || fields`, strings and decimals length-prefixed.
    pub fn write_canonical(&self, out: &mut Vec<u8>) {
        match self {
            Self::Balance(b) => {
                out.push(0x01);
                out.extend_from_slice(b.issuer.as_bytes());
                out.extend_from_slice(b.owner.as_bytes());
                out.extend_from_slice(&b.amount.to_le_bytes());
            }
            Self::Order(o) => {
                out.push(0x02);
                write_str(out, &o.logical_id.external_id);
                out.extend_from_slice(o.logical_id.id.as_bytes());
                write_str(out, &o.description);
                out.extend_from_slice(o.buyer.as_bytes());
                out.extend_from_slice(o.seller.as_bytes());
                write_str(out, &o.price.to_string());
                write_str(out, &o.down_payment_fraction.to_string());
                out.push(match o.status {
                    OrderStatus::Placed => 0,
                    OrderStatus::Delivered => 1,
                });
            }
        }
    }
}

impl From<BalanceRecord> for Record {
    fn from(b: BalanceRecord) -> Self {
        Self::Balance(b)
    }
}

impl From<OrderRecord> for Record {
    fn from(o: OrderRecord) -> Self {
        Self::Order(o)
    }
}

pub(crate) fn write_str(out: &mut Vec<u8>, s: &str) {
    let len = u32::try_from(s.len()).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
    out.extend_from_slice(s.as_bytes());
}

// ---------------------------------------------------------------------------
// LiveRecord
// ---------------------------------------------------------------------------

/// A record paired with the reference it can be consumed by.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LiveRecord {
    pub reference: RecordRef,
    pub record: Record,
}

impl LiveRecord {
    #[must_use]
    pub fn new(reference: RecordRef, record: Record) -> Self {
        Self { reference, record }
    }
}

/// Dummy live records for testing. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl LiveRecord {
    /// A balance record under a random, never-committed reference.
    pub fn dummy_balance(issuer: PartyId, owner: PartyId, amount: i64) -> Self {
        Self::dummy(BalanceRecord::new(issuer, owner, amount).into())
    }

    /// Any record under a random, never-committed reference.
    pub fn dummy(record: Record) -> Self {
        Self {
            reference: RecordRef::new(crate::TxId(rand::random::<[u8; 32]>()), 0),
            record,
        }
    }
}
