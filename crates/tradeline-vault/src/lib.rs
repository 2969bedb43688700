//! # tradeline-vault
//!
//! **Holdings store**: each participant's private view of the ledger.
//!
//! ## Architecture
//!
//! ```text
//!   committed transition ──▶ Vault::record_transition
//!                               │
//!            ┌──────────────────┼──────────────────┐
//!            ▼                  ▼                  ▼
//!     records (arena)     consumed set       reserved set
//!     RecordRef → Record  (never live again) (attempt-local)
//!
//!   live  = records − consumed
//!   spendable = live − reserved
//! ```
//!
//! Records are immutable once stored; a new version of an order is a new
//! record under a new reference. Liveness is plain set subtraction.
//!
//! Reservations are soft: they keep two concurrent attempts of the *same*
//! participant from selecting the same record, and are never visible to
//! anyone else. Across participants the notary is the only arbiter.

pub mod query;
pub mod reservation;
pub mod selection;
pub mod vault;

pub use query::HoldingsQuery;
pub use reservation::Reservation;
pub use selection::select;
pub use vault::{SharedVault, Vault};
