//! # tradeline-types
//!
//! Shared types, errors, and configuration for the **Tradeline** settlement
//! protocol.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`PartyId`], [`Party`], [`NotaryId`], [`TxId`], [`RecordRef`], [`OrderId`]
//! - **Record model**: [`BalanceRecord`], [`OrderRecord`], [`OrderStatus`], [`Record`], [`LiveRecord`]
//! - **Transition model**: [`Transition`], [`TransitionBuilder`], [`Intent`], [`Command`]
//! - **Authorization**: [`Identity`], [`Authorization`], [`SignedTransition`]
//! - **Receipts**: [`FinalityReceipt`]
//! - **Configuration**: [`ParticipantConfig`], [`NotaryConfig`], [`SelectionPolicy`]
//! - **Errors**: [`ValidationError`] and [`SettleError`] with `TL_ERR_` prefix codes
//! - **Constants**: protocol-wide limits and defaults

pub mod authorization;
pub mod config;
pub mod constants;
pub mod error;
pub mod ids;
pub mod receipt;
pub mod record;
pub mod transition;

// Re-export all primary types at crate root for ergonomic imports:
//   use tradeline_types::{BalanceRecord, Transition, SignedTransition, ...};

pub use authorization::*;
pub use config::*;
pub use error::*;
pub use ids::*;
pub use receipt::*;
pub use record::*;
pub use transition::*;

// Constants are accessed via `tradeline_types::constants::FOO`
// (not re-exported to avoid name collisions).
