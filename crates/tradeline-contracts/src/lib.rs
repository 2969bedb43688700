//! # tradeline-contracts
//!
//! **Validation Engine**: the pure rules that decide whether a proposed
//! [`Transition`](tradeline_types::Transition) may ever be committed.
//!
//! ## Architecture
//!
//! Every transition carries exactly one intent. The engine selects the rule
//! for its [`Command`](tradeline_types::Command) by exhaustive match:
//!
//! ```text
//! ISSUE           → balance::verify_issue
//! PAY             → balance::verify_payment
//! ORDER_PLACING   → order::verify_placing   (+ balance::verify_payment)
//! ORDER_DELIVERED → order::verify_delivered (+ balance::verify_payment)
//! ```
//!
//! followed by a participation check on the required authorizers.
//!
//! The engine is deterministic and performs no I/O. Each party runs it
//! before signing and the notary runs it again before finality.

mod balance;
pub mod engine;
mod order;
mod view;

pub use engine::validate;
