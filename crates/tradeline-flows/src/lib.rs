//! # tradeline-flows
//!
//! **Negotiation and settlement**: how participants turn a
//! [`SettlementPlan`] into a committed transition.
//!
//! ## Architecture
//!
//! ```text
//!   Orchestrator::settle(plan)
//!        │
//!        ▼
//!   Proposer ──Session──▶ Responder (per counterparty, via its Inbox)
//!     │  locate holdings          answer holding request (reserve)
//!     │  build + validate         re-validate + accept / refuse
//!     │  sign, collect sigs  ◀──  sign
//!     ▼
//!   FinalityService::submit ──▶ receipt ──Finalized──▶ responders record it
//! ```
//!
//! Only the notary (a [`FinalityService`]) decides between conflicting
//! transitions. Participants reserve records locally so their own attempts
//! do not collide, and every reservation is released when the attempt or
//! responder session that took it ends.

pub mod acceptance;
pub mod cancel;
pub mod context;
pub mod message;
pub mod negotiation;
pub mod notary;
pub mod orchestrator;
pub mod plan;
pub mod proposer;
pub mod responder;
pub mod supply;
pub mod transport;

pub use cancel::{CancelHandle, CancelSignal};
pub use context::{Directory, ParticipantContext};
pub use message::{HoldingRequest, HoldingResponse, Message, MessageKind};
pub use notary::{FinalityService, InMemoryNotary};
pub use orchestrator::Orchestrator;
pub use plan::{SettlementOutcome, SettlementPlan};
pub use proposer::{Proposer, ProposerState};
pub use responder::{ResponderOutcome, ResponderState, respond};
pub use transport::{Inbox, Network, Session};
