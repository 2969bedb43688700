//! Error types for the Tradeline settlement protocol.
//!
//! All errors use the `TL_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Validation (transition rejected by a contract rule)
//! - 2xx: Holdings / negotiation errors
//! - 3xx: Authorization errors
//! - 4xx: Consensus / finality errors
//! - 5xx: Session / transport errors
//! - 9xx: General / internal errors

use thiserror::Error;

use crate::{OrderId, OrderStatus, PartyId, RecordRef};

/// Why the validation engine rejected a transition.
///
/// Every variant names the offending record, party or intent where one
/// exists so the proposer can surface it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// Issuance shape or signer requirements not met.
    #[error("TL_ERR_100: Invalid issuance: {reason}")]
    InvalidIssuance { reason: String },

    /// Consumed and produced balance amounts (or issuers) do not match.
    #[error("TL_ERR_101: Conservation violated: consumed {consumed}, produced {produced}")]
    ConservationViolation { consumed: i64, produced: i64 },

    /// A two-way split assigns both outputs to the same owner.
    #[error("TL_ERR_102: Ambiguous split: both outputs owned by {owner}")]
    AmbiguousSplit { owner: PartyId },

    /// A produced balance's issuer is not among the intent's signers.
    #[error("TL_ERR_103: Missing issuer signature: {issuer}")]
    MissingIssuerSignature { issuer: PartyId },

    /// An order's buyer is not among the intent's signers.
    #[error("TL_ERR_104: Unauthorized buyer: {buyer} did not sign")]
    UnauthorizedBuyer { buyer: PartyId },

    /// Consumed and produced order versions name different logical orders.
    #[error("TL_ERR_105: Logical identity violated: consumed {consumed}, produced {produced}")]
    LogicalIdentityViolation { consumed: OrderId, produced: OrderId },

    /// The order status does not move forward as the command requires.
    #[error("TL_ERR_106: Invalid status transition for {order}: {from:?} -> {to}")]
    InvalidStatusTransition {
        order: OrderId,
        from: Option<OrderStatus>,
        to: OrderStatus,
    },

    /// Transitions carry exactly one intent.
    #[error("TL_ERR_107: Expected exactly one command, found {count}")]
    MultipleOrNoCommand { count: usize },

    /// A produced balance has a zero or negative amount.
    #[error("TL_ERR_108: Non-positive amount {amount} at output {index}")]
    NonPositiveAmount { index: usize, amount: i64 },

    /// A full transfer produces a balance for the same owner it consumed.
    #[error("TL_ERR_109: Transfer does not change owner {owner}")]
    OwnerUnchanged { owner: PartyId },

    /// A split's change output is not owned by the declared change owner.
    #[error("TL_ERR_110: Split change not owned by declared change owner {declared:?}")]
    UndeclaredChange { declared: Option<PartyId> },

    /// An order's seller is not among the intent's signers.
    #[error("TL_ERR_111: Unauthorized seller: {seller} did not sign")]
    UnauthorizedSeller { seller: PartyId },

    /// Delivery altered fields other than status.
    #[error("TL_ERR_112: Order terms altered for {order}")]
    OrderTermsAltered { order: OrderId },

    /// A required authorizer has no stake in any touched record.
    #[error("TL_ERR_113: Unexpected authorizer {party}: not a participant of any record")]
    UnexpectedAuthorizer { party: PartyId },

    /// Record counts or field values do not fit the command's shape.
    #[error("TL_ERR_114: Malformed {command} transition: {reason}")]
    MalformedTransition { command: String, reason: String },
}

/// Central error enum for orchestration, negotiation and finality.
#[derive(Debug, Clone, Error)]
pub enum SettleError {
    // =================================================================
    // Validation (1xx)
    // =================================================================
    /// Local validation rejected the transition.
    #[error("{0}")]
    Rejected(#[from] ValidationError),

    // =================================================================
    // Holdings / negotiation (2xx)
    // =================================================================
    /// No live record satisfies the proposer's own requirement.
    #[error("TL_ERR_200: No matching holding: {requirement}")]
    NoMatchingHolding { requirement: String },

    /// A counterparty had nothing matching the request (or offered junk).
    #[error("TL_ERR_201: Counterparty {party} refused: {reason}")]
    CounterpartyRefused { party: PartyId, reason: String },

    /// The record is already reserved by another attempt of this party.
    #[error("TL_ERR_202: Holding {0} already reserved by another attempt")]
    HoldingReserved(RecordRef),

    // =================================================================
    // Authorization (3xx)
    // =================================================================
    /// Required authorizers did not sign.
    #[error("TL_ERR_300: Incomplete authorization: {} signer(s) missing", missing.len())]
    IncompleteAuthorization { missing: Vec<PartyId> },

    /// An authorizer re-validated and refused to sign.
    #[error("TL_ERR_301: Authorizer {party} rejected: {reason}")]
    AuthorizerRejected { party: PartyId, reason: String },

    /// An attached signature does not verify.
    #[error("TL_ERR_302: Invalid signature from {signer}")]
    InvalidSignature { signer: PartyId },

    // =================================================================
    // Consensus / finality (4xx)
    // =================================================================
    /// The finality service refused to commit.
    #[error("TL_ERR_400: Consensus rejected: {reason}")]
    ConsensusRejected { reason: String },

    // =================================================================
    // Session / transport (5xx)
    // =================================================================
    /// Peer closed the session before the protocol finished.
    #[error("TL_ERR_500: Session with {peer} closed")]
    SessionClosed { peer: PartyId },

    /// Peer sent a message out of protocol order.
    #[error("TL_ERR_501: Unexpected message from {peer}: expected {expected}, got {actual}")]
    UnexpectedMessage {
        peer: PartyId,
        expected: String,
        actual: String,
    },

    /// A suspension point waited longer than configured.
    #[error("TL_ERR_502: Timed out waiting for {waiting_for}")]
    Timeout { waiting_for: String },

    /// The party is not registered on the network.
    #[error("TL_ERR_503: Unknown party: {0}")]
    UnknownParty(PartyId),

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// The attempt was abandoned before finality.
    #[error("TL_ERR_900: Attempt cancelled")]
    Cancelled,

    /// Unrecoverable internal error.
    #[error("TL_ERR_901: Internal error: {0}")]
    Internal(String),

    /// Configuration error (invalid values, missing fields, etc.).
    #[error("TL_ERR_902: Configuration error: {0}")]
    Configuration(String),
}

impl SettleError {
    /// `true` only for failures caused by a race on the shared ledger, where
    /// retrying with freshly queried holdings is a reasonable reaction.
    #[must_use]
    pub fn is_race(&self) -> bool {
        matches!(self, Self::ConsensusRejected { .. })
    }
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, SettleError>;
