//! Messages exchanged over a session between proposer and responder.
//!
//! ```text
//!   proposer                          responder
//!      │ ── HoldingRequest ───────────▶ │   (only if a contribution is needed)
//!      │ ◀─────────── HoldingResponse ─ │
//!      │ ── Proposal ─────────────────▶ │
//!      │ ◀── Authorization | Rejection ─ │
//!      │ ── Finalized ────────────────▶ │   (only after the notary commits)
//! ```

use serde::{Deserialize, Serialize};
use tradeline_types::{Authorization, FinalityReceipt, LiveRecord, PartyId, SignedTransition};

/// Ask a counterparty for one live balance it owns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoldingRequest {
    pub required_amount: i64,
    pub required_owner: PartyId,
}

impl HoldingRequest {
    /// Whether `live` is a balance that satisfies this request.
    #[must_use]
    pub fn is_satisfied_by(&self, live: &LiveRecord) -> bool {
        live.record
            .as_balance()
            .is_some_and(|b| b.owner == self.required_owner && b.amount >= self.required_amount)
    }
}

/// A counterparty's answer. Nothing beyond the one offered record is disclosed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum HoldingResponse {
    Offered(LiveRecord),
    InsufficientFunds,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Message {
    HoldingRequest(HoldingRequest),
    HoldingResponse(HoldingResponse),
    Proposal(Box<SignedTransition>),
    Authorization(Authorization),
    Rejection { reason: String },
    /// The committed transition and the notary's receipt for it.
    Finalized {
        signed: Box<SignedTransition>,
        receipt: FinalityReceipt,
    },
}

/// Discriminant of a [`Message`], used to state what a session expects next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    HoldingRequest,
    HoldingResponse,
    Proposal,
    Authorization,
    Rejection,
    Finalized,
}

impl Message {
    #[must_use]
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::HoldingRequest(_) => MessageKind::HoldingRequest,
            Self::HoldingResponse(_) => MessageKind::HoldingResponse,
            Self::Proposal(_) => MessageKind::Proposal,
            Self::Authorization(_) => MessageKind::Authorization,
            Self::Rejection { .. } => MessageKind::Rejection,
            Self::Finalized { .. } => MessageKind::Finalized,
        }
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::HoldingRequest => write!(f, "HOLDING_REQUEST"),
            Self::HoldingResponse => write!(f, "HOLDING_RESPONSE"),
            Self::Proposal => write!(f, "PROPOSAL"),
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::Rejection => write!(f, "REJECTION"),
            Self::Finalized => write!(f, "FINALIZED"),
        }
    }
}

#[cfg(test)]
mod tests {
    use tradeline_types::{BalanceRecord, PartyId};

    use super::*;

    #[test]
    fn request_matching() {
        let owner = PartyId([2; 32]);
        let req = HoldingRequest {
            required_amount: 50,
            required_owner: owner,
        };
        let issuer = PartyId([1; 32]);
        assert!(req.is_satisfied_by(&LiveRecord::dummy_balance(issuer, owner, 50)));
        assert!(!req.is_satisfied_by(&LiveRecord::dummy_balance(issuer, owner, 49)));
        assert!(!req.is_satisfied_by(&LiveRecord::dummy_balance(issuer, issuer, 500)));
    }

    #[test]
    fn response_serde_roundtrip() {
        let live = LiveRecord::dummy(BalanceRecord::new(PartyId([1; 32]), PartyId([2; 32]), 7).into());
        let msg = Message::HoldingResponse(HoldingResponse::Offered(live.clone()));
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind(), MessageKind::HoldingResponse);
        match back {
            Message::HoldingResponse(HoldingResponse::Offered(got)) => assert_eq!(got, live),
            other => panic!("unexpected {:?}", other.kind()),
        }
    }
}
