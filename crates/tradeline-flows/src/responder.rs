//! Responder side: one incoming session, answered on the participant's behalf.
//!
//! ```text
//!   AwaitingRequest ──HoldingRequest──▶ Responding ──offered──▶ AwaitingProposal
//!         │                                 │                         │
//!         │                                 └──insufficient──▶ Rejected
//!         └───────────────Proposal────────────────────────────▶ Validating
//!                                                                     │
//!                                               Rejected ◀──refuse────┤
//!                                                 Signed ◀──sign──────┘
//!                                                   │
//!                                                   └──Finalized──▶ Recorded
//! ```
//!
//! The responder never signs a transition it did not re-validate itself.
//! A record it offered stays reserved until the session ends, whatever way
//! it ends.

use std::time::Duration;

use tradeline_types::{PartyId, Result, SettleError, SignedTransition, TxId};
use tradeline_vault::Reservation;

use crate::acceptance::{Refusal, check_acceptance};
use crate::context::ParticipantContext;
use crate::message::{Message, MessageKind};
use crate::negotiation::answer_holding_request;
use crate::transport::Session;

/// Where a responder session is. `Signed`, `Rejected` and `Recorded` end it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponderState {
    AwaitingRequest,
    Responding,
    AwaitingProposal,
    Validating,
    Signed,
    Rejected(String),
    /// Signed, and the committed transition was applied to the vault.
    Recorded,
}

impl std::fmt::Display for ResponderState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AwaitingRequest => write!(f, "AWAITING_REQUEST"),
            Self::Responding => write!(f, "RESPONDING"),
            Self::AwaitingProposal => write!(f, "AWAITING_PROPOSAL"),
            Self::Validating => write!(f, "VALIDATING"),
            Self::Signed => write!(f, "SIGNED"),
            Self::Rejected(_) => write!(f, "REJECTED"),
            Self::Recorded => write!(f, "RECORDED"),
        }
    }
}

/// How a responder session ended.
#[derive(Debug, Clone)]
pub struct ResponderOutcome {
    pub peer: PartyId,
    pub state: ResponderState,
    /// The proposal seen, if one arrived.
    pub tx_id: Option<TxId>,
}

struct Responder {
    ctx: ParticipantContext,
    peer: PartyId,
    state: ResponderState,
}

impl Responder {
    fn enter(&mut self, next: ResponderState) {
        tracing::debug!(
            party = %self.ctx.identity.name(),
            peer = %self.ctx.name_of(&self.peer),
            from = %self.state,
            to = %next,
            "Responder state change"
        );
        self.state = next;
    }

    fn finish(self, tx_id: Option<TxId>) -> ResponderOutcome {
        ResponderOutcome {
            peer: self.peer,
            state: self.state,
            tx_id,
        }
    }

    /// Re-validate `proposal` as this party.
    fn evaluate(
        &self,
        proposal: &SignedTransition,
        offered: Option<&Reservation>,
    ) -> std::result::Result<(), Refusal> {
        let tx = &proposal.transition;
        if tx.notary() != self.ctx.config.notary {
            return Err(format!("tagged for notary {}, not ours", tx.notary()));
        }
        if !proposal.verify_signatures() {
            return Err("an attached signature does not verify".to_string());
        }
        tradeline_contracts::validate(tx).map_err(|e| e.to_string())?;
        check_acceptance(self.ctx.id(), tx, offered.map(Reservation::record))
    }

    /// Record the committed transition once the proposer announces it.
    /// Anything else leaves the session `Signed`.
    async fn await_finality(&mut self, session: &mut Session, tx_id: TxId, wait: Duration) {
        match session.receive_within(wait).await {
            Ok(Message::Finalized { signed, receipt }) => {
                let genuine = signed.id() == tx_id
                    && receipt.tx_id == tx_id
                    && receipt.notary == self.ctx.config.notary
                    && receipt.verify()
                    && signed.require_complete().is_ok();
                if genuine {
                    self.ctx.vault.record_transition(&signed.transition);
                    self.enter(ResponderState::Recorded);
                } else {
                    tracing::warn!(
                        peer = %self.ctx.name_of(&self.peer),
                        tx = %tx_id.short(),
                        "Ignoring finality announcement that does not verify"
                    );
                }
            }
            Ok(other) => {
                tracing::warn!(
                    peer = %self.ctx.name_of(&self.peer),
                    kind = %other.kind(),
                    "Expected a finality announcement"
                );
            }
            Err(err) => {
                tracing::debug!(
                    peer = %self.ctx.name_of(&self.peer),
                    tx = %tx_id.short(),
                    error = %err,
                    "Session ended before finality"
                );
            }
        }
    }
}

/// Answer one session opened by a proposer.
///
/// Returns once the session reached a terminal state. After signing, the
/// responder waits for the finality announcement and records the committed
/// transition; if none arrives the outcome stays `Signed`.
///
/// # Errors
/// Session failures before a terminal state (`Timeout`, `SessionClosed`,
/// `UnexpectedMessage`).
pub async fn respond(ctx: ParticipantContext, mut session: Session) -> Result<ResponderOutcome> {
    session.set_timeout(ctx.config.session_timeout());
    let finality_wait = ctx
        .config
        .session_timeout()
        .saturating_add(ctx.config.finality_timeout());
    let mut responder = Responder {
        peer: session.peer(),
        ctx,
        state: ResponderState::AwaitingRequest,
    };

    // 1. Optional holding request
    let mut offered: Option<Reservation> = None;
    let proposal = match session.receive().await? {
        Message::HoldingRequest(request) => {
            responder.enter(ResponderState::Responding);
            let (response, reservation) = answer_holding_request(
                &responder.ctx.vault,
                &request,
                responder.ctx.config.selection,
            );
            let refused = reservation.is_none();
            session.send(Message::HoldingResponse(response)).await?;
            if refused {
                responder.enter(ResponderState::Rejected(format!(
                    "no balance of at least {} to offer",
                    request.required_amount
                )));
                return Ok(responder.finish(None));
            }
            offered = reservation;
            responder.enter(ResponderState::AwaitingProposal);

            let Message::Proposal(proposal) =
                session.receive_expected(MessageKind::Proposal).await?
            else {
                return Err(SettleError::Internal(
                    "receive_expected returned another kind".to_string(),
                ));
            };
            proposal
        }
        Message::Proposal(proposal) => proposal,
        other => {
            return Err(SettleError::UnexpectedMessage {
                peer: responder.peer,
                expected: "HOLDING_REQUEST or PROPOSAL".to_string(),
                actual: other.kind().to_string(),
            });
        }
    };

    // 2. Re-validate and decide
    responder.enter(ResponderState::Validating);
    let tx_id = proposal.id();
    if let Err(reason) = responder.evaluate(&proposal, offered.as_ref()) {
        tracing::info!(
            party = %responder.ctx.identity.name(),
            peer = %responder.ctx.name_of(&responder.peer),
            tx = %tx_id.short(),
            reason = %reason,
            "Refusing to sign"
        );
        session
            .send(Message::Rejection {
                reason: reason.clone(),
            })
            .await?;
        responder.enter(ResponderState::Rejected(reason));
        return Ok(responder.finish(Some(tx_id)));
    }

    let authorization = responder.ctx.identity.sign(&proposal.transition);
    session.send(Message::Authorization(authorization)).await?;
    responder.enter(ResponderState::Signed);

    // 3. Finality announcement
    responder
        .await_finality(&mut session, tx_id, finality_wait)
        .await;

    drop(offered);
    Ok(responder.finish(Some(tx_id)))
}
