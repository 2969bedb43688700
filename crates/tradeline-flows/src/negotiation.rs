//! Holding negotiation: the proposer learns exactly one counterparty record.
//!
//! The proposer cannot build a transition that consumes a counterparty's
//! balance without knowing its reference and content, and the counterparty
//! should disclose nothing more than that. One request, one response.

use tradeline_types::{LiveRecord, Result, SelectionPolicy, SettleError};
use tradeline_vault::{Reservation, SharedVault};

use crate::message::{HoldingRequest, HoldingResponse, Message, MessageKind};
use crate::transport::Session;

/// Proposer side: ask the session peer for a record satisfying `request`.
///
/// # Errors
/// - `CounterpartyRefused` if the peer has nothing suitable, or offers a
///   record that does not satisfy the request
/// - session errors (`Timeout`, `SessionClosed`, `UnexpectedMessage`)
pub async fn request_holding(session: &mut Session, request: HoldingRequest) -> Result<LiveRecord> {
    let peer = session.peer();
    session
        .send(Message::HoldingRequest(request.clone()))
        .await?;

    let Message::HoldingResponse(response) =
        session.receive_expected(MessageKind::HoldingResponse).await?
    else {
        return Err(SettleError::Internal(
            "receive_expected returned another kind".to_string(),
        ));
    };

    match response {
        HoldingResponse::Offered(live) if request.is_satisfied_by(&live) => {
            tracing::debug!(peer = %peer, record = %live.reference, "Counterparty offered holding");
            Ok(live)
        }
        HoldingResponse::Offered(live) => Err(SettleError::CounterpartyRefused {
            party: peer,
            reason: format!("offered record {} does not satisfy the request", live.reference),
        }),
        HoldingResponse::InsufficientFunds => Err(SettleError::CounterpartyRefused {
            party: peer,
            reason: format!(
                "no live balance of at least {} owned by {}",
                request.required_amount, request.required_owner
            ),
        }),
    }
}

/// Responder side: pick and reserve one record satisfying `request`.
///
/// Requests naming an owner other than the vault's owner are answered with
/// [`HoldingResponse::InsufficientFunds`]. The returned reservation keeps the
/// offered record from being offered or spent by another attempt until it
/// is dropped.
#[must_use]
pub fn answer_holding_request(
    vault: &SharedVault,
    request: &HoldingRequest,
    policy: SelectionPolicy,
) -> (HoldingResponse, Option<Reservation>) {
    if request.required_owner != vault.owner() {
        return (HoldingResponse::InsufficientFunds, None);
    }
    match vault.reserve_spendable(request.required_amount, policy) {
        Ok(reservation) => (
            HoldingResponse::Offered(reservation.record().clone()),
            Some(reservation),
        ),
        Err(_) => (HoldingResponse::InsufficientFunds, None),
    }
}
