//! Proposer side of one settlement attempt.
//!
//! ```text
//!   Start ─▶ HoldingsLocated ─▶ CounterpartyQueried ─▶ TransitionBuilt
//!                                                           │
//!   Committed ◀─ Finalizing ◀─ Authorizing ◀─ LocallySigned ◀─ LocallyValidated
//!
//!   any state before Finalizing ──(error | cancel)──▶ Aborted(reason)
//! ```
//!
//! Every record the attempt holds is reserved through a [`Reservation`], so
//! leaving the attempt by any path releases it. Sessions opened during
//! negotiation are reused to collect authorizations and to announce
//! finality.

use std::collections::BTreeMap;

use tokio::task::JoinSet;
use tradeline_types::{
    Authorization, BalanceRecord, Command, FinalityReceipt, Intent, LiveRecord, OrderId,
    OrderRecord, OrderStatus, PartyId, Result, SettleError, SignedTransition, Transition,
    TransitionBuilder, ValidationError,
};
use tradeline_vault::Reservation;
use uuid::Uuid;

use crate::cancel::CancelSignal;
use crate::context::ParticipantContext;
use crate::message::{HoldingRequest, Message};
use crate::negotiation::request_holding;
use crate::plan::{SettlementOutcome, SettlementPlan};
use crate::transport::Session;

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Where a proposer attempt is. `Committed` and `Aborted` are terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProposerState {
    Start,
    HoldingsLocated,
    CounterpartyQueried,
    TransitionBuilt,
    LocallyValidated,
    LocallySigned,
    Authorizing,
    Finalizing,
    Committed,
    Aborted(String),
}

impl ProposerState {
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Committed | Self::Aborted(_))
    }
}

impl std::fmt::Display for ProposerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Start => write!(f, "START"),
            Self::HoldingsLocated => write!(f, "HOLDINGS_LOCATED"),
            Self::CounterpartyQueried => write!(f, "COUNTERPARTY_QUERIED"),
            Self::TransitionBuilt => write!(f, "TRANSITION_BUILT"),
            Self::LocallyValidated => write!(f, "LOCALLY_VALIDATED"),
            Self::LocallySigned => write!(f, "LOCALLY_SIGNED"),
            Self::Authorizing => write!(f, "AUTHORIZING"),
            Self::Finalizing => write!(f, "FINALIZING"),
            Self::Committed => write!(f, "COMMITTED"),
            Self::Aborted(_) => write!(f, "ABORTED"),
        }
    }
}

// ---------------------------------------------------------------------------
// Draft
// ---------------------------------------------------------------------------

/// Pieces gathered while the attempt moves towards a transition.
#[derive(Debug, Default)]
struct Draft {
    /// Own balance to spend (`Pay`, `PlaceOrder`).
    own_balance: Option<Reservation>,
    /// Own placed order to deliver (`DeliverOrder`).
    own_order: Option<Reservation>,
    /// Order to create (`PlaceOrder`).
    new_order: Option<OrderRecord>,
    /// Balance learned from a counterparty (`DeliverOrder`).
    counterparty_balance: Option<LiveRecord>,
    /// Open sessions by peer.
    sessions: BTreeMap<PartyId, Session>,
}

fn missing(what: &str) -> SettleError {
    SettleError::Internal(format!("attempt draft is missing {what}"))
}

fn malformed(command: &str, reason: impl Into<String>) -> SettleError {
    SettleError::Rejected(ValidationError::MalformedTransition {
        command: command.to_string(),
        reason: reason.into(),
    })
}

/// Add the payee output and, if anything is left, a change output.
/// Returns the change owner to declare.
fn add_payment_outputs(
    builder: &mut TransitionBuilder,
    source: &BalanceRecord,
    payee: PartyId,
    amount: i64,
    change_to: PartyId,
) -> Option<PartyId> {
    builder.add_produced(source.reassigned(payee, amount));
    let change = source.amount.saturating_sub(amount);
    if change == 0 {
        return None;
    }
    builder.add_produced(source.reassigned(change_to, change));
    Some(change_to)
}

// ---------------------------------------------------------------------------
// Proposer
// ---------------------------------------------------------------------------

/// One attempt to settle a [`SettlementPlan`].
#[derive(Debug)]
pub struct Proposer {
    ctx: ParticipantContext,
    attempt: Uuid,
    state: ProposerState,
    cancel: CancelSignal,
}

impl Proposer {
    #[must_use]
    pub fn new(ctx: ParticipantContext, cancel: CancelSignal) -> Self {
        Self {
            ctx,
            attempt: Uuid::now_v7(),
            state: ProposerState::Start,
            cancel,
        }
    }

    #[must_use]
    pub fn attempt(&self) -> Uuid {
        self.attempt
    }

    #[must_use]
    pub fn state(&self) -> &ProposerState {
        &self.state
    }

    /// Drive the attempt to `Committed` or `Aborted`.
    ///
    /// # Errors
    /// The reason the attempt aborted. Only `ConsensusRejected` can follow a
    /// submission to the notary.
    pub async fn run(&mut self, plan: &SettlementPlan) -> Result<SettlementOutcome> {
        tracing::info!(
            attempt = %self.attempt,
            party = %self.ctx.identity.name(),
            plan = %plan,
            "Settlement attempt started"
        );
        match self.drive(plan).await {
            Ok(outcome) => {
                tracing::info!(
                    attempt = %self.attempt,
                    tx = %outcome.tx_id.short(),
                    plan = %plan,
                    "Settlement committed"
                );
                Ok(outcome)
            }
            Err(err) => {
                let reached = self.state.to_string();
                self.enter(ProposerState::Aborted(err.to_string()));
                tracing::info!(
                    attempt = %self.attempt,
                    plan = %plan,
                    reached = %reached,
                    error = %err,
                    "Settlement aborted"
                );
                Err(err)
            }
        }
    }

    fn enter(&mut self, next: ProposerState) {
        tracing::debug!(
            attempt = %self.attempt,
            from = %self.state,
            to = %next,
            "Proposer state change"
        );
        self.state = next;
    }

    /// Move to `next`, unless the attempt was cancelled meanwhile.
    fn advance(&mut self, next: ProposerState) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(SettleError::Cancelled);
        }
        self.enter(next);
        Ok(())
    }

    async fn drive(&mut self, plan: &SettlementPlan) -> Result<SettlementOutcome> {
        // 1. Own holdings
        let mut draft = self.locate(plan)?;
        self.advance(ProposerState::HoldingsLocated)?;

        // 2. Counterparty holdings
        self.query_counterparty(plan, &mut draft).await?;
        self.advance(ProposerState::CounterpartyQueried)?;

        // 3. Build
        let transition = self.build(plan, &draft)?;
        self.advance(ProposerState::TransitionBuilt)?;

        // 4. Validate
        tradeline_contracts::validate(&transition)?;
        self.advance(ProposerState::LocallyValidated)?;

        // 5. Sign
        let mut signed = SignedTransition::new(transition);
        signed.add_authorization(self.ctx.identity.sign(&signed.transition));
        self.advance(ProposerState::LocallySigned)?;

        // 6. Collect authorizations
        self.advance(ProposerState::Authorizing)?;
        let sessions = std::mem::take(&mut draft.sessions);
        let sessions = self.collect_authorizations(&mut signed, sessions).await?;
        signed.require_complete()?;

        // 7. Finality
        self.advance(ProposerState::Finalizing)?;
        let receipt = self.finalize(&signed).await?;
        self.ctx.vault.record_transition(&signed.transition);
        self.announce(&signed, &receipt, &sessions).await;
        self.enter(ProposerState::Committed);

        // Spent records are gone from the vault; releasing is a no-op now.
        drop(draft);

        Ok(SettlementOutcome {
            tx_id: signed.id(),
            transition: signed,
            receipt,
        })
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    fn locate(&self, plan: &SettlementPlan) -> Result<Draft> {
        let me = self.ctx.id();
        let policy = self.ctx.config.selection;
        let mut draft = Draft::default();

        match plan {
            SettlementPlan::Issue { .. } => {}
            SettlementPlan::Pay { amount, .. } => {
                draft.own_balance = Some(self.ctx.vault.reserve_spendable(*amount, policy)?);
            }
            SettlementPlan::PlaceOrder {
                seller,
                external_id,
                description,
                price,
                down_payment_fraction,
            } => {
                let order = OrderRecord::new_placed(
                    OrderId::new(external_id.clone()),
                    description.clone(),
                    me,
                    *seller,
                    *price,
                    *down_payment_fraction,
                );
                let down = order.down_payment().ok_or_else(|| {
                    malformed(
                        "ORDER_PLACING",
                        format!("down payment fraction {down_payment_fraction} outside [0, 1]"),
                    )
                })?;
                draft.own_balance = Some(self.ctx.vault.reserve_spendable(down, policy)?);
                draft.new_order = Some(order);
            }
            SettlementPlan::DeliverOrder { external_id } => {
                let reservation = self
                    .ctx
                    .vault
                    .reserve_order(external_id, OrderStatus::Placed)?;
                let is_seller = reservation
                    .record()
                    .record
                    .as_order()
                    .is_some_and(|o| o.seller == me);
                if !is_seller {
                    return Err(SettleError::NoMatchingHolding {
                        requirement: format!("placed order {external_id} with us as seller"),
                    });
                }
                draft.own_order = Some(reservation);
            }
        }
        Ok(draft)
    }

    async fn query_counterparty(&mut self, plan: &SettlementPlan, draft: &mut Draft) -> Result<()> {
        if !matches!(plan, SettlementPlan::DeliverOrder { .. }) {
            return Ok(());
        }
        let order = draft
            .own_order
            .as_ref()
            .and_then(|r| r.record().record.as_order())
            .ok_or_else(|| missing("the order to deliver"))?;
        let due = order
            .balance_due()
            .ok_or_else(|| malformed("ORDER_DELIVERED", "balance due out of range"))?;
        let buyer = order.buyer;

        let mut session = self.open_session(buyer).await?;
        let request = HoldingRequest {
            required_amount: due,
            required_owner: buyer,
        };
        let offered = self
            .cancel
            .guard(request_holding(&mut session, request))
            .await?;

        draft.counterparty_balance = Some(offered);
        draft.sessions.insert(buyer, session);
        Ok(())
    }

    fn build(&self, plan: &SettlementPlan, draft: &Draft) -> Result<Transition> {
        let me = self.ctx.id();
        let mut builder = TransitionBuilder::new(self.ctx.config.notary);

        match plan {
            SettlementPlan::Issue { owner, amount } => {
                builder
                    .add_produced(BalanceRecord::new(me, *owner, *amount))
                    .add_intent(Intent::new(Command::Issue, [me, *owner]));
            }
            SettlementPlan::Pay { recipient, amount } => {
                let input = draft
                    .own_balance
                    .as_ref()
                    .ok_or_else(|| missing("the balance to spend"))?
                    .record();
                let source = input
                    .record
                    .as_balance()
                    .ok_or_else(|| missing("a balance record"))?;
                builder.add_consumed(input.clone());
                let change_owner = add_payment_outputs(&mut builder, source, *recipient, *amount, me);
                builder.add_intent(Intent::new(
                    Command::Pay { change_owner },
                    [source.issuer, me, *recipient],
                ));
            }
            SettlementPlan::PlaceOrder { seller, .. } => {
                let input = draft
                    .own_balance
                    .as_ref()
                    .ok_or_else(|| missing("the balance to spend"))?
                    .record();
                let source = input
                    .record
                    .as_balance()
                    .ok_or_else(|| missing("a balance record"))?;
                let order = draft
                    .new_order
                    .as_ref()
                    .ok_or_else(|| missing("the order to place"))?;
                let down = order
                    .down_payment()
                    .ok_or_else(|| malformed("ORDER_PLACING", "down payment out of range"))?;

                builder.add_consumed(input.clone()).add_produced(order.clone());
                let change_owner = add_payment_outputs(&mut builder, source, *seller, down, me);
                builder.add_intent(Intent::new(
                    Command::OrderPlacing { change_owner },
                    [me, *seller, source.issuer],
                ));
            }
            SettlementPlan::DeliverOrder { .. } => {
                let placed = draft
                    .own_order
                    .as_ref()
                    .ok_or_else(|| missing("the order to deliver"))?
                    .record();
                let order = placed
                    .record
                    .as_order()
                    .ok_or_else(|| missing("an order record"))?;
                let offered = draft
                    .counterparty_balance
                    .as_ref()
                    .ok_or_else(|| missing("the buyer's balance"))?;
                let source = offered
                    .record
                    .as_balance()
                    .ok_or_else(|| missing("a balance record"))?;
                let due = order
                    .balance_due()
                    .ok_or_else(|| malformed("ORDER_DELIVERED", "balance due out of range"))?;

                builder
                    .add_consumed(placed.clone())
                    .add_consumed(offered.clone())
                    .add_produced(order.delivered());
                let change_owner = add_payment_outputs(&mut builder, source, me, due, order.buyer);
                builder.add_intent(Intent::new(
                    Command::OrderDelivered { change_owner },
                    [me, order.buyer, source.issuer],
                ));
            }
        }
        Ok(builder.build())
    }

    /// Send the proposal to every required authorizer other than us, in
    /// parallel, and attach each valid authorization. Returns all sessions
    /// for the finality announcement.
    async fn collect_authorizations(
        &mut self,
        signed: &mut SignedTransition,
        mut sessions: BTreeMap<PartyId, Session>,
    ) -> Result<BTreeMap<PartyId, Session>> {
        let me = self.ctx.id();
        let tx_id = signed.id();
        let pending: Vec<PartyId> = signed
            .missing_authorizers()
            .into_iter()
            .filter(|party| *party != me)
            .collect();

        for party in &pending {
            if !sessions.contains_key(party) {
                let session = self.open_session(*party).await?;
                sessions.insert(*party, session);
            }
        }

        // Dropping the set on an early return aborts the remaining requests
        // and closes their sessions.
        let mut requests = JoinSet::new();
        for party in pending {
            let Some(mut session) = sessions.remove(&party) else {
                return Err(missing("an authorizer session"));
            };
            let proposal = signed.clone();
            requests.spawn(async move {
                let result = request_authorization(&mut session, proposal).await;
                (party, session, result)
            });
        }

        loop {
            let next = self
                .cancel
                .guard(async { Ok(requests.join_next().await) })
                .await?;
            let Some(joined) = next else {
                break;
            };
            let (party, session, result) = joined
                .map_err(|e| SettleError::Internal(format!("authorization task failed: {e}")))?;
            sessions.insert(party, session);
            let authorization = result?;
            if authorization.signer == party && authorization.verify(&tx_id) {
                tracing::debug!(
                    attempt = %self.attempt,
                    party = %self.ctx.name_of(&party),
                    "Authorization received"
                );
                signed.add_authorization(authorization);
            } else {
                tracing::warn!(
                    attempt = %self.attempt,
                    party = %self.ctx.name_of(&party),
                    signer = %authorization.signer,
                    "Discarding invalid authorization"
                );
            }
        }
        Ok(sessions)
    }

    async fn finalize(&self, signed: &SignedTransition) -> Result<FinalityReceipt> {
        let tx_id = signed.id();
        let receipt = tokio::time::timeout(
            self.ctx.config.finality_timeout(),
            self.ctx.notary.submit(signed.clone()),
        )
        .await
        .map_err(|_| SettleError::Timeout {
            waiting_for: "finality".to_string(),
        })??;

        if receipt.tx_id != tx_id || receipt.notary != self.ctx.config.notary || !receipt.verify() {
            return Err(SettleError::Internal(format!(
                "finality receipt for {} does not verify",
                tx_id.short()
            )));
        }
        Ok(receipt)
    }

    /// Tell every counterparty the transition committed. Failures are only
    /// logged: the ledger is already final.
    async fn announce(
        &self,
        signed: &SignedTransition,
        receipt: &FinalityReceipt,
        sessions: &BTreeMap<PartyId, Session>,
    ) {
        for (party, session) in sessions {
            let message = Message::Finalized {
                signed: Box::new(signed.clone()),
                receipt: receipt.clone(),
            };
            if let Err(err) = session.send(message).await {
                tracing::warn!(
                    attempt = %self.attempt,
                    party = %self.ctx.name_of(party),
                    error = %err,
                    "Could not announce finality"
                );
            }
        }
    }

    async fn open_session(&mut self, peer: PartyId) -> Result<Session> {
        let me = self.ctx.id();
        let network = self.ctx.network.clone();
        let mut session = self.cancel.guard(network.open(me, peer)).await?;
        session.set_timeout(self.ctx.config.session_timeout());
        Ok(session)
    }
}

/// Send `proposal` and wait for the peer's signature or refusal.
async fn request_authorization(
    session: &mut Session,
    proposal: SignedTransition,
) -> Result<Authorization> {
    session.send(Message::Proposal(Box::new(proposal))).await?;
    match session.receive().await? {
        Message::Authorization(authorization) => Ok(authorization),
        Message::Rejection { reason } => Err(SettleError::AuthorizerRejected {
            party: session.peer(),
            reason,
        }),
        other => Err(SettleError::UnexpectedMessage {
            peer: session.peer(),
            expected: "AUTHORIZATION or REJECTION".to_string(),
            actual: other.kind().to_string(),
        }),
    }
}
