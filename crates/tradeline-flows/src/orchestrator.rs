//! The per-participant entry point.
//!
//! An [`Orchestrator`] runs settlement attempts as proposer and serves
//! incoming sessions as responder. Attempts are independent of each other:
//! the vault's reservations keep two concurrent attempts of one party from
//! picking the same record, and the notary decides between parties.

use tokio::task::JoinHandle;
use tradeline_types::{Result, constants};

use crate::cancel::CancelSignal;
use crate::context::ParticipantContext;
use crate::plan::{SettlementOutcome, SettlementPlan};
use crate::proposer::Proposer;
use crate::responder::respond;
use crate::transport::Inbox;

#[derive(Debug, Clone)]
pub struct Orchestrator {
    ctx: ParticipantContext,
}

impl Orchestrator {
    #[must_use]
    pub fn new(ctx: ParticipantContext) -> Self {
        Self { ctx }
    }

    #[must_use]
    pub fn context(&self) -> &ParticipantContext {
        &self.ctx
    }

    /// Settle `plan` with this participant as proposer.
    ///
    /// # Errors
    /// See [`Orchestrator::settle_with_cancel`].
    pub async fn settle(&self, plan: SettlementPlan) -> Result<SettlementOutcome> {
        self.settle_with_cancel(plan, CancelSignal::never()).await
    }

    /// Settle `plan`, abandoning the attempt if `cancel` fires before the
    /// transition reaches the notary.
    ///
    /// # Errors
    /// - `NoMatchingHolding` / `HoldingReserved` if own holdings are missing
    /// - `CounterpartyRefused` if a counterparty has nothing to contribute
    /// - `Rejected` if the built transition fails local validation
    /// - `AuthorizerRejected` / `IncompleteAuthorization` if a signer refuses
    /// - `ConsensusRejected` if the notary refuses (a race: retry may succeed)
    /// - `Timeout`, `SessionClosed`, `UnexpectedMessage`, `Cancelled`
    pub async fn settle_with_cancel(
        &self,
        plan: SettlementPlan,
        cancel: CancelSignal,
    ) -> Result<SettlementOutcome> {
        let mut proposer = Proposer::new(self.ctx.clone(), cancel);
        proposer.run(&plan).await
    }

    /// Answer every session arriving at `inbox`, each on its own task.
    ///
    /// The returned task runs until the inbox closes or is aborted.
    #[must_use]
    pub fn serve(&self, mut inbox: Inbox) -> JoinHandle<()> {
        let ctx = self.ctx.clone();
        tokio::spawn(async move {
            tracing::info!(
                party = %ctx.identity.name(),
                protocol = constants::PROTOCOL_NAME,
                version = constants::VERSION,
                "Responder listening"
            );
            while let Some(session) = inbox.accept().await {
                let ctx = ctx.clone();
                tokio::spawn(async move {
                    let peer = ctx.name_of(&session.peer());
                    let party = ctx.identity.name().to_string();
                    match respond(ctx, session).await {
                        Ok(outcome) => tracing::debug!(
                            party = %party,
                            peer = %peer,
                            state = %outcome.state,
                            "Responder session finished"
                        ),
                        Err(err) => tracing::warn!(
                            party = %party,
                            peer = %peer,
                            error = %err,
                            "Responder session failed"
                        ),
                    }
                });
            }
            tracing::info!(party = %ctx.identity.name(), "Responder stopped");
        })
    }
}
