//! Consensus / finality service.
//!
//! The notary is the only arbiter of double spends. It commits a fully
//! authorized, valid transition atomically, or refuses it without any
//! ledger change.
//!
//! Commit pipeline of [`InMemoryNotary`]:
//! ```text
//! 1. Notary tag      : transition must name this notary
//! 2. Idempotency     : an already committed id returns its receipt again
//! 3. Signatures      : every attached signature valid, none missing
//! 4. Validation      : contract rules re-run
//! 5. Resolution      : every consumed ref known, content matches the ledger
//! 6. Double spend    : no consumed ref already spent
//! 7. Supply          : per-issuer conservation still holds
//! 8. Commit          : mark spent, store outputs, sign receipt
//! ```

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tradeline_types::{
    FinalityReceipt, Identity, NotaryConfig, NotaryId, Record, RecordRef, Result, SettleError,
    SignedTransition, TxId,
};

use crate::supply::SupplyTracker;

/// A service that decides, once and for all, whether a transition commits.
#[async_trait]
pub trait FinalityService: Send + Sync + std::fmt::Debug {
    /// The identity transitions must be tagged with.
    fn id(&self) -> NotaryId;

    /// Commit `signed` or refuse it.
    ///
    /// # Errors
    /// `ConsensusRejected` with the reason; the ledger is unchanged.
    async fn submit(&self, signed: SignedTransition) -> Result<FinalityReceipt>;
}

/// Committed ledger state held by the in-process notary.
#[derive(Debug, Default)]
struct Ledger {
    /// Every record ever produced by a committed transition.
    outputs: HashMap<RecordRef, Record>,
    /// Consumed refs and the transition that consumed them.
    spent: HashMap<RecordRef, TxId>,
    /// Receipts of committed transitions.
    receipts: HashMap<TxId, FinalityReceipt>,
    supply: SupplyTracker,
}

/// Reference notary keeping the committed ledger in memory.
#[derive(Debug)]
pub struct InMemoryNotary {
    identity: Identity,
    config: NotaryConfig,
    ledger: Mutex<Ledger>,
    submissions: AtomicUsize,
}

impl InMemoryNotary {
    #[must_use]
    pub fn new(identity: Identity, config: NotaryConfig) -> Self {
        Self {
            identity,
            config,
            ledger: Mutex::new(Ledger::default()),
            submissions: AtomicUsize::new(0),
        }
    }

    /// Number of `submit` calls received, committed or not.
    #[must_use]
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::Relaxed)
    }

    pub async fn committed_count(&self) -> usize {
        self.ledger.lock().await.receipts.len()
    }

    /// The transition that consumed `reference`, if any.
    pub async fn spent_by(&self, reference: &RecordRef) -> Option<TxId> {
        self.ledger.lock().await.spent.get(reference).copied()
    }

    pub async fn issued_supply(&self, issuer: &tradeline_types::PartyId) -> i64 {
        self.ledger.lock().await.supply.issued_supply(issuer)
    }

    pub async fn live_supply(&self, issuer: &tradeline_types::PartyId) -> i64 {
        self.ledger.lock().await.supply.live_supply(issuer)
    }

    fn reject(tx_id: TxId, reason: String) -> SettleError {
        tracing::warn!(tx = %tx_id.short(), reason = %reason, "Notary rejected transition");
        SettleError::ConsensusRejected { reason }
    }
}

#[async_trait]
impl FinalityService for InMemoryNotary {
    fn id(&self) -> NotaryId {
        NotaryId(self.identity.id().0)
    }

    async fn submit(&self, signed: SignedTransition) -> Result<FinalityReceipt> {
        self.submissions.fetch_add(1, Ordering::Relaxed);
        let tx = &signed.transition;
        let tx_id = tx.id();

        // 1. Notary tag
        if tx.notary() != self.id() {
            return Err(Self::reject(
                tx_id,
                format!("tagged for notary {}, not {}", tx.notary(), self.id()),
            ));
        }

        // The whole check-then-commit runs under one lock, so two
        // submissions spending the same ref are serialized.
        let mut ledger = self.ledger.lock().await;

        // 2. Idempotency
        if let Some(receipt) = ledger.receipts.get(&tx_id) {
            tracing::debug!(tx = %tx_id.short(), "Resubmission of committed transition");
            return Ok(receipt.clone());
        }

        // 3. Signatures
        signed
            .require_complete()
            .map_err(|e| Self::reject(tx_id, e.to_string()))?;

        // 4. Validation
        tradeline_contracts::validate(tx).map_err(|e| Self::reject(tx_id, e.to_string()))?;

        // 5–6. Resolution and double spend
        for live in tx.consumed() {
            match ledger.outputs.get(&live.reference) {
                None => {
                    return Err(Self::reject(
                        tx_id,
                        format!("unknown record {}", live.reference),
                    ));
                }
                Some(committed) if *committed != live.record => {
                    return Err(Self::reject(
                        tx_id,
                        format!("record {} does not match the ledger", live.reference),
                    ));
                }
                Some(_) => {}
            }
            if let Some(consumer) = ledger.spent.get(&live.reference) {
                return Err(Self::reject(
                    tx_id,
                    format!(
                        "double spend: {} already consumed by {}",
                        live.reference,
                        consumer.short()
                    ),
                ));
            }
        }

        // 7. Supply
        if self.config.verify_supply {
            ledger
                .supply
                .verify(tx)
                .map_err(|reason| Self::reject(tx_id, reason))?;
        }

        // 8. Commit
        for reference in tx.consumed_refs() {
            ledger.spent.insert(reference, tx_id);
        }
        for live in tx.outputs() {
            ledger.outputs.insert(live.reference, live.record);
        }
        ledger.supply.apply(tx);

        let receipt = FinalityReceipt {
            tx_id,
            notary: self.id(),
            committed_at: Utc::now(),
            signature: self.identity.sign_receipt(&tx_id),
        };
        ledger.receipts.insert(tx_id, receipt.clone());

        tracing::info!(
            notary = %self.config.name,
            tx = %tx_id.short(),
            consumed = tx.consumed().len(),
            produced = tx.produced().len(),
            "Transition committed"
        );
        Ok(receipt)
    }
}
