//! Per-issuer supply conservation.
//!
//! Invariant enforced on every commit:
//! ```text
//! ∀ issuer: Σ(live balance amounts) == Σ(issued amounts)
//! ```
//!
//! Transfers move value between owners but never create or destroy it, so
//! only an issuance may change an issuer's total. A transition that would
//! break the invariant is refused before anything is committed.

use std::collections::HashMap;

use tradeline_types::{Command, PartyId, Transition};

/// Tracks issued and live supply per issuer.
#[derive(Debug, Default)]
pub struct SupplyTracker {
    /// Total minted per issuer since genesis.
    issued: HashMap<PartyId, i64>,
    /// Sum of live balance amounts per issuer.
    live: HashMap<PartyId, i64>,
}

impl SupplyTracker {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn issued_supply(&self, issuer: &PartyId) -> i64 {
        self.issued.get(issuer).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn live_supply(&self, issuer: &PartyId) -> i64 {
        self.live.get(issuer).copied().unwrap_or(0)
    }

    /// Check that committing `tx` keeps every issuer's supply conserved.
    ///
    /// # Errors
    /// A description of the first issuer whose supply would drift.
    pub fn verify(&self, tx: &Transition) -> Result<(), String> {
        let deltas = Self::deltas(tx);
        for (issuer, delta) in &deltas {
            let live = self.live_supply(issuer).checked_add(delta.live);
            let issued = self.issued_supply(issuer).checked_add(delta.issued);
            match (live, issued) {
                (Some(live), Some(issued)) if live == issued => {}
                (Some(live), Some(issued)) => {
                    return Err(format!(
                        "issuer {issuer}: live supply {live} != issued supply {issued}"
                    ));
                }
                _ => return Err(format!("issuer {issuer}: supply overflow")),
            }
        }
        Ok(())
    }

    /// Apply a transition already checked by [`SupplyTracker::verify`].
    pub fn apply(&mut self, tx: &Transition) {
        for (issuer, delta) in Self::deltas(tx) {
            let live = self.live.entry(issuer).or_insert(0);
            *live = live.saturating_add(delta.live);
            let issued = self.issued.entry(issuer).or_insert(0);
            *issued = issued.saturating_add(delta.issued);
        }
    }

    fn deltas(tx: &Transition) -> HashMap<PartyId, Delta> {
        let minting = tx
            .intents()
            .iter()
            .any(|intent| intent.command == Command::Issue);

        let mut deltas: HashMap<PartyId, Delta> = HashMap::new();
        for balance in tx.consumed().iter().filter_map(|l| l.record.as_balance()) {
            let d = deltas.entry(balance.issuer).or_default();
            d.live = d.live.saturating_sub(balance.amount);
        }
        for balance in tx.produced().iter().filter_map(|r| r.as_balance()) {
            let d = deltas.entry(balance.issuer).or_default();
            d.live = d.live.saturating_add(balance.amount);
            if minting {
                d.issued = d.issued.saturating_add(balance.amount);
            }
        }
        deltas
    }
}

#[derive(Debug, Default, Clone, Copy)]
struct Delta {
    live: i64,
    issued: i64,
}

#[cfg(test)]
mod tests {
    use tradeline_types::{BalanceRecord, Intent, LiveRecord, NotaryId, TransitionBuilder};

    use super::*;

    const ISSUER: PartyId = PartyId([1; 32]);
    const ALICE: PartyId = PartyId([2; 32]);
    const BOB: PartyId = PartyId([3; 32]);

    fn issue(amount: i64) -> Transition {
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_produced(BalanceRecord::new(ISSUER, ALICE, amount))
            .add_intent(Intent::new(Command::Issue, [ISSUER, ALICE]));
        b.build()
    }

    fn transfer(input: i64, outputs: &[i64]) -> Transition {
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_consumed(LiveRecord::dummy_balance(ISSUER, ALICE, input));
        for amount in outputs {
            b.add_produced(BalanceRecord::new(ISSUER, BOB, *amount));
        }
        b.add_intent(Intent::new(
            Command::Pay { change_owner: None },
            [ISSUER, ALICE, BOB],
        ));
        b.build()
    }

    #[test]
    fn issuance_grows_both_sides() {
        let mut supply = SupplyTracker::new();
        let tx = issue(100);
        supply.verify(&tx).unwrap();
        supply.apply(&tx);
        assert_eq!(supply.issued_supply(&ISSUER), 100);
        assert_eq!(supply.live_supply(&ISSUER), 100);
    }

    #[test]
    fn conserving_transfer_passes() {
        let mut supply = SupplyTracker::new();
        supply.apply(&issue(100));
        let tx = transfer(100, &[60, 40]);
        supply.verify(&tx).unwrap();
        supply.apply(&tx);
        assert_eq!(supply.live_supply(&ISSUER), 100);
    }

    #[test]
    fn inflating_transfer_fails() {
        let mut supply = SupplyTracker::new();
        supply.apply(&issue(100));
        let err = supply.verify(&transfer(100, &[60, 41])).unwrap_err();
        assert!(err.contains("101"), "{err}");
    }

    #[test]
    fn untracked_issuer_reads_zero() {
        let supply = SupplyTracker::new();
        assert_eq!(supply.issued_supply(&BOB), 0);
        assert_eq!(supply.live_supply(&BOB), 0);
    }
}
