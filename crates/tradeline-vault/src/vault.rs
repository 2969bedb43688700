//! The vault: one participant's arena of records and their liveness.
//!
//! The vault never invents state. It changes only when its owner observes
//! a committed transition ([`Vault::record_transition`]) or when an attempt
//! reserves and releases a record.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tradeline_types::{
    LiveRecord, OrderStatus, PartyId, Record, RecordKind, RecordRef, Result, SelectionPolicy,
    SettleError, Transition, TxId,
};

use crate::query::HoldingsQuery;
use crate::reservation::Reservation;
use crate::selection::select;

/// A participant's private holdings.
#[derive(Debug)]
pub struct Vault {
    /// Whose view this is. Only records relevant to the owner are stored.
    owner: PartyId,
    /// Every record ever stored, keyed (and therefore ordered) by reference.
    records: BTreeMap<RecordRef, Record>,
    /// References consumed by a committed transition.
    consumed: HashSet<RecordRef>,
    /// References held by an in-flight attempt of this participant.
    reserved: HashSet<RecordRef>,
    /// Transitions already recorded, so a repeated broadcast is a no-op.
    recorded: HashSet<TxId>,
}

impl Vault {
    /// An empty vault for `owner`.
    #[must_use]
    pub fn new(owner: PartyId) -> Self {
        Self {
            owner,
            records: BTreeMap::new(),
            consumed: HashSet::new(),
            reserved: HashSet::new(),
            recorded: HashSet::new(),
        }
    }

    #[must_use]
    pub fn owner(&self) -> PartyId {
        self.owner
    }

    /// Apply a committed transition: its inputs stop being live and its
    /// outputs relevant to the owner become live.
    ///
    /// Returns the number of records added. Recording the same transition
    /// twice changes nothing.
    pub fn record_transition(&mut self, tx: &Transition) -> usize {
        let tx_id = tx.id();
        if !self.recorded.insert(tx_id) {
            return 0;
        }

        for reference in tx.consumed_refs() {
            self.consumed.insert(reference);
            self.reserved.remove(&reference);
        }

        let mut added = 0;
        for live in tx.outputs() {
            if live.record.is_relevant_to(&self.owner) {
                self.records.insert(live.reference, live.record);
                added += 1;
            }
        }

        tracing::debug!(
            owner = %self.owner,
            tx = %tx_id.short(),
            added,
            live = self.live_count(),
            "Recorded committed transition"
        );
        added
    }

    /// Look up a stored record, live or not.
    #[must_use]
    pub fn get(&self, reference: &RecordRef) -> Option<&Record> {
        self.records.get(reference)
    }

    #[must_use]
    pub fn is_live(&self, reference: &RecordRef) -> bool {
        self.records.contains_key(reference) && !self.consumed.contains(reference)
    }

    #[must_use]
    pub fn is_reserved(&self, reference: &RecordRef) -> bool {
        self.reserved.contains(reference)
    }

    /// Mark a live record as held by an attempt.
    ///
    /// # Errors
    /// - `HoldingReserved` if another attempt already holds it
    /// - `NoMatchingHolding` if the record is not live in this vault
    pub fn reserve(&mut self, reference: RecordRef) -> Result<()> {
        if !self.is_live(&reference) {
            return Err(SettleError::NoMatchingHolding {
                requirement: format!("live record {reference}"),
            });
        }
        if !self.reserved.insert(reference) {
            return Err(SettleError::HoldingReserved(reference));
        }
        Ok(())
    }

    /// Drop a reservation. Returns `false` if none was held.
    pub fn release(&mut self, reference: &RecordRef) -> bool {
        self.reserved.remove(reference)
    }

    /// Number of live records.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.records
            .keys()
            .filter(|r| !self.consumed.contains(r))
            .count()
    }

    #[must_use]
    pub fn reserved_count(&self) -> usize {
        self.reserved.len()
    }

    /// The owner's unreserved balance best matching `min_amount` under `policy`.
    #[must_use]
    pub fn find_spendable(&self, min_amount: i64, policy: SelectionPolicy) -> Option<LiveRecord> {
        let owner = self.owner;
        let candidates: Vec<LiveRecord> = self
            .find_live(RecordKind::Balance, &|r| {
                r.as_balance().is_some_and(|b| b.owner == owner)
            })
            .into_iter()
            .filter(|live| !self.is_reserved(&live.reference))
            .collect();
        select(&candidates, min_amount, policy)
    }

    /// The unreserved live order with `external_id` and `status`, lowest
    /// reference first if several match.
    #[must_use]
    pub fn find_order(&self, external_id: &str, status: OrderStatus) -> Option<LiveRecord> {
        self.find_live(RecordKind::Order, &|r| {
            r.as_order()
                .is_some_and(|o| o.logical_id.external_id == external_id && o.status == status)
        })
        .into_iter()
        .find(|live| !self.is_reserved(&live.reference))
    }
}

impl HoldingsQuery for Vault {
    fn find_live(&self, kind: RecordKind, predicate: &dyn Fn(&Record) -> bool) -> Vec<LiveRecord> {
        self.records
            .iter()
            .filter(|(reference, record)| {
                !self.consumed.contains(reference) && record.kind() == kind && predicate(record)
            })
            .map(|(reference, record)| LiveRecord::new(*reference, record.clone()))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// SharedVault
// ---------------------------------------------------------------------------

/// A vault shared between a participant's concurrent attempts.
///
/// Locks are held only for the duration of a single call; nothing awaits
/// while holding one.
#[derive(Debug, Clone)]
pub struct SharedVault(Arc<RwLock<Vault>>);

impl SharedVault {
    #[must_use]
    pub fn new(vault: Vault) -> Self {
        Self(Arc::new(RwLock::new(vault)))
    }

    /// Read access. A panic in another holder does not corrupt the vault
    /// (every mutation is a single set or map operation), so poisoning is
    /// ignored.
    pub fn read(&self) -> RwLockReadGuard<'_, Vault> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, Vault> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn owner(&self) -> PartyId {
        self.read().owner()
    }

    pub fn record_transition(&self, tx: &Transition) -> usize {
        self.write().record_transition(tx)
    }

    /// Reserve a specific live record for the lifetime of the returned guard.
    ///
    /// # Errors
    /// See [`Vault::reserve`].
    pub fn reserve(&self, live: LiveRecord) -> Result<Reservation> {
        self.write().reserve(live.reference)?;
        Ok(Reservation::new(self.clone(), live))
    }

    /// Select and reserve a balance of at least `min_amount` in one step, so
    /// no other attempt can pick it in between.
    ///
    /// # Errors
    /// `NoMatchingHolding` if no unreserved balance qualifies.
    pub fn reserve_spendable(&self, min_amount: i64, policy: SelectionPolicy) -> Result<Reservation> {
        let mut vault = self.write();
        let live = vault.find_spendable(min_amount, policy).ok_or_else(|| {
            SettleError::NoMatchingHolding {
                requirement: format!("balance of at least {min_amount} owned by {}", vault.owner),
            }
        })?;
        vault.reserve(live.reference)?;
        drop(vault);
        Ok(Reservation::new(self.clone(), live))
    }

    /// Locate and reserve a live order by external id and status.
    ///
    /// # Errors
    /// `NoMatchingHolding` if no unreserved order matches.
    pub fn reserve_order(&self, external_id: &str, status: OrderStatus) -> Result<Reservation> {
        let mut vault = self.write();
        let live = vault.find_order(external_id, status).ok_or_else(|| {
            SettleError::NoMatchingHolding {
                requirement: format!("{status} order with external id {external_id:?}"),
            }
        })?;
        vault.reserve(live.reference)?;
        drop(vault);
        Ok(Reservation::new(self.clone(), live))
    }
}

impl HoldingsQuery for SharedVault {
    fn find_live(&self, kind: RecordKind, predicate: &dyn Fn(&Record) -> bool) -> Vec<LiveRecord> {
        self.read().find_live(kind, predicate)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use tradeline_types::{
        BalanceRecord, Command, Intent, NotaryId, OrderId, OrderRecord, TransitionBuilder,
    };

    use super::*;

    const ISSUER: PartyId = PartyId([1; 32]);
    const ALICE: PartyId = PartyId([2; 32]);
    const BOB: PartyId = PartyId([3; 32]);

    fn issue(owner: PartyId, amount: i64) -> Transition {
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_produced(BalanceRecord::new(ISSUER, owner, amount))
            .add_intent(Intent::new(Command::Issue, [ISSUER, owner]));
        b.build()
    }

    fn pay(input: LiveRecord, to: PartyId, amount: i64) -> Transition {
        let source = input.record.as_balance().unwrap().clone();
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_consumed(input)
            .add_produced(source.reassigned(to, amount))
            .add_produced(source.reassigned(source.owner, source.amount - amount))
            .add_intent(Intent::new(
                Command::Pay {
                    change_owner: Some(source.owner),
                },
                [ISSUER, source.owner, to],
            ));
        b.build()
    }

    #[test]
    fn issuance_becomes_live_for_owner_only() {
        let tx = issue(ALICE, 100);
        let mut alice = Vault::new(ALICE);
        let mut bob = Vault::new(BOB);
        assert_eq!(alice.record_transition(&tx), 1);
        assert_eq!(bob.record_transition(&tx), 0);
        assert_eq!(alice.total_balance(&ALICE), 100);
        assert_eq!(bob.live_count(), 0);
    }

    #[test]
    fn consumed_records_stop_being_live() {
        let mut alice = Vault::new(ALICE);
        let issued = issue(ALICE, 100);
        alice.record_transition(&issued);
        let input = issued.outputs().remove(0);

        let payment = pay(input.clone(), BOB, 30);
        alice.record_transition(&payment);

        assert!(!alice.is_live(&input.reference));
        assert!(alice.get(&input.reference).is_some(), "arena keeps history");
        assert_eq!(alice.total_balance(&ALICE), 70);
        assert_eq!(alice.live_count(), 1);
    }

    #[test]
    fn recording_twice_is_a_noop() {
        let mut alice = Vault::new(ALICE);
        let tx = issue(ALICE, 5);
        assert_eq!(alice.record_transition(&tx), 1);
        assert_eq!(alice.record_transition(&tx), 0);
        assert_eq!(alice.live_count(), 1);
    }

    #[test]
    fn find_live_is_ordered_by_reference() {
        let mut alice = Vault::new(ALICE);
        for amount in [5, 10, 15, 20] {
            alice.record_transition(&issue(ALICE, amount));
        }
        let refs: Vec<RecordRef> = alice
            .all_live(RecordKind::Balance)
            .into_iter()
            .map(|l| l.reference)
            .collect();
        let mut sorted = refs.clone();
        sorted.sort();
        assert_eq!(refs, sorted);
    }

    #[test]
    fn reserved_records_are_not_spendable() {
        let mut alice = Vault::new(ALICE);
        alice.record_transition(&issue(ALICE, 100));
        let live = alice
            .find_spendable(50, SelectionPolicy::SmallestSufficient)
            .unwrap();
        alice.reserve(live.reference).unwrap();

        assert!(alice.find_spendable(50, SelectionPolicy::SmallestSufficient).is_none());
        assert!(matches!(
            alice.reserve(live.reference),
            Err(SettleError::HoldingReserved(_))
        ));

        assert!(alice.release(&live.reference));
        assert!(alice.find_spendable(50, SelectionPolicy::SmallestSufficient).is_some());
    }

    #[test]
    fn reserving_a_dead_record_fails() {
        let mut alice = Vault::new(ALICE);
        let err = alice
            .reserve(RecordRef::new(TxId([9; 32]), 0))
            .unwrap_err();
        assert!(matches!(err, SettleError::NoMatchingHolding { .. }));
    }

    #[test]
    fn commit_clears_reservation() {
        let mut alice = Vault::new(ALICE);
        let issued = issue(ALICE, 100);
        alice.record_transition(&issued);
        let input = issued.outputs().remove(0);
        alice.reserve(input.reference).unwrap();

        alice.record_transition(&pay(input, BOB, 40));
        assert_eq!(alice.reserved_count(), 0);
    }

    #[test]
    fn find_order_by_external_id_and_status() {
        let order = OrderRecord::new_placed(
            OrderId::new("ord-7"),
            "crate of apples",
            ALICE,
            BOB,
            Decimal::new(50, 0),
            Decimal::ZERO,
        );
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_produced(order)
            .add_intent(Intent::new(Command::Issue, [ALICE, BOB]));
        let tx = b.build();

        let mut bob = Vault::new(BOB);
        bob.record_transition(&tx);
        assert!(bob.find_order("ord-7", OrderStatus::Placed).is_some());
        assert!(bob.find_order("ord-7", OrderStatus::Delivered).is_none());
        assert!(bob.find_order("ord-8", OrderStatus::Placed).is_none());
    }
}
