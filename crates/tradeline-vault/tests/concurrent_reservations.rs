//! Concurrent attempts of one participant never reserve the same record.

use std::collections::HashSet;
use std::sync::{Arc, Barrier};
use std::thread;

use tradeline_types::{
    BalanceRecord, Command, Intent, NotaryId, PartyId, SelectionPolicy, TransitionBuilder,
};
use tradeline_vault::{HoldingsQuery, SharedVault, Vault};

const ISSUER: PartyId = PartyId([1; 32]);
const OWNER: PartyId = PartyId([2; 32]);

fn funded(records: usize) -> SharedVault {
    let vault = SharedVault::new(Vault::new(OWNER));
    for _ in 0..records {
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_produced(BalanceRecord::new(ISSUER, OWNER, 100))
            .add_intent(Intent::new(Command::Issue, [ISSUER, OWNER]));
        vault.record_transition(&b.build());
    }
    vault
}

#[test]
fn racing_threads_get_distinct_records() {
    const THREADS: usize = 8;
    const RECORDS: usize = 5;

    let vault = funded(RECORDS);
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let vault = vault.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                vault.reserve_spendable(50, SelectionPolicy::SmallestSufficient)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let guards: Vec<_> = results.into_iter().filter_map(Result::ok).collect();

    assert_eq!(guards.len(), RECORDS, "one winner per record");
    let distinct: HashSet<_> = guards.iter().map(|g| g.reference()).collect();
    assert_eq!(distinct.len(), RECORDS);
    assert_eq!(vault.read().reserved_count(), RECORDS);

    drop(guards);
    assert_eq!(vault.read().reserved_count(), 0);
    assert_eq!(vault.total_balance(&OWNER), 500, "reservations never move value");
}
