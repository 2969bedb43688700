//! Deterministic choice of a single balance record.
//!
//! Given the same candidates and policy, every run picks the same record:
//! ties on amount are broken by the lower [`RecordRef`].
//!
//! [`RecordRef`]: tradeline_types::RecordRef

use tradeline_types::{LiveRecord, SelectionPolicy};

/// Pick one balance record with `amount >= min_amount` according to `policy`.
///
/// Non-balance candidates are ignored. Returns `None` when nothing
/// qualifies.
#[must_use]
pub fn select(
    candidates: &[LiveRecord],
    min_amount: i64,
    policy: SelectionPolicy,
) -> Option<LiveRecord> {
    let sufficient = candidates.iter().filter_map(|live| {
        live.record
            .as_balance()
            .filter(|b| b.amount >= min_amount)
            .map(|b| (b.amount, live))
    });

    let chosen = match policy {
        SelectionPolicy::SmallestSufficient => {
            sufficient.min_by(|(a, la), (b, lb)| a.cmp(b).then(la.reference.cmp(&lb.reference)))
        }
        SelectionPolicy::LargestFirst => {
            sufficient.min_by(|(a, la), (b, lb)| b.cmp(a).then(la.reference.cmp(&lb.reference)))
        }
    };

    chosen.map(|(_, live)| live.clone())
}
