//! Read-only holdings queries.

use tradeline_types::{LiveRecord, Record, RecordKind};

/// Query interface over a participant's own live records.
///
/// Implementations return results in ascending [`RecordRef`] order so
/// every caller sees the same ordering for the same vault state, and never
/// block on anything but a local lock.
///
/// [`RecordRef`]: tradeline_types::RecordRef
pub trait HoldingsQuery {
    /// Live records of `kind` for which `predicate` holds.
    fn find_live(&self, kind: RecordKind, predicate: &dyn Fn(&Record) -> bool) -> Vec<LiveRecord>;

    /// Every live record of `kind`.
    fn all_live(&self, kind: RecordKind) -> Vec<LiveRecord> {
        self.find_live(kind, &|_| true)
    }

    /// Sum of the live balance amounts owned by `owner`, saturating.
    fn total_balance(&self, owner: &tradeline_types::PartyId) -> i64 {
        self.find_live(RecordKind::Balance, &|r| {
            r.as_balance().is_some_and(|b| b.owner == *owner)
        })
        .iter()
        .filter_map(|live| live.record.as_balance())
        .fold(0i64, |acc, b| acc.saturating_add(b.amount))
    }
}
