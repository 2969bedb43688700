//! Scoped soft reservations.
//!
//! A [`Reservation`] holds one live record for an attempt and releases it
//! when dropped, whether the attempt commits, aborts, is cancelled or
//! panics. After a commit the vault has already cleared the reservation,
//! so the release is a no-op.

use tradeline_types::{LiveRecord, RecordRef};

use crate::vault::SharedVault;

/// RAII guard over a reserved record.
#[derive(Debug)]
pub struct Reservation {
    vault: SharedVault,
    live: LiveRecord,
}

impl Reservation {
    pub(crate) fn new(vault: SharedVault, live: LiveRecord) -> Self {
        Self { vault, live }
    }

    /// The reserved record.
    #[must_use]
    pub fn record(&self) -> &LiveRecord {
        &self.live
    }

    #[must_use]
    pub fn reference(&self) -> RecordRef {
        self.live.reference
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        if self.vault.write().release(&self.live.reference) {
            tracing::debug!(record = %self.live.reference, "Released reservation");
        }
    }
}
