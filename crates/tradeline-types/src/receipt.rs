//! Finality receipts: the notary's signed statement that a transition committed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::authorization::{receipt_preimage, verify_payload};
use crate::{NotaryId, PartyId, TxId};

/// Proof that the notary committed transition `tx_id`.
///
/// The signature is made with the notary's key over [`receipt_preimage`],
/// a domain of its own, so it can never pass as an authorization.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalityReceipt {
    pub tx_id: TxId,
    pub notary: NotaryId,
    pub committed_at: DateTime<Utc>,
    pub signature: Vec<u8>,
}

impl FinalityReceipt {
    /// Check the notary's signature.
    #[must_use]
    pub fn verify(&self) -> bool {
        verify_payload(
            &PartyId(self.notary.0),
            &receipt_preimage(&self.tx_id),
            &self.signature,
        )
    }
}
