//! Transition proposals: consumed records, produced records, declared intent.
//!
//! A [`Transition`] is assembled incrementally with a [`TransitionBuilder`]
//! and is immutable once built. Its [`TxId`] is the SHA-256 of a canonical,
//! length-prefixed encoding, so every party derives the same id and the
//! same [`RecordRef`]s for its outputs.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{LiveRecord, NotaryId, PartyId, Record, RecordRef, TxId};

/// Domain separator for transition hashing.
const TX_DOMAIN: &[u8] = b"tradeline:tx:v1:";

// ---------------------------------------------------------------------------
// Command / Intent
// ---------------------------------------------------------------------------

/// The declared purpose of a transition. Selects the validation rule.
///
/// Pay-bearing commands carry the party that receives the change output of
/// a two-way balance split; a split without a declared change owner is
/// rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Command {
    Issue,
    Pay { change_owner: Option<PartyId> },
    OrderPlacing { change_owner: Option<PartyId> },
    OrderDelivered { change_owner: Option<PartyId> },
}

impl Command {
    #[must_use]
    pub fn change_owner(&self) -> Option<PartyId> {
        match self {
            Self::Issue => None,
            Self::Pay { change_owner }
            | Self::OrderPlacing { change_owner }
            | Self::OrderDelivered { change_owner } => *change_owner,
        }
    }

    fn tag(&self) -> u8 {
        match self {
            Self::Issue => 0,
            Self::Pay { .. } => 1,
            Self::OrderPlacing { .. } => 2,
            Self::OrderDelivered { .. } => 3,
        }
    }
}

impl std::fmt::Display for Command {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Issue => write!(f, "ISSUE"),
            Self::Pay { .. } => write!(f, "PAY"),
            Self::OrderPlacing { .. } => write!(f, "ORDER_PLACING"),
            Self::OrderDelivered { .. } => write!(f, "ORDER_DELIVERED"),
        }
    }
}

/// A command together with the parties that must authorize it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Intent {
    pub command: Command,
    pub required_authorizers: BTreeSet<PartyId>,
}

impl Intent {
    #[must_use]
    pub fn new(command: Command, authorizers: impl IntoIterator<Item = PartyId>) -> Self {
        Self {
            command,
            required_authorizers: authorizers.into_iter().collect(),
        }
    }

    /// Whether `party` is among this intent's signers.
    #[must_use]
    pub fn is_signed_by(&self, party: &PartyId) -> bool {
        self.required_authorizers.contains(party)
    }
}

// ---------------------------------------------------------------------------
// Transition
// ---------------------------------------------------------------------------

/// An atomic proposal to replace `consumed` records with `produced` ones.
///
/// Consumed entries carry the resolved record content next to the
/// reference so every authorizer can validate without a ledger lookup; the
/// notary checks that content against what it committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    consumed: Vec<LiveRecord>,
    produced: Vec<Record>,
    intents: Vec<Intent>,
    notary: NotaryId,
    /// Distinguishes otherwise identical proposals (e.g. two equal issuances).
    salt: Uuid,
}

impl Transition {
    #[must_use]
    pub fn consumed(&self) -> &[LiveRecord] {
        &self.consumed
    }

    #[must_use]
    pub fn produced(&self) -> &[Record] {
        &self.produced
    }

    #[must_use]
    pub fn intents(&self) -> &[Intent] {
        &self.intents
    }

    #[must_use]
    pub fn notary(&self) -> NotaryId {
        self.notary
    }

    /// References of the consumed records, in order.
    pub fn consumed_refs(&self) -> impl Iterator<Item = RecordRef> + '_ {
        self.consumed.iter().map(|live| live.reference)
    }

    /// Union of every intent's required authorizers.
    #[must_use]
    pub fn required_authorizers(&self) -> BTreeSet<PartyId> {
        self.intents
            .iter()
            .flat_map(|intent| intent.required_authorizers.iter().copied())
            .collect()
    }

    /// Deterministic identifier: SHA-256 over the canonical bytes.
    #[must_use]
    pub fn id(&self) -> TxId {
        let hash = Sha256::digest(self.canonical_bytes());
        TxId(hash.into())
    }

    /// The reference later transitions use to consume output `index`.
    #[must_use]
    pub fn output_ref(&self, index: usize) -> Option<RecordRef> {
        if index >= self.produced.len() {
            return None;
        }
        let index = u32::try_from(index).ok()?;
        Some(RecordRef::new(self.id(), index))
    }

    /// Every produced record paired with its future reference.
    #[must_use]
    pub fn outputs(&self) -> Vec<LiveRecord> {
        let tx_id = self.id();
        self.produced
            .iter()
            .zip(0u32..)
            .map(|(record, index)| LiveRecord::new(RecordRef::new(tx_id, index), record.clone()))
            .collect()
    }

    /// Canonical encoding hashed into the [`TxId`].
    ///
    /// Format: `"tradeline:tx:v1:" || notary || salt || consumed || produced || intents`,
    /// each list prefixed with its length.
    #[must_use]
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(512);
        out.extend_from_slice(TX_DOMAIN);
        out.extend_from_slice(self.notary.as_bytes());
        out.extend_from_slice(self.salt.as_bytes());

        write_len(&mut out, self.consumed.len());
        for live in &self.consumed {
            out.extend_from_slice(live.reference.tx_id.as_bytes());
            out.extend_from_slice(&live.reference.index.to_le_bytes());
            live.record.write_canonical(&mut out);
        }

        write_len(&mut out, self.produced.len());
        for record in &self.produced {
            record.write_canonical(&mut out);
        }

        write_len(&mut out, self.intents.len());
        for intent in &self.intents {
            out.push(intent.command.tag());
            match intent.command.change_owner() {
                Some(owner) => {
                    out.push(1);
                    out.extend_from_slice(owner.as_bytes());
                }
                None => out.push(0),
            }
            write_len(&mut out, intent.required_authorizers.len());
            for party in &intent.required_authorizers {
                out.extend_from_slice(party.as_bytes());
            }
        }
        out
    }
}

fn write_len(out: &mut Vec<u8>, len: usize) {
    let len = u32::try_from(len).unwrap_or(u32::MAX);
    out.extend_from_slice(&len.to_le_bytes());
}

// ---------------------------------------------------------------------------
// TransitionBuilder
// ---------------------------------------------------------------------------

/// Incremental builder; [`TransitionBuilder::build`] freezes the proposal.
#[derive(Debug, Clone)]
pub struct TransitionBuilder {
    consumed: Vec<LiveRecord>,
    produced: Vec<Record>,
    intents: Vec<Intent>,
    notary: NotaryId,
}

impl TransitionBuilder {
    #[must_use]
    pub fn new(notary: NotaryId) -> Self {
        Self {
            consumed: Vec::new(),
            produced: Vec::new(),
            intents: Vec::new(),
            notary,
        }
    }

    pub fn add_consumed(&mut self, live: LiveRecord) -> &mut Self {
        self.consumed.push(live);
        self
    }

    pub fn add_produced(&mut self, record: impl Into<Record>) -> &mut Self {
        self.produced.push(record.into());
        self
    }

    pub fn add_intent(&mut self, intent: Intent) -> &mut Self {
        self.intents.push(intent);
        self
    }

    #[must_use]
    pub fn build(self) -> Transition {
        Transition {
            consumed: self.consumed,
            produced: self.produced,
            intents: self.intents,
            notary: self.notary,
            salt: Uuid::new_v4(),
        }
    }
}
