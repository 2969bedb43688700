//! Everything a participant needs to take part in settlement.
//!
//! Passed explicitly at construction; there is no global state. Cheap to
//! clone, so each attempt and each responder task holds its own handle.

use std::collections::BTreeMap;
use std::sync::Arc;

use tradeline_types::{Identity, Party, PartyId, ParticipantConfig, Result, SettleError};
use tradeline_vault::{SharedVault, Vault};

use crate::notary::FinalityService;
use crate::transport::Network;

/// Known parties by id, used to resolve names for logs and plans.
#[derive(Debug, Clone, Default)]
pub struct Directory {
    parties: BTreeMap<PartyId, Party>,
}

impl Directory {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, party: Party) {
        self.parties.insert(party.id, party);
    }

    #[must_use]
    pub fn get(&self, id: &PartyId) -> Option<&Party> {
        self.parties.get(id)
    }

    /// The party's name, or its short id if unknown.
    #[must_use]
    pub fn name_of(&self, id: &PartyId) -> String {
        self.get(id)
            .map_or_else(|| id.short(), |party| party.name.clone())
    }
}

impl FromIterator<Party> for Directory {
    fn from_iter<I: IntoIterator<Item = Party>>(iter: I) -> Self {
        let mut directory = Self::new();
        for party in iter {
            directory.insert(party);
        }
        directory
    }
}

/// A participant's identity, view of the world, and collaborators.
#[derive(Debug, Clone)]
pub struct ParticipantContext {
    pub identity: Arc<Identity>,
    pub directory: Arc<Directory>,
    pub network: Network,
    pub notary: Arc<dyn FinalityService>,
    pub vault: SharedVault,
    pub config: ParticipantConfig,
}

impl ParticipantContext {
    /// Build a context with an empty vault.
    ///
    /// # Errors
    /// `Configuration` if `config` is invalid or tags another notary than
    /// `notary`.
    pub fn new(
        identity: Identity,
        directory: Arc<Directory>,
        network: Network,
        notary: Arc<dyn FinalityService>,
        config: ParticipantConfig,
    ) -> Result<Self> {
        config.validate()?;
        if config.notary != notary.id() {
            return Err(SettleError::Configuration(format!(
                "configured notary {} differs from the finality service {}",
                config.notary,
                notary.id()
            )));
        }
        let vault = SharedVault::new(Vault::new(identity.id()));
        Ok(Self {
            identity: Arc::new(identity),
            directory,
            network,
            notary,
            vault,
            config,
        })
    }

    #[must_use]
    pub fn id(&self) -> PartyId {
        self.identity.id()
    }

    #[must_use]
    pub fn name_of(&self, id: &PartyId) -> String {
        self.directory.name_of(id)
    }
}
