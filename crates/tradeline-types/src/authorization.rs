//! Signing service: party identities and transition authorizations.
//!
//! An [`Authorization`] is an ed25519 signature over a domain-separated
//! preimage of the [`TxId`]. A [`SignedTransition`] is complete once every
//! required authorizer of every intent has contributed a valid one.

use std::collections::BTreeSet;

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};

use crate::{Party, PartyId, Result, SettleError, Transition, TxId};

/// Domain separator for authorization signatures.
const AUTH_DOMAIN: &[u8] = b"tradeline:auth:v1:";

/// Domain separator for finality receipt signatures.
const RECEIPT_DOMAIN: &[u8] = b"tradeline:receipt:v1:";

fn preimage(domain: &[u8], tx_id: &TxId) -> Vec<u8> {
    let mut payload = Vec::with_capacity(domain.len() + 32);
    payload.extend_from_slice(domain);
    payload.extend_from_slice(tx_id.as_bytes());
    payload
}

/// The bytes a party signs to authorize transition `tx_id`.
#[must_use]
pub fn authorization_preimage(tx_id: &TxId) -> Vec<u8> {
    preimage(AUTH_DOMAIN, tx_id)
}

/// The bytes a notary signs to state that `tx_id` committed.
#[must_use]
pub fn receipt_preimage(tx_id: &TxId) -> Vec<u8> {
    preimage(RECEIPT_DOMAIN, tx_id)
}

/// `true` iff `signature` is `signer`'s signature over `payload`.
pub(crate) fn verify_payload(signer: &PartyId, payload: &[u8], signature: &[u8]) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(signer.as_bytes()) else {
        return false;
    };
    let Ok(signature) = Signature::from_slice(signature) else {
        return false;
    };
    key.verify(payload, &signature).is_ok()
}

// ---------------------------------------------------------------------------
// Identity
// ---------------------------------------------------------------------------

/// The private side of a party: its name and ed25519 signing key.
pub struct Identity {
    name: String,
    signing_key: SigningKey,
}

impl Identity {
    /// Derive an identity from a 32-byte secret seed.
    #[must_use]
    pub fn from_seed(name: impl Into<String>, seed: [u8; 32]) -> Self {
        Self {
            name: name.into(),
            signing_key: SigningKey::from_bytes(&seed),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn id(&self) -> PartyId {
        PartyId(self.signing_key.verifying_key().to_bytes())
    }

    #[must_use]
    pub fn party(&self) -> Party {
        Party::new(self.name.clone(), self.id())
    }

    /// Authorize `transition`.
    #[must_use]
    pub fn sign(&self, transition: &Transition) -> Authorization {
        let signature = self
            .signing_key
            .sign(&authorization_preimage(&transition.id()));
        Authorization {
            signer: self.id(),
            signature: signature.to_bytes().to_vec(),
        }
    }

    /// Receipt signature over [`receipt_preimage`]. Never valid as an
    /// authorization.
    #[must_use]
    pub fn sign_receipt(&self, tx_id: &TxId) -> Vec<u8> {
        self.signing_key
            .sign(&receipt_preimage(tx_id))
            .to_bytes()
            .to_vec()
    }
}

impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("name", &self.name)
            .field("id", &self.id())
            .finish_non_exhaustive()
    }
}

/// Random identity for tests. **Never use in production.**
#[cfg(any(test, feature = "test-helpers"))]
impl Identity {
    pub fn generate(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signing_key: SigningKey::generate(&mut rand::rngs::OsRng),
        }
    }
}

// ---------------------------------------------------------------------------
// Authorization
// ---------------------------------------------------------------------------

/// One party's signature over a transition id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authorization {
    pub signer: PartyId,
    /// Ed25519 signature over [`authorization_preimage`].
    pub signature: Vec<u8>,
}

impl Authorization {
    /// Check this signature against `tx_id` and the signer's key.
    #[must_use]
    pub fn verify(&self, tx_id: &TxId) -> bool {
        verify_payload(&self.signer, &authorization_preimage(tx_id), &self.signature)
    }
}

/// `true` iff every authorization is a valid signature over `transition`.
#[must_use]
pub fn verify_signatures(transition: &Transition, authorizations: &[Authorization]) -> bool {
    let tx_id = transition.id();
    authorizations.iter().all(|auth| auth.verify(&tx_id))
}

// ---------------------------------------------------------------------------
// SignedTransition
// ---------------------------------------------------------------------------

/// A transition together with the authorizations collected so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTransition {
    pub transition: Transition,
    pub authorizations: Vec<Authorization>,
}

impl SignedTransition {
    #[must_use]
    pub fn new(transition: Transition) -> Self {
        Self {
            transition,
            authorizations: Vec::new(),
        }
    }

    #[must_use]
    pub fn id(&self) -> TxId {
        self.transition.id()
    }

    /// Add an authorization. A second one from the same signer is ignored.
    pub fn add_authorization(&mut self, authorization: Authorization) {
        if self
            .authorizations
            .iter()
            .any(|existing| existing.signer == authorization.signer)
        {
            return;
        }
        self.authorizations.push(authorization);
    }

    /// Parties that have contributed an authorization (valid or not).
    #[must_use]
    pub fn signers(&self) -> BTreeSet<PartyId> {
        self.authorizations.iter().map(|a| a.signer).collect()
    }

    /// Whether `party` has a valid authorization attached.
    #[must_use]
    pub fn is_signed_by(&self, party: &PartyId) -> bool {
        let tx_id = self.id();
        self.authorizations
            .iter()
            .any(|a| a.signer == *party && a.verify(&tx_id))
    }

    /// Required authorizers without a valid authorization attached.
    #[must_use]
    pub fn missing_authorizers(&self) -> BTreeSet<PartyId> {
        let tx_id = self.id();
        let valid: BTreeSet<PartyId> = self
            .authorizations
            .iter()
            .filter(|a| a.verify(&tx_id))
            .map(|a| a.signer)
            .collect();
        self.transition
            .required_authorizers()
            .difference(&valid)
            .copied()
            .collect()
    }

    /// `true` iff every attached authorization verifies.
    #[must_use]
    pub fn verify_signatures(&self) -> bool {
        verify_signatures(&self.transition, &self.authorizations)
    }

    /// Require valid signatures from every required authorizer.
    ///
    /// # Errors
    /// - [`SettleError::InvalidSignature`] if any attached signature fails
    /// - [`SettleError::IncompleteAuthorization`] if a required signer is missing
    pub fn require_complete(&self) -> Result<()> {
        let tx_id = self.id();
        if let Some(bad) = self.authorizations.iter().find(|a| !a.verify(&tx_id)) {
            return Err(SettleError::InvalidSignature { signer: bad.signer });
        }
        let missing = self.missing_authorizers();
        if !missing.is_empty() {
            return Err(SettleError::IncompleteAuthorization {
                missing: missing.into_iter().collect(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{BalanceRecord, Command, Intent, NotaryId, TransitionBuilder};

    fn issuance(issuer: &Identity, owner: &Identity) -> Transition {
        let mut b = TransitionBuilder::new(NotaryId([0; 32]));
        b.add_produced(BalanceRecord::new(issuer.id(), owner.id(), 100))
            .add_intent(Intent::new(Command::Issue, [issuer.id(), owner.id()]));
        b.build()
    }

    #[test]
    fn sign_and_verify() {
        let issuer = Identity::generate("Issuer");
        let owner = Identity::generate("Owner");
        let tx = issuance(&issuer, &owner);
        let auth = issuer.sign(&tx);
        assert!(auth.verify(&tx.id()));
        assert!(verify_signatures(&tx, &[auth]));
    }

    #[test]
    fn signature_over_other_tx_fails() {
        let issuer = Identity::generate("Issuer");
        let owner = Identity::generate("Owner");
        let tx = issuance(&issuer, &owner);
        let other = issuance(&issuer, &owner);
        let auth = issuer.sign(&other);
        assert!(!auth.verify(&tx.id()));
    }

    #[test]
    fn from_seed_is_stable() {
        let a = Identity::from_seed("A", [7; 32]);
        let b = Identity::from_seed("A", [7; 32]);
        assert_eq!(a.id(), b.id());
    }

    #[test]
    fn completeness_tracks_missing_signers() {
        let issuer = Identity::generate("Issuer");
        let owner = Identity::generate("Owner");
        let mut stx = SignedTransition::new(issuance(&issuer, &owner));

        stx.add_authorization(issuer.sign(&stx.transition));
        let err = stx.require_complete().unwrap_err();
        assert!(
            matches!(&err, SettleError::IncompleteAuthorization { missing } if missing == &vec![owner.id()]),
            "got {err:?}"
        );

        stx.add_authorization(owner.sign(&stx.transition));
        stx.require_complete().unwrap();
        assert!(stx.missing_authorizers().is_empty());
    }

    #[test]
    fn forged_signature_is_rejected() {
        let issuer = Identity::generate("Issuer");
        let owner = Identity::generate("Owner");
        let mut stx = SignedTransition::new(issuance(&issuer, &owner));
        stx.add_authorization(issuer.sign(&stx.transition));
        stx.add_authorization(Authorization {
            signer: owner.id(),
            signature: vec![0u8; 64],
        });
        assert!(!stx.verify_signatures());
        assert!(!stx.is_signed_by(&owner.id()));
        assert!(matches!(
            stx.require_complete(),
            Err(SettleError::InvalidSignature { signer }) if signer == owner.id()
        ));
    }

    #[test]
    fn duplicate_signer_ignored() {
        let issuer = Identity::generate("Issuer");
        let owner = Identity::generate("Owner");
        let mut stx = SignedTransition::new(issuance(&issuer, &owner));
        stx.add_authorization(issuer.sign(&stx.transition));
        stx.add_authorization(issuer.sign(&stx.transition));
        assert_eq!(stx.authorizations.len(), 1);
    }
}
