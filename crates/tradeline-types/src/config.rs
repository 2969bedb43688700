//! Configuration types for Tradeline participants and notaries.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{NotaryId, Result, SettleError, constants};

/// How a participant picks one record when several satisfy a request.
///
/// Every policy is deterministic; ties are broken by [`crate::RecordRef`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum SelectionPolicy {
    /// Smallest amount that still covers the request.
    #[default]
    SmallestSufficient,
    /// Largest amount first, to consolidate change.
    LargestFirst,
}

impl std::fmt::Display for SelectionPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SmallestSufficient => write!(f, "SMALLEST_SUFFICIENT"),
            Self::LargestFirst => write!(f, "LARGEST_FIRST"),
        }
    }
}

/// Configuration for a single participant's orchestrator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantConfig {
    /// Human-facing name, used in logs and the party directory.
    pub name: String,
    /// The notary new transitions are tagged for.
    pub notary: NotaryId,
    /// Wait for each counterparty message (negotiation, authorization).
    pub session_timeout_ms: u64,
    /// Wait for the finality service.
    pub finality_timeout_ms: u64,
    /// Record selection when answering holding requests and locating own holdings.
    #[serde(default)]
    pub selection: SelectionPolicy,
}

impl ParticipantConfig {
    /// A config with default timeouts and selection.
    #[must_use]
    pub fn new(name: impl Into<String>, notary: NotaryId) -> Self {
        Self {
            name: name.into(),
            notary,
            session_timeout_ms: constants::DEFAULT_SESSION_TIMEOUT_MS,
            finality_timeout_ms: constants::DEFAULT_FINALITY_TIMEOUT_MS,
            selection: SelectionPolicy::default(),
        }
    }

    #[must_use]
    pub fn session_timeout(&self) -> Duration {
        Duration::from_millis(self.session_timeout_ms)
    }

    #[must_use]
    pub fn finality_timeout(&self) -> Duration {
        Duration::from_millis(self.finality_timeout_ms)
    }

    /// Parse a JSON config file's contents and validate it.
    ///
    /// # Errors
    /// Returns [`SettleError::Configuration`] for malformed JSON or invalid values.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| SettleError::Configuration(format!("invalid participant config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations that could never complete an attempt.
    ///
    /// # Errors
    /// Returns [`SettleError::Configuration`] for an empty name or zero timeout.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(SettleError::Configuration(
                "participant name must not be empty".to_string(),
            ));
        }
        if self.session_timeout_ms == 0 || self.finality_timeout_ms == 0 {
            return Err(SettleError::Configuration(format!(
                "timeouts must be positive (session={}ms, finality={}ms)",
                self.session_timeout_ms, self.finality_timeout_ms
            )));
        }
        Ok(())
    }
}

/// Configuration for the in-process notary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotaryConfig {
    pub name: String,
    /// Check per-issuer supply after every commit.
    pub verify_supply: bool,
}

impl Default for NotaryConfig {
    fn default() -> Self {
        Self {
            name: "Notary".to_string(),
            verify_supply: true,
        }
    }
}
