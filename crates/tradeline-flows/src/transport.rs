//! In-process session transport.
//!
//! A [`Network`] routes new sessions to the [`Inbox`] of the party being
//! contacted. A [`Session`] is a pair of bounded, ordered channels between
//! exactly two parties; whoever holds one end knows who holds the other,
//! so messages are authenticated by construction.
//!
//! ```text
//!   Network::open(A, B) ──▶ B's Inbox ──▶ Inbox::accept() ──▶ Session(B↔A)
//!          │
//!          └──▶ Session(A↔B)
//! ```
//!
//! Every receive is bounded by the session timeout; dropping either end
//! closes the session for the other.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tradeline_types::{PartyId, Result, SettleError, constants};

use crate::message::{Message, MessageKind};

// ---------------------------------------------------------------------------
// Network
// ---------------------------------------------------------------------------

/// Directory of reachable parties. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Network {
    inboxes: Arc<Mutex<HashMap<PartyId, mpsc::Sender<Session>>>>,
}

impl Network {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `party` reachable. Registering again replaces the previous inbox.
    #[must_use]
    pub fn register(&self, party: PartyId) -> Inbox {
        let (tx, rx) = mpsc::channel(constants::INBOX_CHANNEL_CAPACITY);
        self.inboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(party, tx);
        Inbox { party, rx }
    }

    /// Open a session from `from` to `to`.
    ///
    /// # Errors
    /// - `UnknownParty` if `to` never registered
    /// - `SessionClosed` if `to` stopped accepting sessions
    pub async fn open(&self, from: PartyId, to: PartyId) -> Result<Session> {
        let inbox = self
            .inboxes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&to)
            .cloned()
            .ok_or(SettleError::UnknownParty(to))?;

        let (local, remote) = Session::pair(from, to);
        inbox
            .send(remote)
            .await
            .map_err(|_| SettleError::SessionClosed { peer: to })?;

        tracing::debug!(from = %from, to = %to, "Session opened");
        Ok(local)
    }
}

// ---------------------------------------------------------------------------
// Inbox
// ---------------------------------------------------------------------------

/// Incoming sessions for one party.
#[derive(Debug)]
pub struct Inbox {
    party: PartyId,
    rx: mpsc::Receiver<Session>,
}

impl Inbox {
    #[must_use]
    pub fn party(&self) -> PartyId {
        self.party
    }

    /// Wait for the next incoming session. `None` once the network is gone.
    pub async fn accept(&mut self) -> Option<Session> {
        self.rx.recv().await
    }
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One end of a private, ordered channel between two parties.
#[derive(Debug)]
pub struct Session {
    local: PartyId,
    peer: PartyId,
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<Message>,
    timeout: Duration,
}

impl Session {
    /// Both ends of a fresh session, `(a's end, b's end)`.
    fn pair(a: PartyId, b: PartyId) -> (Self, Self) {
        let (a_tx, b_rx) = mpsc::channel(constants::SESSION_CHANNEL_CAPACITY);
        let (b_tx, a_rx) = mpsc::channel(constants::SESSION_CHANNEL_CAPACITY);
        let timeout = Duration::from_millis(constants::DEFAULT_SESSION_TIMEOUT_MS);
        (
            Self {
                local: a,
                peer: b,
                tx: a_tx,
                rx: a_rx,
                timeout,
            },
            Self {
                local: b,
                peer: a,
                tx: b_tx,
                rx: b_rx,
                timeout,
            },
        )
    }

    #[must_use]
    pub fn local(&self) -> PartyId {
        self.local
    }

    #[must_use]
    pub fn peer(&self) -> PartyId {
        self.peer
    }

    /// Bound every subsequent receive on this end by `timeout`.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// # Errors
    /// `SessionClosed` if the peer dropped its end.
    pub async fn send(&self, message: Message) -> Result<()> {
        self.tx
            .send(message)
            .await
            .map_err(|_| SettleError::SessionClosed { peer: self.peer })
    }

    /// Next message from the peer, waiting at most the session timeout.
    ///
    /// # Errors
    /// - `Timeout` if nothing arrives in time
    /// - `SessionClosed` if the peer dropped its end
    pub async fn receive(&mut self) -> Result<Message> {
        self.receive_within(self.timeout).await
    }

    /// Like [`Session::receive`] with an explicit bound.
    ///
    /// # Errors
    /// See [`Session::receive`].
    pub async fn receive_within(&mut self, timeout: Duration) -> Result<Message> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(message)) => Ok(message),
            Ok(None) => Err(SettleError::SessionClosed { peer: self.peer }),
            Err(_) => Err(SettleError::Timeout {
                waiting_for: format!("message from {}", self.peer),
            }),
        }
    }

    /// Next message, which must be of `kind`.
    ///
    /// # Errors
    /// `UnexpectedMessage` for any other kind, plus those of [`Session::receive`].
    pub async fn receive_expected(&mut self, kind: MessageKind) -> Result<Message> {
        let message = self.receive().await?;
        if message.kind() == kind {
            Ok(message)
        } else {
            Err(SettleError::UnexpectedMessage {
                peer: self.peer,
                expected: kind.to_string(),
                actual: message.kind().to_string(),
            })
        }
    }
}
