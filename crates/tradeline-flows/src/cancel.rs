//! Cooperative cancellation of a settlement attempt.
//!
//! An attempt checks its [`CancelSignal`] at every suspension point before
//! finality. Cancelling after the transition reached the notary has no
//! effect: the outcome is then decided by the notary alone.

use std::future::Future;

use tokio::sync::watch;
use tradeline_types::{Result, SettleError};

/// Owner side; call [`CancelHandle::cancel`] to abandon the attempt.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        // No receivers left means the attempt already finished.
        let _ = self.tx.send(true);
    }
}

/// Attempt side of a cancellation channel.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: watch::Receiver<bool>,
}

impl CancelSignal {
    /// A connected handle/signal pair.
    #[must_use]
    pub fn channel() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, Self { rx })
    }

    /// A signal that never fires.
    #[must_use]
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once cancelled; pends forever if the handle is dropped first.
    pub async fn cancelled(&mut self) {
        loop {
            if *self.rx.borrow_and_update() {
                return;
            }
            if self.rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Run `fut` unless cancelled first.
    ///
    /// # Errors
    /// `Cancelled`, or whatever `fut` returns.
    pub async fn guard<T>(&mut self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        if self.is_cancelled() {
            return Err(SettleError::Cancelled);
        }
        tokio::select! {
            biased;
            () = self.cancelled() => Err(SettleError::Cancelled),
            result = fut => result,
        }
    }
}
