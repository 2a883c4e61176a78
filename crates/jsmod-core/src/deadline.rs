//! Wall-clock deadline and cancellation for link + evaluate.
//!
//! The spawning task owns a [`CancelHandle`]; the runtime instance thread
//! holds the matching [`CancelSignal`] inside a [`Deadline`]. Dropping the
//! handle counts as cancellation, so a caller that stops waiting also stops
//! any pending fetch.

use std::time::{Duration, Instant};

use tokio::sync::watch;

/// Sending half of a cancellation signal.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Signal cancellation to every clone of the paired [`CancelSignal`].
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Receiving half of a cancellation signal.
#[derive(Debug, Clone)]
pub struct CancelSignal {
    rx: Option<watch::Receiver<bool>>,
}

impl CancelSignal {
    /// Create a connected handle/signal pair.
    pub fn channel() -> (CancelHandle, CancelSignal) {
        let (tx, rx) = watch::channel(false);
        (CancelHandle { tx }, CancelSignal { rx: Some(rx) })
    }

    /// A signal that never fires.
    pub fn never() -> Self {
        Self { rx: None }
    }

    /// Returns `true` once cancelled or once the handle is dropped.
    pub fn is_cancelled(&self) -> bool {
        match &self.rx {
            None => false,
            Some(rx) => *rx.borrow() || rx.has_changed().is_err(),
        }
    }

    /// Wait until cancellation.
    pub async fn cancelled(&mut self) {
        match &mut self.rx {
            None => std::future::pending::<()>().await,
            Some(rx) => {
                // An error means the handle was dropped, which is cancellation too.
                let _ = rx.wait_for(|cancelled| *cancelled).await;
            }
        }
    }
}

/// A fixed point in time after which link + evaluate must give up.
#[derive(Debug, Clone)]
pub struct Deadline {
    expires_at: Instant,
    budget: Duration,
    signal: CancelSignal,
}

impl Deadline {
    /// Create a deadline `budget` from now, also tripped by `signal`.
    pub fn new(budget: Duration, signal: CancelSignal) -> Self {
        Self {
            expires_at: Instant::now() + budget,
            budget,
            signal,
        }
    }

    /// Create a deadline that only expires with time.
    pub fn after(budget: Duration) -> Self {
        Self::new(budget, CancelSignal::never())
    }

    /// Returns `true` once the time is up or the caller cancelled.
    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at || self.signal.is_cancelled()
    }

    /// The full budget in milliseconds.
    pub fn budget_ms(&self) -> u64 {
        u64::try_from(self.budget.as_millis()).unwrap_or(u64::MAX)
    }

    /// A clone of the cancellation signal, for awaiting inside a fetch.
    pub fn signal(&self) -> CancelSignal {
        self.signal.clone()
    }
}
