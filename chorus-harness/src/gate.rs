//! One-shot completion gate.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::debug;

/// A one-shot, broadcast completion signal.
///
/// Exactly one transition armed -> signaled; redundant `signal` calls are
/// no-ops. Any number of waiters may block on it, and waiters that start
/// after the signal still observe it. There is no reset.
///
/// Used to park one actor's routine until another actor's state change has
/// reached a milestone, without coupling the two through a shared sync
/// poll. One gate per milestone keeps the intended ordering readable in
/// the scenario wiring.
#[derive(Clone)]
pub struct CompletionGate {
    tx: Arc<watch::Sender<bool>>,
}

impl CompletionGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    /// Marks the gate signaled and wakes all current and future waiters.
    /// Idempotent and non-blocking.
    pub fn signal(&self) {
        if !self.tx.send_replace(true) {
            debug!("[GATE] signaled");
        }
    }

    /// True once `signal` has been called.
    pub fn is_signaled(&self) -> bool {
        *self.tx.borrow()
    }

    /// Blocks until the gate is signaled or `timeout` elapses. Returns
    /// whether the signal arrived in time.
    pub async fn wait(&self, timeout: Duration) -> bool {
        let mut rx = self.tx.subscribe();
        // The sender lives inside self, so wait_for can only fail via the
        // timeout wrapper.
        matches!(
            tokio::time::timeout(timeout, rx.wait_for(|signaled| *signaled)).await,
            Ok(Ok(_))
        )
    }
}

impl Default for CompletionGate {
    fn default() -> Self {
        Self::new()
    }
}
