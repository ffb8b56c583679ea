//! Cursor hand-off relay.

use crate::error::{HarnessError, HarnessResult};
use chorus_types::Cursor;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// A bounded baton-relay channel for transferring `Cursor` ownership
/// between routines.
///
/// `send` blocks when the buffer is full and `recv` blocks when it is
/// empty; both blockings are deliberate ordering devices, not defects.
/// The sender must not reuse a cursor after relaying it — ownership moves
/// with the value.
///
/// A single relay with capacity >= 2 threads one logical cursor through a
/// chain of dependent steps (A hands off to B, B polls and hands the
/// advanced cursor back into the same relay for C) without one primitive
/// per hop, and without deadlocking when the final hand-off goes
/// unconsumed.
#[derive(Clone)]
pub struct TokenRelay {
    capacity: usize,
    tx: mpsc::Sender<Cursor>,
    rx: Arc<Mutex<mpsc::Receiver<Cursor>>>,
}

impl TokenRelay {
    /// Creates a relay holding at most `capacity` unconsumed cursors.
    ///
    /// # Panics
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        Self {
            capacity,
            tx,
            rx: Arc::new(Mutex::new(rx)),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hands a cursor to the next routine, blocking while the buffer is
    /// full.
    pub async fn send(&self, cursor: Cursor) -> HarnessResult<()> {
        debug!("[RELAY] handing off cursor {}", cursor);
        self.tx
            .send(cursor)
            .await
            .map_err(|_| HarnessError::RelayClosed)
    }

    /// Takes ownership of the next relayed cursor, blocking while the
    /// buffer is empty.
    pub async fn recv(&self) -> HarnessResult<Cursor> {
        let mut rx = self.rx.lock().await;
        let cursor = rx.recv().await.ok_or(HarnessError::RelayClosed)?;
        debug!("[RELAY] received cursor {}", cursor);
        Ok(cursor)
    }
}
