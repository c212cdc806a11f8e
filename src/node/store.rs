//! Observable single-value store for the local node record.

use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::LocalNode;

/// Errors returned by [`NodeStore`] operations.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum StoreError {
    #[error("local node store not started")]
    NotStarted,

    #[error("local node store stopped")]
    Stopped,

    #[error("cancelled while waiting for local node")]
    Cancelled,
}

#[derive(Clone, Debug)]
enum StoreState {
    Pending,
    Ready(Arc<LocalNode>),
    Stopped,
}

/// Holds the one current [`LocalNode`] value.
///
/// Updates are serialized through an internal writer lock and installed as
/// whole-value replacements; readers get owned copies and never observe a
/// record mid-mutation. Once [`stop`](Self::stop) has been called every read
/// fails with [`StoreError::Stopped`] and every update is rejected with the
/// same error, leaving nothing changed.
#[derive(Debug)]
pub struct NodeStore {
    state: watch::Sender<StoreState>,
    writer: Mutex<()>,
}

impl NodeStore {
    /// Create a store that is immediately readable.
    pub fn new(initial: LocalNode) -> Self {
        let (state, _) = watch::channel(StoreState::Ready(Arc::new(initial)));
        Self {
            state,
            writer: Mutex::new(()),
        }
    }

    /// Create a store whose initial value is supplied later via [`start`](Self::start).
    ///
    /// Readers calling [`get`](Self::get) in the meantime wait for the value
    /// or for their cancellation token.
    pub fn pending() -> Self {
        let (state, _) = watch::channel(StoreState::Pending);
        Self {
            state,
            writer: Mutex::new(()),
        }
    }

    /// Install the initial value of a pending store.
    pub fn start(&self, initial: LocalNode) -> Result<(), StoreError> {
        let _guard = self.writer.lock();
        match *self.state.borrow() {
            StoreState::Pending => {}
            StoreState::Ready(_) => return Ok(()),
            StoreState::Stopped => return Err(StoreError::Stopped),
        }
        info!(name = %initial.name, "Local node store started");
        self.state.send_replace(StoreState::Ready(Arc::new(initial)));
        Ok(())
    }

    /// Shut the store down.
    pub fn stop(&self) {
        let _guard = self.writer.lock();
        if !matches!(*self.state.borrow(), StoreState::Stopped) {
            info!("Local node store stopped");
        }
        self.state.send_replace(StoreState::Stopped);
    }

    /// Check whether the store has been shut down.
    pub fn is_stopped(&self) -> bool {
        matches!(*self.state.borrow(), StoreState::Stopped)
    }

    /// Return a copy of the current record, waiting while the store is pending.
    ///
    /// Fails promptly with [`StoreError::Cancelled`] if `cancel` fires first
    /// and with [`StoreError::Stopped`] once the store has been shut down.
    pub async fn get(&self, cancel: &CancellationToken) -> Result<LocalNode, StoreError> {
        let mut rx = self.state.subscribe();
        loop {
            let current = rx.borrow_and_update().clone();
            match current {
                StoreState::Ready(node) => return Ok(LocalNode::clone(&node)),
                StoreState::Stopped => return Err(StoreError::Stopped),
                StoreState::Pending => {}
            }

            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        return Err(StoreError::Stopped);
                    }
                }
                _ = cancel.cancelled() => return Err(StoreError::Cancelled),
            }
        }
    }

    /// Return a copy of the current record without waiting.
    pub fn snapshot(&self) -> Result<LocalNode, StoreError> {
        match &*self.state.borrow() {
            StoreState::Ready(node) => Ok(LocalNode::clone(node)),
            StoreState::Pending => Err(StoreError::NotStarted),
            StoreState::Stopped => Err(StoreError::Stopped),
        }
    }

    /// Apply `mutate` to a private copy of the current record and install it.
    ///
    /// Concurrent updates are applied one at a time.
    pub fn update<F>(&self, mutate: F) -> Result<(), StoreError>
    where
        F: FnOnce(&mut LocalNode),
    {
        let _guard = self.writer.lock();
        let mut next = match &*self.state.borrow() {
            StoreState::Ready(node) => LocalNode::clone(node),
            StoreState::Pending => return Err(StoreError::NotStarted),
            StoreState::Stopped => return Err(StoreError::Stopped),
        };
        mutate(&mut next);
        self.state.send_replace(StoreState::Ready(Arc::new(next)));
        Ok(())
    }

    /// Observe future changes of the record.
    pub fn watch(&self) -> NodeWatch {
        NodeWatch {
            rx: self.state.subscribe(),
        }
    }
}

/// Receiver side of [`NodeStore::watch`].
#[derive(Debug)]
pub struct NodeWatch {
    rx: watch::Receiver<StoreState>,
}

impl NodeWatch {
    /// Wait for the next installed record.
    ///
    /// Returns [`StoreError::Stopped`] once the store shuts down.
    pub async fn changed(&mut self) -> Result<LocalNode, StoreError> {
        loop {
            if self.rx.changed().await.is_err() {
                return Err(StoreError::Stopped);
            }
            let current = self.rx.borrow_and_update().clone();
            match current {
                StoreState::Ready(node) => return Ok(LocalNode::clone(&node)),
                StoreState::Stopped => return Err(StoreError::Stopped),
                StoreState::Pending => debug!("Local node store still pending"),
            }
        }
    }
}
