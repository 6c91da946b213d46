//! Where pushed wallet bodies enter the node.

use std::future::Future;
use std::sync::Arc;

use tally_types::WalletId;

use crate::{EntranceError, SyncError, WalletLocks};

/// Accepts wallet bodies and folds them into local state.
///
/// Implementations are synchronous and may block; [`SyncEntrance`] moves them
/// onto the blocking pool.
pub trait Entrance: Send + Sync + 'static {
    /// Lifecycle hook, called once before the first push.
    fn start(&self) -> Result<(), EntranceError> {
        Ok(())
    }

    /// Push a body for `id`; returns the ids whose local state changed.
    fn push(&self, id: &WalletId, body: &str) -> Result<Vec<WalletId>, EntranceError>;

    /// Status snapshot.
    fn to_json(&self) -> serde_json::Value;
}

/// Serializes pushes per wallet id through [`WalletLocks`].
pub struct SyncEntrance<E> {
    entrance: Arc<E>,
    locks: Arc<WalletLocks>,
}

impl<E> Clone for SyncEntrance<E> {
    fn clone(&self) -> Self {
        Self {
            entrance: Arc::clone(&self.entrance),
            locks: Arc::clone(&self.locks),
        }
    }
}

impl<E: Entrance> SyncEntrance<E> {
    pub fn new(entrance: E, locks: Arc<WalletLocks>) -> Self {
        Self::from_arc(Arc::new(entrance), locks)
    }

    pub fn from_arc(entrance: Arc<E>, locks: Arc<WalletLocks>) -> Self {
        Self { entrance, locks }
    }

    pub fn inner(&self) -> &Arc<E> {
        &self.entrance
    }

    pub fn locks(&self) -> &Arc<WalletLocks> {
        &self.locks
    }

    /// Start the wrapped entrance, then hand a handle to `f`.
    pub async fn start<F, Fut, R>(&self, f: F) -> Result<R, SyncError>
    where
        F: FnOnce(Self) -> Fut,
        Fut: Future<Output = R>,
    {
        self.entrance.start()?;
        tracing::debug!("entrance started");
        Ok(f(self.clone()).await)
    }

    /// Push under the wallet lock.
    ///
    /// The guard travels with the blocking task, so the wallet stays locked
    /// until the inner push returns even if this future is dropped early. A
    /// panic in the inner push surfaces as [`SyncError::Aborted`] and still
    /// releases the lock.
    pub async fn push(&self, id: WalletId, body: impl Into<String>) -> Result<Vec<WalletId>, SyncError> {
        let guard = self.locks.lock(id).await?;
        let entrance = Arc::clone(&self.entrance);
        let body = body.into();

        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            entrance.push(&id, &body)
        });
        match task.await {
            Ok(pushed) => Ok(pushed?),
            Err(e) => {
                tracing::error!(wallet = %id, "push aborted: {e}");
                Err(SyncError::Aborted(e.to_string()))
            }
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        self.entrance.to_json()
    }
}
