//! The node: one home directory, its stores, its locks and its entrance.

use std::sync::Arc;

use tally_merge::MergeOptions;
use tally_store::CopiesStore;
use tally_store_fs::{FsCopies, FsWallets};
use tally_sync::{SyncEntrance, SyncError, WalletLocks};
use tally_types::{Score, WalletId};

use crate::{LocalEntrance, Merger, NodeConfig, NodeError};

pub type NodeEntrance = SyncEntrance<LocalEntrance<FsWallets, FsCopies>>;

/// Owns everything a home directory needs.
///
/// Every mutation of a wallet (merge or push) runs under that wallet's lock,
/// so operations on one id happen strictly one after another while different
/// ids proceed in parallel.
pub struct Node {
    config: NodeConfig,
    locks: Arc<WalletLocks>,
    merger: Merger<FsWallets, FsCopies>,
    entrance: NodeEntrance,
}

impl Node {
    /// Open (and create if needed) the home directory named by `config`.
    pub fn new(config: NodeConfig) -> Result<Self, NodeError> {
        for dir in [config.wallets_dir(), config.copies_dir(), config.locks_dir()] {
            std::fs::create_dir_all(&dir)?;
        }

        let wallets = Arc::new(FsWallets::new(config.wallets_dir()));
        let copies = Arc::new(FsCopies::with_capacity(config.copies_dir(), config.max_copies));
        let locks = Arc::new(WalletLocks::new(config.locks_dir(), config.lock_timeout()));
        let merger = Merger::new(wallets, copies).clean_copies(config.clean_copies);
        let entrance = SyncEntrance::new(LocalEntrance::new(&config, merger.clone()), Arc::clone(&locks));

        tracing::info!(
            home = %config.home.display(),
            lock_timeout = ?config.lock_timeout(),
            max_copies = config.max_copies,
            "node opened"
        );
        Ok(Self {
            config,
            locks,
            merger,
            entrance,
        })
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    pub fn wallets(&self) -> &Arc<FsWallets> {
        self.merger.wallets()
    }

    /// Direct access to the copies store. Writes that may race a merge go
    /// through [`add_copy`](Self::add_copy) instead.
    pub fn copies(&self) -> &Arc<FsCopies> {
        self.merger.copies()
    }

    pub fn locks(&self) -> &Arc<WalletLocks> {
        &self.locks
    }

    pub fn entrance(&self) -> &NodeEntrance {
        &self.entrance
    }

    /// Merge `id` with its stored copies under the wallet lock.
    ///
    /// Returns the ids whose wallet changed; empty means nothing to do.
    pub async fn merge(&self, id: WalletId, options: MergeOptions) -> Result<Vec<WalletId>, NodeError> {
        let guard = self.locks.lock(id).await?;
        let merger = self.merger.clone();
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            merger.run(&id, &options)
        });
        task.await.map_err(|e| SyncError::Aborted(e.to_string()))?
    }

    /// Store the copy of `id` claimed by `(host, port)` under the wallet lock,
    /// so it never interleaves with a merge of the same wallet.
    pub async fn add_copy(
        &self,
        id: WalletId,
        body: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        score: Score,
    ) -> Result<(), NodeError> {
        let (body, host) = (body.into(), host.into());
        let guard = self.locks.lock(id).await?;
        let copies = Arc::clone(self.copies());
        let task = tokio::task::spawn_blocking(move || {
            let _guard = guard;
            copies.add(&id, &body, &host, port, score)
        });
        task.await.map_err(|e| SyncError::Aborted(e.to_string()))??;
        Ok(())
    }

    /// Push a wallet body through the synchronized entrance.
    ///
    /// `id` is validated before anything is locked or read.
    pub async fn push(&self, id: &str, body: impl Into<String>) -> Result<Vec<WalletId>, NodeError> {
        let id: WalletId = id.parse()?;
        Ok(self.entrance.push(id, body).await?)
    }
}
