//! The entrance that folds pushed bodies into the local home directory.

use std::sync::atomic::{AtomicU64, Ordering};

use tally_merge::MergeOptions;
use tally_store::{CopiesStore, RemoteCopy, WalletStore};
use tally_sync::{Entrance, EntranceError};
use tally_types::{Score, Wallet, WalletId};

use crate::tracing_spans::push_span;
use crate::{Merger, NodeConfig};

/// Host name recorded for a pushed body when it joins a merge.
pub const PUSH_HOST: &str = "push";

/// Accepts wallet bodies pushed by peers or the command line.
///
/// Not synchronized on its own; wrap it in a `SyncEntrance`.
pub struct LocalEntrance<W, C> {
    config: NodeConfig,
    merger: Merger<W, C>,
    options: MergeOptions,
    pushes: AtomicU64,
}

impl<W: WalletStore, C: CopiesStore> LocalEntrance<W, C> {
    /// Pushes merge with the options `config` prescribes.
    pub fn new(config: &NodeConfig, merger: Merger<W, C>) -> Self {
        Self {
            config: config.clone(),
            merger,
            options: config.merge_options(),
            pushes: AtomicU64::new(0),
        }
    }

    /// Pushes accepted so far.
    pub fn pushes(&self) -> u64 {
        self.pushes.load(Ordering::Relaxed)
    }
}

fn backend(e: impl std::fmt::Display) -> EntranceError {
    EntranceError::Backend(e.to_string())
}

impl<W, C> Entrance for LocalEntrance<W, C>
where
    W: WalletStore + Send + Sync + 'static,
    C: CopiesStore + Send + Sync + 'static,
{
    fn start(&self) -> Result<(), EntranceError> {
        tracing::info!(home = %self.config.home.display(), baseline = self.options.baseline, "local entrance started");
        Ok(())
    }

    fn push(&self, id: &WalletId, body: &str) -> Result<Vec<WalletId>, EntranceError> {
        let _span = push_span(id, body.len()).entered();

        let pushed = Wallet::from_body(body).map_err(|e| EntranceError::InvalidBody(e.to_string()))?;
        if pushed.id() != *id {
            return Err(EntranceError::IdMismatch {
                expected: *id,
                found: pushed.id(),
            });
        }
        self.pushes.fetch_add(1, Ordering::Relaxed);

        if !self.merger.wallets().exists(id).map_err(backend)? {
            self.merger.wallets().save(&pushed).map_err(backend)?;
            tracing::info!(wallet = %id, txns = pushed.txns().len(), "new wallet stored from push");
            return Ok(vec![*id]);
        }

        let copy = RemoteCopy::new(PUSH_HOST, 0, Score::ZERO, body);
        let modified = self.merger.run_with(id, vec![copy], &self.options).map_err(backend)?;
        tracing::debug!(wallet = %id, modified = modified.len(), "push merged");
        Ok(modified)
    }

    fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "home": self.config.home.display().to_string(),
            "wallets": self.config.wallets_dir().display().to_string(),
            "copies": self.config.copies_dir().display().to_string(),
            "pushes": self.pushes(),
            "baseline": self.options.baseline,
        })
    }
}
