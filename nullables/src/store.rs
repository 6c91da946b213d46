//! Nullable stores: thread-safe in-memory storage for testing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use tally_store::{CopiesStore, CopyRecords, RemoteCopy, StoreError, WalletStore, DEFAULT_MAX_COPIES};
use tally_types::{Score, Timestamp, Wallet, WalletId};

use crate::NullClock;

/// An in-memory wallet store for testing.
/// Thread-safe for use with tokio's multi-threaded runtime.
#[derive(Default)]
pub struct NullWallets {
    wallets: Mutex<HashMap<WalletId, Wallet>>,
    saves: AtomicUsize,
}

impl NullWallets {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store that already holds `wallets`.
    pub fn with_wallets(wallets: impl IntoIterator<Item = Wallet>) -> Self {
        let store = Self::new();
        store
            .wallets
            .lock()
            .unwrap()
            .extend(wallets.into_iter().map(|w| (w.id(), w)));
        store
    }

    /// How many times `save` has been called.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.wallets.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl WalletStore for NullWallets {
    fn find(&self, id: &WalletId) -> Result<Option<Wallet>, StoreError> {
        Ok(self.wallets.lock().unwrap().get(id).cloned())
    }

    fn save(&self, wallet: &Wallet) -> Result<(), StoreError> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.wallets.lock().unwrap().insert(wallet.id(), wallet.clone());
        Ok(())
    }
}

#[derive(Default)]
struct Entries {
    records: CopyRecords,
    bodies: HashMap<u32, String>,
}

/// An in-memory copies store with the same ranking and eviction rules as
/// the filesystem backend. `add` takes its time from a [`NullClock`].
pub struct NullCopies {
    wallets: Mutex<HashMap<WalletId, Entries>>,
    capacity: usize,
    clock: NullClock,
}

impl NullCopies {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_COPIES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            wallets: Mutex::new(HashMap::new()),
            capacity,
            clock: NullClock::new(0),
        }
    }

    pub fn clock(&self) -> &NullClock {
        &self.clock
    }
}

impl Default for NullCopies {
    fn default() -> Self {
        Self::new()
    }
}

impl CopiesStore for NullCopies {
    fn add_at(
        &self,
        id: &WalletId,
        body: &str,
        host: &str,
        port: u16,
        score: Score,
        time: Timestamp,
    ) -> Result<(), StoreError> {
        let mut wallets = self.wallets.lock().unwrap();
        let entries = wallets.entry(*id).or_default();
        let name = entries.records.upsert(host, port, score, time).name;
        entries.bodies.insert(name, body.to_string());
        for evicted in entries.records.evict(self.capacity) {
            entries.bodies.remove(&evicted.name);
        }
        Ok(())
    }

    fn add(&self, id: &WalletId, body: &str, host: &str, port: u16, score: Score) -> Result<(), StoreError> {
        self.add_at(id, body, host, port, score, self.clock.now())
    }

    fn all(&self, id: &WalletId) -> Result<Vec<RemoteCopy>, StoreError> {
        let wallets = self.wallets.lock().unwrap();
        let Some(entries) = wallets.get(id) else {
            return Ok(Vec::new());
        };
        entries
            .records
            .ranked()
            .into_iter()
            .enumerate()
            .map(|(rank, record)| {
                let body = entries
                    .bodies
                    .get(&record.name)
                    .cloned()
                    .ok_or_else(|| StoreError::Corruption(format!("no body for copy {}", record.name)))?;
                Ok(RemoteCopy {
                    host: record.host.clone(),
                    port: record.port,
                    score: record.score,
                    rank,
                    body,
                })
            })
            .collect()
    }

    fn remove(&self, id: &WalletId, host: &str, port: u16) -> Result<bool, StoreError> {
        let mut wallets = self.wallets.lock().unwrap();
        let Some(entries) = wallets.get_mut(id) else {
            return Ok(false);
        };
        match entries.records.remove(host, port) {
            Some(record) => {
                entries.bodies.remove(&record.name);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clean(&self, id: &WalletId) -> Result<usize, StoreError> {
        Ok(self
            .wallets
            .lock()
            .unwrap()
            .remove(id)
            .map_or(0, |entries| entries.records.len()))
    }

    fn purge_older_than(&self, id: &WalletId, cutoff: Timestamp) -> Result<usize, StoreError> {
        let mut wallets = self.wallets.lock().unwrap();
        let Some(entries) = wallets.get_mut(id) else {
            return Ok(0);
        };
        let stale = entries.records.purge_older_than(cutoff);
        for record in &stale {
            entries.bodies.remove(&record.name);
        }
        Ok(stale.len())
    }
}
