//! Filesystem implementation of CopiesStore.
//!
//! Layout under the copies root:
//!
//! ```text
//! <root>/<wallet-id>/scores.tly   JSON array of ScoreRecord, oldest first
//! <root>/<wallet-id>/<name>.tly   raw body claimed by one (host, port)
//! ```
//!
//! Every operation is a read-modify-write of `scores.tly`, so clones of one
//! `FsCopies` serialize on a shared mutex. Other processes sharing the root
//! must hold the wallet lock.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tally_store::{CopiesStore, CopyRecords, RemoteCopy, ScoreRecord, StoreError, DEFAULT_MAX_COPIES};
use tally_types::{Score, Timestamp, WalletId};

use crate::atomic::{remove_if_exists, write_atomic};
use crate::{FsError, EXT};

/// Copies of every wallet, one directory per wallet id.
#[derive(Clone, Debug)]
pub struct FsCopies {
    root: PathBuf,
    capacity: usize,
    serial: Arc<Mutex<()>>,
}

impl FsCopies {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self::with_capacity(root, DEFAULT_MAX_COPIES)
    }

    pub fn with_capacity(root: impl Into<PathBuf>, capacity: usize) -> Self {
        Self {
            root: root.into(),
            capacity,
            serial: Arc::new(Mutex::new(())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn dir(&self, id: &WalletId) -> PathBuf {
        self.root.join(id.to_string())
    }

    fn exclusive(&self) -> MutexGuard<'_, ()> {
        // The guarded state lives on disk; a panicked holder left nothing in memory.
        self.serial.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn scores_path(&self, id: &WalletId) -> PathBuf {
        self.dir(id).join(format!("scores.{EXT}"))
    }

    fn body_path(&self, id: &WalletId, name: u32) -> PathBuf {
        self.dir(id).join(format!("{name}.{EXT}"))
    }

    fn load(&self, id: &WalletId) -> Result<CopyRecords, FsError> {
        match fs::read_to_string(self.scores_path(id)) {
            Ok(json) => Ok(serde_json::from_str(&json)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(CopyRecords::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn store(&self, id: &WalletId, records: &CopyRecords) -> Result<(), FsError> {
        write_atomic(&self.scores_path(id), &serde_json::to_string_pretty(records)?)
    }

    fn delete_bodies(&self, id: &WalletId, records: &[ScoreRecord]) -> Result<(), FsError> {
        for record in records {
            remove_if_exists(&self.body_path(id, record.name))?;
        }
        Ok(())
    }
}

impl CopiesStore for FsCopies {
    fn add_at(
        &self,
        id: &WalletId,
        body: &str,
        host: &str,
        port: u16,
        score: Score,
        time: Timestamp,
    ) -> Result<(), StoreError> {
        let _serial = self.exclusive();
        fs::create_dir_all(self.dir(id)).map_err(FsError::from)?;
        let mut records = self.load(id)?;
        let name = records.upsert(host, port, score, time).name;
        write_atomic(&self.body_path(id, name), body)?;
        let evicted = records.evict(self.capacity);
        self.delete_bodies(id, &evicted)?;
        self.store(id, &records)?;
        for record in &evicted {
            tracing::debug!(
                wallet = %id,
                host = %record.host,
                port = record.port,
                score = %record.score,
                "copy evicted"
            );
        }
        tracing::debug!(wallet = %id, host, port, score = %score, "copy stored as {name}.{EXT}");
        Ok(())
    }

    fn all(&self, id: &WalletId) -> Result<Vec<RemoteCopy>, StoreError> {
        let _serial = self.exclusive();
        let records = self.load(id)?;
        let mut copies = Vec::with_capacity(records.len());
        for (rank, record) in records.ranked().into_iter().enumerate() {
            let path = self.body_path(id, record.name);
            let body = fs::read_to_string(&path).map_err(|e| {
                FsError::Corruption(format!("copy body {} unreadable: {e}", path.display()))
            })?;
            copies.push(RemoteCopy {
                host: record.host.clone(),
                port: record.port,
                score: record.score,
                rank,
                body,
            });
        }
        Ok(copies)
    }

    fn remove(&self, id: &WalletId, host: &str, port: u16) -> Result<bool, StoreError> {
        let _serial = self.exclusive();
        let mut records = self.load(id)?;
        match records.remove(host, port) {
            Some(record) => {
                self.delete_bodies(id, &[record])?;
                self.store(id, &records)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn clean(&self, id: &WalletId) -> Result<usize, StoreError> {
        let _serial = self.exclusive();
        let mut records = self.load(id)?;
        let removed = records.clear();
        self.delete_bodies(id, &removed)?;
        remove_if_exists(&self.scores_path(id))?;
        if let Err(e) = fs::remove_dir(self.dir(id)) {
            // A directory holding files this store does not own stays put.
            if e.kind() != io::ErrorKind::NotFound {
                tracing::debug!(wallet = %id, "copies directory kept: {e}");
            }
        }
        Ok(removed.len())
    }

    fn purge_older_than(&self, id: &WalletId, cutoff: Timestamp) -> Result<usize, StoreError> {
        let _serial = self.exclusive();
        let mut records = self.load(id)?;
        let stale = records.purge_older_than(cutoff);
        if stale.is_empty() {
            return Ok(0);
        }
        self.delete_bodies(id, &stale)?;
        self.store(id, &records)?;
        Ok(stale.len())
    }
}
