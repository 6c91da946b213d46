//! Remote copies storage trait and the ranking/eviction rules every backend shares.
//!
//! A copy is the body of a wallet as claimed by one remote `(host, port)`,
//! tagged with that host's score. Bodies are kept verbatim: whether they parse
//! is only decided at merge time.

use serde::{Deserialize, Serialize};
use tally_types::{Score, Timestamp, WalletId};

use crate::StoreError;

/// How many copies per wallet are retained unless configured otherwise.
pub const DEFAULT_MAX_COPIES: usize = 16;

/// A snapshot of one stored copy, as handed to the merge engine.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteCopy {
    pub host: String,
    pub port: u16,
    pub score: Score,
    /// Position in the store's ranking, 0 = best.
    pub rank: usize,
    pub body: String,
}

impl RemoteCopy {
    /// A copy that is not (yet) part of any store ranking.
    pub fn new(host: impl Into<String>, port: u16, score: Score, body: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            score,
            rank: 0,
            body: body.into(),
        }
    }

    pub fn origin(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// One line of a wallet's scores file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRecord {
    /// Numeric suffix naming the body file.
    pub name: u32,
    pub host: String,
    pub port: u16,
    pub score: Score,
    pub time: Timestamp,
}

/// The score records of one wallet, oldest first.
///
/// Order is recency: an `upsert` for an existing `(host, port)` moves the
/// record to the back, which is what breaks eviction ties.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CopyRecords(Vec<ScoreRecord>);

impl CopyRecords {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_records(records: Vec<ScoreRecord>) -> Self {
        Self(records)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScoreRecord> {
        self.0.iter()
    }

    pub fn find(&self, host: &str, port: u16) -> Option<&ScoreRecord> {
        self.0.iter().find(|r| r.host == host && r.port == port)
    }

    /// Insert or replace the record for `(host, port)` and return it.
    ///
    /// A replaced record keeps its file name; a new one gets the next free name.
    pub fn upsert(&mut self, host: &str, port: u16, score: Score, time: Timestamp) -> &ScoreRecord {
        let name = match self.remove(host, port) {
            Some(previous) => previous.name,
            None => self.0.iter().map(|r| r.name).max().map_or(1, |max| max + 1),
        };
        self.0.push(ScoreRecord {
            name,
            host: host.to_string(),
            port,
            score,
            time,
        });
        &self.0[self.0.len() - 1]
    }

    pub fn remove(&mut self, host: &str, port: u16) -> Option<ScoreRecord> {
        let idx = self.0.iter().position(|r| r.host == host && r.port == port)?;
        Some(self.0.remove(idx))
    }

    /// Drop records until at most `capacity` remain and return the dropped ones.
    ///
    /// The lowest score goes first; among equal scores the least recently
    /// replaced record goes first.
    pub fn evict(&mut self, capacity: usize) -> Vec<ScoreRecord> {
        let mut evicted = Vec::new();
        while self.0.len() > capacity {
            let victim = self
                .0
                .iter()
                .enumerate()
                .min_by_key(|(idx, r)| (r.score, *idx))
                .map(|(idx, _)| idx);
            match victim {
                Some(idx) => evicted.push(self.0.remove(idx)),
                None => break,
            }
        }
        evicted
    }

    /// Drop records older than `cutoff` and return them.
    pub fn purge_older_than(&mut self, cutoff: Timestamp) -> Vec<ScoreRecord> {
        let (stale, fresh): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.0).into_iter().partition(|r| r.time < cutoff);
        self.0 = fresh;
        stale
    }

    pub fn clear(&mut self) -> Vec<ScoreRecord> {
        std::mem::take(&mut self.0)
    }

    /// Records ordered by descending score, then host, then port.
    pub fn ranked(&self) -> Vec<&ScoreRecord> {
        let mut ranked: Vec<&ScoreRecord> = self.0.iter().collect();
        ranked.sort_by(|a, b| {
            b.score
                .cmp(&a.score)
                .then_with(|| a.host.cmp(&b.host))
                .then_with(|| a.port.cmp(&b.port))
        });
        ranked
    }
}

/// Trait for remote copy storage.
///
/// Every operation names the wallet it works on; there is no ambient
/// "current wallet".
pub trait CopiesStore {
    /// Store or replace the copy from `(host, port)`, recorded at `time`.
    fn add_at(
        &self,
        id: &WalletId,
        body: &str,
        host: &str,
        port: u16,
        score: Score,
        time: Timestamp,
    ) -> Result<(), StoreError>;

    /// Store or replace the copy from `(host, port)`, recorded now.
    fn add(&self, id: &WalletId, body: &str, host: &str, port: u16, score: Score) -> Result<(), StoreError> {
        self.add_at(id, body, host, port, score, Timestamp::now())
    }

    /// Snapshot of all copies, best first (see [`CopyRecords::ranked`]).
    fn all(&self, id: &WalletId) -> Result<Vec<RemoteCopy>, StoreError>;

    /// Remove the copy from `(host, port)`. Returns whether one existed.
    fn remove(&self, id: &WalletId, host: &str, port: u16) -> Result<bool, StoreError>;

    /// Remove every copy of the wallet. Returns how many were removed.
    fn clean(&self, id: &WalletId) -> Result<usize, StoreError>;

    /// Remove copies recorded before `cutoff`. Returns how many were removed.
    fn purge_older_than(&self, id: &WalletId, cutoff: Timestamp) -> Result<usize, StoreError>;
}
