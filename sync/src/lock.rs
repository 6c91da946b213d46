//! Per-wallet exclusive lock.
//!
//! Two layers: an in-process async mutex per wallet id, so tasks of one
//! process queue fairly, and a `<id>.lock` token file created with
//! `create_new`, so separate processes sharing a home directory exclude each
//! other as well. Both are released when the [`WalletLockGuard`] drops.
//!
//! The token names its owner's pid. A token whose owner is no longer running,
//! or which has not been touched for [`STALE_TOKEN_AGE`], is broken by the
//! next process that wants the wallet.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::future::Future;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use serde::{Deserialize, Serialize};
use sysinfo::{Pid, System};
use tally_types::{Timestamp, WalletId};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use crate::SyncError;

/// How long a caller waits for a busy wallet by default.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(30);

/// A token older than this is abandoned, whoever wrote it.
pub const STALE_TOKEN_AGE: Duration = Duration::from_secs(600);

/// How often a foreign lock token is re-checked.
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// What a lock token file holds.
#[derive(Debug, PartialEq, Eq, Serialize, Deserialize)]
struct TokenOwner {
    pid: u32,
    acquired_at: Timestamp,
}

impl TokenOwner {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            acquired_at: Timestamp::now(),
        }
    }
}

pub struct WalletLocks {
    dir: PathBuf,
    timeout: Duration,
    slots: Mutex<HashMap<WalletId, Arc<Mutex<()>>>>,
}

impl WalletLocks {
    pub fn new(dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            dir: dir.into(),
            timeout,
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Path of the token file that marks `id` as held.
    pub fn token_path(&self, id: &WalletId) -> PathBuf {
        self.dir.join(format!("{id}.lock"))
    }

    async fn slot(&self, id: &WalletId) -> Arc<Mutex<()>> {
        let mut slots = self.slots.lock().await;
        slots.entry(*id).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    /// Acquire `id` with the configured timeout.
    pub async fn lock(&self, id: WalletId) -> Result<WalletLockGuard, SyncError> {
        self.lock_with_timeout(id, self.timeout).await
    }

    /// Acquire `id`, giving up after `timeout`.
    ///
    /// Not reentrant: acquiring an id the current task already holds waits
    /// for itself and times out. A timed-out or cancelled acquisition leaves
    /// no trace behind.
    pub async fn lock_with_timeout(&self, id: WalletId, timeout: Duration) -> Result<WalletLockGuard, SyncError> {
        let started = Instant::now();
        let deadline = started + timeout;
        tracing::debug!(wallet = %id, ?timeout, "acquiring wallet lock");

        let slot = self.slot(&id).await;
        let held = match tokio::time::timeout_at(deadline, slot.lock_owned()).await {
            Ok(held) => held,
            Err(_) => return Err(timed_out(id, started)),
        };

        fs::create_dir_all(&self.dir)?;
        let token = self.token_path(&id);
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&token) {
                Ok(file) => {
                    if let Err(e) = claim(file) {
                        let _ = fs::remove_file(&token);
                        return Err(e.into());
                    }
                    break;
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    if break_if_stale(&id, &token)? {
                        continue;
                    }
                    let now = Instant::now();
                    if now >= deadline {
                        tracing::warn!(wallet = %id, path = %token.display(), "lock token held by another process");
                        return Err(timed_out(id, started));
                    }
                    tokio::time::sleep_until(deadline.min(now + POLL_INTERVAL)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::debug!(wallet = %id, waited = ?started.elapsed(), "wallet lock held");
        Ok(WalletLockGuard {
            id,
            token,
            acquired: Instant::now(),
            _held: held,
        })
    }

    /// Run `f` while holding the lock for `id`.
    pub async fn with_lock<F, Fut, R>(&self, id: WalletId, f: F) -> Result<R, SyncError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = R>,
    {
        let _guard = self.lock(id).await?;
        Ok(f().await)
    }

    /// Whether some task or process currently holds `id`.
    pub async fn is_locked(&self, id: &WalletId) -> bool {
        let busy = {
            let slots = self.slots.lock().await;
            slots.get(id).is_some_and(|slot| slot.try_lock().is_err())
        };
        busy || self.token_path(id).exists()
    }

    /// Forget mutexes nobody is holding or waiting for.
    pub async fn cleanup(&self) {
        let mut slots = self.slots.lock().await;
        slots.retain(|_, slot| Arc::strong_count(slot) > 1);
    }
}

fn claim(mut file: File) -> io::Result<()> {
    serde_json::to_writer(&mut file, &TokenOwner::current())?;
    file.sync_all()
}

fn process_alive(pid: u32) -> bool {
    pid == std::process::id() || System::new().refresh_process(Pid::from_u32(pid))
}

/// Why `token` no longer protects anything, if it doesn't.
///
/// An unreadable or half-written token counts as held until it goes stale.
fn staleness(token: &Path) -> io::Result<Option<String>> {
    let age = fs::metadata(token)?
        .modified()
        .map(|mtime| SystemTime::now().duration_since(mtime).unwrap_or_default())?;
    if age >= STALE_TOKEN_AGE {
        return Ok(Some(format!("untouched for {age:?}")));
    }
    let owner = match serde_json::from_str::<TokenOwner>(&fs::read_to_string(token)?) {
        Ok(owner) => owner,
        Err(_) => return Ok(None),
    };
    Ok((!process_alive(owner.pid)).then(|| format!("owner pid {} is gone", owner.pid)))
}

/// Remove `token` if it is stale. Returns whether the caller should retry now.
///
/// The token is renamed aside before it is judged a second time, so two
/// processes breaking the same token cannot delete each other's fresh one.
fn break_if_stale(id: &WalletId, token: &Path) -> io::Result<bool> {
    let not_found = |e: &io::Error| e.kind() == io::ErrorKind::NotFound;
    match staleness(token) {
        Ok(Some(_)) => {}
        Ok(None) => return Ok(false),
        Err(e) if not_found(&e) => return Ok(true),
        Err(e) => return Err(e),
    }
    let aside = token.with_extension(format!("lock.{}.stale", std::process::id()));
    match fs::rename(token, &aside) {
        Ok(()) => {}
        Err(e) if not_found(&e) => return Ok(true),
        Err(e) => return Err(e),
    }
    match staleness(&aside)? {
        Some(reason) => {
            tracing::warn!(wallet = %id, path = %token.display(), "breaking stale lock token: {reason}");
            fs::remove_file(&aside)?;
            Ok(true)
        }
        None => {
            // Took a live token; put it back unless a new one already exists.
            let _ = fs::hard_link(&aside, token);
            fs::remove_file(&aside)?;
            Ok(false)
        }
    }
}

fn timed_out(id: WalletId, started: Instant) -> SyncError {
    let waited = started.elapsed();
    tracing::warn!(wallet = %id, ?waited, "gave up waiting for wallet lock");
    SyncError::LockTimeout { id, waited }
}

/// Exclusive hold on one wallet id. Dropping it releases the lock.
#[derive(Debug)]
pub struct WalletLockGuard {
    id: WalletId,
    token: PathBuf,
    acquired: Instant,
    _held: OwnedMutexGuard<()>,
}

impl WalletLockGuard {
    pub fn id(&self) -> WalletId {
        self.id
    }

    pub fn held_for(&self) -> Duration {
        self.acquired.elapsed()
    }
}

impl Drop for WalletLockGuard {
    fn drop(&mut self) {
        // The token goes first; the mutex is released after this body runs.
        if let Err(e) = fs::remove_file(&self.token) {
            if e.kind() != io::ErrorKind::NotFound {
                tracing::warn!(wallet = %self.id, "failed to remove lock token: {e}");
            }
        }
        tracing::debug!(wallet = %self.id, held = ?self.held_for(), "wallet lock released");
    }
}
