//! Single-writer synchronization for wallet mutations.
//!
//! Every push or merge touching a wallet id runs under that id's
//! [`WalletLockGuard`]. Different ids proceed in parallel.

pub mod entrance;
pub mod error;
pub mod lock;

pub use entrance::{Entrance, SyncEntrance};
pub use error::{EntranceError, SyncError};
pub use lock::{WalletLockGuard, WalletLocks, DEFAULT_LOCK_TIMEOUT, STALE_TOKEN_AGE};
