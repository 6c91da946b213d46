use std::time::Duration;

use tally_types::WalletId;
use thiserror::Error;

/// Failures of an entrance's own push logic.
#[derive(Debug, Error)]
pub enum EntranceError {
    #[error("invalid wallet body: {0}")]
    InvalidBody(String),

    #[error("body is wallet {found}, pushed as {expected}")]
    IdMismatch { expected: WalletId, found: WalletId },

    #[error("entrance backend error: {0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("wallet {id} still locked after {waited:?}")]
    LockTimeout { id: WalletId, waited: Duration },

    #[error("lock file I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Entrance(#[from] EntranceError),

    #[error("locked operation aborted: {0}")]
    Aborted(String),
}

impl SyncError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::LockTimeout { .. })
    }
}
