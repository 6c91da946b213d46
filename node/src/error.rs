use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error("store error: {0}")]
    Store(#[from] tally_store::StoreError),

    #[error("sync error: {0}")]
    Sync(#[from] tally_sync::SyncError),

    #[error("entrance error: {0}")]
    Entrance(#[from] tally_sync::EntranceError),

    #[error(transparent)]
    Types(#[from] tally_types::TallyError),

    #[error("config error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl NodeError {
    /// The wallet was busy for longer than the lock timeout.
    pub fn is_lock_timeout(&self) -> bool {
        matches!(self, Self::Sync(e) if e.is_timeout())
    }
}
