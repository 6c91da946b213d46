use thiserror::Error;

#[derive(Debug, Error)]
pub enum FsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("corrupted: {0}")]
    Corruption(String),
}

impl From<FsError> for tally_store::StoreError {
    fn from(e: FsError) -> Self {
        match e {
            FsError::Io(e) => tally_store::StoreError::Io(e.to_string()),
            FsError::Json(e) => tally_store::StoreError::Serialization(e.to_string()),
            FsError::Corruption(msg) => tally_store::StoreError::Corruption(msg),
        }
    }
}
