//! Abstract storage traits for Tally.
//!
//! Every storage backend (filesystem, in-memory for testing) implements
//! these traits. The merge and node crates depend only on the traits.

pub mod copies;
pub mod error;
pub mod wallets;

pub use copies::{CopiesStore, CopyRecords, RemoteCopy, ScoreRecord, DEFAULT_MAX_COPIES};
pub use error::StoreError;
pub use wallets::WalletStore;
