//! Top-level error type shared across crates.

use thiserror::Error;

/// Common error type for Tally's leaf types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TallyError {
    #[error("invalid wallet id: {0:?}")]
    InvalidWalletId(String),

    #[error("invalid amount: {0:?}")]
    InvalidAmount(String),

    #[error("amount overflow")]
    AmountOverflow,

    #[error("unparsable wallet: {0}")]
    UnparsableWallet(String),

    #[error("duplicate transaction id {id} in wallet {wallet}")]
    DuplicateTransaction { wallet: String, id: u64 },
}
