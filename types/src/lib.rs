//! Fundamental types for Tally.
//!
//! This crate defines the leaf contracts shared across every other crate in the
//! workspace: wallet ids, amounts, timestamps, transactions, wallets and scores.

pub mod amount;
pub mod error;
pub mod id;
pub mod score;
pub mod time;
pub mod txn;
pub mod wallet;

pub use amount::Amount;
pub use error::TallyError;
pub use id::WalletId;
pub use score::Score;
pub use time::Timestamp;
pub use txn::{Txn, TxnKey};
pub use wallet::{ParsedWallet, Wallet};
