//! Filesystem storage backend for Tally.
//!
//! Implements the traits from `tally-store` on plain files: one body file per
//! wallet, and one directory of copy bodies plus a scores file per wallet.
//! Every write is a temp-file-and-rename, so a crash never leaves a torn file.

mod atomic;
pub mod copies;
pub mod error;
pub mod wallets;

pub use copies::FsCopies;
pub use error::FsError;
pub use wallets::FsWallets;

/// Extension shared by wallet files, copy bodies and scores files.
pub const EXT: &str = "tly";
