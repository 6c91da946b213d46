//! Nullable infrastructure for deterministic testing.
//!
//! Everything the node touches (clock, wallet and copy storage, the entrance)
//! is reached through a trait. This crate provides test-friendly
//! implementations that:
//! - Return deterministic values
//! - Can be inspected and controlled programmatically
//! - Never touch the filesystem or network
//!
//! Usage: swap real implementations for nullables in tests.

pub mod clock;
pub mod entrance;
pub mod store;

pub use clock::NullClock;
pub use entrance::NullEntrance;
pub use store::{NullCopies, NullWallets};
