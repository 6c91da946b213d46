//! Tally node: the wiring between stores, merge engine and wallet locks.
//!
//! - [`Merger`] merges a stored wallet with its stored copies and persists it
//! - [`LocalEntrance`] folds pushed wallet bodies into the home directory
//! - [`Node`] owns one home directory and serializes work per wallet id

pub mod config;
pub mod error;
pub mod local_entrance;
pub mod logging;
pub mod merger;
pub mod node;
pub mod tracing_spans;

pub use config::NodeConfig;
pub use error::NodeError;
pub use local_entrance::{LocalEntrance, PUSH_HOST};
pub use logging::{init_logging, LogFormat};
pub use merger::Merger;
pub use node::{Node, NodeEntrance};
