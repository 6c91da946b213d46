//! Wallet merge engine.
//!
//! Combines a local wallet with the copies other nodes hold of it. Trust in a
//! copy comes from its score; the baseline is the ledger content with the
//! highest aggregate score behind it.

mod baseline;
pub mod engine;
pub mod options;
pub mod payments;
pub mod report;

pub use engine::{merge, merge_with, MergeOutcome};
pub use options::MergeOptions;
pub use payments::{pays, NoPayments, PaymentLookup};
pub use report::{BaselineSummary, ExcludedCopy, MergeReport, Rejection};
