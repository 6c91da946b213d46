//! What a merge decided, and why.

use std::fmt;

use tally_types::{Score, Txn, WalletId};

/// Why a copy was left out of a merge. None of these fail the merge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// The body is not a wallet.
    Unparsable(String),
    /// The body is a different wallet.
    Foreign(WalletId),
    /// The body records a different fact under an already known txn id.
    Conflicting { txn: u64 },
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unparsable(reason) => write!(f, "unparsable copy: {reason}"),
            Self::Foreign(id) => write!(f, "copy of another wallet {id}"),
            Self::Conflicting { txn } => write!(f, "conflicting transaction #{txn}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExcludedCopy {
    /// `host:port` of the copy.
    pub origin: String,
    pub rejection: Rejection,
}

/// The content group chosen as baseline.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BaselineSummary {
    pub members: usize,
    pub score: Score,
    pub origins: Vec<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MergeReport {
    /// Copies that took part in the merge.
    pub considered: usize,
    pub excluded: Vec<ExcludedCopy>,
    /// `None` when the local wallet stood in as its own baseline, or in strict mode.
    pub baseline: Option<BaselineSummary>,
    /// Transactions added to the local ledger.
    pub accepted: Vec<Txn>,
    /// Local debits removed as fake negatives.
    pub pruned: Vec<Txn>,
    /// Remote credits refused as fake positives.
    pub rejected: Vec<Txn>,
}

impl MergeReport {
    pub fn broken(&self) -> usize {
        self.count(|r| matches!(r, Rejection::Unparsable(_)))
    }

    pub fn foreign(&self) -> usize {
        self.count(|r| matches!(r, Rejection::Foreign(_)))
    }

    pub fn conflicting(&self) -> usize {
        self.count(|r| matches!(r, Rejection::Conflicting { .. }))
    }

    fn count(&self, pred: impl Fn(&Rejection) -> bool) -> usize {
        self.excluded.iter().filter(|e| pred(&e.rejection)).count()
    }
}
