//! Ledger transactions.

use serde::{Deserialize, Serialize};

use crate::{Amount, Timestamp, WalletId};

/// A single signed ledger entry.
///
/// Positive amounts are incoming payments from `bnf`, negative amounts are
/// outgoing payments to `bnf`. Signature verification is done before a
/// transaction ever reaches this crate; `signature` is carried verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Txn {
    pub id: u64,
    pub time: Timestamp,
    pub amount: Amount,
    pub prefix: String,
    /// Beneficiary: the counterpart wallet.
    pub bnf: WalletId,
    #[serde(default)]
    pub details: String,
    #[serde(default)]
    pub signature: String,
}

/// The fields that make two transactions "the same fact".
///
/// Two ledger entries with equal keys collapse into one during a merge,
/// even if their details or signature encodings differ.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct TxnKey {
    pub id: u64,
    pub amount: Amount,
    pub bnf: WalletId,
}

impl Txn {
    pub fn new(
        id: u64,
        time: Timestamp,
        amount: Amount,
        prefix: impl Into<String>,
        bnf: WalletId,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id,
            time,
            amount,
            prefix: prefix.into(),
            bnf,
            details: details.into(),
            signature: String::new(),
        }
    }

    pub fn with_signature(mut self, signature: impl Into<String>) -> Self {
        self.signature = signature.into();
        self
    }

    pub fn key(&self) -> TxnKey {
        TxnKey {
            id: self.id,
            amount: self.amount,
            bnf: self.bnf,
        }
    }

    pub fn is_incoming(&self) -> bool {
        self.amount.is_positive()
    }

    pub fn is_outgoing(&self) -> bool {
        self.amount.is_negative()
    }

    /// Whether `other` records a different fact under the same id.
    pub fn conflicts_with(&self, other: &Txn) -> bool {
        self.id == other.id && self.key() != other.key()
    }
}
