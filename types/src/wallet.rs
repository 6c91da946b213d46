//! Wallet ledger and its body format.
//!
//! A wallet body is a JSON document. Parsing is whitespace-insensitive, and
//! ledger equality is the derived equality over the transaction sequence, so
//! two hosts that format the same ledger differently still agree.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{Amount, TallyError, Txn, WalletId};

/// An append-only ledger of transactions for one wallet id.
///
/// The balance is never stored; it is always the exact sum of the ledger.
/// A ledger whose sum leaves the `Amount` range is refused on every path in,
/// including deserialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WalletBody")]
pub struct Wallet {
    id: WalletId,
    network: String,
    protocol: u32,
    #[serde(default)]
    txns: Vec<Txn>,
}

/// Wire shape of a wallet, before the ledger is checked.
#[derive(Deserialize)]
struct WalletBody {
    id: WalletId,
    network: String,
    protocol: u32,
    #[serde(default)]
    txns: Vec<Txn>,
}

impl TryFrom<WalletBody> for Wallet {
    type Error = TallyError;

    /// Duplicate ids are kept so callers can see them; overflow is not.
    fn try_from(body: WalletBody) -> Result<Self, Self::Error> {
        if Amount::checked_sum(body.txns.iter().map(|t| t.amount)).is_none() {
            return Err(TallyError::AmountOverflow);
        }
        Ok(Self {
            id: body.id,
            network: body.network,
            protocol: body.protocol,
            txns: body.txns,
        })
    }
}

impl Wallet {
    /// Protocol version written into new wallets.
    pub const PROTOCOL: u32 = 2;

    /// Network name used when none is configured.
    pub const DEFAULT_NETWORK: &'static str = "test";

    /// An empty wallet.
    pub fn new(id: WalletId, network: impl Into<String>) -> Self {
        Self {
            id,
            network: network.into(),
            protocol: Self::PROTOCOL,
            txns: Vec::new(),
        }
    }

    /// Build a wallet from an explicit ledger, rejecting duplicate txn ids and
    /// ledgers whose balance overflows.
    pub fn from_parts(
        id: WalletId,
        network: impl Into<String>,
        protocol: u32,
        txns: Vec<Txn>,
    ) -> Result<Self, TallyError> {
        let mut wallet = Self {
            id,
            network: network.into(),
            protocol,
            txns: Vec::with_capacity(txns.len()),
        };
        for txn in txns {
            wallet.add(txn)?;
        }
        Ok(wallet)
    }

    /// Parse a wallet body.
    pub fn from_body(body: &str) -> Result<Self, TallyError> {
        serde_json::from_str(body).map_err(|e| TallyError::UnparsableWallet(e.to_string()))
    }

    /// Serialize to the canonical body format.
    pub fn to_body(&self) -> String {
        serde_json::to_string_pretty(self).expect("Wallet is always serializable to JSON")
    }

    pub fn id(&self) -> WalletId {
        self.id
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    pub fn protocol(&self) -> u32 {
        self.protocol
    }

    pub fn txns(&self) -> &[Txn] {
        &self.txns
    }

    pub fn is_empty(&self) -> bool {
        self.txns.is_empty()
    }

    pub fn balance(&self) -> Amount {
        self.txns.iter().map(|t| t.amount).sum()
    }

    pub fn contains_id(&self, id: u64) -> bool {
        self.txns.iter().any(|t| t.id == id)
    }

    /// Next free id for an outgoing transaction.
    pub fn next_txn_id(&self) -> u64 {
        self.txns
            .iter()
            .filter(|t| t.is_outgoing())
            .map(|t| t.id)
            .max()
            .map_or(1, |max| max + 1)
    }

    /// Append a transaction. The ledger only ever grows through this call.
    pub fn add(&mut self, txn: Txn) -> Result<(), TallyError> {
        if self.contains_id(txn.id) {
            return Err(TallyError::DuplicateTransaction {
                wallet: self.id.to_string(),
                id: txn.id,
            });
        }
        if self.balance().checked_add(txn.amount).is_none() {
            return Err(TallyError::AmountOverflow);
        }
        self.txns.push(txn);
        Ok(())
    }

    /// Whether some txn id appears more than once.
    pub fn has_duplicate_ids(&self) -> bool {
        let mut seen = HashSet::with_capacity(self.txns.len());
        !self.txns.iter().all(|t| seen.insert(t.id))
    }
}

/// Outcome of parsing a raw body that may not be a wallet at all.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParsedWallet {
    Parsed(Wallet),
    Unparsable(String),
}

impl ParsedWallet {
    pub fn parse(body: &str) -> Self {
        match serde_json::from_str::<Wallet>(body) {
            Ok(wallet) => Self::Parsed(wallet),
            Err(e) => Self::Unparsable(e.to_string()),
        }
    }

    pub fn wallet(&self) -> Option<&Wallet> {
        match self {
            Self::Parsed(w) => Some(w),
            Self::Unparsable(_) => None,
        }
    }

    pub fn into_wallet(self) -> Option<Wallet> {
        match self {
            Self::Parsed(w) => Some(w),
            Self::Unparsable(_) => None,
        }
    }
}
