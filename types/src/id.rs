//! Wallet identifier: 16 lowercase hex characters.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::TallyError;

/// A wallet identifier.
///
/// Always rendered as exactly 16 lowercase hex digits. It keys wallet files,
/// copy directories and lock tokens, so any malformed input is rejected at
/// parse time, before it can reach the filesystem.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WalletId(u64);

impl WalletId {
    /// The root wallet, the only one allowed to go negative.
    pub const ROOT: Self = Self(0);

    /// Number of hex characters in the textual form.
    pub const LEN: usize = 16;

    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_root(&self) -> bool {
        self.0 == 0
    }
}

impl FromStr for WalletId {
    type Err = TallyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let well_formed = s.len() == Self::LEN
            && s.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b));
        if !well_formed {
            return Err(TallyError::InvalidWalletId(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(Self)
            .map_err(|_| TallyError::InvalidWalletId(s.to_string()))
    }
}

impl TryFrom<String> for WalletId {
    type Error = TallyError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<WalletId> for String {
    fn from(id: WalletId) -> Self {
        id.to_string()
    }
}

impl fmt::Display for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for WalletId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WalletId({:016x})", self.0)
    }
}
