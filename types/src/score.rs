//! Trust score attached to a remote host's claim about a wallet.
//!
//! Computing and verifying scores happens elsewhere; here a score is only
//! something to rank and add up.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque score strength. Higher is more trustworthy.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Score(u64);

impl Score {
    pub const ZERO: Self = Self(0);

    pub fn new(strength: u64) -> Self {
        Self(strength)
    }

    pub fn strength(&self) -> u64 {
        self.0
    }

    pub fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
