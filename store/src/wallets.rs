//! Wallet storage trait.

use crate::StoreError;
use tally_types::{Wallet, WalletId};

/// Where local wallets live.
///
/// Implementations must replace a wallet atomically on `save`: a reader sees
/// either the old ledger or the new one, never a partial write.
pub trait WalletStore {
    fn find(&self, id: &WalletId) -> Result<Option<Wallet>, StoreError>;
    fn save(&self, wallet: &Wallet) -> Result<(), StoreError>;

    fn exists(&self, id: &WalletId) -> Result<bool, StoreError> {
        self.find(id).map(|w| w.is_some())
    }
}
