//! Filesystem implementation of WalletStore.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tally_store::{StoreError, WalletStore};
use tally_types::{Wallet, WalletId};

use crate::atomic::write_atomic;
use crate::{FsError, EXT};

/// One `<id>.tly` file per wallet under a root directory.
#[derive(Clone, Debug)]
pub struct FsWallets {
    root: PathBuf,
}

impl FsWallets {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path(&self, id: &WalletId) -> PathBuf {
        self.root.join(format!("{id}.{EXT}"))
    }
}

impl WalletStore for FsWallets {
    fn find(&self, id: &WalletId) -> Result<Option<Wallet>, StoreError> {
        let path = self.path(id);
        let body = match fs::read_to_string(&path) {
            Ok(body) => body,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(FsError::from(e).into()),
        };
        let wallet = Wallet::from_body(&body)
            .map_err(|e| FsError::Corruption(format!("{}: {e}", path.display())))?;
        if wallet.id() != *id {
            return Err(FsError::Corruption(format!(
                "{} holds wallet {}",
                path.display(),
                wallet.id()
            ))
            .into());
        }
        Ok(Some(wallet))
    }

    fn save(&self, wallet: &Wallet) -> Result<(), StoreError> {
        fs::create_dir_all(&self.root).map_err(FsError::from)?;
        write_atomic(&self.path(&wallet.id()), &wallet.to_body())?;
        tracing::debug!(wallet = %wallet.id(), txns = wallet.txns().len(), "wallet saved");
        Ok(())
    }

    fn exists(&self, id: &WalletId) -> Result<bool, StoreError> {
        Ok(self.path(id).is_file())
    }
}
