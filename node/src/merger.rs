//! Merge a stored wallet with its stored copies and persist the result.

use std::sync::Arc;

use tally_merge::{merge_with, pays, MergeOptions, MergeOutcome, NoPayments, PaymentLookup};
use tally_store::{CopiesStore, RemoteCopy, WalletStore};
use tally_types::{ParsedWallet, Txn, Wallet, WalletId};

use crate::tracing_spans::merge_span;
use crate::NodeError;

/// Looks payers up in the local wallet store.
struct StoredPayments<'a, W>(&'a W);

impl<W: WalletStore> PaymentLookup for StoredPayments<'_, W> {
    fn confirms(&self, payee: &WalletId, credit: &Txn) -> bool {
        match self.0.find(&credit.bnf) {
            Ok(Some(payer)) => pays(&payer, payee, credit),
            Ok(None) => false,
            Err(e) => {
                tracing::warn!(payer = %credit.bnf, "payer wallet unreadable: {e}");
                false
            }
        }
    }
}

/// Runs merges against a wallet store and a copies store.
///
/// Callers hold the wallet lock; the merger itself does no locking.
pub struct Merger<W, C> {
    wallets: Arc<W>,
    copies: Arc<C>,
    clean_copies: bool,
}

impl<W, C> Clone for Merger<W, C> {
    fn clone(&self) -> Self {
        Self {
            wallets: Arc::clone(&self.wallets),
            copies: Arc::clone(&self.copies),
            clean_copies: self.clean_copies,
        }
    }
}

impl<W: WalletStore, C: CopiesStore> Merger<W, C> {
    pub fn new(wallets: Arc<W>, copies: Arc<C>) -> Self {
        Self {
            wallets,
            copies,
            clean_copies: true,
        }
    }

    /// Whether consumed copies are removed after a merge (default true).
    pub fn clean_copies(mut self, clean: bool) -> Self {
        self.clean_copies = clean;
        self
    }

    pub fn wallets(&self) -> &Arc<W> {
        &self.wallets
    }

    pub fn copies(&self) -> &Arc<C> {
        &self.copies
    }

    /// Merge `id` with its stored copies. Returns the ids that changed.
    pub fn run(&self, id: &WalletId, options: &MergeOptions) -> Result<Vec<WalletId>, NodeError> {
        self.run_with(id, Vec::new(), options)
    }

    /// Like [`run`](Self::run), with `extra` copies ranked after the stored ones.
    pub fn run_with(
        &self,
        id: &WalletId,
        extra: Vec<RemoteCopy>,
        options: &MergeOptions,
    ) -> Result<Vec<WalletId>, NodeError> {
        let outcome = self.merge(id, extra, options)?;
        Ok(if outcome.modified { vec![*id] } else { Vec::new() })
    }

    /// The full merge outcome, after persisting it.
    pub fn merge(
        &self,
        id: &WalletId,
        extra: Vec<RemoteCopy>,
        options: &MergeOptions,
    ) -> Result<MergeOutcome, NodeError> {
        let _span = merge_span(id, options.baseline).entered();

        let mut copies = self.copies.all(id)?;
        let stored = copies.len();
        copies.extend(extra.into_iter().enumerate().map(|(i, mut copy)| {
            copy.rank = stored + i;
            copy
        }));

        let local = match self.wallets.find(id)? {
            Some(wallet) => wallet,
            None => starting_wallet(id, &copies)?,
        };

        let outcome = if options.baseline {
            merge_with(&local, &copies, options, &NoPayments)
        } else {
            merge_with(&local, &copies, options, &StoredPayments(self.wallets.as_ref()))
        };

        if outcome.modified {
            self.wallets.save(&outcome.wallet)?;
        }
        if self.clean_copies && stored > 0 {
            // Only the claims this merge read; a copy stored meanwhile waits for the next merge.
            let mut removed = 0;
            for copy in &copies[..stored] {
                if self.copies.remove(id, &copy.host, copy.port)? {
                    removed += 1;
                }
            }
            tracing::debug!(wallet = %id, removed, "consumed copies cleaned");
        }
        Ok(outcome)
    }
}

/// An empty ledger for a wallet we do not hold yet, carrying the network
/// and protocol of the best-ranked copy that parses.
fn starting_wallet(id: &WalletId, copies: &[RemoteCopy]) -> Result<Wallet, NodeError> {
    let template = copies
        .iter()
        .filter_map(|c| ParsedWallet::parse(&c.body).into_wallet())
        .find(|w| w.id() == *id);
    Ok(match template {
        Some(w) => Wallet::from_parts(*id, w.network(), w.protocol(), Vec::new())?,
        None => Wallet::new(*id, Wallet::DEFAULT_NETWORK),
    })
}
