//! Pre-built [`tracing::Span`] constructors for wallet operations.
//!
//! Consistent span names and fields make it easy to follow one wallet
//! through the logs.

use tally_types::WalletId;
use tracing::{info_span, Span};

/// Span covering one merge run for a wallet.
pub fn merge_span(id: &WalletId, baseline: bool) -> Span {
    info_span!("merge", wallet = %id, baseline)
}

/// Span covering one push through the local entrance.
pub fn push_span(id: &WalletId, bytes: usize) -> Span {
    info_span!("push", wallet = %id, bytes)
}
