//! The merge itself.
//!
//! Input is the local wallet and a ranked set of remote copies; output is a
//! new wallet that never contains a credit the evidence does not support and
//! never keeps a debit no copy confirms.

use std::collections::{HashMap, HashSet};

use tally_store::RemoteCopy;
use tally_types::{ParsedWallet, Txn, TxnKey, Wallet};

use crate::baseline::{self, Candidate};
use crate::payments::{NoPayments, PaymentLookup};
use crate::report::{ExcludedCopy, MergeReport, Rejection};
use crate::MergeOptions;

/// Result of one merge.
#[derive(Clone, Debug)]
pub struct MergeOutcome {
    pub wallet: Wallet,
    /// The resulting ledger differs from the local one.
    pub modified: bool,
    pub report: MergeReport,
}

/// Merge without sender-side evidence; strict mode then refuses every new credit.
pub fn merge(local: &Wallet, copies: &[RemoteCopy], options: &MergeOptions) -> MergeOutcome {
    merge_with(local, copies, options, &NoPayments)
}

/// Merge `copies` into `local`.
///
/// Broken, foreign and conflicting copies are excluded and reported; they
/// never make the merge fail. With no usable copy at all the local wallet is
/// returned unchanged.
pub fn merge_with(
    local: &Wallet,
    copies: &[RemoteCopy],
    options: &MergeOptions,
    payments: &dyn PaymentLookup,
) -> MergeOutcome {
    let mut report = MergeReport::default();
    let candidates = screen(local, copies, &mut report);
    report.considered = candidates.len();

    if candidates.is_empty() {
        tracing::debug!(
            wallet = %local.id(),
            excluded = report.excluded.len(),
            "no usable copies, nothing to merge"
        );
        return MergeOutcome {
            wallet: local.clone(),
            modified: false,
            report,
        };
    }

    let evidence = Evidence::gather(local, &candidates, options, &mut report);
    let txns = reconcile(local, &evidence, options, payments, &mut report);
    report_rejected_credits(local, &candidates, &mut report);

    let wallet = match Wallet::from_parts(local.id(), local.network(), local.protocol(), txns) {
        Ok(wallet) => wallet,
        Err(e) => {
            tracing::warn!(wallet = %local.id(), "merged ledger refused, keeping local: {e}");
            return MergeOutcome {
                wallet: local.clone(),
                modified: false,
                report,
            };
        }
    };
    let modified = wallet.txns() != local.txns();

    tracing::info!(
        wallet = %local.id(),
        considered = report.considered,
        broken = report.broken(),
        accepted = report.accepted.len(),
        pruned = report.pruned.len(),
        rejected = report.rejected.len(),
        modified,
        "merged: balance {} -> {}",
        local.balance(),
        wallet.balance(),
    );

    MergeOutcome {
        wallet,
        modified,
        report,
    }
}

/// Parse every copy and keep those that may take part in the merge.
fn screen<'a>(local: &Wallet, copies: &'a [RemoteCopy], report: &mut MergeReport) -> Vec<Candidate<'a>> {
    let local_by_id: HashMap<u64, &Txn> = local.txns().iter().map(|t| (t.id, t)).collect();
    let mut candidates = Vec::with_capacity(copies.len());

    for copy in copies {
        let rejection = match ParsedWallet::parse(&copy.body) {
            ParsedWallet::Unparsable(reason) => Rejection::Unparsable(reason),
            ParsedWallet::Parsed(wallet) if wallet.id() != local.id() => Rejection::Foreign(wallet.id()),
            ParsedWallet::Parsed(wallet) => match first_conflict(&local_by_id, &wallet) {
                Some(txn) => Rejection::Conflicting { txn },
                None => {
                    candidates.push(Candidate { copy, wallet });
                    continue;
                }
            },
        };
        tracing::warn!(
            wallet = %local.id(),
            origin = %copy.origin(),
            score = %copy.score,
            "copy excluded: {rejection}"
        );
        report.excluded.push(ExcludedCopy {
            origin: copy.origin(),
            rejection,
        });
    }
    candidates
}

/// The first txn id under which `wallet` disagrees with the local ledger or
/// with itself.
fn first_conflict(local_by_id: &HashMap<u64, &Txn>, wallet: &Wallet) -> Option<u64> {
    let mut seen: HashMap<u64, &Txn> = HashMap::with_capacity(wallet.txns().len());
    for txn in wallet.txns() {
        if local_by_id.get(&txn.id).is_some_and(|l| l.conflicts_with(txn)) {
            return Some(txn.id);
        }
        if let Some(previous) = seen.insert(txn.id, txn) {
            if previous.conflicts_with(txn) {
                return Some(txn.id);
            }
        }
    }
    None
}

fn keys(txns: &[Txn]) -> HashSet<TxnKey> {
    txns.iter().map(Txn::key).collect()
}

/// What the copies vouch for.
struct Evidence {
    /// New remote txns may only be accepted from here.
    corroborated: HashSet<TxnKey>,
    /// Local debits outside this set are fake negatives.
    confirmed: HashSet<TxnKey>,
    /// Candidate new txns, in the order they will be appended.
    source: Vec<Txn>,
}

impl Evidence {
    fn gather(local: &Wallet, candidates: &[Candidate<'_>], options: &MergeOptions, report: &mut MergeReport) -> Self {
        if options.baseline {
            match candidates {
                [_, _, ..] => match baseline::select(candidates) {
                    Some(group) => {
                        let summary = group.summary();
                        tracing::debug!(
                            wallet = %local.id(),
                            members = summary.members,
                            score = %summary.score,
                            "baseline chosen from {}",
                            summary.origins.join(", ")
                        );
                        report.baseline = Some(summary);
                        let set = keys(group.ledger());
                        Self {
                            corroborated: set.clone(),
                            confirmed: set,
                            source: group.ledger().to_vec(),
                        }
                    }
                    None => Self::local_only(local),
                },
                _ => Self::local_only(local),
            }
        } else {
            let mut sets = candidates.iter().map(|c| keys(c.wallet.txns()));
            let first = sets.next().unwrap_or_default();
            let (corroborated, confirmed) = sets.fold((first.clone(), first), |(every, any), set| {
                let every = every.intersection(&set).copied().collect();
                let any = any.union(&set).copied().collect();
                (every, any)
            });
            let mut seen = HashSet::new();
            let source = candidates
                .iter()
                .flat_map(|c| c.wallet.txns())
                .filter(|t| seen.insert(t.key()))
                .cloned()
                .collect();
            Self {
                corroborated,
                confirmed,
                source,
            }
        }
    }

    /// The local wallet stands in as its own baseline.
    fn local_only(local: &Wallet) -> Self {
        let set = keys(local.txns());
        Self {
            corroborated: set.clone(),
            confirmed: set,
            source: Vec::new(),
        }
    }
}

fn reconcile(
    local: &Wallet,
    evidence: &Evidence,
    options: &MergeOptions,
    payments: &dyn PaymentLookup,
    report: &mut MergeReport,
) -> Vec<Txn> {
    let local_ids: HashSet<u64> = local.txns().iter().map(|t| t.id).collect();
    let mut ids = HashSet::with_capacity(local_ids.len());
    let mut txns = Vec::with_capacity(local.txns().len());

    for txn in local.txns() {
        if txn.is_outgoing() && !evidence.confirmed.contains(&txn.key()) {
            tracing::warn!(
                wallet = %local.id(),
                txn = txn.id,
                amount = %txn.amount,
                bnf = %txn.bnf,
                "fake negative pruned: debit not confirmed by any copy"
            );
            report.pruned.push(txn.clone());
            continue;
        }
        if ids.insert(txn.id) {
            txns.push(txn.clone());
        }
    }

    for txn in &evidence.source {
        if local_ids.contains(&txn.id) || ids.contains(&txn.id) {
            continue;
        }
        if !evidence.corroborated.contains(&txn.key()) {
            continue;
        }
        if txn.is_incoming() && !options.baseline && !payments.confirms(&local.id(), txn) {
            continue;
        }
        ids.insert(txn.id);
        txns.push(txn.clone());
        report.accepted.push(txn.clone());
    }
    txns
}

/// Record every remote credit that was offered but not taken.
fn report_rejected_credits(local: &Wallet, candidates: &[Candidate<'_>], report: &mut MergeReport) {
    let accepted: HashSet<TxnKey> = report.accepted.iter().map(Txn::key).collect();
    let mut seen = HashSet::new();
    for txn in candidates.iter().flat_map(|c| c.wallet.txns()) {
        if !txn.is_incoming() || local.contains_id(txn.id) || accepted.contains(&txn.key()) {
            continue;
        }
        if seen.insert(txn.key()) {
            tracing::warn!(
                wallet = %local.id(),
                txn = txn.id,
                amount = %txn.amount,
                bnf = %txn.bnf,
                "fake positive rejected: credit not corroborated"
            );
            report.rejected.push(txn.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::{Amount, Score, Timestamp, WalletId};

    const ME: WalletId = WalletId::new(0x1111);
    const PEER: WalletId = WalletId::new(0x2222);

    fn credit(id: u64, units: i64) -> Txn {
        Txn::new(id, Timestamp::new(1_000 + id), Amount::from_units(units), "nonce", PEER, "in")
    }

    fn debit(id: u64, units: i64) -> Txn {
        Txn::new(id, Timestamp::new(2_000 + id), Amount::from_units(-units), "nonce", PEER, "out")
    }

    fn wallet(txns: Vec<Txn>) -> Wallet {
        Wallet::from_parts(ME, "test", Wallet::PROTOCOL, txns).unwrap()
    }

    fn copy(host: &str, score: u64, wallet: &Wallet) -> RemoteCopy {
        RemoteCopy::new(host, 4096, Score::new(score), wallet.to_body())
    }

    fn raw(host: &str, score: u64, body: &str) -> RemoteCopy {
        RemoteCopy::new(host, 4096, Score::new(score), body)
    }

    #[test]
    fn empty_copy_set_is_noop() {
        let local = wallet(vec![credit(1, 10)]);
        for options in [MergeOptions::default(), MergeOptions::strict()] {
            let outcome = merge(&local, &[], &options);
            assert!(!outcome.modified);
            assert_eq!(outcome.wallet, local);
            assert_eq!(outcome.report, MergeReport::default());
        }
    }

    #[test]
    fn broken_copies_are_skipped() {
        let local = wallet(vec![credit(1, 10)]);
        let agreed = wallet(vec![credit(1, 10), credit(2, 5)]);
        let copies = vec![
            raw("junk", 9, "this is not a wallet"),
            copy("a", 1, &agreed),
            raw("empty", 9, ""),
            copy("b", 1, &agreed),
        ];
        let outcome = merge(&local, &copies, &MergeOptions::default());
        assert_eq!(outcome.report.broken(), 2);
        assert_eq!(outcome.report.considered, 2);
        assert!(outcome.modified);
        assert_eq!(outcome.wallet.txns(), agreed.txns());
    }

    #[test]
    fn only_broken_copies_change_nothing() {
        let local = wallet(vec![debit(1, 3)]);
        let copies = vec![raw("x", 5, "{"), raw("y", 5, "[]")];
        for options in [MergeOptions::default(), MergeOptions::strict()] {
            let outcome = merge(&local, &copies, &options);
            assert!(!outcome.modified);
            assert_eq!(outcome.wallet, local);
            assert_eq!(outcome.report.broken(), 2);
        }
    }

    #[test]
    fn strict_mode_prunes_unconfirmed_debit() {
        let before = wallet(vec![]);
        let local = wallet(vec![debit(1, 39)]);
        assert_eq!(local.balance(), Amount::from_units(-39));

        let outcome = merge(&local, &[copy("a", 1, &before)], &MergeOptions::strict());
        assert!(outcome.modified);
        assert_eq!(outcome.wallet.balance(), Amount::ZERO);
        assert_eq!(outcome.report.pruned, vec![debit(1, 39)]);
    }

    #[test]
    fn single_copy_keeps_local_baseline() {
        let local = wallet(vec![debit(1, 39)]);
        let outcome = merge(&local, &[copy("a", 1, &wallet(vec![]))], &MergeOptions::default());
        assert!(!outcome.modified);
        assert_eq!(outcome.wallet.balance(), Amount::from_units(-39));
        assert!(outcome.report.baseline.is_none());
    }

    #[test]
    fn strict_mode_rejects_unpaid_credit() {
        let local = wallet(vec![]);
        let fake = wallet(vec![credit(1, 1_000)]);
        let outcome = merge(&local, &[copy("a", 1, &fake)], &MergeOptions::strict());
        assert!(!outcome.modified);
        assert_eq!(outcome.wallet.balance(), Amount::ZERO);
        assert_eq!(outcome.report.rejected, vec![credit(1, 1_000)]);
    }

    #[test]
    fn strict_mode_accepts_credit_the_payer_confirms() {
        let local = wallet(vec![]);
        let remote = wallet(vec![credit(7, 25)]);
        let mut payer = Wallet::new(PEER, "test");
        payer
            .add(Txn::new(7, Timestamp::new(1_007), Amount::from_units(-25), "nonce", ME, "out"))
            .unwrap();
        let copies = vec![copy("a", 1, &remote), copy("b", 1, &remote)];

        let outcome = merge_with(&local, &copies, &MergeOptions::strict(), &vec![payer]);
        assert!(outcome.modified);
        assert_eq!(outcome.wallet.balance(), Amount::from_units(25));
        assert!(outcome.report.rejected.is_empty());
    }

    #[test]
    fn strict_mode_needs_every_copy() {
        let local = wallet(vec![]);
        let with = wallet(vec![credit(7, 25)]);
        let without = wallet(vec![]);
        let mut payer = Wallet::new(PEER, "test");
        payer
            .add(Txn::new(7, Timestamp::new(1_007), Amount::from_units(-25), "nonce", ME, "out"))
            .unwrap();
        let copies = vec![copy("a", 1, &with), copy("b", 1, &without)];

        let outcome = merge_with(&local, &copies, &MergeOptions::strict(), &vec![payer]);
        assert!(!outcome.modified);
        assert_eq!(outcome.report.rejected.len(), 1);
    }

    #[test]
    fn quorum_of_copies_becomes_the_ledger() {
        let local = wallet(vec![debit(1, 10)]);
        let agreed = wallet(vec![debit(1, 10), credit(2, 4)]);
        let copies = vec![copy("a", 1, &agreed), copy("b", 1, &agreed)];

        let outcome = merge(&local, &copies, &MergeOptions::default());
        assert!(outcome.modified);
        assert_eq!(outcome.wallet.txns(), agreed.txns());
        assert_eq!(outcome.report.accepted, vec![credit(2, 4)]);
        let baseline = outcome.report.baseline.unwrap();
        assert_eq!(baseline.members, 2);
        assert_eq!(baseline.score, Score::new(2));
    }

    #[test]
    fn highest_aggregate_score_wins() {
        let local = wallet(vec![]);
        let honest = wallet(vec![credit(1, 1)]);
        let inflated = wallet(vec![credit(1, 1), credit(2, 1_000_000)]);
        let copies = vec![
            copy("liar", 5, &inflated),
            copy("a", 4, &honest),
            copy("b", 4, &honest),
        ];
        let outcome = merge(&local, &copies, &MergeOptions::default());
        assert_eq!(outcome.wallet.txns(), honest.txns());
        assert_eq!(outcome.report.rejected, vec![credit(2, 1_000_000)]);
    }

    #[test]
    fn conflicting_copy_is_excluded() {
        let local = wallet(vec![credit(1, 10)]);
        let rewritten = wallet(vec![credit(1, 99), credit(2, 1)]);
        let agreed = wallet(vec![credit(1, 10), credit(3, 2)]);
        let copies = vec![
            copy("evil", 50, &rewritten),
            copy("a", 1, &agreed),
            copy("b", 1, &agreed),
        ];
        let outcome = merge(&local, &copies, &MergeOptions::default());
        assert_eq!(outcome.report.conflicting(), 1);
        assert_eq!(outcome.report.excluded[0].rejection, Rejection::Conflicting { txn: 1 });
        assert_eq!(outcome.wallet.txns(), agreed.txns());
    }

    #[test]
    fn foreign_copy_is_excluded() {
        let local = wallet(vec![]);
        let other = Wallet::from_parts(PEER, "test", Wallet::PROTOCOL, vec![credit(1, 5)]).unwrap();
        let outcome = merge(&local, &[copy("x", 9, &other)], &MergeOptions::strict());
        assert_eq!(outcome.report.foreign(), 1);
        assert_eq!(outcome.report.considered, 0);
        assert!(!outcome.modified);
    }

    #[test]
    fn merging_twice_changes_nothing_more() {
        let local = wallet(vec![credit(1, 10), debit(2, 4)]);
        let agreed = wallet(vec![credit(1, 10), debit(2, 4), credit(3, 7)]);
        let copies = vec![copy("a", 2, &agreed), copy("b", 3, &agreed)];

        let first = merge(&local, &copies, &MergeOptions::default());
        assert!(first.modified);
        let second = merge(&first.wallet, &copies, &MergeOptions::default());
        assert!(!second.modified);
        assert_eq!(second.wallet, first.wallet);
    }

    #[test]
    fn corroborated_remote_debit_is_taken() {
        let local = wallet(vec![credit(1, 10)]);
        let remote = wallet(vec![credit(1, 10), debit(2, 3)]);
        let copies = vec![copy("a", 1, &remote), copy("b", 1, &remote)];
        let outcome = merge(&local, &copies, &MergeOptions::strict());
        assert!(outcome.modified);
        assert_eq!(outcome.wallet.balance(), Amount::from_units(7));
    }

    #[test]
    fn local_credits_survive_any_baseline() {
        let local = wallet(vec![credit(1, 10)]);
        let empty = wallet(vec![]);
        let copies = vec![copy("a", 1, &empty), copy("b", 1, &empty)];
        for options in [MergeOptions::default(), MergeOptions::strict()] {
            let outcome = merge(&local, &copies, &options);
            assert!(!outcome.modified);
            assert_eq!(outcome.wallet.balance(), Amount::from_units(10));
        }
    }

    #[test]
    fn whitespace_does_not_split_the_baseline() {
        let local = wallet(vec![]);
        let agreed = wallet(vec![credit(1, 3)]);
        let compact = serde_json::to_string(&agreed).unwrap();
        let copies = vec![raw("a", 1, &compact), copy("b", 1, &agreed)];
        let outcome = merge(&local, &copies, &MergeOptions::default());
        assert_eq!(outcome.report.baseline.unwrap().members, 2);
        assert_eq!(outcome.wallet.txns(), agreed.txns());
    }

    fn maxed_body(id: WalletId, credits: u64) -> String {
        let txns: Vec<String> = (1..=credits)
            .map(|n| {
                format!(
                    r#"{{"id":{n},"time":{n},"amount":{},"prefix":"nonce","bnf":"{PEER}"}}"#,
                    i64::MAX
                )
            })
            .collect();
        format!(
            r#"{{"id":"{id}","network":"test","protocol":{},"txns":[{}]}}"#,
            Wallet::PROTOCOL,
            txns.join(",")
        )
    }

    #[test]
    fn agreeing_copies_with_overflowing_ledgers_are_broken() {
        let local = wallet(vec![]);
        let hostile = maxed_body(ME, 2);
        let copies = vec![raw("a", 9, &hostile), raw("b", 9, &hostile)];
        for options in [MergeOptions::default(), MergeOptions::strict()] {
            let outcome = merge(&local, &copies, &options);
            assert!(!outcome.modified);
            assert_eq!(outcome.report.broken(), 2);
            assert_eq!(outcome.report.considered, 0);
            assert_eq!(outcome.wallet.balance(), Amount::ZERO);
        }
    }

    #[test]
    fn single_maxed_credit_is_still_a_wallet() {
        let local = wallet(vec![]);
        let rich = maxed_body(ME, 1);
        let copies = vec![raw("a", 1, &rich), raw("b", 1, &rich)];
        let outcome = merge(&local, &copies, &MergeOptions::default());
        assert!(outcome.modified);
        assert_eq!(outcome.wallet.balance(), Amount::new(i64::MAX));
    }

    #[test]
    fn merge_that_would_overflow_keeps_local() {
        let near_max = Txn::new(1, Timestamp::new(1), Amount::new(i64::MAX - 10), "nonce", PEER, "in");
        let local = wallet(vec![near_max]);
        let remote = wallet(vec![credit(2, 1)]);
        let copies = vec![copy("a", 1, &remote), copy("b", 1, &remote)];
        let outcome = merge(&local, &copies, &MergeOptions::default());
        assert!(!outcome.modified);
        assert_eq!(outcome.wallet, local);
        assert_eq!(outcome.wallet.balance(), Amount::new(i64::MAX - 10));
    }
}
