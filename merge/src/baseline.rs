//! Baseline selection: which content the network, weighted by trust, agrees on.

use std::cmp::Reverse;
use std::collections::HashMap;

use tally_store::RemoteCopy;
use tally_types::{Score, Txn, Wallet};

use crate::report::BaselineSummary;

/// A parsed copy that survived screening.
pub(crate) struct Candidate<'a> {
    pub copy: &'a RemoteCopy,
    pub wallet: Wallet,
}

/// Copies that hold exactly the same ledger.
pub(crate) struct ContentGroup<'c, 'a> {
    pub members: Vec<&'c Candidate<'a>>,
    pub score: Score,
}

impl ContentGroup<'_, '_> {
    pub fn ledger(&self) -> &[Txn] {
        self.members[0].wallet.txns()
    }

    pub fn summary(&self) -> BaselineSummary {
        BaselineSummary {
            members: self.members.len(),
            score: self.score,
            origins: self.members.iter().map(|c| c.copy.origin()).collect(),
        }
    }
}

/// Group candidates by ledger content and pick the strongest group.
///
/// Strength is the aggregate score of the members, then member count, then
/// the best single score, then the position of the group's first member in
/// the (ranked) candidate list. The last key is unique, so the choice is
/// deterministic.
pub(crate) fn select<'c, 'a>(candidates: &'c [Candidate<'a>]) -> Option<ContentGroup<'c, 'a>> {
    let mut groups: HashMap<&'c [Txn], Vec<usize>> = HashMap::new();
    for (idx, candidate) in candidates.iter().enumerate() {
        groups.entry(candidate.wallet.txns()).or_default().push(idx);
    }

    groups
        .into_values()
        .map(|indices| {
            let score = indices
                .iter()
                .fold(Score::ZERO, |acc, &i| acc.saturating_add(candidates[i].copy.score));
            let best_single = indices
                .iter()
                .map(|&i| candidates[i].copy.score)
                .max()
                .unwrap_or(Score::ZERO);
            let first = indices.iter().copied().min().unwrap_or(usize::MAX);
            let key = (score, indices.len(), best_single, Reverse(first));
            (key, indices)
        })
        .max_by_key(|(key, _)| *key)
        .map(|((score, ..), indices)| ContentGroup {
            members: indices.into_iter().map(|i| &candidates[i]).collect(),
            score,
        })
}
