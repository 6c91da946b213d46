//! Sender-side evidence for incoming payments.

use tally_types::{Txn, Wallet, WalletId};

/// Answers "did the payer really pay this?" for a credit in `payee`'s ledger.
pub trait PaymentLookup {
    fn confirms(&self, payee: &WalletId, credit: &Txn) -> bool;
}

/// A lookup with no wallets behind it: confirms nothing.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPayments;

impl PaymentLookup for NoPayments {
    fn confirms(&self, _payee: &WalletId, _credit: &Txn) -> bool {
        false
    }
}

impl PaymentLookup for Vec<Wallet> {
    fn confirms(&self, payee: &WalletId, credit: &Txn) -> bool {
        self.iter().any(|payer| pays(payer, payee, credit))
    }
}

/// Whether `payer` holds the debit matching `credit` in `payee`'s ledger:
/// same txn id, opposite amount, pointing back at `payee`.
pub fn pays(payer: &Wallet, payee: &WalletId, credit: &Txn) -> bool {
    credit.is_incoming()
        && payer.id() == credit.bnf
        && payer
            .txns()
            .iter()
            .any(|t| t.id == credit.id && t.amount == -credit.amount && t.bnf == *payee)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tally_types::{Amount, Timestamp};

    #[test]
    fn matching_debit_confirms_credit() {
        let payer_id = WalletId::new(1);
        let payee_id = WalletId::new(2);
        let mut payer = Wallet::new(payer_id, "test");
        payer
            .add(Txn::new(7, Timestamp::new(1), Amount::from_units(-5), "p", payee_id, ""))
            .unwrap();
        let credit = Txn::new(7, Timestamp::new(1), Amount::from_units(5), "p", payer_id, "");
        assert!(pays(&payer, &payee_id, &credit));
        assert!(vec![payer.clone()].confirms(&payee_id, &credit));

        let wrong_amount = Txn::new(7, Timestamp::new(1), Amount::from_units(6), "p", payer_id, "");
        assert!(!pays(&payer, &payee_id, &wrong_amount));
        assert!(!pays(&payer, &WalletId::new(3), &credit));
        assert!(!NoPayments.confirms(&payee_id, &credit));
    }
}
