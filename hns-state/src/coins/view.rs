use std::collections::HashMap;

use thiserror::Error;

use hns_chain::transaction::{OutPoint, Transaction};

use super::CoinEntry;

/// An in-memory overlay of the UTXO set, built up while validating a
/// block and committed (or discarded) as a unit.
///
/// Each outpoint the view has touched is in one of two states: *present*
/// (available to spend, will be written on commit) or *spent* (a
/// tombstone, will be deleted on commit; spending it again in the same
/// view is a double-spend). Outpoints the view has never touched are
/// *unknown*: the caller fetches them from the chain store and installs
/// them with [`CoinView::add_entry`].
#[derive(Debug, Default)]
pub struct CoinView {
    entries: HashMap<OutPoint, Slot>,
}

#[derive(Debug, Clone)]
enum Slot {
    Present(CoinEntry),
    Spent,
}

/// A failed spend against a [`CoinView`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoinViewError {
    /// The outpoint is unknown to this view.
    #[error("coin not found in view: {0:?}")]
    NotFound(OutPoint),
    /// The outpoint was already spent in this view.
    #[error("coin already spent in view: {0:?}")]
    DoubleSpend(OutPoint),
}

impl CoinView {
    pub fn new() -> CoinView {
        CoinView::default()
    }

    /// The coin at `outpoint`, if the view holds it unspent.
    pub fn get(&self, outpoint: &OutPoint) -> Option<&CoinEntry> {
        match self.entries.get(outpoint) {
            Some(Slot::Present(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Whether the view has any record (live or tombstone) of `outpoint`.
    pub fn contains(&self, outpoint: &OutPoint) -> bool {
        self.entries.contains_key(outpoint)
    }

    /// Whether `outpoint` is a tombstone in this view.
    pub fn is_spent(&self, outpoint: &OutPoint) -> bool {
        matches!(self.entries.get(outpoint), Some(Slot::Spent))
    }

    /// Adds every output of `tx` as a fresh coin at `height`.
    pub fn add_tx(&mut self, tx: &Transaction, height: i32) {
        let hash = tx.hash();
        for index in 0..tx.outputs.len() {
            let outpoint = OutPoint {
                hash,
                index: index as u32,
            };
            self.entries
                .insert(outpoint, Slot::Present(CoinEntry::from_tx(tx, index, height)));
        }
    }

    /// Installs a coin fetched from the chain store (or restored from an
    /// undo journal).
    pub fn add_entry(&mut self, outpoint: OutPoint, entry: CoinEntry) {
        self.entries.insert(outpoint, Slot::Present(entry));
    }

    /// Spends `outpoint`, leaving a tombstone and returning the removed
    /// entry for undo recording.
    pub fn spend(&mut self, outpoint: &OutPoint) -> Result<CoinEntry, CoinViewError> {
        match self.entries.get_mut(outpoint) {
            // Replacing a tombstone with a tombstone is harmless, so the
            // slot can be taken before inspecting it.
            Some(slot) => match std::mem::replace(slot, Slot::Spent) {
                Slot::Present(entry) => Ok(entry),
                Slot::Spent => Err(CoinViewError::DoubleSpend(*outpoint)),
            },
            None => Err(CoinViewError::NotFound(*outpoint)),
        }
    }

    /// Tombstones `outpoint` without returning it; the disconnect path
    /// uses this to delete the outputs a block created.
    pub fn remove(&mut self, outpoint: OutPoint) {
        self.entries.insert(outpoint, Slot::Spent);
    }

    /// The view's delta: `Some(entry)` to write, `None` to delete.
    pub fn entries(&self) -> impl Iterator<Item = (&OutPoint, Option<&CoinEntry>)> {
        self.entries.iter().map(|(outpoint, slot)| match slot {
            Slot::Present(entry) => (outpoint, Some(entry)),
            Slot::Spent => (outpoint, None),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hns_chain::{
        address::Address,
        amount::Amount,
        covenant::Covenant,
        transaction::{Input, Output, Witness, SEQUENCE_FINAL},
    };

    fn coinbase(value: u64) -> Transaction {
        Transaction::new(
            0,
            vec![Input {
                prevout: OutPoint::null(),
                sequence: SEQUENCE_FINAL,
                witness: Witness::empty(),
            }],
            vec![Output {
                value: Amount::from_raw(value),
                address: Address::new(0, vec![0; 20]).unwrap(),
                covenant: Covenant::none(),
            }],
            0,
        )
    }

    #[test]
    fn spend_removes_and_returns() {
        hns_test::init();

        let tx = coinbase(100);
        let outpoint = OutPoint {
            hash: tx.hash(),
            index: 0,
        };

        let mut view = CoinView::new();
        view.add_tx(&tx, 5);
        assert!(view.get(&outpoint).is_some());

        let entry = view.spend(&outpoint).expect("coin is present");
        assert_eq!(entry.value, Amount::from_raw(100));
        assert_eq!(entry.height, 5);
        assert!(entry.coinbase);
        assert!(view.get(&outpoint).is_none());
        assert!(view.is_spent(&outpoint));
    }

    #[test]
    fn double_spend_fails() {
        hns_test::init();

        let tx = coinbase(100);
        let outpoint = OutPoint {
            hash: tx.hash(),
            index: 0,
        };

        let mut view = CoinView::new();
        view.add_tx(&tx, 5);
        view.spend(&outpoint).expect("first spend succeeds");
        assert_eq!(
            view.spend(&outpoint),
            Err(CoinViewError::DoubleSpend(outpoint))
        );
    }

    #[test]
    fn unknown_outpoint_is_not_found() {
        hns_test::init();

        let mut view = CoinView::new();
        let outpoint = OutPoint {
            hash: coinbase(1).hash(),
            index: 0,
        };
        assert_eq!(view.spend(&outpoint), Err(CoinViewError::NotFound(outpoint)));
    }

    #[test]
    fn undo_restores_spent_coin() {
        hns_test::init();

        let tx = coinbase(100);
        let outpoint = OutPoint {
            hash: tx.hash(),
            index: 0,
        };

        let mut view = CoinView::new();
        view.add_tx(&tx, 5);
        let entry = view.spend(&outpoint).expect("coin is present");

        view.add_entry(outpoint, entry.clone());
        assert_eq!(view.get(&outpoint), Some(&entry));
        // Restored coins are spendable again.
        assert!(view.spend(&outpoint).is_ok());
    }
}
