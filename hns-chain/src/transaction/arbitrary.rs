use std::sync::Arc;

use proptest::{arbitrary::any, collection::vec, prelude::*};

use crate::{cached::Cached, LedgerState};

use super::{Input, OutPoint, Output, Transaction, Witness, SEQUENCE_FINAL};

impl Transaction {
    /// Generate a proptest strategy for transactions consistent with
    /// `ledger_state`.
    pub fn strategy(ledger_state: LedgerState) -> BoxedStrategy<Self> {
        if ledger_state.is_coinbase {
            (vec(any::<Output>(), 1..4), any::<Witness>())
                .prop_map(move |(outputs, witness)| {
                    let mut tx = Transaction::new(
                        0,
                        vec![Input {
                            prevout: OutPoint::null(),
                            sequence: SEQUENCE_FINAL,
                            witness,
                        }],
                        outputs,
                        ledger_state.tip_height.0,
                    );
                    tx.cache_hashes();
                    tx
                })
                .boxed()
        } else {
            (
                vec(any::<Input>(), 1..4),
                vec(any::<Output>(), 1..4),
                any::<u32>(),
            )
                .prop_map(|(inputs, outputs, locktime)| {
                    let mut tx = Transaction::new(0, inputs, outputs, locktime);
                    tx.cache_hashes();
                    tx
                })
                .boxed()
        }
    }

    /// Proptest Strategy for creating a Vector of transactions where the
    /// first transaction is always the only coinbase transaction
    pub fn vec_strategy(
        mut ledger_state: LedgerState,
        len: usize,
    ) -> BoxedStrategy<Vec<Arc<Self>>> {
        ledger_state.is_coinbase = true;
        let coinbase = Transaction::strategy(ledger_state).prop_map(Arc::new);
        ledger_state.is_coinbase = false;
        let remainder = vec(Transaction::strategy(ledger_state).prop_map(Arc::new), 0..len);

        (coinbase, remainder)
            .prop_map(|(first, mut remainder)| {
                let mut transactions = vec![first];
                transactions.append(&mut remainder);
                transactions
            })
            .boxed()
    }
}

impl Arbitrary for Transaction {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (
            vec(any::<Input>(), 1..4),
            vec(any::<Output>(), 1..4),
            any::<u32>(),
        )
            .prop_map(|(inputs, outputs, locktime)| Transaction {
                version: 0,
                inputs,
                outputs,
                locktime,
                hash: Cached::new(),
                witness_hash: Cached::new(),
            })
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Input {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (any::<OutPoint>(), any::<u32>(), any::<Witness>())
            .prop_map(|(prevout, sequence, witness)| Input {
                prevout,
                sequence,
                witness,
            })
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for OutPoint {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (any::<super::Hash>(), any::<u32>())
            .prop_map(|(hash, index)| OutPoint { hash, index })
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Witness {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        vec(vec(any::<u8>(), 0..72), 0..4).prop_map(Witness).boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Output {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (
            0..=crate::amount::MAX_MONEY,
            any::<crate::address::Address>(),
            any::<crate::covenant::Covenant>(),
        )
            .prop_map(|(value, address, covenant)| Output {
                value: crate::amount::Amount::from_raw(value),
                address,
                covenant,
            })
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}
