use std::sync::Arc;

use proptest::{
    arbitrary::{any, Arbitrary},
    prelude::*,
};

use crate::work::difficulty::CompactDifficulty;
use crate::LedgerState;

use super::*;

impl Arbitrary for Block {
    type Parameters = LedgerState;

    fn arbitrary_with(ledger_state: Self::Parameters) -> Self::Strategy {
        let transactions_strategy = Transaction::vec_strategy(ledger_state, 2);

        (any::<Header>(), transactions_strategy)
            .prop_map(|(header, transactions)| Self {
                header,
                transactions,
            })
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

impl Arbitrary for Header {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        (
            any::<u32>(),
            // time is bounded so the two-hour-future check has headroom
            (0u64..(u32::MAX as u64)),
            any::<Hash>(),
            any::<[u8; 32]>(),
            (
                any::<[u8; 24]>(),
                any::<[u8; 32]>(),
                any::<merkle::Root>(),
                any::<merkle::Root>(),
                any::<u32>(),
                any::<CompactDifficulty>(),
                any::<[u8; 32]>(),
            ),
        )
            .prop_map(
                |(
                    nonce,
                    time,
                    prev_block,
                    tree_root,
                    (extra_nonce, reserved_root, witness_root, merkle_root, version, bits, mask),
                )| {
                    Header::new(
                        nonce,
                        time,
                        prev_block,
                        tree_root,
                        extra_nonce,
                        reserved_root,
                        witness_root,
                        merkle_root,
                        version,
                        bits,
                        mask,
                    )
                },
            )
            .boxed()
    }

    type Strategy = BoxedStrategy<Self>;
}

/// A fixed all-zero-roots header for unit tests that only need structure,
/// not validity.
pub(crate) fn test_header() -> Header {
    Header::new(
        0,
        1_600_000_000,
        Hash([0; 32]),
        [0; 32],
        [0; 24],
        [0; 32],
        merkle::Root([0; 32]),
        merkle::Root([0; 32]),
        0,
        CompactDifficulty(0x207f_ffff),
        [0; 32],
    )
}
