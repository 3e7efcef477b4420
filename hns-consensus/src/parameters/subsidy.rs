//! Constants for the block subsidy.

use hns_chain::amount::COIN;

/// The largest block subsidy, used before the first halving.
pub const MAX_BLOCK_SUBSIDY: u64 = 2_000 * COIN;
