//! Consensus check functions

use std::collections::HashSet;

use chrono::{DateTime, Utc};

use hns_chain::{
    block::{Block, Hash, Header, Height, MAX_BLOCK_BYTES},
    parameters::Network,
    work::difficulty::ExpandedDifficulty,
    HandshakeSerialize,
};

use crate::error::*;

/// Returns `Ok(())` if there is exactly one coinbase transaction in `Block`,
/// and that coinbase transaction is the first transaction in the block.
pub fn coinbase_is_first(block: &Block) -> Result<(), BlockError> {
    let first = block
        .transactions
        .get(0)
        .ok_or(BlockError::NoTransactions)?;
    let mut rest = block.transactions.iter().skip(1);
    if !first.is_coinbase() {
        return Err(TransactionError::CoinbasePosition)?;
    }
    if rest.any(|tx| tx.contains_coinbase_input()) {
        return Err(TransactionError::CoinbaseInputFound)?;
    }

    Ok(())
}

/// Returns `Ok(())` if the coinbase locktime records `height`, which is
/// what keeps coinbase txids unique across the chain.
pub fn coinbase_height_is_valid(block: &Block, height: Height) -> Result<(), BlockError> {
    if block.coinbase_height() != Some(height) {
        return Err(BlockError::BadCoinbaseHeight);
    }
    Ok(())
}

/// Returns `Ok(())` if `hash` passes:
///   - the target difficulty limit for `network`, and
///   - the difficulty filter,
/// based on the fields in `header`.
///
/// If the block is invalid, returns an error containing `height` and `hash`.
pub fn difficulty_is_valid(
    header: &Header,
    network: Network,
    height: &Height,
    hash: &Hash,
) -> Result<(), BlockError> {
    let difficulty_threshold = header
        .bits
        .to_expanded()
        .ok_or(BlockError::InvalidDifficulty(*height, *hash))?;

    // Note: the comparisons in this function are u256 integer
    // comparisons. Greater values represent *less* work.

    // The limit check doesn't depend on any previous blocks.
    if difficulty_threshold > ExpandedDifficulty::target_difficulty_limit(network) {
        Err(BlockError::TargetDifficultyLimit(
            *height,
            *hash,
            difficulty_threshold,
            ExpandedDifficulty::target_difficulty_limit(network),
        ))?;
    }

    // The difficulty filter is also context-free.
    if hash > &difficulty_threshold {
        Err(BlockError::DifficultyFilter(
            *height,
            *hash,
            difficulty_threshold,
        ))?;
    }

    Ok(())
}

/// Returns `Ok(())` if `header.time` is less than or equal to
/// 2 hours in the future, according to the node's local clock (`now`).
///
/// This is a non-deterministic rule: clocks vary over time, and between
/// different nodes. A block rejected by this rule at a given point in
/// time may later be accepted.
pub fn time_is_valid_at(
    header: &Header,
    now: DateTime<Utc>,
    height: &Height,
    hash: &Hash,
) -> Result<(), hns_chain::block::BlockTimeError> {
    header.time_is_valid_at(now, height, hash)
}

/// Check merkle and witness root validity, plus the duplicate-transaction
/// scan.
///
/// The domain-separated tree already prevents the classic
/// duplicate-tail root malleation, but duplicate transactions imply a
/// double-spend, so we reject them directly as well.
pub fn merkle_root_validity(block: &Block) -> Result<(), BlockError> {
    let merkle_root = block.merkle_root();
    if block.header.merkle_root != merkle_root {
        return Err(BlockError::BadMerkleRoot {
            actual: merkle_root,
            expected: block.header.merkle_root,
        });
    }

    let witness_root = block.witness_root();
    if block.header.witness_root != witness_root {
        return Err(BlockError::BadWitnessRoot {
            actual: witness_root,
            expected: block.header.witness_root,
        });
    }

    let transaction_hashes: Vec<_> = block.transactions.iter().map(|tx| tx.hash()).collect();
    if transaction_hashes.len() != transaction_hashes.iter().collect::<HashSet<_>>().len() {
        return Err(BlockError::DuplicateTransaction);
    }

    Ok(())
}

/// Returns `Ok(())` if no outpoint is spent twice within `block`.
pub fn outpoints_are_unique(block: &Block) -> Result<(), BlockError> {
    let mut seen = HashSet::new();
    for tx in block.transactions.iter().skip(1) {
        for input in &tx.inputs {
            if !seen.insert(input.prevout) {
                return Err(BlockError::DuplicateOutpoint);
            }
        }
    }
    Ok(())
}

/// Returns `Ok(())` if the serialized block fits the size limit.
pub fn size_is_valid(block: &Block) -> Result<(), BlockError> {
    let size: usize = block
        .transactions
        .iter()
        .map(|tx| tx.len())
        .sum::<usize>()
        + Header::len();
    if size as u64 > MAX_BLOCK_BYTES {
        return Err(BlockError::OversizedBlock);
    }
    // Defensive cross-check against the canonical encoding length.
    debug_assert_eq!(
        size + hns_chain::compactint::CompactInt::size(block.transactions.len()),
        block
            .handshake_serialize_to_vec()
            .expect("writing to a Vec cannot fail")
            .len()
    );
    Ok(())
}
