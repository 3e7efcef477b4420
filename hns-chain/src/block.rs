//! Blocks and block-related structures (heights, headers, etc.)
#![allow(clippy::unit_arg)]

mod hash;
mod header;
mod height;
mod mem_block;
mod merkle_block;
mod serialize;

pub mod merkle;

#[cfg(any(test, feature = "proptest-impl"))]
mod arbitrary;
#[cfg(test)]
mod tests;

use std::{convert::TryInto, fmt, sync::Arc};

use handshake_serde_derive::HnsSerialize;
use serde::{Deserialize, Serialize};

use crate::compactint::CompactInt;
use crate::{HandshakeDeserialize, HandshakeSerialize, SerializationError};

pub use hash::Hash;
pub use header::{BlockTimeError, CountedHeader, Header};
pub use height::Height;
pub use mem_block::MemBlock;
pub use merkle_block::{MerkleBlock, PartialTree};
pub use serialize::MAX_BLOCK_BYTES;

use crate::{fmt::DisplayToDebug, transaction::Transaction};

/// The shared behavior of every block shape: the full block, the
/// filtered [`MerkleBlock`], the deferred-parse [`MemBlock`], and a bare
/// header. Each carries a [`Header`], and through it a hash and a
/// proof-of-work check.
pub trait AnyBlock {
    fn header(&self) -> &Header;

    fn hash(&self) -> Hash {
        self.header().hash()
    }

    fn verify_pow(&self) -> bool {
        self.header().verify_pow()
    }
}

impl AnyBlock for Header {
    fn header(&self) -> &Header {
        self
    }
}

impl AnyBlock for CountedHeader {
    fn header(&self) -> &Header {
        &self.header
    }
}

/// A block: a header and the full list of transactions it commits to.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, HnsSerialize)]
pub struct Block {
    /// The block header, containing block metadata.
    pub header: Header,
    /// The block transactions.
    pub transactions: Vec<std::sync::Arc<Transaction>>,
}

impl AnyBlock for Block {
    fn header(&self) -> &Header {
        &self.header
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut fmter = f.debug_struct("Block");
        if let Some(height) = self.coinbase_height() {
            fmter.field("height", &height);
        }

        fmter.field("hash", &DisplayToDebug(self.hash())).finish()
    }
}

impl Block {
    /// Return the block height reported by the coinbase transaction, if any.
    ///
    /// Coinbase transactions record their block height in the locktime
    /// field, which keeps coinbase txids unique across heights.
    pub fn coinbase_height(&self) -> Option<Height> {
        self.transactions
            .get(0)
            .filter(|tx| tx.is_coinbase())
            .map(|tx| Height(tx.locktime))
    }

    /// Compute the hash of this block.
    pub fn hash(&self) -> Hash {
        Hash::from(self)
    }

    /// The merkle root over this block's transaction identity hashes.
    pub fn merkle_root(&self) -> merkle::Root {
        self.transactions.iter().map(|tx| tx.hash()).collect()
    }

    /// The merkle root over this block's transaction witness hashes.
    pub fn witness_root(&self) -> merkle::Root {
        self.transactions.iter().map(|tx| tx.witness_hash()).collect()
    }
}

impl HandshakeDeserialize for Block {
    fn handshake_deserialize<R: std::io::Read>(src: R) -> Result<Self, SerializationError> {
        let mut src = src.take(MAX_BLOCK_BYTES);
        let header = Header::handshake_deserialize(&mut src)?;

        let tx_count = CompactInt::handshake_deserialize(&mut src)?.value();

        // Sanity check number of transactions to prevent DOS attacks
        if tx_count > MAX_BLOCK_BYTES / (36 * 4) {
            return Err(SerializationError::Parse(
                "Block contained too many transactions for each to have at least one input",
            ));
        }
        let mut transactions = Vec::with_capacity(
            tx_count
                .try_into()
                .expect("tx_count is bounded by MAX_BLOCK_BYTES"),
        );
        for _ in 0..tx_count {
            transactions.push(<Arc<Transaction>>::handshake_deserialize(&mut src)?);
        }

        Ok(Block {
            header,
            transactions,
        })
    }
}

impl<'a> From<&'a Block> for Hash {
    fn from(block: &'a Block) -> Hash {
        (&block.header).into()
    }
}
