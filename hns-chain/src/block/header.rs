use bytes::Buf;
use chrono::{DateTime, Duration, Utc};
use thiserror::Error;

use handshake_serde_derive::HnsSerialize;
use serde::{Deserialize, Serialize};

use crate::{
    cached::Cached,
    compactint::CompactInt,
    serialization::blake2b,
    work::difficulty::CompactDifficulty,
    HandshakeDeserialize, HandshakeSerialize, SerializationError,
};

use super::{merkle, Hash, Height};

/// A block header.
///
/// The 236 serialized bytes split into two 128-byte BLAKE2b blocks for
/// hashing purposes:
///
/// - the **preheader** (nonce, time, derived padding, previous hash, tree
///   root, commit hash) carries everything a miner iterates over, so a
///   nonce roll touches exactly one hash block;
/// - the **subheader** (extra nonce, reserved root, witness root, merkle
///   root, version, bits) is folded in through `commit_hash`, which makes
///   updating any of its fields cost two extra BLAKE2b blocks and keeps
///   template churn unattractive.
///
/// The `mask` is a pool-hiding XOR pad: the share hash is computable
/// without it, but only whoever knows the mask can tell a share from an
/// actual block.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, HnsSerialize)]
pub struct Header {
    /// The miner's primary rolling field.
    pub nonce: u32,

    /// The block timestamp as seconds since the unix epoch. Lives in the
    /// preheader so trivial nonce exhaustion can overflow into it.
    pub time: u64,

    /// The hash of the previous block, used to create a chain of blocks back to
    /// the genesis block.
    pub prev_block: Hash,

    /// The root of the authenticated name tree after this block's
    /// covenants have been applied.
    pub tree_root: [u8; 32],

    /// Additional mining entropy beyond the 32-bit nonce.
    pub extra_nonce: [u8; 24],

    /// Reserved commitment root; zero until a future deployment assigns
    /// it a meaning.
    pub reserved_root: [u8; 32],

    /// The merkle root over the transactions' witness hashes.
    pub witness_root: merkle::Root,

    /// The merkle root over the transactions' identity hashes, binding
    /// the block header to the transactions in the block.
    pub merkle_root: merkle::Root,

    /// The block's version field.
    pub version: u32,

    /// An encoded version of the target threshold this block's
    /// proof-of-work hash must be less than or equal to, in the same
    /// nBits format used by Bitcoin.
    pub bits: CompactDifficulty,

    /// The pool-hiding XOR pad applied to the share hash.
    pub mask: [u8; 32],

    /// For efficiency, we cache the hash of this block after computing it the first time
    /// This field is not part of the consensus serialization
    hash: Cached<Hash>,
}

#[derive(Error, Debug)]
pub enum BlockTimeError {
    #[error("invalid time {0:?} in block header {1:?} {2:?}: block time is more than 2 hours in the future ({3:?}). Hint: check your machine's date, time, and time zone.")]
    InvalidBlockTime(u64, Height, Hash, DateTime<Utc>),
}

impl Header {
    /// Returns length of serialized header in bytes
    pub const fn len() -> usize {
        236
    }

    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nonce: u32,
        time: u64,
        prev_block: Hash,
        tree_root: [u8; 32],
        extra_nonce: [u8; 24],
        reserved_root: [u8; 32],
        witness_root: merkle::Root,
        merkle_root: merkle::Root,
        version: u32,
        bits: CompactDifficulty,
        mask: [u8; 32],
    ) -> Header {
        Header {
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
            hash: Cached::new(),
        }
    }

    /// The deterministic padding stream: `prev_block XOR tree_root`,
    /// cycled. Derivable from preheader fields alone, so SPV verifiers
    /// need nothing extra to reproduce it.
    fn padding(&self, n: usize) -> Vec<u8> {
        (0..n)
            .map(|i| self.prev_block.0[i % 32] ^ self.tree_root[i % 32])
            .collect()
    }

    /// The subheader: the miner-stable second 128-byte hash block.
    pub fn sub_head(&self) -> [u8; 128] {
        let mut out = [0u8; 128];
        out[0..24].copy_from_slice(&self.extra_nonce);
        out[24..56].copy_from_slice(&self.reserved_root);
        out[56..88].copy_from_slice(&self.witness_root.0);
        out[88..120].copy_from_slice(&self.merkle_root.0);
        out[120..124].copy_from_slice(&self.version.to_le_bytes());
        out[124..128].copy_from_slice(&self.bits.0.to_le_bytes());
        out
    }

    pub fn sub_hash(&self) -> [u8; 32] {
        blake2b::digest256(&self.sub_head())
    }

    /// `BLAKE2b-256(prev_block || mask)`. Hashing the previous hash in
    /// lets a pool keep one mask across template changes.
    pub fn mask_hash(&self) -> [u8; 32] {
        blake2b::multi256(&[&self.prev_block.0, &self.mask])
    }

    pub fn commit_hash(&self) -> [u8; 32] {
        blake2b::multi256(&[&self.sub_hash(), &self.mask_hash()])
    }

    /// The preheader: the miner-mutable first 128-byte hash block.
    pub fn pre_head(&self) -> [u8; 128] {
        let pad = self.padding(20);
        let commit_hash = self.commit_hash();
        let mut out = [0u8; 128];
        out[0..4].copy_from_slice(&self.nonce.to_le_bytes());
        out[4..12].copy_from_slice(&self.time.to_le_bytes());
        out[12..32].copy_from_slice(&pad);
        out[32..64].copy_from_slice(&self.prev_block.0);
        out[64..96].copy_from_slice(&self.tree_root);
        out[96..128].copy_from_slice(&commit_hash);
        out
    }

    /// The mask-independent share hash a pool hands out as work.
    pub fn share_hash(&self) -> [u8; 32] {
        let pre = self.pre_head();
        let left = blake2b::digest512(&pre);
        let right = blake2b::sha3_multi256(&[&pre[..], &self.padding(8)]);
        blake2b::multi256(&[&left, &self.padding(32), &right])
    }

    /// The proof-of-work hash: the share hash XORed with the mask. This
    /// is also the block's identity hash.
    pub fn pow_hash(&self) -> [u8; 32] {
        let mut hash = self.share_hash();
        for (byte, mask) in hash.iter_mut().zip(self.mask.iter()) {
            *byte ^= mask;
        }
        hash
    }

    /// Compute the hash of this header.
    pub fn hash(&self) -> Hash {
        if let Some(hash) = self.hash.value() {
            return hash;
        }
        Hash::from(self)
    }

    /// Whether the proof-of-work hash meets the target encoded in `bits`.
    ///
    /// This is the context-free difficulty filter only; whether `bits`
    /// itself is the right target for this chain position is a contextual
    /// check.
    pub fn verify_pow(&self) -> bool {
        let target = match self.bits.to_expanded() {
            Some(target) => target,
            None => return false,
        };
        // u256 comparison, big-endian: greater values represent *less* work.
        !(self.hash() > target)
    }

    pub fn time_is_valid_at(
        &self,
        now: DateTime<Utc>,
        height: &Height,
        hash: &Hash,
    ) -> Result<(), BlockTimeError> {
        let two_hours_in_the_future = now
            .checked_add_signed(Duration::hours(2))
            .expect("calculating 2 hours in the future does not overflow");
        if (self.time as i128) <= (two_hours_in_the_future.timestamp() as i128) {
            Ok(())
        } else {
            Err(BlockTimeError::InvalidBlockTime(
                self.time,
                *height,
                *hash,
                two_hours_in_the_future,
            ))?
        }
    }

    /// Deserializes a block header from a `Buf`, for decoders that keep
    /// the raw buffer around (see `MemBlock`).
    pub fn deserialize_from_buf<B: Buf>(mut src: B) -> Result<Self, SerializationError> {
        if src.remaining() < Header::len() {
            return Err(SerializationError::Parse(
                "Not enough bytes in block header",
            ));
        }
        let bytes = src.copy_to_bytes(Header::len());
        Header::handshake_deserialize(&bytes[..])
    }
}

/// Deserializes a header, calculating and caching its proof-of-work hash.
impl HandshakeDeserialize for Header {
    fn handshake_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let mut header = Header {
            nonce: u32::handshake_deserialize(&mut reader)?,
            time: u64::handshake_deserialize(&mut reader)?,
            prev_block: Hash::handshake_deserialize(&mut reader)?,
            tree_root: <[u8; 32]>::handshake_deserialize(&mut reader)?,
            extra_nonce: <[u8; 24]>::handshake_deserialize(&mut reader)?,
            reserved_root: <[u8; 32]>::handshake_deserialize(&mut reader)?,
            witness_root: merkle::Root::handshake_deserialize(&mut reader)?,
            merkle_root: merkle::Root::handshake_deserialize(&mut reader)?,
            version: u32::handshake_deserialize(&mut reader)?,
            bits: CompactDifficulty::handshake_deserialize(&mut reader)?,
            mask: <[u8; 32]>::handshake_deserialize(&mut reader)?,
            hash: Cached::new(),
        };
        let own_hash = header.hash();
        header.hash = Cached::from(own_hash);
        Ok(header)
    }
}

/// A header with a count of the number of transactions in its block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountedHeader {
    pub header: Header,
    pub transaction_count: usize,
}

impl HandshakeSerialize for CountedHeader {
    fn handshake_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.header.handshake_serialize(&mut target)?;
        CompactInt::from(self.transaction_count).handshake_serialize(&mut target)?;
        Ok(())
    }
}

impl HandshakeDeserialize for CountedHeader {
    fn handshake_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(CountedHeader {
            header: Header::handshake_deserialize(&mut reader)?,
            transaction_count: CompactInt::handshake_deserialize(&mut reader)?.value() as usize,
        })
    }
}
