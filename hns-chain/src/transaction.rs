//! Transactions and transaction-related structures.

use handshake_serde_derive::{HnsDeserialize, HnsSerialize};
use serde::{Deserialize, Serialize};

use crate::{
    address::Address,
    amount::{self, Amount},
    cached::Cached,
    compactint::CompactInt,
    covenant::Covenant,
    serialization::{blake2b, HandshakeDeserialize, HandshakeSerialize, SerializationError},
};

mod hash;
mod serialize;

#[cfg(any(test, feature = "proptest-impl"))]
mod arbitrary;
#[cfg(test)]
mod tests;

pub use hash::Hash;
pub use serialize::MAX_TX_SIZE;

/// The sequence number that opts an input out of locktime enforcement.
pub const SEQUENCE_FINAL: u32 = 0xffff_ffff;

/// Locktime values below this are block heights; values at or above it
/// are unix timestamps.
pub const LOCKTIME_THRESHOLD: u32 = 500_000_000;

/// OutPoint
///
/// A particular transaction output reference.
#[derive(
    Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize, Hash,
    HnsSerialize, HnsDeserialize,
)]
pub struct OutPoint {
    /// References the transaction that contains the coin being spent.
    pub hash: hash::Hash,

    /// Identifies which output of that transaction is referenced; the
    /// first output is 0, etc.
    pub index: u32,
}

impl OutPoint {
    #[inline]
    pub const fn len() -> usize {
        36
    }

    /// The outpoint a coinbase input carries: a zero hash and the
    /// all-ones index.
    pub fn null() -> OutPoint {
        OutPoint {
            hash: hash::Hash([0; 32]),
            index: 0xffff_ffff,
        }
    }

    pub fn is_null(&self) -> bool {
        self.index == 0xffff_ffff && self.hash.0 == [0; 32]
    }
}

/// A per-input witness: an ordered stack of byte strings.
///
/// Witness data is not covered by the transaction identity hash, only by
/// the witness hash, so signatures cannot malleate txids.
#[derive(
    Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize, Hash, HnsSerialize,
    HnsDeserialize,
)]
pub struct Witness(pub Vec<Vec<u8>>);

impl Witness {
    pub fn empty() -> Witness {
        Witness(Vec::new())
    }

    pub fn serialized_size(&self) -> usize {
        let mut size = CompactInt::size(self.0.len());
        for item in &self.0 {
            size += CompactInt::size(item.len()) + item.len();
        }
        size
    }
}

/// A transaction input.
///
/// A coinbase input is not a separate shape here: it is an input whose
/// prevout is [`OutPoint::null`], permitted only in the first transaction
/// of a block.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash)]
pub struct Input {
    /// The previous output being spent.
    pub prevout: OutPoint,
    /// The sequence number.
    pub sequence: u32,
    /// The witness stack authorizing the spend. Not part of this input's
    /// own encoding: all witnesses trail the locktime on the wire, one
    /// stack per input in input order.
    pub witness: Witness,
}

impl Input {
    pub fn len(&self) -> usize {
        OutPoint::len() + 4
    }
}

impl HandshakeSerialize for Input {
    fn handshake_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        self.prevout.handshake_serialize(&mut target)?;
        self.sequence.handshake_serialize(&mut target)?;
        Ok(())
    }
}

/// Deserializes the outpoint and sequence; the witness stack is attached
/// by the transaction decoder once the locktime has been read.
impl HandshakeDeserialize for Input {
    fn handshake_deserialize<R: std::io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Input {
            prevout: OutPoint::handshake_deserialize(&mut reader)?,
            sequence: u32::handshake_deserialize(&mut reader)?,
            witness: Witness::empty(),
        })
    }
}

/// A transaction output: a value, the address that may spend it, and the
/// covenant constraining how.
#[derive(
    Clone, Debug, Eq, PartialEq, Serialize, Deserialize, Hash, HnsSerialize, HnsDeserialize,
)]
pub struct Output {
    /// Output value in base units.
    pub value: Amount,

    /// The receiving address.
    pub address: Address,

    /// The name covenant; [`Covenant::none`] for plain transfers.
    pub covenant: Covenant,
}

impl Output {
    /// Returns the serialized length (in bytes) of this Output
    pub fn len(&self) -> usize {
        8 + self.address.serialized_size() + self.covenant.serialized_size()
    }
}

/// A Handshake transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// The transaction version.
    pub version: u32,
    /// The transaction inputs.
    pub inputs: Vec<Input>,
    /// The transaction outputs.
    pub outputs: Vec<Output>,
    /// Absolute locktime: a height below [`LOCKTIME_THRESHOLD`], a unix
    /// time at or above it. Coinbase transactions record their block
    /// height here, which keeps coinbase txids unique across heights.
    pub locktime: u32,
    hash: Cached<Hash>,
    witness_hash: Cached<Hash>,
}

impl Transaction {
    pub fn new(version: u32, inputs: Vec<Input>, outputs: Vec<Output>, locktime: u32) -> Transaction {
        Transaction {
            version,
            inputs,
            outputs,
            locktime,
            hash: Cached::new(),
            witness_hash: Cached::new(),
        }
    }

    /// Get the identity hash (txid) of this transaction.
    pub fn hash(&self) -> Hash {
        // If we have a cached version, just return that
        if let Some(hash) = self.hash.value() {
            return hash;
        }
        // Otherwise, serialize the tx to calculate and return the hash
        Hash::from(self)
    }

    /// The witness hash: commits to both the identity hash and every
    /// witness byte.
    pub fn witness_hash(&self) -> Hash {
        if let Some(hash) = self.witness_hash.value() {
            return hash;
        }
        let mut witness_writer = blake2b::Writer::default();
        self.write_witnesses(&mut witness_writer)
            .expect("Blake2bWriter is infallible");
        let witness_digest = witness_writer.finish();
        Hash(blake2b::multi256(&[&self.hash().0, &witness_digest]))
    }

    /// Populate both hash caches. Called after deserialization and by
    /// constructors that know the transaction will not change again.
    pub(crate) fn cache_hashes(&mut self) {
        let hash = self.hash();
        let witness_hash = self.witness_hash();
        self.hash = Cached::from(hash);
        self.witness_hash = Cached::from(witness_hash);
    }

    pub fn contains_coinbase_input(&self) -> bool {
        self.inputs.iter().any(|input| input.prevout.is_null())
    }

    /// Returns `true` if this transaction is a coinbase transaction.
    pub fn is_coinbase(&self) -> bool {
        self.inputs.len() == 1 && self.inputs[0].prevout.is_null()
    }

    /// The checked sum of all output values.
    pub fn output_value_sum(&self) -> Result<Amount, amount::Error> {
        let mut sum = Amount::ZERO;
        for output in &self.outputs {
            sum = sum.checked_add(output.value)?;
        }
        Ok(sum)
    }

    /// Returns the serialized length (in bytes) of this transaction,
    /// witnesses included.
    pub fn len(&self) -> usize {
        let mut size = 4 + CompactInt::size(self.inputs.len());
        for input in self.inputs.iter() {
            size += input.len();
        }
        size += CompactInt::size(self.outputs.len());
        for output in self.outputs.iter() {
            size += output.len();
        }
        size += 4;
        for input in self.inputs.iter() {
            size += input.witness.serialized_size();
        }
        size
    }
}
