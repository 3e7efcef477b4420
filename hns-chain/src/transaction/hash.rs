use std::{fmt, io};

use serde::{Deserialize, Serialize};

use crate::serialization::{
    blake2b, HandshakeDeserialize, HandshakeSerialize, SerializationError,
};

use super::Transaction;

/// The identity hash of a transaction: BLAKE2b-256 over the encoding with
/// every witness stack omitted.
///
/// The same 32-byte type doubles as the witness hash, which additionally
/// commits to the witness bytes (see [`Transaction::witness_hash`]).
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct Hash(pub [u8; 32]);

impl Hash {
    pub fn from_bytes_exact(bytes: [u8; 32]) -> Hash {
        Hash(bytes)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("transaction::Hash")
            .field(&hex::encode(&self.0))
            .finish()
    }
}

impl HandshakeSerialize for Hash {
    fn handshake_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error> {
        self.0.handshake_serialize(target)
    }
}

impl HandshakeDeserialize for Hash {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(Hash(<[u8; 32]>::handshake_deserialize(&mut reader)?))
    }
}

impl<'a> From<&'a Transaction> for Hash {
    fn from(tx: &'a Transaction) -> Self {
        let mut hash_writer = blake2b::Writer::default();
        tx.write_normal(&mut hash_writer)
            .expect("Blake2bWriter is infallible");
        Self(hash_writer.finish())
    }
}

impl std::str::FromStr for Hash {
    type Err = SerializationError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0; 32];
        if hex::decode_to_slice(s, &mut bytes[..]).is_err() {
            Err(SerializationError::Parse("hex decoding error"))
        } else {
            Ok(Hash(bytes))
        }
    }
}

#[cfg(any(test, feature = "proptest-impl"))]
impl proptest::arbitrary::Arbitrary for Hash {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        use proptest::prelude::*;
        any::<[u8; 32]>().prop_map(Hash).boxed()
    }

    type Strategy = proptest::strategy::BoxedStrategy<Self>;
}
