use std::{fmt, io};

use serde::{Deserialize, Serialize};

use crate::serialization::{HandshakeDeserialize, HandshakeSerialize, SerializationError};

use super::Header;

/// A hash of a block, used to identify blocks and link blocks into a chain. ⛓️
///
/// This is the header's proof-of-work hash: the masked share hash of the
/// two-phase header construction. Because the header commits to the
/// merkle, witness, and tree roots, this one hash binds the entire
/// contents of the block and the name-tree state it produces.
///
/// Note: block hashes are displayed in the same big-endian byte order the
/// proof-of-work comparison uses; there is no Bitcoin-style reversal.
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
        f.debug_tuple("block::Hash")
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

impl<'a> From<&'a Header> for Hash {
    fn from(block_header: &'a Header) -> Self {
        Hash(block_header.pow_hash())
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
