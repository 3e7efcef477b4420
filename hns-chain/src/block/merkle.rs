//! The merkle commitment over a block's transactions.
//!
//! RFC-6962-style domain separation with BLAKE2b-256: leaves hash as
//! `H(0x00 || leaf)`, internal nodes as `H(0x01 || left || right)`. A
//! missing right sibling at an odd level is the sentinel [`empty_hash`]
//! rather than a duplicate of the left child, so the
//! duplicate-transaction root malleation of Bitcoin's scheme
//! (CVE-2012-2459) cannot arise.

use std::{fmt, io, iter::FromIterator};

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

use crate::{
    serialization::{blake2b, HandshakeDeserialize, HandshakeSerialize, SerializationError},
    transaction,
};

lazy_static! {
    static ref EMPTY: [u8; 32] = blake2b::digest256(&[]);
}

/// The sentinel digest standing in for a missing right sibling.
pub fn empty_hash() -> [u8; 32] {
    *EMPTY
}

/// Domain-separated leaf digest: `BLAKE2b-256(0x00 || leaf)`.
pub fn hash_leaf(leaf: &[u8; 32]) -> [u8; 32] {
    blake2b::multi256(&[&[0x00], leaf])
}

/// Domain-separated internal digest: `BLAKE2b-256(0x01 || left || right)`.
pub fn hash_internal(left: &[u8; 32], right: &[u8; 32]) -> [u8; 32] {
    blake2b::multi256(&[&[0x01], left, right])
}

/// A merkle root committed to in a block header.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Root(pub [u8; 32]);

impl Root {
    /// Computes the root over raw 32-byte leaves.
    pub fn from_leaves(leaves: &[[u8; 32]]) -> Root {
        if leaves.is_empty() {
            return Root(empty_hash());
        }
        let mut level: Vec<[u8; 32]> = leaves.iter().map(hash_leaf).collect();
        while level.len() > 1 {
            let mut next = Vec::with_capacity((level.len() + 1) / 2);
            for pair in level.chunks(2) {
                let right = pair.get(1).copied().unwrap_or_else(empty_hash);
                next.push(hash_internal(&pair[0], &right));
            }
            level = next;
        }
        Root(level[0])
    }
}

impl FromIterator<transaction::Hash> for Root {
    fn from_iter<I>(hashes: I) -> Self
    where
        I: IntoIterator<Item = transaction::Hash>,
    {
        let leaves: Vec<[u8; 32]> = hashes.into_iter().map(|hash| hash.0).collect();
        Root::from_leaves(&leaves)
    }
}

impl fmt::Display for Root {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl fmt::Debug for Root {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("merkle::Root")
            .field(&hex::encode(&self.0))
            .finish()
    }
}

impl HandshakeSerialize for Root {
    fn handshake_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error> {
        self.0.handshake_serialize(target)
    }
}

impl HandshakeDeserialize for Root {
    fn handshake_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Root(<[u8; 32]>::handshake_deserialize(reader)?))
    }
}

#[cfg(any(test, feature = "proptest-impl"))]
impl proptest::arbitrary::Arbitrary for Root {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        use proptest::prelude::*;
        any::<[u8; 32]>().prop_map(Root).boxed()
    }

    type Strategy = proptest::strategy::BoxedStrategy<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(n: u8) -> [u8; 32] {
        [n; 32]
    }

    #[test]
    fn single_leaf_root_is_leaf_digest() {
        assert_eq!(Root::from_leaves(&[leaf(7)]).0, hash_leaf(&leaf(7)));
    }

    #[test]
    fn two_leaves() {
        let expected = hash_internal(&hash_leaf(&leaf(1)), &hash_leaf(&leaf(2)));
        assert_eq!(Root::from_leaves(&[leaf(1), leaf(2)]).0, expected);
    }

    #[test]
    fn odd_level_uses_sentinel() {
        let bottom = [
            hash_internal(&hash_leaf(&leaf(1)), &hash_leaf(&leaf(2))),
            hash_internal(&hash_leaf(&leaf(3)), &empty_hash()),
        ];
        let expected = hash_internal(&bottom[0], &bottom[1]);
        assert_eq!(Root::from_leaves(&[leaf(1), leaf(2), leaf(3)]).0, expected);
    }

    #[test]
    fn leaf_order_matters() {
        assert_ne!(
            Root::from_leaves(&[leaf(1), leaf(2)]),
            Root::from_leaves(&[leaf(2), leaf(1)])
        );
    }

    #[test]
    fn leaves_and_nodes_are_domain_separated() {
        // A single leaf equal to an internal digest must not produce
        // that internal digest as its root.
        let internal = hash_internal(&leaf(1), &leaf(2));
        assert_ne!(Root::from_leaves(&[internal]).0, internal);
    }
}
