//! The on-disk key and value formats.
//!
//! Everything lives in one sled keyspace. Each record kind gets a
//! single-byte tag, followed by its fixed or length-prefixed key fields;
//! values are the consensus serialization of the record. One keyspace
//! means one `sled::Batch` covers a whole block's mutations atomically.

use hns_chain::{
    block,
    covenant::NameHash,
    transaction::OutPoint,
    HandshakeDeserialize, HandshakeSerialize,
};

use crate::StoreError;

/// Record tags.
pub(crate) mod tags {
    /// The chain-state counters and tip pointer.
    pub const CHAIN_STATE: u8 = b'R';
    /// The migration-state record.
    pub const MIGRATION: u8 = b'M';
    /// The in-progress write marker.
    pub const WRITE_MARKER: u8 = b'F';
    /// Header record by block hash.
    pub const HEADER: u8 = b'H';
    /// Block hash by height.
    pub const HASH_BY_HEIGHT: u8 = b'h';
    /// Full block bytes by hash.
    pub const BLOCK: u8 = b'B';
    /// Undo record by block hash.
    pub const UNDO: u8 = b'U';
    /// Coin entry by outpoint.
    pub const COIN: u8 = b'C';
    /// Name state by name hash.
    pub const NAME: u8 = b'N';
    /// Tree leaf by name hash.
    pub const TREE_LEAF: u8 = b'l';
    /// Tree root by height.
    pub const TREE_ROOT: u8 = b'r';
}

pub(crate) fn meta_key(tag: u8) -> [u8; 1] {
    [tag]
}

pub(crate) fn hash_key(tag: u8, hash: &block::Hash) -> [u8; 33] {
    let mut key = [0u8; 33];
    key[0] = tag;
    key[1..].copy_from_slice(&hash.0);
    key
}

/// Heights are big-endian so that range scans iterate in chain order.
pub(crate) fn height_key(tag: u8, height: u32) -> [u8; 5] {
    let mut key = [0u8; 5];
    key[0] = tag;
    key[1..].copy_from_slice(&height.to_be_bytes());
    key
}

pub(crate) fn outpoint_key(outpoint: &OutPoint) -> [u8; 37] {
    let mut key = [0u8; 37];
    key[0] = tags::COIN;
    key[1..33].copy_from_slice(&outpoint.hash.0);
    key[33..].copy_from_slice(&outpoint.index.to_be_bytes());
    key
}

pub(crate) fn name_key(tag: u8, name_hash: &NameHash) -> [u8; 33] {
    let mut key = [0u8; 33];
    key[0] = tag;
    key[1..].copy_from_slice(name_hash.as_bytes());
    key
}

/// Serializes a record value.
pub(crate) fn ser<T: HandshakeSerialize>(value: &T) -> Vec<u8> {
    value
        .handshake_serialize_to_vec()
        .expect("writing to a Vec cannot fail")
}

/// Deserializes a record value, rejecting trailing bytes: a stored
/// record with leftovers is corruption, not laziness in the decoder.
pub(crate) fn de<T: HandshakeDeserialize>(bytes: &[u8]) -> Result<T, StoreError> {
    let mut reader = bytes;
    let value = T::handshake_deserialize(&mut reader)?;
    if !reader.is_empty() {
        return Err(StoreError::Corrupt("trailing bytes in stored record"));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_are_prefix_disjoint() {
        hns_test::init();

        let hash = block::Hash([7; 32]);
        let header = hash_key(tags::HEADER, &hash);
        let block_key = hash_key(tags::BLOCK, &hash);
        assert_ne!(header[0], block_key[0]);
        assert_eq!(&header[1..], &block_key[1..]);
    }

    #[test]
    fn height_keys_sort_in_chain_order() {
        hns_test::init();

        let low = height_key(tags::HASH_BY_HEIGHT, 1);
        let high = height_key(tags::HASH_BY_HEIGHT, 256);
        assert!(low < high);
    }
}
