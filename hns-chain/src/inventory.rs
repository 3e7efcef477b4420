//! Inventory items: typed hashes advertising or requesting data.

use std::io::{Read, Write};

use crate::{
    block,
    serialization::{HandshakeDeserialize, HandshakeSerialize, SerializationError},
    transaction,
};

/// An inventory hash which refers to some advertised or requested data.
///
/// This is just a typed hash, not a container, so we do not call it an
/// "inventory vector" to avoid confusion with `Vec<T>`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum InventoryHash {
    /// An error; data with this tag is ignored.
    Error,
    /// A hash of a transaction.
    Tx(transaction::Hash),
    /// A hash of a block.
    Block(block::Hash),
    /// A hash of a filtered block: the reply should be a
    /// [`block::MerkleBlock`] rather than a full block.
    FilteredBlock(block::Hash),
}

impl From<transaction::Hash> for InventoryHash {
    fn from(tx: transaction::Hash) -> InventoryHash {
        InventoryHash::Tx(tx)
    }
}

impl From<block::Hash> for InventoryHash {
    fn from(hash: block::Hash) -> InventoryHash {
        // Auto-convert to Block; filtered blocks are only ever requested
        // explicitly.
        InventoryHash::Block(hash)
    }
}

impl HandshakeSerialize for InventoryHash {
    fn handshake_serialize<W: Write>(&self, mut writer: W) -> Result<(), std::io::Error> {
        let (code, bytes) = match *self {
            InventoryHash::Error => (0u32, [0; 32]),
            InventoryHash::Tx(hash) => (1, hash.0),
            InventoryHash::Block(hash) => (2, hash.0),
            InventoryHash::FilteredBlock(hash) => (3, hash.0),
        };
        code.handshake_serialize(&mut writer)?;
        bytes.handshake_serialize(&mut writer)?;
        Ok(())
    }
}

impl HandshakeDeserialize for InventoryHash {
    fn handshake_deserialize<R: Read>(mut reader: R) -> Result<Self, SerializationError> {
        let code = u32::handshake_deserialize(&mut reader)?;
        let bytes = <[u8; 32]>::handshake_deserialize(&mut reader)?;
        match code {
            0 => Ok(InventoryHash::Error),
            1 => Ok(InventoryHash::Tx(transaction::Hash(bytes))),
            2 => Ok(InventoryHash::Block(block::Hash(bytes))),
            3 => Ok(InventoryHash::FilteredBlock(block::Hash(bytes))),
            _ => Err(SerializationError::Parse("invalid inventory code")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::serialization::HandshakeDeserializeInto;

    #[test]
    fn roundtrip() {
        hns_test::init();

        let items = [
            InventoryHash::Error,
            InventoryHash::Tx(transaction::Hash([1; 32])),
            InventoryHash::Block(block::Hash([2; 32])),
            InventoryHash::FilteredBlock(block::Hash([3; 32])),
        ];
        for item in &items {
            let data = item
                .handshake_serialize_to_vec()
                .expect("inventory should serialize");
            assert_eq!(data.len(), 36);
            let item2: InventoryHash = data
                .as_slice()
                .handshake_deserialize_into()
                .expect("inventory should deserialize");
            assert_eq!(*item, item2);
        }
    }

    #[test]
    fn invalid_code_rejected() {
        let mut data = vec![4u8, 0, 0, 0];
        data.extend_from_slice(&[0; 32]);
        assert!(InventoryHash::handshake_deserialize(&data[..]).is_err());
    }
}
