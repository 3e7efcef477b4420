use std::io;

use hns_chain::{HandshakeDeserialize, HandshakeSerialize, SerializationError};

use crate::names::NameUndo;

use super::CoinEntry;

/// The coins a block removed from the UTXO set, in exact spend order.
///
/// This journal is the source of truth for disconnecting the block: the
/// pre-block UTXO set is never reconstructed from the post-block store,
/// it is replayed from here, popping entries in reverse-spend order.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct UndoCoins {
    items: Vec<CoinEntry>,
}

impl UndoCoins {
    pub fn new() -> UndoCoins {
        UndoCoins { items: Vec::new() }
    }

    /// Record a spent coin. Must be called in spend order.
    pub fn push(&mut self, entry: CoinEntry) {
        self.items.push(entry);
    }

    /// Take back the most recently recorded coin.
    pub fn pop(&mut self) -> Option<CoinEntry> {
        self.items.pop()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[CoinEntry] {
        &self.items
    }
}

/// A fixed u32 count precedes the entries; undo records are read back
/// before anything else during a disconnect, so the count doubles as a
/// cheap integrity check.
impl HandshakeSerialize for UndoCoins {
    fn handshake_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        (self.items.len() as u32).handshake_serialize(&mut writer)?;
        for item in &self.items {
            item.handshake_serialize(&mut writer)?;
        }
        Ok(())
    }
}

impl HandshakeDeserialize for UndoCoins {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let count = u32::handshake_deserialize(&mut reader)?;
        let mut items = Vec::with_capacity(std::cmp::min(count as usize, 1024));
        for _ in 0..count {
            items.push(CoinEntry::handshake_deserialize(&mut reader)?);
        }
        Ok(UndoCoins { items })
    }
}

/// Everything needed to reverse one block: the spent coins and the prior
/// name-state snapshots.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct BlockUndo {
    pub coins: UndoCoins,
    pub names: NameUndo,
}

impl HandshakeSerialize for BlockUndo {
    fn handshake_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.coins.handshake_serialize(&mut writer)?;
        self.names.handshake_serialize(&mut writer)?;
        Ok(())
    }
}

impl HandshakeDeserialize for BlockUndo {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        Ok(BlockUndo {
            coins: UndoCoins::handshake_deserialize(&mut reader)?,
            names: NameUndo::handshake_deserialize(&mut reader)?,
        })
    }
}
