//! Deferred-parse blocks.
//!
//! A `MemBlock` holds a block's raw bytes and parses only the header up
//! front. Relay and header-first sync paths can hash, check
//! proof-of-work, and store the block without paying for a full
//! transaction decode; the decode happens once, when (if) the block is
//! actually connected.

use bytes::Bytes;

use crate::{
    compactint::CompactInt,
    transaction::{Input, Output},
    HandshakeDeserialize, HandshakeSerialize, SerializationError,
};

use super::{AnyBlock, Block, Header, Height, MAX_BLOCK_BYTES};

#[derive(Clone, Debug)]
pub struct MemBlock {
    header: Header,
    raw: Bytes,
}

impl AnyBlock for MemBlock {
    fn header(&self) -> &Header {
        &self.header
    }
}

impl MemBlock {
    /// Wraps raw block bytes, eagerly parsing only the 236-byte header.
    pub fn decode(raw: Bytes) -> Result<MemBlock, SerializationError> {
        if raw.len() as u64 > MAX_BLOCK_BYTES {
            return Err(SerializationError::Parse("block exceeds maximum size"));
        }
        if raw.len() < Header::len() {
            return Err(SerializationError::Parse(
                "Not enough bytes in block header",
            ));
        }
        let header = Header::handshake_deserialize(&raw[..Header::len()])?;
        Ok(MemBlock { header, raw })
    }

    pub fn raw(&self) -> &[u8] {
        &self.raw
    }

    /// The block height recorded in the coinbase locktime, parsed on
    /// demand from the first transaction's base encoding. Returns `None`
    /// if the body is malformed or the first transaction is not a
    /// coinbase; full decoding reports those errors properly.
    pub fn coinbase_height(&self) -> Option<Height> {
        let mut src = &self.raw[Header::len()..];
        let tx_count = CompactInt::handshake_deserialize(&mut src).ok()?;
        if tx_count.value() == 0 {
            return None;
        }
        let _version = u32::handshake_deserialize(&mut src).ok()?;
        let inputs = Vec::<Input>::handshake_deserialize(&mut src).ok()?;
        let _outputs = Vec::<Output>::handshake_deserialize(&mut src).ok()?;
        let locktime = u32::handshake_deserialize(&mut src).ok()?;
        if inputs.len() != 1 || !inputs[0].prevout.is_null() {
            return None;
        }
        Some(Height(locktime))
    }

    /// Fully decodes the wrapped bytes.
    pub fn to_block(&self) -> Result<Block, SerializationError> {
        Block::handshake_deserialize(&self.raw[..])
    }
}

impl HandshakeSerialize for MemBlock {
    fn handshake_serialize<W: std::io::Write>(&self, mut target: W) -> Result<(), std::io::Error> {
        target.write_all(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::arbitrary::test_header;
    use crate::transaction::{OutPoint, Transaction, Witness, SEQUENCE_FINAL};
    use std::sync::Arc;

    fn raw_block(height: u32) -> (Block, Bytes) {
        let coinbase = Transaction::new(
            0,
            vec![Input {
                prevout: OutPoint::null(),
                sequence: SEQUENCE_FINAL,
                witness: Witness(vec![vec![height as u8]]),
            }],
            vec![],
            height,
        );
        let mut block = Block {
            header: test_header(),
            transactions: vec![Arc::new(coinbase)],
        };
        block.header.merkle_root = block.merkle_root();
        block.header.witness_root = block.witness_root();
        let bytes = block
            .handshake_serialize_to_vec()
            .expect("block should serialize");
        (block, Bytes::from(bytes))
    }

    #[test]
    fn header_parses_eagerly_and_hash_agrees() {
        hns_test::init();

        let (block, raw) = raw_block(42);
        let mem_block = MemBlock::decode(raw).expect("raw block should wrap");
        assert_eq!(mem_block.hash(), block.hash());
        assert_eq!(mem_block.header(), &block.header);
    }

    #[test]
    fn coinbase_height_without_full_decode() {
        hns_test::init();

        let (_, raw) = raw_block(42);
        let mem_block = MemBlock::decode(raw).expect("raw block should wrap");
        assert_eq!(mem_block.coinbase_height(), Some(Height(42)));
    }

    #[test]
    fn full_decode_roundtrips() {
        hns_test::init();

        let (block, raw) = raw_block(7);
        let mem_block = MemBlock::decode(raw).expect("raw block should wrap");
        assert_eq!(mem_block.to_block().expect("block should decode"), block);
    }

    #[test]
    fn truncated_header_rejected() {
        hns_test::init();

        assert!(MemBlock::decode(Bytes::from(vec![0u8; Header::len() - 1])).is_err());
    }
}
