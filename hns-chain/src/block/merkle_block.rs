//! Filtered blocks: a header plus a pruned merkle tree proving that a
//! subset of transactions is committed by the header's merkle root.

use handshake_serde_derive::{HnsDeserialize, HnsSerialize};

use crate::{
    compactint::CompactInt,
    transaction, HandshakeDeserialize, HandshakeSerialize, SerializationError,
};

use super::{merkle, AnyBlock, Block, Header};

/// A block with its transaction list replaced by a pruned merkle tree.
///
/// `flags` is a bitstream in depth-first pre-order, one bit per visited
/// node, lowest bit of each byte first: `1` means "parent of a match,
/// descend"; `0` means "cut here, the node's digest is supplied in
/// `hashes`". At the leaf level a `1` bit marks a matched transaction
/// whose identity hash is supplied (and extractable); a `0` bit supplies
/// the hash of a non-matched transaction.
#[derive(HnsDeserialize, HnsSerialize, Debug, Clone, PartialEq, Eq)]
pub struct MerkleBlock {
    pub header: Header,
    pub total_tx: u32,
    pub hashes: Vec<transaction::Hash>,
    pub flags: Vec<u8>,
}

/// The result of reconstructing a [`MerkleBlock`]: the recomputed root
/// and the matched transactions in block order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialTree {
    pub root: merkle::Root,
    pub matches: Vec<transaction::Hash>,
    pub indexes: Vec<usize>,
}

impl AnyBlock for MerkleBlock {
    fn header(&self) -> &Header {
        &self.header
    }
}

impl MerkleBlock {
    /// Builds a filtered block from a full block and one match flag per
    /// transaction.
    ///
    /// # Panics
    ///
    /// If `matches` and the block's transactions differ in length.
    pub fn from_matches(block: &Block, matches: &[bool]) -> MerkleBlock {
        assert_eq!(
            matches.len(),
            block.transactions.len(),
            "one match flag per transaction"
        );
        let txids: Vec<[u8; 32]> = block.transactions.iter().map(|tx| tx.hash().0).collect();

        let mut builder = TreeBuilder {
            txids: &txids,
            matches,
            bits: Vec::new(),
            hashes: Vec::new(),
        };
        let height = tree_height(txids.len());
        builder.traverse(height, 0);

        let mut flags = vec![0u8; (builder.bits.len() + 7) / 8];
        for (i, bit) in builder.bits.iter().enumerate() {
            if *bit {
                flags[i / 8] |= 1 << (i % 8);
            }
        }

        MerkleBlock {
            header: block.header,
            total_tx: txids.len() as u32,
            hashes: builder.hashes.into_iter().map(transaction::Hash).collect(),
            flags,
        }
    }

    /// Rebuilds the pruned tree, returning the recomputed root and the
    /// matched transactions.
    ///
    /// Fails unless every supplied hash and every flag bit is consumed
    /// exactly once (trailing padding bits in the final byte must be
    /// zero), and the recomputed root equals the header's merkle root.
    pub fn extract_tree(&self) -> Result<PartialTree, SerializationError> {
        if self.total_tx == 0 {
            return Err(SerializationError::Parse("empty merkle block"));
        }
        let total = self.total_tx as usize;
        if self.hashes.len() > total {
            return Err(SerializationError::Parse("more hashes than transactions"));
        }

        let mut extractor = TreeExtractor {
            total,
            hashes: &self.hashes,
            flags: &self.flags,
            next_hash: 0,
            next_bit: 0,
            matches: Vec::new(),
            indexes: Vec::new(),
        };
        let root = extractor.traverse(tree_height(total), 0)?;

        if extractor.next_hash != self.hashes.len() {
            return Err(SerializationError::Parse("unconsumed hashes"));
        }
        // All bits after the last consumed one must be zero padding
        // within the final byte; whole unread bytes are an error.
        if (extractor.next_bit + 7) / 8 != self.flags.len() {
            return Err(SerializationError::Parse("unconsumed flag bytes"));
        }
        for bit in extractor.next_bit..self.flags.len() * 8 {
            if self.flags[bit / 8] & (1 << (bit % 8)) != 0 {
                return Err(SerializationError::Parse("nonzero flag padding"));
            }
        }

        let root = merkle::Root(root);
        if root != self.header.merkle_root {
            return Err(SerializationError::Parse(
                "reconstructed root does not match header",
            ));
        }

        Ok(PartialTree {
            root,
            matches: extractor.matches,
            indexes: extractor.indexes,
        })
    }

    fn serialized_size(&self) -> usize {
        Header::len()
            + 4
            + CompactInt::size(self.hashes.len())
            + (self.hashes.len() * 32)
            + CompactInt::size(self.flags.len())
            + self.flags.len()
    }
}

/// Levels above the leaves: the smallest `h` with `ceil(n / 2^h) == 1`.
fn tree_height(leaves: usize) -> usize {
    let mut height = 0;
    while level_width(leaves, height) > 1 {
        height += 1;
    }
    height
}

/// Node count at `height` levels above the leaves.
fn level_width(leaves: usize, height: usize) -> usize {
    (leaves + (1 << height) - 1) >> height
}

struct TreeBuilder<'a> {
    txids: &'a [[u8; 32]],
    matches: &'a [bool],
    bits: Vec<bool>,
    hashes: Vec<[u8; 32]>,
}

impl<'a> TreeBuilder<'a> {
    /// The digest of the subtree rooted `height` levels up at `pos`.
    /// Height-0 node digests are leaf digests of the raw txids; the raw
    /// txid is what gets *stored*, mirroring the leaf level of the full
    /// tree.
    fn node_hash(&self, height: usize, pos: usize) -> [u8; 32] {
        if height == 0 {
            return merkle::hash_leaf(&self.txids[pos]);
        }
        let left = self.node_hash(height - 1, pos * 2);
        let right = if pos * 2 + 1 < level_width(self.txids.len(), height - 1) {
            self.node_hash(height - 1, pos * 2 + 1)
        } else {
            merkle::empty_hash()
        };
        merkle::hash_internal(&left, &right)
    }

    fn parent_of_match(&self, height: usize, pos: usize) -> bool {
        let start = pos << height;
        let end = std::cmp::min((pos + 1) << height, self.txids.len());
        self.matches[start..end].iter().any(|matched| *matched)
    }

    fn traverse(&mut self, height: usize, pos: usize) {
        let descend = self.parent_of_match(height, pos);
        self.bits.push(descend);

        if height == 0 {
            // Leaf nodes always supply their txid; the bit says whether
            // it is a match.
            self.hashes.push(self.txids[pos]);
        } else if !descend {
            self.hashes.push(self.node_hash(height, pos));
        } else {
            self.traverse(height - 1, pos * 2);
            if pos * 2 + 1 < level_width(self.txids.len(), height - 1) {
                self.traverse(height - 1, pos * 2 + 1);
            }
        }
    }
}

struct TreeExtractor<'a> {
    total: usize,
    hashes: &'a [transaction::Hash],
    flags: &'a [u8],
    next_hash: usize,
    next_bit: usize,
    matches: Vec<transaction::Hash>,
    indexes: Vec<usize>,
}

impl<'a> TreeExtractor<'a> {
    fn read_bit(&mut self) -> Result<bool, SerializationError> {
        if self.next_bit >= self.flags.len() * 8 {
            return Err(SerializationError::Parse("flag bits exhausted"));
        }
        let bit = self.flags[self.next_bit / 8] & (1 << (self.next_bit % 8)) != 0;
        self.next_bit += 1;
        Ok(bit)
    }

    fn read_hash(&mut self) -> Result<[u8; 32], SerializationError> {
        let hash = self
            .hashes
            .get(self.next_hash)
            .ok_or(SerializationError::Parse("hash list exhausted"))?;
        self.next_hash += 1;
        Ok(hash.0)
    }

    /// Returns the digest of the subtree rooted `height` levels up at
    /// `pos`, consuming bits and hashes as the flags dictate.
    fn traverse(&mut self, height: usize, pos: usize) -> Result<[u8; 32], SerializationError> {
        let descend = self.read_bit()?;

        if height == 0 {
            let txid = self.read_hash()?;
            if descend {
                self.matches.push(transaction::Hash(txid));
                self.indexes.push(pos);
            }
            return Ok(merkle::hash_leaf(&txid));
        }

        if !descend {
            return Ok(self.read_hash()?);
        }

        let left = self.traverse(height - 1, pos * 2)?;
        let right = if pos * 2 + 1 < level_width(self.total, height - 1) {
            self.traverse(height - 1, pos * 2 + 1)?
        } else {
            merkle::empty_hash()
        };
        Ok(merkle::hash_internal(&left, &right))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::block::Height;
    use crate::transaction::{Input, OutPoint, Transaction, Witness, SEQUENCE_FINAL};

    fn test_block(tx_count: usize) -> Block {
        // Distinct coinbase-shaped transactions; the locktime makes each
        // txid unique.
        let transactions: Vec<Arc<Transaction>> = (0..tx_count)
            .map(|i| {
                Arc::new(Transaction::new(
                    0,
                    vec![Input {
                        prevout: OutPoint::null(),
                        sequence: SEQUENCE_FINAL,
                        witness: Witness::empty(),
                    }],
                    vec![],
                    i as u32,
                ))
            })
            .collect();
        let mut block = Block {
            header: crate::block::arbitrary::test_header(),
            transactions,
        };
        block.header.merkle_root = block.merkle_root();
        block.header.witness_root = block.witness_root();
        block
    }

    #[test]
    fn all_matches_extracts_every_txid() {
        hns_test::init();

        let block = test_block(7);
        let merkle_block = MerkleBlock::from_matches(&block, &[true; 7]);
        let tree = merkle_block.extract_tree().expect("tree should rebuild");

        assert_eq!(tree.root, block.header.merkle_root);
        assert_eq!(tree.indexes, vec![0, 1, 2, 3, 4, 5, 6]);
        let expected: Vec<_> = block.transactions.iter().map(|tx| tx.hash()).collect();
        assert_eq!(tree.matches, expected);
    }

    #[test]
    fn no_matches_still_verifies_root() {
        hns_test::init();

        let block = test_block(5);
        let merkle_block = MerkleBlock::from_matches(&block, &[false; 5]);
        let tree = merkle_block.extract_tree().expect("tree should rebuild");

        assert_eq!(tree.root, block.header.merkle_root);
        assert!(tree.matches.is_empty());
    }

    #[test]
    fn single_match_identifies_position() {
        hns_test::init();

        let block = test_block(6);
        let mut matches = [false; 6];
        matches[3] = true;
        let merkle_block = MerkleBlock::from_matches(&block, &matches);
        let tree = merkle_block.extract_tree().expect("tree should rebuild");

        assert_eq!(tree.indexes, vec![3]);
        assert_eq!(tree.matches, vec![block.transactions[3].hash()]);
    }

    #[test]
    fn oversized_flags_rejected() {
        hns_test::init();

        let block = test_block(4);
        let mut merkle_block = MerkleBlock::from_matches(&block, &[true; 4]);
        merkle_block.flags.push(0);
        assert!(merkle_block.extract_tree().is_err());

        // Setting a padding bit in the last byte must also fail.
        let mut merkle_block = MerkleBlock::from_matches(&block, &[true; 4]);
        *merkle_block.flags.last_mut().expect("flags are nonempty") |= 0x80;
        assert!(merkle_block.extract_tree().is_err());
    }

    #[test]
    fn tampered_hash_rejected() {
        hns_test::init();

        let block = test_block(3);
        let mut merkle_block = MerkleBlock::from_matches(&block, &[false; 3]);
        merkle_block.hashes[0].0[0] ^= 1;
        assert!(merkle_block.extract_tree().is_err());
    }

    #[test]
    fn single_transaction_block() {
        hns_test::init();

        let block = test_block(1);
        let merkle_block = MerkleBlock::from_matches(&block, &[true]);
        let tree = merkle_block.extract_tree().expect("tree should rebuild");
        assert_eq!(tree.matches, vec![block.transactions[0].hash()]);
        assert!(merkle_block.serialized_size() > Header::len());
    }

    #[test]
    fn roundtrips_on_the_wire() {
        hns_test::init();

        use crate::serialization::HandshakeDeserializeInto;
        let block = test_block(7);
        let merkle_block = MerkleBlock::from_matches(&block, &[true, false, true, false, true, false, true]);
        let data = merkle_block
            .handshake_serialize_to_vec()
            .expect("merkle block should serialize");
        assert_eq!(data.len(), merkle_block.serialized_size());
        let merkle_block2: MerkleBlock = data
            .as_slice()
            .handshake_deserialize_into()
            .expect("merkle block should deserialize");
        assert_eq!(merkle_block, merkle_block2);
    }
}
