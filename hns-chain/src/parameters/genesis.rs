//! Genesis blocks for each Handshake network.

use std::sync::Arc;

use lazy_static::lazy_static;

use crate::{
    address::Address,
    amount::Amount,
    block::{self, merkle, Block, Header},
    covenant::Covenant,
    parameters::Network,
    transaction::{Input, OutPoint, Output, Transaction, Witness, SEQUENCE_FINAL},
    work::difficulty::ExpandedDifficulty,
};

/// The previous block hash for the genesis block.
///
/// All networks use the `null` value for the parent of the genesis block.
pub const GENESIS_PREVIOUS_BLOCK_HASH: block::Hash = block::Hash([0; 32]);

/// The message committed in every genesis coinbase witness.
const GENESIS_WITNESS_MESSAGE: &[u8] = b"A peer-to-peer root zone";

fn genesis_time(network: Network) -> u64 {
    match network {
        Network::Mainnet => 1_580_745_600,
        Network::Testnet => 1_580_745_601,
        Network::Regtest => 1_580_745_602,
        Network::Simnet => 1_580_745_603,
    }
}

/// Constructs the genesis block for `network` from first principles: an
/// unspendable-by-construction coinbase paying zero to the all-zero
/// program, roots computed from that coinbase, an empty (all-zero) name
/// tree root, and the network's proof-of-work limit as `bits`.
fn make_genesis(network: Network) -> Block {
    let address = Address::new(0, vec![0u8; 20]).expect("the null program is a valid address");
    let mut coinbase = Transaction::new(
        0,
        vec![Input {
            prevout: OutPoint::null(),
            sequence: SEQUENCE_FINAL,
            witness: Witness(vec![GENESIS_WITNESS_MESSAGE.to_vec()]),
        }],
        vec![Output {
            value: Amount::ZERO,
            address,
            covenant: Covenant::none(),
        }],
        // Coinbase locktime records the height.
        0,
    );
    coinbase.cache_hashes();

    let merkle_root: merkle::Root = [coinbase.hash()].iter().cloned().collect();
    let witness_root: merkle::Root = [coinbase.witness_hash()].iter().cloned().collect();

    let header = Header::new(
        0,
        genesis_time(network),
        GENESIS_PREVIOUS_BLOCK_HASH,
        [0; 32],
        [0; 24],
        [0; 32],
        witness_root,
        merkle_root,
        0,
        ExpandedDifficulty::pow_limit_bits(network),
        [0; 32],
    );

    Block {
        header,
        transactions: vec![Arc::new(coinbase)],
    }
}

lazy_static! {
    static ref MAINNET_GENESIS: Arc<Block> = Arc::new(make_genesis(Network::Mainnet));
    static ref TESTNET_GENESIS: Arc<Block> = Arc::new(make_genesis(Network::Testnet));
    static ref REGTEST_GENESIS: Arc<Block> = Arc::new(make_genesis(Network::Regtest));
    static ref SIMNET_GENESIS: Arc<Block> = Arc::new(make_genesis(Network::Simnet));
    static ref MAINNET_GENESIS_HASH: block::Hash = MAINNET_GENESIS.hash();
    static ref TESTNET_GENESIS_HASH: block::Hash = TESTNET_GENESIS.hash();
    static ref REGTEST_GENESIS_HASH: block::Hash = REGTEST_GENESIS.hash();
    static ref SIMNET_GENESIS_HASH: block::Hash = SIMNET_GENESIS.hash();
}

/// Returns the genesis block for `network`.
pub fn genesis_block(network: Network) -> Arc<Block> {
    match network {
        Network::Mainnet => MAINNET_GENESIS.clone(),
        Network::Testnet => TESTNET_GENESIS.clone(),
        Network::Regtest => REGTEST_GENESIS.clone(),
        Network::Simnet => SIMNET_GENESIS.clone(),
    }
}

/// Returns the hash of the genesis block for `network`.
pub fn genesis_hash(network: Network) -> block::Hash {
    match network {
        Network::Mainnet => *MAINNET_GENESIS_HASH,
        Network::Testnet => *TESTNET_GENESIS_HASH,
        Network::Regtest => *REGTEST_GENESIS_HASH,
        Network::Simnet => *SIMNET_GENESIS_HASH,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn genesis_structure() {
        hns_test::init();

        for &network in &[
            Network::Mainnet,
            Network::Testnet,
            Network::Regtest,
            Network::Simnet,
        ] {
            let genesis = genesis_block(network);
            assert_eq!(genesis.transactions.len(), 1);
            assert!(genesis.transactions[0].is_coinbase());
            assert_eq!(genesis.coinbase_height(), Some(block::Height(0)));
            assert_eq!(genesis.header.prev_block, GENESIS_PREVIOUS_BLOCK_HASH);
            assert_eq!(genesis.header.tree_root, [0; 32]);
            assert_eq!(genesis.header.merkle_root, genesis.merkle_root());
            assert_eq!(genesis.header.witness_root, genesis.witness_root());
            assert_eq!(genesis.hash(), genesis_hash(network));
        }
    }

    #[test]
    fn genesis_hashes_are_distinct() {
        hns_test::init();

        use std::collections::HashSet;
        let hashes: HashSet<block::Hash> = [
            Network::Mainnet,
            Network::Testnet,
            Network::Regtest,
            Network::Simnet,
        ]
        .iter()
        .map(|&network| genesis_hash(network))
        .collect();
        assert_eq!(hashes.len(), 4);
    }

    #[test]
    fn genesis_roundtrips() {
        hns_test::init();

        use crate::serialization::{HandshakeDeserializeInto, HandshakeSerialize};
        let genesis = genesis_block(Network::Regtest);
        let bytes = genesis
            .handshake_serialize_to_vec()
            .expect("genesis should serialize");
        let decoded: Block = bytes
            .as_slice()
            .handshake_deserialize_into()
            .expect("genesis should deserialize");
        assert_eq!(*genesis, decoded);
        assert_eq!(genesis.hash(), decoded.hash());
    }
}
