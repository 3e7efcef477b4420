//! The sled-backed chain store.
//!
//! One ordered keyspace holds every persisted record, keyed by a
//! single-byte tag (see `disk_format`). A block's worth of mutations is
//! applied as one `sled::Batch`, bracketed by an in-progress marker:
//! the marker is written (and flushed) before the batch, and the batch
//! itself clears it. If the process dies in between, the batch never
//! landed — startup recovery just clears the stale marker and the store
//! is still the previous consistent state.

pub(crate) mod disk_format;

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use handshake_serde_derive::{HnsDeserialize, HnsSerialize};
use hns_chain::{
    amount::Amount,
    block::{self, Block, Header, Height},
    covenant::NameHash,
    parameters::{genesis_block, Network},
    transaction::OutPoint,
    HandshakeDeserialize, HandshakeSerialize, SerializationError,
};

use crate::{
    coins::{BlockUndo, CoinEntry, CoinView},
    migrations,
    names::NameState,
    tree::Tree,
    Config, HashOrHeight, StoreError,
};

use disk_format::{de, hash_key, height_key, meta_key, name_key, outpoint_key, ser, tags};

/// The tip pointer and cumulative chain counters.
#[derive(Clone, Debug, Eq, PartialEq, HnsSerialize, HnsDeserialize)]
pub struct ChainState {
    pub tip: block::Hash,
    pub height: u32,
    pub tx_count: u64,
    pub coin_count: u64,
    pub burned: Amount,
}

/// A header as persisted: the header itself plus its chain position and
/// the cumulative work up to and including it.
#[derive(Clone, Debug, Eq, PartialEq, HnsSerialize, HnsDeserialize)]
pub struct HeaderRecord {
    pub header: Header,
    pub height: u32,
    /// Big-endian cumulative chain work.
    pub chain_work: [u8; 32],
}

/// The migration bookkeeping record.
#[derive(Clone, Debug, Default, Eq, PartialEq, HnsSerialize, HnsDeserialize)]
pub struct MigrationState {
    pub next_migration: u32,
    pub in_progress: bool,
    pub skipped: Vec<u32>,
}

/// Everything one block connect writes, assembled by the validation
/// pipeline and committed here in a single batch.
pub struct BlockWrite<'a> {
    pub block: &'a Block,
    pub height: u32,
    /// Big-endian cumulative work including this block.
    pub chain_work: [u8; 32],
    pub view: &'a CoinView,
    pub undo: &'a BlockUndo,
    pub names: &'a HashMap<NameHash, Option<NameState>>,
    pub tree_updates: &'a HashMap<NameHash, Option<Vec<u8>>>,
    pub new_tree: Tree,
    pub chain_state: ChainState,
}

/// Everything one block disconnect writes.
pub struct BlockUnwrite<'a> {
    pub hash: block::Hash,
    pub height: u32,
    pub view: &'a CoinView,
    pub names: &'a HashMap<NameHash, Option<NameState>>,
    pub tree_updates: &'a HashMap<NameHash, Option<Vec<u8>>>,
    pub new_tree: Tree,
    pub chain_state: ChainState,
}

pub struct ChainStore {
    pub(crate) db: sled::Db,
    network: Network,
    config: Config,
    tree: Tree,
}

impl ChainStore {
    /// Opens (or creates) the store for `network`, running crash
    /// recovery, pending migrations, and genesis initialization.
    pub fn open(config: Config, network: Network) -> Result<ChainStore, StoreError> {
        let db = config.sled_config(network).open()?;
        let mut store = ChainStore {
            db,
            network,
            config,
            tree: Tree::new(),
        };
        store.recover()?;
        migrations::run(&mut store)?;
        store.init_genesis()?;
        store.tree = store.load_tree()?;
        Ok(store)
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The current name tree.
    pub fn tree(&self) -> &Tree {
        &self.tree
    }

    fn recover(&self) -> Result<(), StoreError> {
        if self.db.remove(&meta_key(tags::WRITE_MARKER)[..])?.is_some() {
            // The batch that would have cleared this marker never
            // landed, so the store still holds the previous consistent
            // state.
            warn!("clearing stale in-progress write marker");
            self.db.flush()?;
        }
        Ok(())
    }

    fn init_genesis(&mut self) -> Result<(), StoreError> {
        if self.db.get(&meta_key(tags::CHAIN_STATE)[..])?.is_some() {
            return Ok(());
        }
        let genesis = genesis_block(self.network);
        let hash = genesis.hash();
        debug!(%hash, network = %self.network, "initializing chain store at genesis");

        let mut view = CoinView::new();
        let mut coin_count = 0u64;
        for tx in &genesis.transactions {
            view.add_tx(tx, 0);
            coin_count += tx.outputs.len() as u64;
        }
        let work = genesis
            .header
            .bits
            .to_expanded()
            .ok_or(StoreError::Corrupt("genesis difficulty is invalid"))?
            .to_work();
        let mut chain_work = [0u8; 32];
        work.0.to_big_endian(&mut chain_work);

        let names = HashMap::new();
        let tree_updates = HashMap::new();
        self.commit_connect(BlockWrite {
            block: &genesis,
            height: 0,
            chain_work,
            view: &view,
            undo: &BlockUndo::default(),
            names: &names,
            tree_updates: &tree_updates,
            new_tree: Tree::new(),
            chain_state: ChainState {
                tip: hash,
                height: 0,
                tx_count: genesis.transactions.len() as u64,
                coin_count,
                burned: Amount::ZERO,
            },
        })
    }

    fn load_tree(&self) -> Result<Tree, StoreError> {
        let mut leaves = Vec::new();
        for item in self.db.scan_prefix(&[tags::TREE_LEAF]) {
            let (key, value) = item?;
            if key.len() != 33 {
                return Err(StoreError::Corrupt("malformed tree leaf key"));
            }
            let mut hash = [0u8; 32];
            hash.copy_from_slice(&key[1..]);
            leaves.push((NameHash(hash), value.to_vec()));
        }
        Ok(Tree::from_leaves(leaves))
    }

    pub fn chain_state(&self) -> Result<ChainState, StoreError> {
        let bytes = self
            .db
            .get(&meta_key(tags::CHAIN_STATE)[..])?
            .ok_or(StoreError::Corrupt("missing chain state record"))?;
        de(&bytes)
    }

    pub fn tip(&self) -> Result<(Height, block::Hash), StoreError> {
        let state = self.chain_state()?;
        Ok((Height(state.height), state.tip))
    }

    pub fn header(&self, hash: &block::Hash) -> Result<Option<HeaderRecord>, StoreError> {
        match self.db.get(&hash_key(tags::HEADER, hash)[..])? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn hash_by_height(&self, height: u32) -> Result<Option<block::Hash>, StoreError> {
        match self.db.get(&height_key(tags::HASH_BY_HEIGHT, height)[..])? {
            Some(bytes) => {
                if bytes.len() != 32 {
                    return Err(StoreError::Corrupt("malformed hash-by-height record"));
                }
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&bytes);
                Ok(Some(block::Hash(hash)))
            }
            None => Ok(None),
        }
    }

    /// Whether `hash` is on the main chain (as opposed to a stored side
    /// chain header).
    pub fn is_main_chain(&self, hash: &block::Hash) -> Result<bool, StoreError> {
        match self.header(hash)? {
            Some(record) => Ok(self.hash_by_height(record.height)?.as_ref() == Some(hash)),
            None => Ok(false),
        }
    }

    pub fn block(&self, hash_or_height: HashOrHeight) -> Result<Option<Arc<Block>>, StoreError> {
        let hash = match hash_or_height {
            HashOrHeight::Hash(hash) => hash,
            HashOrHeight::Height(height) => match self.hash_by_height(height.0)? {
                Some(hash) => hash,
                None => return Ok(None),
            },
        };
        match self.db.get(&hash_key(tags::BLOCK, &hash)[..])? {
            Some(bytes) => Ok(Some(Arc::new(Block::handshake_deserialize(&bytes[..])?))),
            None => Ok(None),
        }
    }

    pub fn coin(&self, outpoint: &OutPoint) -> Result<Option<CoinEntry>, StoreError> {
        match self.db.get(&outpoint_key(outpoint)[..])? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn name(&self, name_hash: &NameHash) -> Result<Option<NameState>, StoreError> {
        match self.db.get(&name_key(tags::NAME, name_hash)[..])? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    pub fn undo(&self, hash: &block::Hash) -> Result<Option<BlockUndo>, StoreError> {
        match self.db.get(&hash_key(tags::UNDO, hash)[..])? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    /// The name-tree root as of the block at `height`.
    pub fn tree_root_at(&self, height: u32) -> Result<Option<[u8; 32]>, StoreError> {
        match self.db.get(&height_key(tags::TREE_ROOT, height)[..])? {
            Some(bytes) => {
                if bytes.len() != 32 {
                    return Err(StoreError::Corrupt("malformed tree root record"));
                }
                let mut root = [0u8; 32];
                root.copy_from_slice(&bytes);
                Ok(Some(root))
            }
            None => Ok(None),
        }
    }

    pub(crate) fn migration_state(&self) -> Result<Option<MigrationState>, StoreError> {
        match self.db.get(&meta_key(tags::MIGRATION)[..])? {
            Some(bytes) => Ok(Some(de(&bytes)?)),
            None => Ok(None),
        }
    }

    pub(crate) fn put_migration_state(&self, state: &MigrationState) -> Result<(), StoreError> {
        self.db.insert(&meta_key(tags::MIGRATION)[..], ser(state))?;
        self.db.flush()?;
        Ok(())
    }

    /// Atomically applies one connected block: headers, indexes, block
    /// bytes, the undo journal, the UTXO delta, name records, tree
    /// leaves and root history, and the chain-state record.
    pub fn commit_connect(&mut self, write: BlockWrite<'_>) -> Result<(), StoreError> {
        let hash = write.block.hash();
        self.db
            .insert(&meta_key(tags::WRITE_MARKER)[..], &hash.0[..])?;
        self.db.flush()?;

        let mut batch = sled::Batch::default();
        let record = HeaderRecord {
            header: write.block.header,
            height: write.height,
            chain_work: write.chain_work,
        };
        batch.insert(&hash_key(tags::HEADER, &hash)[..], ser(&record));
        batch.insert(
            &height_key(tags::HASH_BY_HEIGHT, write.height)[..],
            &hash.0[..],
        );
        batch.insert(&hash_key(tags::BLOCK, &hash)[..], ser(write.block));
        batch.insert(&hash_key(tags::UNDO, &hash)[..], ser(write.undo));
        self.batch_common(&mut batch, write.view, write.names, write.tree_updates);
        batch.insert(
            &height_key(tags::TREE_ROOT, write.height)[..],
            &write.new_tree.root()[..],
        );
        batch.insert(&meta_key(tags::CHAIN_STATE)[..], ser(&write.chain_state));
        batch.remove(&meta_key(tags::WRITE_MARKER)[..]);

        self.db.apply_batch(batch)?;
        self.db.flush()?;
        self.tree = write.new_tree;

        trace!(%hash, height = write.height, "committed block");
        self.prune(write.height)?;
        Ok(())
    }

    /// Atomically reverts the tip block: drops its height index, undo
    /// record and tree-root entry, and restores coins and name records
    /// from the journals. Header and block bytes stay, as side-chain
    /// data for a possible reconnect.
    pub fn commit_disconnect(&mut self, unwrite: BlockUnwrite<'_>) -> Result<(), StoreError> {
        self.db
            .insert(&meta_key(tags::WRITE_MARKER)[..], &unwrite.hash.0[..])?;
        self.db.flush()?;

        let mut batch = sled::Batch::default();
        batch.remove(&height_key(tags::HASH_BY_HEIGHT, unwrite.height)[..]);
        batch.remove(&hash_key(tags::UNDO, &unwrite.hash)[..]);
        batch.remove(&height_key(tags::TREE_ROOT, unwrite.height)[..]);
        self.batch_common(&mut batch, unwrite.view, unwrite.names, unwrite.tree_updates);
        batch.insert(&meta_key(tags::CHAIN_STATE)[..], ser(&unwrite.chain_state));
        batch.remove(&meta_key(tags::WRITE_MARKER)[..]);

        self.db.apply_batch(batch)?;
        self.db.flush()?;
        self.tree = unwrite.new_tree;

        trace!(hash = %unwrite.hash, height = unwrite.height, "disconnected block");
        Ok(())
    }

    fn batch_common(
        &self,
        batch: &mut sled::Batch,
        view: &CoinView,
        names: &HashMap<NameHash, Option<NameState>>,
        tree_updates: &HashMap<NameHash, Option<Vec<u8>>>,
    ) {
        for (outpoint, entry) in view.entries() {
            match entry {
                Some(entry) => batch.insert(&outpoint_key(outpoint)[..], ser(entry)),
                None => batch.remove(&outpoint_key(outpoint)[..]),
            }
        }
        for (name_hash, state) in names {
            match state {
                Some(state) => batch.insert(&name_key(tags::NAME, name_hash)[..], ser(state)),
                None => batch.remove(&name_key(tags::NAME, name_hash)[..]),
            }
        }
        for (name_hash, leaf) in tree_updates {
            match leaf {
                Some(leaf) => {
                    batch.insert(&name_key(tags::TREE_LEAF, name_hash)[..], leaf.clone())
                }
                None => batch.remove(&name_key(tags::TREE_LEAF, name_hash)[..]),
            }
        }
    }

    fn prune(&self, height: u32) -> Result<(), StoreError> {
        if !self.config.prune {
            return Ok(());
        }
        let target = match height.checked_sub(self.config.keep_blocks) {
            Some(target) if target > self.config.prune_after_height => target,
            _ => return Ok(()),
        };
        if let Some(hash) = self.hash_by_height(target)? {
            let mut batch = sled::Batch::default();
            batch.remove(&hash_key(tags::BLOCK, &hash)[..]);
            batch.remove(&hash_key(tags::UNDO, &hash)[..]);
            self.db.apply_batch(batch)?;
            trace!(height = target, "pruned block and undo data");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hns_chain::parameters::genesis_hash;
    use tempdir::TempDir;

    fn test_config(dir: &TempDir) -> Config {
        Config {
            cache_dir: dir.path().to_path_buf(),
            ephemeral: false,
            ..Config::default()
        }
    }

    #[test]
    fn opens_at_genesis() {
        hns_test::init();

        let dir = TempDir::new("hns-state-test").unwrap();
        let store = ChainStore::open(test_config(&dir), Network::Regtest).unwrap();

        let state = store.chain_state().unwrap();
        assert_eq!(state.height, 0);
        assert_eq!(state.tip, genesis_hash(Network::Regtest));
        assert_eq!(state.tx_count, 1);
        assert_eq!(state.coin_count, 1);
        assert_eq!(state.burned, Amount::ZERO);

        // The genesis coin is queryable.
        let genesis = genesis_block(Network::Regtest);
        let outpoint = OutPoint {
            hash: genesis.transactions[0].hash(),
            index: 0,
        };
        let coin = store.coin(&outpoint).unwrap().expect("genesis coin exists");
        assert!(coin.coinbase);
        assert_eq!(coin.height, 0);

        // The empty name tree root is recorded for height 0.
        assert_eq!(store.tree_root_at(0).unwrap(), Some([0u8; 32]));
        assert!(store.tree().is_empty());
    }

    #[test]
    fn reopen_preserves_state() {
        hns_test::init();

        let dir = TempDir::new("hns-state-test").unwrap();
        let tip = {
            let store = ChainStore::open(test_config(&dir), Network::Regtest).unwrap();
            store.tip().unwrap()
        };
        let store = ChainStore::open(test_config(&dir), Network::Regtest).unwrap();
        assert_eq!(store.tip().unwrap(), tip);
    }

    #[test]
    fn genesis_block_is_retrievable_both_ways() {
        hns_test::init();

        let dir = TempDir::new("hns-state-test").unwrap();
        let store = ChainStore::open(test_config(&dir), Network::Regtest).unwrap();

        let hash = genesis_hash(Network::Regtest);
        let by_hash = store.block(hash.into()).unwrap().expect("genesis stored");
        let by_height = store
            .block(Height(0).into())
            .unwrap()
            .expect("genesis indexed");
        assert_eq!(by_hash, by_height);
        assert_eq!(by_hash.hash(), hash);
        assert!(store.is_main_chain(&hash).unwrap());
    }

    #[test]
    fn stale_write_marker_is_cleared_on_open() {
        hns_test::init();

        let dir = TempDir::new("hns-state-test").unwrap();
        {
            let store = ChainStore::open(test_config(&dir), Network::Regtest).unwrap();
            // Simulate a crash between marker write and batch apply.
            store
                .db
                .insert(&meta_key(tags::WRITE_MARKER)[..], &[0u8; 32][..])
                .unwrap();
            store.db.flush().unwrap();
        }
        let store = ChainStore::open(test_config(&dir), Network::Regtest).unwrap();
        assert!(store
            .db
            .get(&meta_key(tags::WRITE_MARKER)[..])
            .unwrap()
            .is_none());
        // The store is still the pre-crash consistent state.
        assert_eq!(store.tip().unwrap().0, Height(0));
    }
}
