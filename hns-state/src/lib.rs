//! Persistent chain state: the UTXO set, per-block undo journals, name
//! records, the authenticated name tree, and the sled-backed chain store
//! that holds them all under one atomically-batched keyspace.

pub mod chain_store;
pub mod coins;
mod error;
pub mod migrations;
pub mod names;
pub mod tree;

use std::path::PathBuf;

use hns_chain::{block, parameters::Network};

pub use chain_store::{ChainState, ChainStore, HeaderRecord};
pub use coins::{BlockUndo, CoinEntry, CoinView, CoinViewError, UndoCoins};
pub use error::StoreError;
pub use names::{NamePhase, NameState, NameUndo};
pub use tree::Tree;

/// Configuration for the chain store.
///
/// A plain parameter bag: constructed once, passed explicitly, no global
/// state.
#[derive(Clone, Debug)]
pub struct Config {
    /// The root directory for databases; the network name is appended as
    /// a subdirectory.
    pub cache_dir: PathBuf,

    /// Use a temporary backing store that is discarded on drop. For
    /// tests.
    pub ephemeral: bool,

    /// Whether to delete old block and undo data.
    pub prune: bool,

    /// How many recent blocks to always keep when pruning.
    pub keep_blocks: u32,

    /// Never prune at or below this height.
    pub prune_after_height: u32,
}

impl Config {
    /// The sled configuration for this config and `network`.
    pub fn sled_config(&self, network: Network) -> sled::Config {
        let path = self.cache_dir.join(network.to_string());
        sled::Config::default()
            .path(path)
            .temporary(self.ephemeral)
    }

    /// An ephemeral config rooted in the system temp directory.
    pub fn ephemeral() -> Config {
        Config {
            cache_dir: std::env::temp_dir(),
            ephemeral: true,
            ..Config::default()
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            cache_dir: PathBuf::from("hns-state"),
            ephemeral: false,
            prune: false,
            keep_blocks: 288,
            prune_after_height: 1_000,
        }
    }
}

/// A block identifier: either a hash or a height.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum HashOrHeight {
    Hash(block::Hash),
    Height(block::Height),
}

impl From<block::Hash> for HashOrHeight {
    fn from(hash: block::Hash) -> Self {
        HashOrHeight::Hash(hash)
    }
}

impl From<block::Height> for HashOrHeight {
    fn from(height: block::Height) -> Self {
        HashOrHeight::Height(height)
    }
}
