//! The block connect/disconnect pipeline.
//!
//! Single-writer and strictly serialized on the tip: one connect or
//! disconnect at a time, each ending in one atomic store batch. A
//! failure anywhere before the batch leaves no visible mutation.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use primitive_types::U256;
use tracing::info;

use hns_chain::{
    amount::Amount,
    block::{Block, Hash, Header, Height},
    covenant::{CovenantType, NameHash},
    parameters::Network,
    transaction::OutPoint,
    work::difficulty::{CompactDifficulty, ExpandedDifficulty},
};
use hns_state::{
    chain_store::{BlockUnwrite, BlockWrite, HeaderRecord},
    BlockUndo, ChainState, ChainStore, CoinView, HashOrHeight, NameState, StoreError,
};

use crate::{
    block::{check, subsidy},
    covenants::{self, NameView},
    error::{BlockError, ChainError, TransactionError},
    script::{NoopVerifier, WitnessVerifier},
    transaction::check as tx_check,
};


pub struct Chain<V: WitnessVerifier = NoopVerifier> {
    store: ChainStore,
    network: Network,
    verifier: V,
    /// Blocks that arrived before their parent, indexed by the parent
    /// hash. Drained as the chain catches up to them.
    queued_by_prev_hash: HashMap<Hash, Arc<Block>>,
}

impl Chain<NoopVerifier> {
    pub fn new(store: ChainStore) -> Chain<NoopVerifier> {
        Chain::with_verifier(store, NoopVerifier)
    }
}

impl<V: WitnessVerifier> Chain<V> {
    pub fn with_verifier(store: ChainStore, verifier: V) -> Chain<V> {
        let network = store.network();
        Chain {
            store,
            network,
            verifier,
            queued_by_prev_hash: HashMap::new(),
        }
    }

    pub fn store(&self) -> &ChainStore {
        &self.store
    }

    pub fn network(&self) -> Network {
        self.network
    }

    pub fn tip(&self) -> Result<(Height, Hash), ChainError> {
        Ok(self.store.tip()?)
    }

    /// Queue a block for connection.
    ///
    /// Connects it immediately when it extends the tip, then keeps
    /// connecting any queued descendants. Blocks arriving out of order
    /// wait under their parent hash.
    pub fn queue(&mut self, block: Arc<Block>) -> Result<Vec<Hash>, ChainError> {
        self.queued_by_prev_hash
            .insert(block.header.prev_block, block);

        let mut connected = Vec::new();
        loop {
            let (_, tip_hash) = self.store.tip()?;
            let next = match self.queued_by_prev_hash.remove(&tip_hash) {
                Some(block) => block,
                None => break,
            };
            let hash = self.connect(next)?;
            metrics::counter!("chain.connected.block.count", 1);
            connected.push(hash);
        }

        metrics::gauge!(
            "chain.queued.block.count",
            self.queued_by_prev_hash.len() as _
        );
        Ok(connected)
    }

    /// Validate `block` against the current tip and commit it.
    pub fn connect(&mut self, block: Arc<Block>) -> Result<Hash, ChainError> {
        let (tip_height, tip_hash) = self.store.tip()?;
        if block.header.prev_block != tip_hash {
            return Err(if self.store.header(&block.header.prev_block)?.is_some() {
                BlockError::PrevBlockMismatch {
                    actual: block.header.prev_block,
                    expected: tip_hash,
                }
                .into()
            } else {
                ChainError::Orphan(block.hash())
            });
        }

        let height = tip_height.0 + 1;
        let hash = block.hash();
        let prev = self
            .store
            .header(&tip_hash)?
            .ok_or(StoreError::Corrupt("missing tip header"))?;
        let mtp = self.median_time_past(&tip_hash)?;

        self.check_header(&block.header, &prev, height, &hash, mtp)?;
        self.check_body(&block, height)?;

        let mut view = CoinView::new();
        let mut names = NameView::new();
        let mut undo = BlockUndo::default();
        let mut total_fees = Amount::ZERO;
        let mut burned = Amount::ZERO;
        let mut created = 0u64;
        let mut spent_count = 0u64;

        for (tx_index, tx) in block.transactions.iter().enumerate() {
            tx_check::is_sane(tx).map_err(ChainError::Transaction)?;

            if tx_index == 0 {
                // The coinbase spends nothing, but may carry claims.
                let burn =
                    covenants::apply_tx(self.network, &self.store, &mut names, tx, &[], height)?;
                burned = add(burned, burn)?;
                view.add_tx(tx, height as i32);
                created += tx.outputs.len() as u64;
                continue;
            }

            tx_check::locktime(tx, height, mtp).map_err(ChainError::Transaction)?;

            let mut spent = Vec::with_capacity(tx.inputs.len());
            for (input_index, input) in tx.inputs.iter().enumerate() {
                let outpoint = input.prevout;
                if !view.contains(&outpoint) {
                    match self.store.coin(&outpoint)? {
                        Some(entry) => view.add_entry(outpoint, entry),
                        None => return Err(TransactionError::MissingUtxo(outpoint).into()),
                    }
                }
                let entry = view.spend(&outpoint).map_err(TransactionError::from)?;
                self.verifier
                    .verify(tx, input_index, &entry)
                    .map_err(TransactionError::from)?;
                undo.coins.push(entry.clone());
                spent.push(entry);
            }
            spent_count += spent.len() as u64;

            let fee =
                tx_check::spends(tx, &spent, self.network, height).map_err(ChainError::Transaction)?;
            total_fees = add(total_fees, fee)?;

            let burn =
                covenants::apply_tx(self.network, &self.store, &mut names, tx, &spent, height)?;
            burned = add(burned, burn)?;

            view.add_tx(tx, height as i32);
            created += tx.outputs.len() as u64;
        }

        // The coinbase may claim at most the subsidy plus the fees paid
        // by this block's transactions.
        let coinbase_sum = block.transactions[0]
            .output_value_sum()
            .map_err(TransactionError::Amount)
            .map_err(ChainError::Transaction)?;
        let allowance = add(
            subsidy::block_subsidy(Height(height), self.network)
                .map_err(TransactionError::Amount)
                .map_err(ChainError::Transaction)?,
            total_fees,
        )?;
        if coinbase_sum > allowance {
            return Err(BlockError::ExcessCoinbaseValue.into());
        }

        // The header commits to the name tree after this block.
        let tree_updates = names.tree_updates();
        let new_tree = self.store.tree().with_updates(&tree_updates);
        if new_tree.root() != block.header.tree_root {
            return Err(BlockError::BadTreeRoot.into());
        }

        let prev_work = U256::from_big_endian(&prev.chain_work);
        let block_work = block
            .header
            .bits
            .to_expanded()
            .ok_or(BlockError::InvalidDifficulty(Height(height), hash))?
            .to_work();
        let mut chain_work = [0u8; 32];
        (prev_work + block_work.0).to_big_endian(&mut chain_work);

        let old_state = self.store.chain_state()?;
        let (names_map, name_undo) = names.into_parts();
        undo.names = name_undo;
        let chain_state = ChainState {
            tip: hash,
            height,
            tx_count: old_state.tx_count + block.transactions.len() as u64,
            coin_count: old_state.coin_count + created - spent_count,
            burned: add(old_state.burned, burned)?,
        };

        self.store.commit_connect(BlockWrite {
            block: &block,
            height,
            chain_work,
            view: &view,
            undo: &undo,
            names: &names_map,
            tree_updates: &tree_updates,
            new_tree,
            chain_state,
        })?;

        info!(%hash, height, "connected block");
        Ok(hash)
    }

    /// Disconnect the tip block, restoring the previous state from the
    /// undo journal, and return the new tip hash.
    pub fn disconnect(&mut self) -> Result<Hash, ChainError> {
        let (tip_height, tip_hash) = self.store.tip()?;
        if tip_height.0 == 0 {
            return Err(ChainError::DisconnectGenesis);
        }
        let height = tip_height.0;
        let block = self
            .store
            .block(HashOrHeight::Hash(tip_hash))?
            .ok_or(StoreError::Corrupt("missing tip block"))?;
        let mut undo = self
            .store
            .undo(&tip_hash)?
            .ok_or(ChainError::MissingUndo(tip_hash))?;

        let mut view = CoinView::new();
        let mut created = 0u64;
        let mut restored = 0u64;

        // Transactions in reverse, inputs in reverse: the undo journal
        // pops in exact reverse-spend order.
        for tx in block.transactions.iter().rev() {
            let tx_hash = tx.hash();
            for index in 0..tx.outputs.len() {
                view.remove(OutPoint {
                    hash: tx_hash,
                    index: index as u32,
                });
            }
            created += tx.outputs.len() as u64;
            if tx.is_coinbase() {
                continue;
            }
            for input in tx.inputs.iter().rev() {
                let entry = undo
                    .coins
                    .pop()
                    .ok_or_else(|| StoreError::Corrupt("undo journal shorter than block spends"))?;
                view.add_entry(input.prevout, entry);
                restored += 1;
            }
        }
        if !undo.coins.is_empty() {
            return Err(StoreError::Corrupt("undo journal longer than block spends").into());
        }

        let names_map: HashMap<NameHash, Option<NameState>> =
            undo.names.entries.iter().cloned().collect();
        let tree_updates: HashMap<NameHash, Option<Vec<u8>>> = names_map
            .iter()
            .map(|(name_hash, state)| (*name_hash, state.as_ref().and_then(NameState::tree_leaf)))
            .collect();
        let new_tree = self.store.tree().with_updates(&tree_updates);
        if let Some(prev_root) = self.store.tree_root_at(height - 1)? {
            if new_tree.root() != prev_root {
                return Err(StoreError::Corrupt("tree restore does not match recorded root").into());
            }
        }

        // Value locked by this block's registrations comes back.
        let mut unburned = Amount::ZERO;
        for tx in block.transactions.iter() {
            for output in &tx.outputs {
                if output.covenant.kind == CovenantType::Register {
                    unburned = add(unburned, output.value)?;
                }
            }
        }

        let old_state = self.store.chain_state()?;
        let chain_state = ChainState {
            tip: block.header.prev_block,
            height: height - 1,
            tx_count: old_state.tx_count - block.transactions.len() as u64,
            coin_count: old_state.coin_count - created + restored,
            burned: old_state
                .burned
                .checked_sub(unburned)
                .map_err(TransactionError::Amount)
                .map_err(ChainError::Transaction)?,
        };

        self.store.commit_disconnect(BlockUnwrite {
            hash: tip_hash,
            height,
            view: &view,
            names: &names_map,
            tree_updates: &tree_updates,
            new_tree,
            chain_state,
        })?;

        info!(hash = %tip_hash, height, "disconnected block");
        Ok(block.header.prev_block)
    }

    fn check_header(
        &self,
        header: &Header,
        prev: &HeaderRecord,
        height: u32,
        hash: &Hash,
        mtp: u64,
    ) -> Result<(), ChainError> {
        let expected_bits = self.next_bits(prev)?;
        if header.bits != expected_bits {
            return Err(BlockError::BitsMismatch {
                actual: header.bits.0,
                expected: expected_bits.0,
            }
            .into());
        }
        check::difficulty_is_valid(header, self.network, &Height(height), hash)?;

        if header.time <= mtp {
            return Err(BlockError::TimeTooOld {
                time: header.time,
                median: mtp,
            }
            .into());
        }
        check::time_is_valid_at(header, Utc::now(), &Height(height), hash)
            .map_err(BlockError::Time)?;
        Ok(())
    }

    fn check_body(&self, block: &Block, height: u32) -> Result<(), ChainError> {
        check::size_is_valid(block)?;
        check::coinbase_is_first(block)?;
        check::coinbase_height_is_valid(block, Height(height))?;
        check::merkle_root_validity(block)?;
        check::outpoints_are_unique(block)?;
        Ok(())
    }

    /// The median of the last (up to) 11 block timestamps ending at
    /// `from`.
    fn median_time_past(&self, from: &Hash) -> Result<u64, ChainError> {
        let mut times = Vec::with_capacity(11);
        let mut cursor = *from;
        for _ in 0..11 {
            let record = match self.store.header(&cursor)? {
                Some(record) => record,
                None => break,
            };
            times.push(record.header.time);
            if record.height == 0 {
                break;
            }
            cursor = record.header.prev_block;
        }
        times.sort_unstable();
        Ok(times[times.len() / 2])
    }

    /// The required `bits` for the block after `prev`: the previous
    /// target scaled by the damped actual timespan over the retarget
    /// window, capped at the network limit.
    fn next_bits(&self, prev: &HeaderRecord) -> Result<CompactDifficulty, ChainError> {
        if self.network.no_retargeting() {
            return Ok(ExpandedDifficulty::pow_limit_bits(self.network));
        }
        let window = self.network.pow_target_window();
        let spacing = self.network.pow_target_spacing();

        let mut first = prev.clone();
        let mut count = 0u32;
        while count < window && first.height > 0 {
            first = self
                .store
                .header(&first.header.prev_block)?
                .ok_or(StoreError::Corrupt("missing ancestor header"))?;
            count += 1;
        }
        if count == 0 {
            return Ok(prev.header.bits);
        }

        let expected = spacing * count as u64;
        let actual = prev
            .header
            .time
            .saturating_sub(first.header.time)
            .clamp(expected * 3 / 4, expected * 3 / 2);

        let prev_target = prev
            .header
            .bits
            .to_expanded()
            .ok_or_else(|| BlockError::InvalidDifficulty(Height(prev.height), prev.header.hash()))?;
        let limit = ExpandedDifficulty::target_difficulty_limit(self.network);
        // No overflow here: targets stay at or below the 2^224-ish
        // limit and the clamped timespan is far below 2^32.
        let next = ExpandedDifficulty::from_u256(
            prev_target.as_u256() * U256::from(actual) / U256::from(expected),
        );
        let next = if next > limit { limit } else { next };
        Ok(next.to_compact())
    }
}

fn add(a: Amount, b: Amount) -> Result<Amount, ChainError> {
    a.checked_add(b)
        .map_err(TransactionError::Amount)
        .map_err(ChainError::Transaction)
}
