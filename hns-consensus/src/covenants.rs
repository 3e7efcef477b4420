//! The name-auction state machine.
//!
//! Covenants on transaction outputs drive each name through
//! `opening -> bidding -> revealing -> closed`, then through ownership
//! operations on the registered name. Linked covenants (REVEAL onward)
//! must spend the prior covenant output of the same name at the *same
//! input index* as the output that continues it, which keeps the chain
//! of custody checkable with nothing but the spent coin.
//!
//! Every name's record is snapshotted into the undo journal the first
//! time a block touches it, so disconnects restore both the record and
//! the tree leaf exactly.

use std::collections::HashMap;

use hns_chain::{
    address::Address,
    amount::Amount,
    block,
    covenant::{self, CovenantType, NameHash},
    parameters::Network,
    serialization::blake2b,
    transaction::{OutPoint, Transaction},
};
use hns_state::{ChainStore, CoinEntry, NamePhase, NameState, NameUndo};

use crate::error::{ChainError, CovenantError};

/// The per-block working set of name records: store-backed reads,
/// in-memory writes, prior snapshots collected for undo.
#[derive(Debug, Default)]
pub struct NameView {
    states: HashMap<NameHash, Option<NameState>>,
    undo: Vec<(NameHash, Option<NameState>)>,
}

impl NameView {
    pub fn new() -> NameView {
        NameView::default()
    }

    /// The working record for `name_hash`, loading it from the store
    /// (and snapshotting it for undo) on first touch.
    fn entry(
        &mut self,
        store: &ChainStore,
        name_hash: NameHash,
    ) -> Result<&mut Option<NameState>, ChainError> {
        use std::collections::hash_map::Entry;
        match self.states.entry(name_hash) {
            Entry::Occupied(occupied) => Ok(occupied.into_mut()),
            Entry::Vacant(vacant) => {
                let prior = store.name(&name_hash)?;
                self.undo.push((name_hash, prior.clone()));
                Ok(vacant.insert(prior))
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// The final records and the undo journal, in first-touch order.
    pub fn into_parts(self) -> (HashMap<NameHash, Option<NameState>>, NameUndo) {
        (self.states, NameUndo { entries: self.undo })
    }

    /// The tree-leaf delta implied by the final records.
    pub fn tree_updates(&self) -> HashMap<NameHash, Option<Vec<u8>>> {
        self.states
            .iter()
            .map(|(name_hash, state)| {
                (*name_hash, state.as_ref().and_then(NameState::tree_leaf))
            })
            .collect()
    }
}

/// The covenant types allowed to spend a coin carrying `prev`.
///
/// `None` in the result means the coin is freely spendable (its covenant
/// has no further obligations).
fn successors(prev: CovenantType) -> Option<&'static [CovenantType]> {
    use CovenantType::*;
    match prev {
        None | Open | Redeem => Option::None,
        Claim => Some(&[Register, Revoke]),
        Bid => Some(&[Reveal]),
        Reveal => Some(&[Redeem, Register]),
        Register | Update | Renew | Finalize => Some(&[Update, Renew, Transfer, Revoke]),
        Transfer => Some(&[Finalize, Revoke]),
        // Revoked outputs are permanently unspendable.
        Revoke => Some(&[]),
    }
}

/// The blinded-bid commitment: `BLAKE2b-256(value_le64 || nonce)`.
pub fn blind_bid(value: Amount, nonce: &[u8]) -> [u8; 32] {
    blake2b::multi256(&[&value.value().to_le_bytes(), nonce])
}

/// Applies the covenants of one transaction to the name view, in output
/// order. `spent` holds the coins consumed by the transaction's inputs,
/// in input order (empty for a coinbase). Returns the value this
/// transaction burns (the Vickrey prices locked by its REGISTERs).
pub fn apply_tx(
    network: Network,
    store: &ChainStore,
    names: &mut NameView,
    tx: &Transaction,
    spent: &[CoinEntry],
    height: u32,
) -> Result<Amount, ChainError> {
    // Every name coin consumed must be continued by a matching output.
    for (index, coin) in spent.iter().enumerate() {
        check_continuation(tx, index, coin)?;
    }

    let mut burned = Amount::ZERO;
    let tx_hash = tx.hash();

    for (index, output) in tx.outputs.iter().enumerate() {
        let cov = &output.covenant;
        if !cov.is_name() {
            continue;
        }
        let name_hash = cov
            .name_hash()
            .map_err(|_| ChainError::covenant(NameHash([0; 32]), CovenantError::Malformed))?;
        let fail = |source| ChainError::covenant(name_hash, source);

        let new_owner = OutPoint {
            hash: tx_hash,
            index: index as u32,
        };

        // The coin consumed by the same-index input, for linked types.
        let linked = if cov.is_linked() {
            let coin = spent.get(index).ok_or_else(|| fail(CovenantError::WrongLinkage))?;
            if !coin.covenant.is_name()
                || coin.covenant.name_hash().map_err(|_| fail(CovenantError::Malformed))?
                    != name_hash
            {
                return Err(fail(CovenantError::WrongLinkage));
            }
            Some((tx.inputs[index].prevout, coin))
        } else {
            Option::None
        };

        match cov.kind {
            CovenantType::None => unreachable!("filtered above"),

            CovenantType::Claim => {
                let name = cov.item_bytes(2).map_err(|_| fail(CovenantError::Malformed))?;
                check_name(name, &name_hash).map_err(fail)?;
                let entry = names.entry(store, name_hash)?;
                check_available(entry, network, height).map_err(fail)?;
                *entry = Some(NameState::claim(name.to_vec(), height, new_owner));
            }

            CovenantType::Open => {
                if cov.start_height().map_err(|_| fail(CovenantError::Malformed))? != 0 {
                    return Err(fail(CovenantError::WrongStartHeight));
                }
                let name = cov.item_bytes(2).map_err(|_| fail(CovenantError::Malformed))?;
                check_name(name, &name_hash).map_err(fail)?;
                if !output.value.is_zero() {
                    return Err(fail(CovenantError::WrongPrice));
                }
                let entry = names.entry(store, name_hash)?;
                check_available(entry, network, height).map_err(fail)?;
                *entry = Some(NameState::open(name.to_vec(), height));
            }

            CovenantType::Bid => {
                let start = cov.start_height().map_err(|_| fail(CovenantError::Malformed))?;
                // The blind must at least be shaped like a digest; its
                // value is only checkable at reveal time.
                cov.item_hash(3).map_err(|_| fail(CovenantError::Malformed))?;
                let entry = names.entry(store, name_hash)?;
                let state = live_state(entry, network, height).map_err(fail)?;
                if start != state.height {
                    return Err(fail(CovenantError::WrongStartHeight));
                }
                if state.phase(network, height) != NamePhase::Bidding {
                    return Err(fail(CovenantError::NotInBiddingWindow));
                }
            }

            CovenantType::Reveal => {
                let start = cov.start_height().map_err(|_| fail(CovenantError::Malformed))?;
                let nonce = cov.item_hash(2).map_err(|_| fail(CovenantError::Malformed))?;
                let (_, coin) = linked.expect("linked is Some for linked covenants");
                if coin.covenant.kind != CovenantType::Bid {
                    return Err(fail(CovenantError::WrongLinkage));
                }
                let committed = coin
                    .covenant
                    .item_hash(3)
                    .map_err(|_| fail(CovenantError::Malformed))?;
                if blind_bid(output.value, &nonce) != committed {
                    return Err(fail(CovenantError::BlindMismatch));
                }
                if output.value > coin.value {
                    return Err(fail(CovenantError::RevealValueTooLarge));
                }

                let entry = names.entry(store, name_hash)?;
                let state = live_state(entry, network, height).map_err(fail)?;
                if start != state.height {
                    return Err(fail(CovenantError::WrongStartHeight));
                }
                if state.phase(network, height) != NamePhase::Revealing {
                    return Err(fail(CovenantError::NotInRevealWindow));
                }

                // Second-price bookkeeping.
                if output.value > state.highest {
                    state.value = state.highest;
                    state.highest = output.value;
                    state.owner = new_owner;
                } else if output.value > state.value {
                    state.value = output.value;
                }
            }

            CovenantType::Redeem => {
                let (outpoint, coin) = linked.expect("linked is Some for linked covenants");
                if coin.covenant.kind != CovenantType::Reveal {
                    return Err(fail(CovenantError::WrongLinkage));
                }
                let entry = names.entry(store, name_hash)?;
                let state = existing_state(entry).map_err(fail)?;
                if state.phase(network, height) != NamePhase::Closed {
                    return Err(fail(CovenantError::AuctionNotClosed));
                }
                if outpoint == state.owner {
                    return Err(fail(CovenantError::WinnerCannotRedeem));
                }
            }

            CovenantType::Register => {
                let (outpoint, coin) = linked.expect("linked is Some for linked covenants");
                if coin.covenant.kind != CovenantType::Reveal
                    && coin.covenant.kind != CovenantType::Claim
                {
                    return Err(fail(CovenantError::WrongLinkage));
                }
                let resource = cov.item_bytes(2).map_err(|_| fail(CovenantError::Malformed))?;
                if resource.len() > covenant::MAX_RESOURCE_SIZE {
                    return Err(fail(CovenantError::OversizedResource));
                }
                let target = cov.item_hash(3).map_err(|_| fail(CovenantError::Malformed))?;
                check_renewal_target(store, network, target, height, &fail)?;

                let entry = names.entry(store, name_hash)?;
                let state = live_state(entry, network, height).map_err(fail)?;
                if state.phase(network, height) != NamePhase::Closed {
                    return Err(fail(CovenantError::AuctionNotClosed));
                }
                if outpoint != state.owner {
                    return Err(fail(CovenantError::NotOwner));
                }
                // The winner pays the second-highest reveal; that value
                // stays locked in the name output forever.
                if output.value != state.value {
                    return Err(fail(CovenantError::WrongPrice));
                }

                state.registered = true;
                state.data = resource.to_vec();
                state.renewal = height;
                state.transfer = 0;
                state.owner = new_owner;
                burned = burned
                    .checked_add(state.value)
                    .map_err(crate::error::TransactionError::Amount)
                    .map_err(ChainError::Transaction)?;
            }

            CovenantType::Update => {
                let (outpoint, coin) = linked.expect("linked is Some for linked covenants");
                let resource = cov.item_bytes(2).map_err(|_| fail(CovenantError::Malformed))?;
                if resource.len() > covenant::MAX_RESOURCE_SIZE {
                    return Err(fail(CovenantError::OversizedResource));
                }
                let entry = names.entry(store, name_hash)?;
                let state =
                    owned_state(entry, network, height, outpoint, coin, output.value)
                        .map_err(fail)?;
                if state.transfer != 0 {
                    return Err(fail(CovenantError::TransferPending));
                }
                state.data = resource.to_vec();
                state.owner = new_owner;
            }

            CovenantType::Renew => {
                let (outpoint, coin) = linked.expect("linked is Some for linked covenants");
                let target = cov.item_hash(2).map_err(|_| fail(CovenantError::Malformed))?;
                check_renewal_target(store, network, target, height, &fail)?;
                let entry = names.entry(store, name_hash)?;
                let state =
                    owned_state(entry, network, height, outpoint, coin, output.value)
                        .map_err(fail)?;
                if state.transfer != 0 {
                    return Err(fail(CovenantError::TransferPending));
                }
                state.renewal = height;
                state.owner = new_owner;
            }

            CovenantType::Transfer => {
                let (outpoint, coin) = linked.expect("linked is Some for linked covenants");
                let version = cov.item_u8(2).map_err(|_| fail(CovenantError::Malformed))?;
                let target = cov.item_bytes(3).map_err(|_| fail(CovenantError::Malformed))?;
                // The destination must itself be a representable address.
                Address::new(version, target.to_vec())
                    .map_err(|_| fail(CovenantError::Malformed))?;
                let entry = names.entry(store, name_hash)?;
                let state =
                    owned_state(entry, network, height, outpoint, coin, output.value)
                        .map_err(fail)?;
                if state.transfer != 0 {
                    return Err(fail(CovenantError::TransferPending));
                }
                state.transfer = height;
                state.owner = new_owner;
            }

            CovenantType::Finalize => {
                let (outpoint, coin) = linked.expect("linked is Some for linked covenants");
                if coin.covenant.kind != CovenantType::Transfer {
                    return Err(fail(CovenantError::WrongLinkage));
                }
                let resource = cov.item_bytes(5).map_err(|_| fail(CovenantError::Malformed))?;
                if resource.len() > covenant::MAX_RESOURCE_SIZE {
                    return Err(fail(CovenantError::OversizedResource));
                }

                let entry = names.entry(store, name_hash)?;
                let state = existing_state(entry).map_err(fail)?;
                if outpoint != state.owner {
                    return Err(fail(CovenantError::NotOwner));
                }
                if state.transfer == 0 {
                    return Err(fail(CovenantError::NoTransfer));
                }
                if height < state.transfer + network.transfer_lockup() {
                    return Err(fail(CovenantError::TransferLocked));
                }
                if output.value != coin.value {
                    return Err(fail(CovenantError::WrongPrice));
                }
                // The destination was fixed by the TRANSFER covenant.
                let version = coin
                    .covenant
                    .item_u8(2)
                    .map_err(|_| fail(CovenantError::Malformed))?;
                let target = coin
                    .covenant
                    .item_bytes(3)
                    .map_err(|_| fail(CovenantError::Malformed))?;
                if output.address.version() != version || output.address.hash() != target {
                    return Err(fail(CovenantError::WrongFinalizeAddress));
                }

                state.data = resource.to_vec();
                state.renewal = height;
                state.transfer = 0;
                state.owner = new_owner;
            }

            CovenantType::Revoke => {
                let (outpoint, coin) = linked.expect("linked is Some for linked covenants");
                let entry = names.entry(store, name_hash)?;
                let state = existing_state(entry).map_err(fail)?;
                if outpoint != state.owner {
                    return Err(fail(CovenantError::NotOwner));
                }
                if output.value != coin.value {
                    return Err(fail(CovenantError::WrongPrice));
                }
                state.revoked = height;
                state.transfer = 0;
                state.owner = OutPoint::null();
            }
        }
    }

    Ok(burned)
}

/// Every spent name coin must be continued by a same-index output with a
/// matching name and a legal successor covenant.
fn check_continuation(tx: &Transaction, index: usize, coin: &CoinEntry) -> Result<(), ChainError> {
    let allowed = match successors(coin.covenant.kind) {
        Some(allowed) => allowed,
        Option::None => return Ok(()),
    };
    let name_hash = coin
        .covenant
        .name_hash()
        .map_err(|_| ChainError::covenant(NameHash([0; 32]), CovenantError::Malformed))?;
    let fail = || ChainError::covenant(name_hash, CovenantError::CovenantUnfollowed);

    let output = tx.outputs.get(index).ok_or_else(fail)?;
    if !allowed.contains(&output.covenant.kind) {
        return Err(fail());
    }
    if output.covenant.name_hash().ok() != Some(name_hash) {
        return Err(fail());
    }
    Ok(())
}

fn check_name(name: &[u8], name_hash: &NameHash) -> Result<(), CovenantError> {
    if !covenant::is_name_valid(name) {
        return Err(CovenantError::InvalidName);
    }
    if covenant::hash_name(name) != *name_hash {
        return Err(CovenantError::NameHashMismatch);
    }
    Ok(())
}

/// OPEN/CLAIM availability: no record, or an expired one.
fn check_available(
    entry: &Option<NameState>,
    network: Network,
    height: u32,
) -> Result<(), CovenantError> {
    match entry {
        Option::None => Ok(()),
        Some(state) if state.is_expired(network, height) => Ok(()),
        Some(_) => Err(CovenantError::NameNotAvailable),
    }
}

/// A record that must exist, in any phase.
fn existing_state(entry: &mut Option<NameState>) -> Result<&mut NameState, CovenantError> {
    entry.as_mut().ok_or(CovenantError::StateMissing)
}

/// A record that must exist and still be live (not expired, not
/// revoked).
fn live_state<'a>(
    entry: &'a mut Option<NameState>,
    network: Network,
    height: u32,
) -> Result<&'a mut NameState, CovenantError> {
    let state = entry.as_mut().ok_or(CovenantError::StateMissing)?;
    if state.is_revoked() {
        return Err(CovenantError::Revoked);
    }
    if state.is_expired(network, height) {
        return Err(CovenantError::NameExpired);
    }
    Ok(state)
}

/// A live, registered record whose current owner output is being spent,
/// with the locked value traveling intact.
fn owned_state<'a>(
    entry: &'a mut Option<NameState>,
    network: Network,
    height: u32,
    outpoint: OutPoint,
    coin: &CoinEntry,
    output_value: Amount,
) -> Result<&'a mut NameState, CovenantError> {
    use CovenantType::*;
    if !matches!(coin.covenant.kind, Register | Update | Renew | Finalize) {
        return Err(CovenantError::WrongLinkage);
    }
    let state = live_state(entry, network, height)?;
    if !state.registered {
        return Err(CovenantError::NotRegistered);
    }
    if outpoint != state.owner {
        return Err(CovenantError::NotOwner);
    }
    if output_value != coin.value {
        return Err(CovenantError::WrongPrice);
    }
    Ok(state)
}

/// REGISTER and RENEW must reference a main-chain block no older than
/// one renewal window, which pins the transaction to this chain.
fn check_renewal_target(
    store: &ChainStore,
    network: Network,
    target: [u8; 32],
    height: u32,
    fail: &dyn Fn(CovenantError) -> ChainError,
) -> Result<(), ChainError> {
    let hash = block::Hash(target);
    let record = match store.header(&hash)? {
        Some(record) => record,
        Option::None => return Err(fail(CovenantError::BadRenewalTarget)),
    };
    if !store.is_main_chain(&hash)? {
        return Err(fail(CovenantError::BadRenewalTarget));
    }
    if record.height < height.saturating_sub(network.renewal_window()) {
        return Err(fail(CovenantError::BadRenewalTarget));
    }
    Ok(())
}
