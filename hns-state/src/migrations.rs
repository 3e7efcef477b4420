//! Versioned, idempotent store upgrades.
//!
//! Each migration has an id, a `check` phase that decides whether any
//! work is needed, and a `migrate` phase that does it. On open, every
//! migration with an id at or past the store's `next_migration` runs in
//! id order under a crash-safe `in_progress` flag: a migration
//! interrupted mid-flight is simply re-run, so `migrate` must be
//! idempotent. Fresh stores skip straight past all known migrations.

use tracing::{info, warn};

use crate::chain_store::disk_format::{meta_key, ser, tags};
use crate::chain_store::{ChainStore, MigrationState};
use crate::StoreError;

/// What `check` decided about one migration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MigrationOp {
    /// The store needs the migration; run `migrate`.
    Migrate,
    /// The store is already in the target shape; record the migration as
    /// done without running it.
    Fake,
    /// The migration does not apply to this store (for example, a
    /// pruned-data rewrite on an unpruned store); record it as skipped.
    Skip,
}

pub trait Migration {
    fn id(&self) -> u32;
    fn name(&self) -> &'static str;
    fn check(&self, store: &ChainStore) -> Result<MigrationOp, StoreError>;
    fn migrate(&self, store: &mut ChainStore) -> Result<(), StoreError>;
}

/// All known migrations, in id order.
pub fn available_migrations() -> Vec<Box<dyn Migration>> {
    vec![Box::new(RecountChainState)]
}

/// The id one past the newest known migration.
fn latest_migration() -> u32 {
    available_migrations()
        .iter()
        .map(|migration| migration.id() + 1)
        .max()
        .unwrap_or(0)
}

pub(crate) fn run(store: &mut ChainStore) -> Result<(), StoreError> {
    let mut state = match store.migration_state()? {
        Some(state) => state,
        None => {
            // A store with no migration record is either brand new or
            // predates the record itself; a brand new store needs no
            // upgrades.
            let fresh = store.chain_state().is_err();
            let state = MigrationState {
                next_migration: if fresh { latest_migration() } else { 0 },
                in_progress: false,
                skipped: Vec::new(),
            };
            store.put_migration_state(&state)?;
            state
        }
    };

    if state.in_progress {
        // A previous run died mid-migration; the pending migration is
        // re-run from scratch below.
        warn!(
            next_migration = state.next_migration,
            "resuming interrupted migration"
        );
    }

    for migration in available_migrations() {
        if migration.id() < state.next_migration {
            continue;
        }
        match migration.check(store)? {
            MigrationOp::Skip => {
                info!(id = migration.id(), name = migration.name(), "skipping migration");
                state.skipped.push(migration.id());
            }
            MigrationOp::Fake => {
                info!(id = migration.id(), name = migration.name(), "faking migration");
            }
            MigrationOp::Migrate => {
                info!(id = migration.id(), name = migration.name(), "running migration");
                state.in_progress = true;
                store.put_migration_state(&state)?;
                migration.migrate(store)?;
                state.in_progress = false;
            }
        }
        state.next_migration = migration.id() + 1;
        store.put_migration_state(&state)?;
    }

    Ok(())
}

/// Migration 0: rebuild the chain-state coin counter by scanning the
/// UTXO records. Repairs stores written before the counter existed (and
/// doubles as the reference for what a migration looks like).
struct RecountChainState;

impl Migration for RecountChainState {
    fn id(&self) -> u32 {
        0
    }

    fn name(&self) -> &'static str {
        "recount chain state"
    }

    fn check(&self, store: &ChainStore) -> Result<MigrationOp, StoreError> {
        let state = match store.chain_state() {
            Ok(state) => state,
            // Nothing to recount on an uninitialized store.
            Err(_) => return Ok(MigrationOp::Skip),
        };
        if state.coin_count == 0 && count_coins(store)? != 0 {
            Ok(MigrationOp::Migrate)
        } else {
            Ok(MigrationOp::Fake)
        }
    }

    fn migrate(&self, store: &mut ChainStore) -> Result<(), StoreError> {
        let mut state = store.chain_state()?;
        state.coin_count = count_coins(store)?;
        store
            .db
            .insert(&meta_key(tags::CHAIN_STATE)[..], ser(&state))?;
        store.db.flush()?;
        Ok(())
    }
}

fn count_coins(store: &ChainStore) -> Result<u64, StoreError> {
    let mut count = 0u64;
    for item in store.db.scan_prefix(&[tags::COIN]) {
        let _ = item?;
        count += 1;
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use hns_chain::parameters::Network;
    use tempdir::TempDir;

    #[test]
    fn fresh_store_skips_all_migrations() {
        hns_test::init();

        let dir = TempDir::new("hns-migrations-test").unwrap();
        let config = Config {
            cache_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        let store = ChainStore::open(config, Network::Regtest).unwrap();
        let state = store.migration_state().unwrap().expect("record written");
        assert_eq!(state.next_migration, latest_migration());
        assert!(!state.in_progress);
    }

    #[test]
    fn reopen_does_not_rerun() {
        hns_test::init();

        let dir = TempDir::new("hns-migrations-test").unwrap();
        let config = Config {
            cache_dir: dir.path().to_path_buf(),
            ..Config::default()
        };
        {
            ChainStore::open(config.clone(), Network::Regtest).unwrap();
        }
        let store = ChainStore::open(config, Network::Regtest).unwrap();
        let state = store.migration_state().unwrap().expect("record persists");
        assert_eq!(state.next_migration, latest_migration());
        assert!(state.skipped.is_empty());
    }
}
