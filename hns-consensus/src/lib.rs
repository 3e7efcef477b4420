//! Consensus validation: stateless block and transaction checks, the
//! name-auction covenant rules, and the block connect/disconnect
//! pipeline that drives the chain store.

pub mod block;
pub mod chain;
pub mod covenants;
pub mod error;
pub mod parameters;
pub mod script;
pub mod transaction;

pub use chain::Chain;
pub use error::{BlockError, ChainError, CovenantError, ErrorKind, TransactionError};
pub use script::{NoopVerifier, WitnessVerifier};
