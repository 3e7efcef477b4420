//! Core consensus primitives for a Handshake-style chain: canonical
//! serialization, transactions with name covenants, the two-phase block
//! header hash, merkle commitments, and proof-of-work arithmetic.
#![allow(clippy::unit_arg)]

pub mod address;
pub mod amount;
pub mod block;
pub mod cached;
pub mod compactint;
pub mod covenant;
pub mod fmt;
pub mod inventory;
pub mod parameters;
pub mod serialization;
pub mod transaction;
pub mod work;

pub use serialization::{
    HandshakeDeserialize, HandshakeDeserializeInto, HandshakeSerialize, SerializationError,
};

/// The chain context a proptest strategy generates values against.
///
/// Passing this explicitly keeps generated blocks and transactions
/// consistent with each other (tip height, coinbase position, network).
#[cfg(any(test, feature = "proptest-impl"))]
#[derive(Debug, Clone, Copy, Default)]
pub struct LedgerState {
    pub tip_height: block::Height,
    pub is_coinbase: bool,
    pub network: parameters::Network,
}
