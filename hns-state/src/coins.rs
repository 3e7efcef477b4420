//! The unspent-coin set: individual entries, the in-memory view a block
//! is validated against, exponent-based value compression for the disk
//! encoding, and the per-block undo journal.

pub mod compress;
mod entry;
mod undo;
mod view;

pub use entry::CoinEntry;
pub use undo::{BlockUndo, UndoCoins};
pub use view::{CoinView, CoinViewError};
