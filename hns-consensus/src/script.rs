//! The witness-verification seam.
//!
//! Script and signature execution (and DNSSEC claim-proof checking) sit
//! outside the chain core. The pipeline calls through this trait for
//! every spend; node builds plug in a real interpreter, and tests use
//! [`NoopVerifier`].

use thiserror::Error;

use hns_chain::transaction::Transaction;
use hns_state::CoinEntry;

/// A failed witness check for one input.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WitnessError {
    #[error("witness verification failed: {0}")]
    Invalid(&'static str),
}

/// Verifies the witness of `tx`'s input at `input_index` against the
/// coin it spends.
pub trait WitnessVerifier {
    fn verify(
        &self,
        tx: &Transaction,
        input_index: usize,
        coin: &CoinEntry,
    ) -> Result<(), WitnessError>;
}

/// Accepts every witness. The default for tests and for header-trusting
/// replay (initial sync below a checkpoint).
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopVerifier;

impl WitnessVerifier for NoopVerifier {
    fn verify(
        &self,
        _tx: &Transaction,
        _input_index: usize,
        _coin: &CoinEntry,
    ) -> Result<(), WitnessError> {
        Ok(())
    }
}
