use thiserror::Error;

use hns_chain::SerializationError;

/// An error from the chain store or its backing key-value database.
///
/// Store errors are never consensus verdicts: the caller retries,
/// recovers, or halts, but never bans a peer over one.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backing database failed
    #[error("store backend error: {0}")]
    Sled(#[from] sled::Error),

    /// A stored record did not decode; the database is damaged or from
    /// an incompatible version
    #[error("corrupt chain store: {0}")]
    Corrupt(&'static str),

    /// Encoding or decoding a stored record failed
    #[error("stored record serialization: {0}")]
    Serialization(#[from] SerializationError),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> StoreError {
        StoreError::Serialization(SerializationError::Io(err))
    }
}
