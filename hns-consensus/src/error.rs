//! The consensus error taxonomy.
//!
//! Every failure carries a stable [`ErrorKind`] plus a peer-scoring
//! severity. Validation errors abort the current block and leave the
//! tip untouched; store errors are transient and never a consensus
//! verdict; internal invariant violations are fatal and panic rather
//! than return.

use thiserror::Error;

use hns_chain::{
    amount,
    block::{self, BlockTimeError},
    covenant::NameHash,
    transaction::OutPoint,
    work::difficulty::ExpandedDifficulty,
    SerializationError,
};
use hns_state::{CoinViewError, StoreError};

use crate::script::WitnessError;

/// The stable classification of a consensus failure.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum ErrorKind {
    InvalidEncoding,
    InvalidHeader,
    InvalidBody,
    InvalidTx,
    InvalidCovenant,
    MissingUtxo,
    DoubleSpend,
    StateMismatch,
    StoreError,
}

#[derive(Error, Debug)]
pub enum SubsidyError {
    #[error("no coinbase transaction in block")]
    NoCoinbase,
}

#[derive(Error, Debug)]
pub enum TransactionError {
    #[error("transaction has no inputs")]
    NoInputs,

    #[error("transaction has no outputs")]
    NoOutputs,

    #[error("coinbase transaction is not the first transaction in its block")]
    CoinbasePosition,

    #[error("coinbase input found in non-coinbase transaction")]
    CoinbaseInputFound,

    #[error("transaction is too large")]
    OversizedTransaction,

    #[error("output or fee amount invalid: {0}")]
    Amount(#[from] amount::Error),

    #[error("transaction spends more than its inputs provide")]
    NegativeFee,

    #[error("spend references unknown outpoint {0:?}")]
    MissingUtxo(OutPoint),

    #[error("outpoint {0:?} is already spent")]
    DoubleSpend(OutPoint),

    #[error("coinbase spend of {0:?} has not matured")]
    ImmatureCoinbaseSpend(OutPoint),

    #[error("locktime has not been reached")]
    LockTime,

    #[error("malformed covenant on output {0}")]
    MalformedCovenant(usize),

    #[error(transparent)]
    Witness(#[from] WitnessError),
}

impl From<CoinViewError> for TransactionError {
    fn from(err: CoinViewError) -> TransactionError {
        match err {
            CoinViewError::NotFound(outpoint) => TransactionError::MissingUtxo(outpoint),
            CoinViewError::DoubleSpend(outpoint) => TransactionError::DoubleSpend(outpoint),
        }
    }
}

#[derive(Error, Debug)]
pub enum BlockError {
    #[error("block has no transactions")]
    NoTransactions,

    #[error("block is too large")]
    OversizedBlock,

    #[error("previous block hash {actual} does not match the chain tip {expected}")]
    PrevBlockMismatch {
        actual: block::Hash,
        expected: block::Hash,
    },

    #[error("block time {time} is not past the median time {median}")]
    TimeTooOld { time: u64, median: u64 },

    #[error(transparent)]
    Time(#[from] BlockTimeError),

    #[error("invalid difficulty threshold in block header {0:?} {1:?}")]
    InvalidDifficulty(block::Height, block::Hash),

    #[error("block {0:?} has a difficulty threshold {2:?} easier than the limit {3:?}")]
    TargetDifficultyLimit(
        block::Height,
        block::Hash,
        ExpandedDifficulty,
        ExpandedDifficulty,
    ),

    #[error("block {0:?} failed the difficulty filter: hash {1:?} is above the threshold {2:?}")]
    DifficultyFilter(block::Height, block::Hash, ExpandedDifficulty),

    #[error("header bits {actual:#010x} do not match the retarget value {expected:#010x}")]
    BitsMismatch { actual: u32, expected: u32 },

    #[error("block contains invalid merkle root, expected: {expected:?}, actual: {actual:?}")]
    BadMerkleRoot {
        actual: block::merkle::Root,
        expected: block::merkle::Root,
    },

    #[error("block contains invalid witness root, expected: {expected:?}, actual: {actual:?}")]
    BadWitnessRoot {
        actual: block::merkle::Root,
        expected: block::merkle::Root,
    },

    #[error("header tree root does not match the name tree")]
    BadTreeRoot,

    #[error("block contains duplicate transactions")]
    DuplicateTransaction,

    #[error("block spends the same outpoint twice")]
    DuplicateOutpoint,

    #[error("coinbase locktime does not record the block height")]
    BadCoinbaseHeight,

    #[error("coinbase pays more than the subsidy plus fees")]
    ExcessCoinbaseValue,

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error(transparent)]
    Subsidy(#[from] SubsidyError),
}

#[derive(Error, Debug)]
pub enum CovenantError {
    #[error("covenant items are malformed")]
    Malformed,

    #[error("name is not a valid auction name")]
    InvalidName,

    #[error("name hash does not match the committed name")]
    NameHashMismatch,

    #[error("name is not available")]
    NameNotAvailable,

    #[error("no auction state exists for this name")]
    StateMissing,

    #[error("name state has expired")]
    NameExpired,

    #[error("covenant start height does not match the auction")]
    WrongStartHeight,

    #[error("auction is not in its bidding window")]
    NotInBiddingWindow,

    #[error("auction is not in its reveal window")]
    NotInRevealWindow,

    #[error("auction has not closed")]
    AuctionNotClosed,

    #[error("covenant does not spend the required prior covenant output")]
    WrongLinkage,

    #[error("spent covenant output is not continued by a matching output")]
    CovenantUnfollowed,

    #[error("reveal does not match the bid blind")]
    BlindMismatch,

    #[error("reveal claims more than the bid lockup")]
    RevealValueTooLarge,

    #[error("covenant does not spend the current name owner")]
    NotOwner,

    #[error("winning reveal must register, not redeem")]
    WinnerCannotRedeem,

    #[error("output value does not carry the amount the covenant requires")]
    WrongPrice,

    #[error("resource blob is too large")]
    OversizedResource,

    #[error("renewal block reference is unknown, off-chain, or too old")]
    BadRenewalTarget,

    #[error("name is not registered")]
    NotRegistered,

    #[error("name has been revoked")]
    Revoked,

    #[error("a transfer is already pending")]
    TransferPending,

    #[error("no transfer is pending")]
    NoTransfer,

    #[error("transfer lockup has not elapsed")]
    TransferLocked,

    #[error("finalize pays the wrong address")]
    WrongFinalizeAddress,
}

/// The top-level pipeline error.
#[derive(Error, Debug)]
pub enum ChainError {
    #[error(transparent)]
    Block(#[from] BlockError),

    #[error(transparent)]
    Transaction(#[from] TransactionError),

    #[error("covenant for name {name_hash} rejected: {source}")]
    Covenant {
        name_hash: NameHash,
        #[source]
        source: CovenantError,
    },

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Encoding(#[from] SerializationError),

    #[error("block {0} does not extend the current tip")]
    Orphan(block::Hash),

    #[error("cannot disconnect the genesis block")]
    DisconnectGenesis,

    #[error("missing undo record for connected block {0}")]
    MissingUndo(block::Hash),
}

impl ChainError {
    /// The stable error kind, used by peer scoring outside this core.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ChainError::Block(BlockError::Transaction(err)) => transaction_kind(err),
            ChainError::Block(err) if err.is_body_error() => ErrorKind::InvalidBody,
            ChainError::Block(_) => ErrorKind::InvalidHeader,
            ChainError::Transaction(err) => transaction_kind(err),
            ChainError::Covenant { .. } => ErrorKind::InvalidCovenant,
            ChainError::Store(_) => ErrorKind::StoreError,
            ChainError::Encoding(_) => ErrorKind::InvalidEncoding,
            ChainError::Orphan(_) => ErrorKind::InvalidHeader,
            ChainError::DisconnectGenesis => ErrorKind::StateMismatch,
            ChainError::MissingUndo(_) => ErrorKind::StateMismatch,
        }
    }

    /// The peer-scoring severity: 100 for consensus violations, 0 for
    /// transient or local failures (store trouble, clock-dependent time
    /// rules, orphans that may connect later).
    pub fn score(&self) -> u32 {
        match self {
            ChainError::Store(_) => 0,
            ChainError::Orphan(_) => 0,
            ChainError::DisconnectGenesis | ChainError::MissingUndo(_) => 0,
            ChainError::Block(BlockError::Time(_)) => 0,
            _ => 100,
        }
    }
}

fn transaction_kind(err: &TransactionError) -> ErrorKind {
    match err {
        TransactionError::MissingUtxo(_) => ErrorKind::MissingUtxo,
        TransactionError::DoubleSpend(_) => ErrorKind::DoubleSpend,
        _ => ErrorKind::InvalidTx,
    }
}

impl ChainError {
    pub(crate) fn covenant(name_hash: NameHash, source: CovenantError) -> ChainError {
        ChainError::Covenant { name_hash, source }
    }
}

/// Block-level errors that actually concern the body, reclassified.
///
/// `kind` on header/body variants is split here rather than in two
/// enums; the wire between them is thin and one block error type keeps
/// the check functions simple.
impl BlockError {
    pub fn is_body_error(&self) -> bool {
        use BlockError::*;
        matches!(
            self,
            NoTransactions
                | OversizedBlock
                | BadMerkleRoot { .. }
                | BadWitnessRoot { .. }
                | DuplicateTransaction
                | DuplicateOutpoint
                | BadCoinbaseHeight
                | ExcessCoinbaseValue
                | Transaction(_)
                | Subsidy(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_scores() {
        hns_test::init();

        let missing = ChainError::Transaction(TransactionError::MissingUtxo(OutPoint::null()));
        assert_eq!(missing.kind(), ErrorKind::MissingUtxo);
        assert_eq!(missing.score(), 100);

        let double = ChainError::Transaction(TransactionError::DoubleSpend(OutPoint::null()));
        assert_eq!(double.kind(), ErrorKind::DoubleSpend);

        let orphan = ChainError::Orphan(block::Hash([0; 32]));
        assert_eq!(orphan.score(), 0);
    }
}
