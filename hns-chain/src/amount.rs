//! Monetary amounts in base units.

use std::convert::TryFrom;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{HandshakeDeserialize, HandshakeSerialize, SerializationError};

/// Base units per whole coin.
pub const COIN: u64 = 1_000_000;

/// The largest representable money supply, in base units.
pub const MAX_MONEY: u64 = 2_040_000_000 * COIN;

/// A non-negative amount of base units, bounded by [`MAX_MONEY`].
///
/// All arithmetic is checked: sums that leave `[0, MAX_MONEY]` surface as
/// [`Error`] rather than wrapping, since a wrapped sum is exactly the kind
/// of bug that mints coins.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct Amount(u64);

impl Amount {
    pub const ZERO: Amount = Amount(0);

    /// The raw value in base units.
    pub fn value(&self) -> u64 {
        self.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// `self + other`, failing if the sum exceeds [`MAX_MONEY`].
    pub fn checked_add(self, other: Amount) -> Result<Amount, Error> {
        let sum = self
            .0
            .checked_add(other.0)
            .ok_or(Error::Overflow)?;
        Amount::try_from(sum)
    }

    /// `self - other`, failing if `other` is larger.
    pub fn checked_sub(self, other: Amount) -> Result<Amount, Error> {
        self.0
            .checked_sub(other.0)
            .map(Amount)
            .ok_or(Error::Underflow)
    }
}

impl TryFrom<u64> for Amount {
    type Error = Error;

    fn try_from(value: u64) -> Result<Self, Error> {
        if value > MAX_MONEY {
            return Err(Error::OutOfRange(value));
        }
        Ok(Amount(value))
    }
}

impl std::fmt::Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:06}", self.0 / COIN, self.0 % COIN)
    }
}

/// An amount arithmetic or range error.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    #[error("amount exceeds the maximum money supply: {0}")]
    OutOfRange(u64),
    #[error("amount arithmetic overflowed")]
    Overflow,
    #[error("amount arithmetic underflowed")]
    Underflow,
}

impl HandshakeSerialize for Amount {
    fn handshake_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error> {
        self.0.handshake_serialize(target)
    }
}

/// Deserializes the raw u64. Range checking against [`MAX_MONEY`] belongs
/// to the sanity checks, not the decoder: a coin entry read back from disk
/// must reproduce whatever was stored.
impl HandshakeDeserialize for Amount {
    fn handshake_deserialize<R: std::io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Amount(u64::handshake_deserialize(reader)?))
    }
}

impl Amount {
    /// An amount from raw base units with no range check.
    ///
    /// For deserialization and tests; everything else goes through
    /// `try_from`.
    pub fn from_raw(value: u64) -> Amount {
        Amount(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_enforced() {
        assert!(Amount::try_from(MAX_MONEY).is_ok());
        assert_eq!(
            Amount::try_from(MAX_MONEY + 1),
            Err(Error::OutOfRange(MAX_MONEY + 1))
        );
    }

    #[test]
    fn checked_add_rejects_overflow() {
        let max = Amount::try_from(MAX_MONEY).unwrap();
        assert_eq!(max.checked_add(Amount(1)), Err(Error::OutOfRange(MAX_MONEY + 1)));

        // Sums that wrap u64 must fail too, not alias small values.
        let near = Amount::from_raw(u64::max_value() / 2 + 1);
        assert_eq!(near.checked_add(near), Err(Error::Overflow));
    }

    #[test]
    fn checked_sub_rejects_underflow() {
        assert_eq!(Amount(1).checked_sub(Amount(2)), Err(Error::Underflow));
        assert_eq!(Amount(2).checked_sub(Amount(2)), Ok(Amount::ZERO));
    }
}
