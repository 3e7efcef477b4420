//! Block difficulty data structures and calculations.
//!
//! The block difficulty "target threshold" is stored in the block header
//! as a 32-bit `CompactDifficulty` (nBits). The expanded 256-bit form is
//! used for proof-of-work comparisons and retarget arithmetic.

use std::{cmp::Ordering, fmt, io};

use primitive_types::U256;
use serde::{Deserialize, Serialize};

use crate::{
    block,
    parameters::Network,
    serialization::{HandshakeDeserialize, HandshakeSerialize, SerializationError},
};

/// A 32-bit compact (nBits) encoding of a 256-bit difficulty target.
///
/// The layout is a floating-point-like `mantissa * 256^(exponent - 3)`,
/// with a sign bit that is never valid in a block header.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct CompactDifficulty(pub u32);

/// A 256-bit difficulty target: a header's proof-of-work hash, read as a
/// big-endian integer, must be less than or equal to this.
///
/// Greater targets mean *less* work.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd)]
pub struct ExpandedDifficulty(pub(crate) U256);

/// The work a single block contributes: `floor(2^256 / (target + 1))`.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd)]
pub struct Work(pub U256);

const SIGN_BIT: u32 = 0x0080_0000;
const MANTISSA_MASK: u32 = 0x007f_ffff;

impl CompactDifficulty {
    /// Expands to the 256-bit target, or `None` if the encoding is
    /// negative, zero, or overflows 256 bits.
    pub fn to_expanded(self) -> Option<ExpandedDifficulty> {
        if self.0 & SIGN_BIT != 0 {
            return None;
        }
        let exponent = self.0 >> 24;
        let mantissa = self.0 & MANTISSA_MASK;
        if mantissa == 0 {
            return None;
        }
        let target = if exponent <= 3 {
            U256::from(mantissa >> (8 * (3 - exponent)))
        } else {
            let shift = 8 * (exponent - 3) as usize;
            if shift > 255 {
                return None;
            }
            let shifted = U256::from(mantissa) << shift;
            // A mantissa bit pushed off the high end means overflow.
            if (shifted >> shift) != U256::from(mantissa) {
                return None;
            }
            shifted
        };
        if target.is_zero() {
            return None;
        }
        Some(ExpandedDifficulty(target))
    }
}

impl ExpandedDifficulty {
    /// The easiest target this network ever allows.
    pub fn target_difficulty_limit(network: Network) -> ExpandedDifficulty {
        match network {
            Network::Mainnet | Network::Testnet => ExpandedDifficulty(U256::MAX >> 32),
            // The local networks accept almost any hash, so tests can
            // mine blocks in a couple of iterations.
            Network::Regtest | Network::Simnet => ExpandedDifficulty(U256::MAX >> 1),
        }
    }

    /// The compact `bits` encoding of the network's target limit.
    pub fn pow_limit_bits(network: Network) -> CompactDifficulty {
        match network {
            Network::Mainnet | Network::Testnet => CompactDifficulty(0x1d00_ffff),
            Network::Regtest | Network::Simnet => CompactDifficulty(0x207f_ffff),
        }
    }

    /// Re-encodes to the compact form, rounding the mantissa down.
    pub fn to_compact(self) -> CompactDifficulty {
        if self.0.is_zero() {
            return CompactDifficulty(0);
        }
        let mut size = (self.0.bits() + 7) / 8;
        let mut compact = if size <= 3 {
            self.0.low_u64() << (8 * (3 - size))
        } else {
            (self.0 >> (8 * (size - 3))).low_u64()
        };
        if compact & SIGN_BIT as u64 != 0 {
            compact >>= 8;
            size += 1;
        }
        CompactDifficulty((compact as u32) | ((size as u32) << 24))
    }

    /// The work this target represents.
    pub fn to_work(self) -> Work {
        // (2^256 - target - 1) / (target + 1) + 1 == 2^256 / (target + 1),
        // computed without leaving 256 bits.
        Work(((!self.0) / (self.0 + U256::one())) + U256::one())
    }

    /// The raw 256-bit target, for retarget arithmetic.
    pub fn as_u256(self) -> U256 {
        self.0
    }

    /// A target from raw retarget arithmetic. Callers cap the result at
    /// the network limit before encoding it.
    pub fn from_u256(value: U256) -> ExpandedDifficulty {
        ExpandedDifficulty(value)
    }
}

impl fmt::Debug for CompactDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("CompactDifficulty")
            .field(&format_args!("{:#010x}", self.0))
            .finish()
    }
}

impl fmt::Debug for ExpandedDifficulty {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut bytes = [0u8; 32];
        self.0.to_big_endian(&mut bytes);
        f.debug_tuple("ExpandedDifficulty")
            .field(&hex::encode(&bytes))
            .finish()
    }
}

impl HandshakeSerialize for CompactDifficulty {
    fn handshake_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error> {
        self.0.handshake_serialize(target)
    }
}

impl HandshakeDeserialize for CompactDifficulty {
    fn handshake_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(CompactDifficulty(u32::handshake_deserialize(reader)?))
    }
}

impl PartialEq<ExpandedDifficulty> for block::Hash {
    fn eq(&self, other: &ExpandedDifficulty) -> bool {
        U256::from_big_endian(&self.0) == other.0
    }
}

impl PartialOrd<ExpandedDifficulty> for block::Hash {
    fn partial_cmp(&self, other: &ExpandedDifficulty) -> Option<Ordering> {
        U256::from_big_endian(&self.0).partial_cmp(&other.0)
    }
}

impl std::ops::Add for Work {
    type Output = Work;

    fn add(self, rhs: Work) -> Work {
        Work(self.0 + rhs.0)
    }
}

#[cfg(any(test, feature = "proptest-impl"))]
impl proptest::arbitrary::Arbitrary for CompactDifficulty {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        use proptest::prelude::*;
        // Valid positive encodings only: random u32s are mostly garbage
        // that `to_expanded` rejects, which starves the strategies that
        // need workable headers.
        (1u32..=0x1f, 1u32..=MANTISSA_MASK)
            .prop_map(|(exponent, mantissa)| CompactDifficulty((exponent << 24) | mantissa))
            .boxed()
    }

    type Strategy = proptest::strategy::BoxedStrategy<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_known_encodings() {
        // mantissa 0xffff at exponent 0x1d: the classic minimum-difficulty
        // target 0x00000000ffff0000...00.
        let target = CompactDifficulty(0x1d00_ffff).to_expanded().unwrap();
        let expected = U256::from(0xffffu64) << (8 * (0x1d - 3));
        assert_eq!(target.as_u256(), expected);

        // Exponent 3: the mantissa is the target.
        let target = CompactDifficulty(0x0300_1234).to_expanded().unwrap();
        assert_eq!(target.as_u256(), U256::from(0x1234u64));

        // Exponent below 3 shifts the mantissa down; here it shifts to
        // zero, which is not a usable target.
        assert!(CompactDifficulty(0x0100_1200).to_expanded().is_none());
    }

    #[test]
    fn invalid_encodings_rejected() {
        // Zero mantissa
        assert!(CompactDifficulty(0x1d00_0000).to_expanded().is_none());
        // Sign bit set
        assert!(CompactDifficulty(0x1d80_0001).to_expanded().is_none());
        // Overflows 256 bits
        assert!(CompactDifficulty(0xff00_ffff).to_expanded().is_none());
    }

    #[test]
    fn compact_expand_roundtrip() {
        for &bits in &[0x1d00_ffffu32, 0x207f_ffff, 0x1b0a_1234, 0x0400_8000] {
            let expanded = CompactDifficulty(bits).to_expanded().unwrap();
            assert_eq!(expanded.to_compact().0, bits);
        }
    }

    #[test]
    fn limits_expand_to_limits() {
        for &network in &[Network::Mainnet, Network::Regtest] {
            let bits = ExpandedDifficulty::pow_limit_bits(network);
            let expanded = bits.to_expanded().expect("limit bits are valid");
            assert!(expanded <= ExpandedDifficulty::target_difficulty_limit(network));
        }
    }

    #[test]
    fn hash_target_ordering() {
        let target = CompactDifficulty(0x2000_0100).to_expanded().unwrap();
        // 0x0100 << (8 * 29): byte 0x01 at offset 1 from the top, i.e. a
        // hash starting 0x00 0x01 0x00... equals the target.
        let mut equal = [0u8; 32];
        equal[1] = 0x01;
        let equal = block::Hash(equal);
        assert!(!(equal > target));

        let mut above = [0u8; 32];
        above[0] = 0x01;
        let above = block::Hash(above);
        assert!(above > target);

        let below = block::Hash([0u8; 32]);
        assert!(!(below > target));
    }

    #[test]
    fn more_work_for_smaller_targets() {
        let easy = CompactDifficulty(0x207f_ffff).to_expanded().unwrap();
        let hard = CompactDifficulty(0x1d00_ffff).to_expanded().unwrap();
        assert!(hard.to_work() > easy.to_work());
    }
}
