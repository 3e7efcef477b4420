//! Exponent-based compression of coin values.
//!
//! Most output values are round multiples of ten, so the disk encoding
//! factors powers of ten out of the value before varint-encoding it. The
//! scheme is a bijection: decompressing a compressed value always
//! reproduces it exactly.
//!
//! For `v > 0`, with `e` the largest exponent `<= 9` such that `10^e`
//! divides `v` and `q = v / 10^e`:
//!
//! - `e < 9`: split `q = 10n + d` (`d` is then in `1..=9`); the code is
//!   `1 + 10*(9n + d - 1) + e`.
//! - `e == 9`: the code is `10 + 10*(q - 1)`.
//!
//! Codes are computed in 128 bits: the code for a value near `u64::MAX`
//! is about nine times the value, which does not fit in 64 bits. Stored
//! coin values are bounded by the money supply, far below that edge.

use std::convert::TryFrom;

/// Compresses a coin value.
pub fn compress_value(value: u64) -> u128 {
    if value == 0 {
        return 0;
    }
    let mut v = value;
    let mut e = 0u128;
    while v % 10 == 0 && e < 9 {
        v /= 10;
        e += 1;
    }
    if e < 9 {
        // v is not divisible by 10 here, so d is in 1..=9.
        let d = (v % 10) as u128;
        let n = (v / 10) as u128;
        1 + 10 * (9 * n + (d - 1)) + e
    } else {
        10 + 10 * (v as u128 - 1)
    }
}

/// Decompresses a coin value code. Returns `None` for codes that do not
/// correspond to any `u64` value.
pub fn decompress_value(compressed: u128) -> Option<u64> {
    if compressed == 0 {
        return Some(0);
    }
    let x = compressed - 1;
    let e = (x % 10) as u32;
    let x = x / 10;
    let mut n = if e < 9 {
        let d = (x % 9) + 1;
        (x / 9).checked_mul(10)?.checked_add(d)?
    } else {
        x.checked_add(1)?
    };
    for _ in 0..e {
        n = n.checked_mul(10)?;
    }
    u64::try_from(n).ok()
}
