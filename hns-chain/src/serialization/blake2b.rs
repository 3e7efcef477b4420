//! BLAKE2b digests and a `Write`-able hashing sink.
//!
//! Everything consensus-hashed in this chain runs through BLAKE2b-256,
//! with BLAKE2b-512 and SHA3-256 appearing only inside the header
//! proof-of-work construction.

use std::io;

/// A 32-byte BLAKE2b digest of `data`.
pub fn digest256(data: &[u8]) -> [u8; 32] {
    let hash = blake2b_simd::Params::new().hash_length(32).hash(data);
    let mut out = [0u8; 32];
    out.copy_from_slice(hash.as_bytes());
    out
}

/// A 64-byte BLAKE2b digest of `data`.
pub fn digest512(data: &[u8]) -> [u8; 64] {
    let hash = blake2b_simd::Params::new().hash_length(64).hash(data);
    let mut out = [0u8; 64];
    out.copy_from_slice(hash.as_bytes());
    out
}

/// A 32-byte BLAKE2b digest over the concatenation of `parts`.
pub fn multi256(parts: &[&[u8]]) -> [u8; 32] {
    let mut state = blake2b_simd::Params::new().hash_length(32).to_state();
    for part in parts {
        state.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(state.finalize().as_bytes());
    out
}

/// A 32-byte SHA3-256 digest over the concatenation of `parts`.
pub fn sha3_multi256(parts: &[&[u8]]) -> [u8; 32] {
    use sha3::{Digest, Sha3_256};
    let mut hasher = Sha3_256::new();
    for part in parts {
        hasher.update(part);
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}

/// An `io::Write` sink that BLAKE2b-256 hashes everything written to it.
///
/// Lets a value be hashed by serializing straight into the hasher, with
/// no intermediate buffer.
#[derive(Default)]
pub struct Writer {
    state: Option<blake2b_simd::State>,
}

impl Writer {
    fn state(&mut self) -> &mut blake2b_simd::State {
        if self.state.is_none() {
            self.state = Some(blake2b_simd::Params::new().hash_length(32).to_state());
        }
        self.state.as_mut().expect("state was just populated")
    }

    /// Consume the writer and return the digest of everything written.
    pub fn finish(mut self) -> [u8; 32] {
        let hash = self.state().finalize();
        let mut out = [0u8; 32];
        out.copy_from_slice(hash.as_bytes());
        out
    }
}

impl io::Write for Writer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.state().update(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn writer_matches_oneshot() {
        let data = b"an arbitrary byte string";
        let mut writer = Writer::default();
        writer.write_all(&data[..]).expect("writer is infallible");
        assert_eq!(writer.finish(), digest256(&data[..]));
    }

    #[test]
    fn multi_matches_concat() {
        assert_eq!(multi256(&[b"ab", b"cd"]), digest256(b"abcd"));
        assert_eq!(sha3_multi256(&[b"ab", b"cd"]), sha3_multi256(&[b"abcd"]));
    }
}
