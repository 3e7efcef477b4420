//! Consensus-critical serialization.
//!
//! This module contains the traits `HandshakeSerialize` and
//! `HandshakeDeserialize`, analogs of the Serde `Serialize` and
//! `Deserialize` traits but intended for the consensus-critical Handshake
//! wire and disk formats. The encoding is injective and deterministic:
//! the same logical value always produces the same byte string, because
//! most of these byte strings end up under a hash.

mod deserialize;
mod error;

pub mod blake2b;

pub use deserialize::{HandshakeDeserialize, HandshakeDeserializeInto};
pub use error::SerializationError;

use crate::compactint::CompactInt;
use byteorder::{LittleEndian, WriteBytesExt};

pub trait HandshakeSerialize {
    fn handshake_serialize<W: std::io::Write>(&self, target: W) -> Result<(), std::io::Error>;

    fn handshake_serialize_to_vec(&self) -> Result<Vec<u8>, std::io::Error> {
        let mut data = Vec::new();
        self.handshake_serialize(&mut data)?;
        Ok(data)
    }
}

impl HandshakeSerialize for bool {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(&[*self as u8])
    }
}

impl HandshakeSerialize for u16 {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u16::<LittleEndian>(*self)
    }
}

impl HandshakeSerialize for u32 {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u32::<LittleEndian>(*self)
    }
}

impl HandshakeSerialize for u64 {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_u64::<LittleEndian>(*self)
    }
}

impl HandshakeSerialize for i32 {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_i32::<LittleEndian>(*self)
    }
}

impl HandshakeSerialize for i64 {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_i64::<LittleEndian>(*self)
    }
}

// No impl for u8: a bare `u8` carrying the trait would make the generic
// `Vec<T>` impl overlap with the length-prefixed `Vec<u8>` impl below.
// Single bytes are written with `write_all(&[b])` at the call site.

impl HandshakeSerialize for &[u8] {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl HandshakeSerialize for [u8; 4] {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl HandshakeSerialize for [u8; 24] {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

impl HandshakeSerialize for [u8; 32] {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        target.write_all(self)
    }
}

/// `varbytes`: length prefix followed by the raw bytes.
impl HandshakeSerialize for Vec<u8> {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).handshake_serialize(&mut target)?;
        target.write_all(self)?;
        Ok(())
    }
}

impl<T> HandshakeSerialize for Vec<T>
where
    T: HandshakeSerialize,
{
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).handshake_serialize(&mut target)?;
        for item in self.iter() {
            item.handshake_serialize(&mut target)?
        }
        Ok(())
    }
}

impl<T, U> HandshakeSerialize for (T, U)
where
    T: HandshakeSerialize,
    U: HandshakeSerialize,
{
    fn handshake_serialize<W>(&self, mut target: W) -> std::result::Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        self.0.handshake_serialize(&mut target)?;
        self.1.handshake_serialize(&mut target)?;
        Ok(())
    }
}

impl HandshakeSerialize for String {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        CompactInt::from(self.len()).handshake_serialize(&mut target)?;
        self.as_bytes().handshake_serialize(&mut target)?;
        Ok(())
    }
}

impl<T: HandshakeSerialize> HandshakeSerialize for Option<T> {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        match self {
            Some(contents) => contents.handshake_serialize(&mut target),
            None => Ok(()),
        }
    }
}
