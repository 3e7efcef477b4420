use crate::{HandshakeDeserialize, HandshakeSerialize, SerializationError};
use byteorder::{LittleEndian, WriteBytesExt};

/// A Bitcoin-style variable-length integer.
///
/// Decoding rejects non-minimal encodings: every length prefix in this
/// chain is committed to by a hash, so two encodings of one value would
/// be two distinct pieces of consensus data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompactInt(u64);

impl CompactInt {
    pub fn new() -> CompactInt {
        CompactInt(0)
    }

    pub fn from(value: usize) -> CompactInt {
        CompactInt(value as u64)
    }

    pub fn value(&self) -> u64 {
        self.0
    }

    /// Serialized length in bytes for `value`.
    pub fn size(value: usize) -> usize {
        if value < 253 {
            1
        } else if value <= std::u16::MAX as usize {
            3
        } else if value <= std::u32::MAX as usize {
            5
        } else {
            9
        }
    }
}

impl Default for CompactInt {
    fn default() -> Self {
        CompactInt::new()
    }
}

impl HandshakeSerialize for CompactInt {
    fn handshake_serialize<W>(&self, mut target: W) -> Result<(), std::io::Error>
    where
        W: std::io::Write,
    {
        if self.value() < 253 {
            target.write_all(&[self.value() as u8])
        } else if self.value() <= std::u16::MAX as u64 {
            target.write_all(&[253])?;
            target.write_u16::<LittleEndian>(self.value() as u16)
        } else if self.value() <= std::u32::MAX as u64 {
            target.write_all(&[254])?;
            target.write_u32::<LittleEndian>(self.value() as u32)
        } else {
            target.write_all(&[255])?;
            target.write_u64::<LittleEndian>(self.value())
        }
    }
}

impl HandshakeDeserialize for CompactInt {
    fn handshake_deserialize<R: std::io::Read>(
        mut target: R,
    ) -> Result<CompactInt, SerializationError> {
        let first = u8::handshake_deserialize(&mut target)?;
        if first < 253 {
            Ok(CompactInt::from(first as usize))
        } else if first == 253 {
            let value = u16::handshake_deserialize(&mut target)?;
            if value < 253 {
                return Err(SerializationError::Parse("non-minimal varint"));
            }
            Ok(CompactInt(value as u64))
        } else if first == 254 {
            let value = u32::handshake_deserialize(&mut target)?;
            if value <= std::u16::MAX as u32 {
                return Err(SerializationError::Parse("non-minimal varint"));
            }
            Ok(CompactInt(value as u64))
        } else {
            let value = u64::handshake_deserialize(&mut target)?;
            if value <= std::u32::MAX as u64 {
                return Err(SerializationError::Parse("non-minimal varint"));
            }
            Ok(CompactInt(value))
        }
    }
}
