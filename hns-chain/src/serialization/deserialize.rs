use byteorder::{LittleEndian, ReadBytesExt};
use std::io;
use std::io::Read;

use crate::compactint::CompactInt;

use super::SerializationError;

type Result<R> = std::result::Result<R, SerializationError>;

pub trait HandshakeDeserialize {
    fn handshake_deserialize<R: io::Read>(reader: R) -> Result<Self>
    where
        Self: Sized;
}

/// Helper for deserializing more succinctly via type inference
pub trait HandshakeDeserializeInto {
    /// Deserialize based on type inference
    fn handshake_deserialize_into<T>(self) -> Result<T>
    where
        T: HandshakeDeserialize;
}

impl<R: io::Read> HandshakeDeserializeInto for R {
    fn handshake_deserialize_into<T>(self) -> Result<T>
    where
        T: HandshakeDeserialize,
    {
        T::handshake_deserialize(self)
    }
}

impl HandshakeDeserialize for bool {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<bool> {
        let value = reader.read_u8()?;
        match value {
            0 => Ok(false),
            1 => Ok(true),
            _ => Err(SerializationError::Parse("Invalid bool")),
        }
    }
}

impl HandshakeDeserialize for u8 {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<u8> {
        Ok(reader.read_u8()?)
    }
}

impl HandshakeDeserialize for u16 {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<u16> {
        Ok(reader.read_u16::<LittleEndian>()?)
    }
}

impl HandshakeDeserialize for u32 {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<u32> {
        Ok(reader.read_u32::<LittleEndian>()?)
    }
}

impl HandshakeDeserialize for u64 {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<u64> {
        Ok(reader.read_u64::<LittleEndian>()?)
    }
}

impl HandshakeDeserialize for i32 {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<i32> {
        Ok(reader.read_i32::<LittleEndian>()?)
    }
}

impl HandshakeDeserialize for i64 {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<i64> {
        Ok(reader.read_i64::<LittleEndian>()?)
    }
}

impl<T> HandshakeDeserialize for Vec<T>
where
    T: HandshakeDeserialize,
{
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<Vec<T>> {
        let len = CompactInt::handshake_deserialize(&mut reader)?.value() as usize;
        // Limit preallocation to about 1000 items since blind preallocation
        // is a DOS vulnerability.
        let blind_alloc_limit = 1024;
        let mut result: Vec<T> = Vec::with_capacity(std::cmp::min(len, blind_alloc_limit));
        for _ in 0..len {
            result.push(T::handshake_deserialize(&mut reader)?);
        }
        Ok(result)
    }
}

impl HandshakeDeserialize for String {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<String> {
        let len = CompactInt::handshake_deserialize(&mut reader)?.value() as usize;
        let blind_alloc_limit = 1024;
        let mut buf = Vec::with_capacity(std::cmp::min(len, blind_alloc_limit));
        (&mut reader).take(len as u64).read_to_end(&mut buf)?;
        if buf.len() != len {
            return Err(SerializationError::Parse("string shorter than prefix"));
        }
        String::from_utf8(buf).map_err(|_| SerializationError::Parse("invalid utf-8"))
    }
}

impl<T: Sized + HandshakeDeserialize> HandshakeDeserialize for Option<T> {
    fn handshake_deserialize<R: io::Read>(reader: R) -> Result<Option<T>> {
        Ok(Some(T::handshake_deserialize(reader)?))
    }
}

impl<T, U> HandshakeDeserialize for (T, U)
where
    T: HandshakeDeserialize,
    U: HandshakeDeserialize,
{
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<(T, U)> {
        Ok((
            T::handshake_deserialize(&mut reader)?,
            U::handshake_deserialize(&mut reader)?,
        ))
    }
}

macro_rules! impl_deserializable_byte_array {
    ($size:expr) => {
        impl HandshakeDeserialize for [u8; $size] {
            fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<[u8; $size]> {
                let mut result = [0u8; $size];
                reader.read_exact(&mut result)?;
                Ok(result)
            }
        }
    };
}

impl_deserializable_byte_array!(4);
impl_deserializable_byte_array!(24);
impl_deserializable_byte_array!(32);
