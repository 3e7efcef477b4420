//! Contains impls of `HandshakeSerialize`, `HandshakeDeserialize` for the
//! transaction types, so that all of the serialization logic is in one place.

use std::{io, sync::Arc};

use crate::serialization::{HandshakeDeserialize, HandshakeSerialize, SerializationError};

use super::*;

/// The maximum size of a serialized transaction in bytes.
pub const MAX_TX_SIZE: u64 = 1_000_000;

impl Transaction {
    /// Writes the identity-hashed portion: everything except the
    /// witnesses.
    pub(crate) fn write_normal<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.version.handshake_serialize(&mut writer)?;
        self.inputs.handshake_serialize(&mut writer)?;
        self.outputs.handshake_serialize(&mut writer)?;
        self.locktime.handshake_serialize(&mut writer)?;
        Ok(())
    }

    /// Writes every input's witness stack, in input order.
    pub(crate) fn write_witnesses<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        for input in &self.inputs {
            input.witness.handshake_serialize(&mut writer)?;
        }
        Ok(())
    }
}

impl HandshakeSerialize for Transaction {
    fn handshake_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.write_normal(&mut writer)?;
        self.write_witnesses(&mut writer)?;
        Ok(())
    }
}

/// Deserializes a transaction, calculating and caching its txid and
/// witness hash.
impl HandshakeDeserialize for Transaction {
    fn handshake_deserialize<R: std::io::Read>(src: R) -> Result<Self, SerializationError> {
        // Cap reads at the maximum transaction size to protect against
        // DOS attacks.
        let mut src = src.take(MAX_TX_SIZE);
        let version = u32::handshake_deserialize(&mut src)?;
        let mut inputs = Vec::<Input>::handshake_deserialize(&mut src)?;
        let outputs = Vec::<Output>::handshake_deserialize(&mut src)?;
        let locktime = u32::handshake_deserialize(&mut src)?;
        // The witness section: one stack per input, trailing the locktime.
        for input in inputs.iter_mut() {
            input.witness = Witness::handshake_deserialize(&mut src)?;
        }
        let mut tx = Transaction {
            version,
            inputs,
            outputs,
            locktime,
            hash: Cached::new(),
            witness_hash: Cached::new(),
        };
        tx.cache_hashes();
        Ok(tx)
    }
}

impl<T> HandshakeDeserialize for Arc<T>
where
    T: HandshakeDeserialize,
{
    fn handshake_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Arc::new(T::handshake_deserialize(reader)?))
    }
}

impl<T> HandshakeSerialize for Arc<T>
where
    T: HandshakeSerialize,
{
    fn handshake_serialize<W: io::Write>(&self, writer: W) -> Result<(), io::Error> {
        T::handshake_serialize(self, writer)
    }
}
