use std::io;

use serde::{Deserialize, Serialize};

use crate::serialization::{HandshakeDeserialize, HandshakeSerialize, SerializationError};

/// The height of a block in the chain; the genesis block is at height 0.
#[derive(
    Copy, Clone, Debug, Default, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize,
)]
pub struct Height(pub u32);

impl Height {
    /// The largest valid height. Heights above this would collide with
    /// the timestamp interpretation of locktimes.
    pub const MAX: Height = Height(499_999_999);
}

impl HandshakeSerialize for Height {
    fn handshake_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error> {
        self.0.handshake_serialize(target)
    }
}

impl HandshakeDeserialize for Height {
    fn handshake_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(Height(u32::handshake_deserialize(reader)?))
    }
}

#[cfg(any(test, feature = "proptest-impl"))]
impl proptest::arbitrary::Arbitrary for Height {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        use proptest::prelude::*;
        (0..=Height::MAX.0).prop_map(Height).boxed()
    }

    type Strategy = proptest::strategy::BoxedStrategy<Self>;
}
