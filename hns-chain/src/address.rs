//! Addresses: versioned witness programs.

use std::{fmt, io};

use bech32::{self, u5, FromBase32, ToBase32, Variant};
use serde::{Deserialize, Serialize};

use crate::{
    parameters::Network,
    serialization::{HandshakeDeserialize, HandshakeSerialize, SerializationError},
};

/// The highest valid address version.
pub const MAX_ADDRESS_VERSION: u8 = 31;

/// The shortest valid witness program, in bytes.
pub const MIN_PROGRAM_SIZE: usize = 2;

/// The longest valid witness program, in bytes.
pub const MAX_PROGRAM_SIZE: usize = 40;

/// An address: a witness version and a 2–40 byte program.
///
/// On the wire an address is `version || varint(len) || program`. The
/// string form is bech32 with a network-specific human-readable prefix,
/// the version as the first data symbol, and a 6-symbol checksum.
///
/// The network is *not* part of the consensus encoding, only of the
/// string form, so conversions to and from strings take a [`Network`].
#[derive(Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Address {
    version: u8,
    hash: Vec<u8>,
}

impl Address {
    /// Creates an address, enforcing the version and program-size ranges.
    pub fn new(version: u8, hash: Vec<u8>) -> Result<Address, SerializationError> {
        if version > MAX_ADDRESS_VERSION {
            return Err(SerializationError::Parse("address version out of range"));
        }
        if hash.len() < MIN_PROGRAM_SIZE || hash.len() > MAX_PROGRAM_SIZE {
            return Err(SerializationError::Parse("address program size out of range"));
        }
        Ok(Address { version, hash })
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn hash(&self) -> &[u8] {
        &self.hash
    }

    /// Serialized length in bytes. Programs are at most 40 bytes, so the
    /// length prefix is always a single byte.
    pub fn serialized_size(&self) -> usize {
        2 + self.hash.len()
    }

    /// The bech32 string form for `network`.
    pub fn to_bech32(&self, network: Network) -> String {
        let mut data = vec![u5::try_from_u8(self.version).expect("address version fits in 5 bits")];
        data.extend(self.hash.to_base32());
        bech32::encode(network.address_hrp(), data, Variant::Bech32)
            .expect("network prefixes are valid bech32 hrps")
    }

    /// Parses a bech32 address string, returning the network its prefix
    /// names alongside the address.
    pub fn from_bech32(s: &str) -> Result<(Network, Address), SerializationError> {
        let (hrp, data, variant) =
            bech32::decode(s).map_err(|_| SerializationError::Parse("bech32 decoding error"))?;
        if variant != Variant::Bech32 {
            return Err(SerializationError::Parse("wrong bech32 variant"));
        }
        let network = match hrp.as_str() {
            "hs" => Network::Mainnet,
            "ts" => Network::Testnet,
            "rs" => Network::Regtest,
            "ss" => Network::Simnet,
            _ => return Err(SerializationError::Parse("unknown address prefix")),
        };
        let version = data
            .first()
            .ok_or(SerializationError::Parse("empty address data"))?
            .to_u8();
        let hash = Vec::<u8>::from_base32(&data[1..])
            .map_err(|_| SerializationError::Parse("invalid address padding"))?;
        let address = Address::new(version, hash)?;
        Ok((network, address))
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Address")
            .field("version", &self.version)
            .field("hash", &hex::encode(&self.hash))
            .finish()
    }
}

impl HandshakeSerialize for Address {
    fn handshake_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_all(&[self.version])?;
        self.hash.handshake_serialize(&mut writer)?;
        Ok(())
    }
}

impl HandshakeDeserialize for Address {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let version = u8::handshake_deserialize(&mut reader)?;
        let hash = Vec::<u8>::handshake_deserialize(&mut reader)?;
        Address::new(version, hash)
    }
}

#[cfg(any(test, feature = "proptest-impl"))]
impl proptest::arbitrary::Arbitrary for Address {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        use proptest::{collection::vec, prelude::*};
        (
            0u8..=MAX_ADDRESS_VERSION,
            vec(any::<u8>(), MIN_PROGRAM_SIZE..=MAX_PROGRAM_SIZE),
        )
            .prop_map(|(version, hash)| {
                Address::new(version, hash).expect("generated fields are in range")
            })
            .boxed()
    }

    type Strategy = proptest::strategy::BoxedStrategy<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_out_of_range_fields() {
        assert!(Address::new(32, vec![0; 20]).is_err());
        assert!(Address::new(0, vec![0; 1]).is_err());
        assert!(Address::new(0, vec![0; 41]).is_err());
        assert!(Address::new(31, vec![0; 40]).is_ok());
    }

    #[test]
    fn bech32_prefix_tracks_network() {
        let addr = Address::new(0, vec![0x11; 20]).unwrap();
        assert!(addr.to_bech32(Network::Mainnet).starts_with("hs1"));
        assert!(addr.to_bech32(Network::Testnet).starts_with("ts1"));
        assert!(addr.to_bech32(Network::Regtest).starts_with("rs1"));
        assert!(addr.to_bech32(Network::Simnet).starts_with("ss1"));
    }

    #[test]
    fn bech32_string_roundtrip() {
        let addr = Address::new(0, vec![0xab; 20]).unwrap();
        let encoded = addr.to_bech32(Network::Mainnet);
        let (network, parsed) = Address::from_bech32(&encoded).unwrap();
        assert_eq!(network, Network::Mainnet);
        assert_eq!(parsed, addr);
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;
    use crate::serialization::HandshakeDeserializeInto;

    proptest! {
        #[test]
        fn address_roundtrip(addr in any::<Address>()) {
            hns_test::init();

            let data = addr.handshake_serialize_to_vec().expect("address should serialize");
            let addr2: Address = data.as_slice().handshake_deserialize_into()
                .expect("randomized address should deserialize");

            prop_assert_eq![addr, addr2];
        }

        #[test]
        fn address_bech32_roundtrip(addr in any::<Address>(), network in any::<Network>()) {
            hns_test::init();

            let encoded = addr.to_bech32(network);
            let (network2, addr2) = Address::from_bech32(&encoded)
                .expect("generated address strings should parse");

            prop_assert_eq![network, network2];
            prop_assert_eq![addr, addr2];
        }
    }
}
