//! Name covenants: the typed tags on outputs that drive the auction
//! state machine.

use std::convert::TryFrom;
use std::{fmt, io};

use serde::{Deserialize, Serialize};

use crate::{
    compactint::CompactInt,
    serialization::{blake2b, HandshakeDeserialize, HandshakeSerialize, SerializationError},
};

/// The longest permitted name, in bytes.
pub const MAX_NAME_SIZE: usize = 63;

/// The longest permitted resource blob, in bytes.
pub const MAX_RESOURCE_SIZE: usize = 512;

/// Longest permitted single covenant item, in bytes.
pub const MAX_COVENANT_ITEM_SIZE: usize = 512;

/// The BLAKE2b-256 hash of a name; the key of the name tree.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct NameHash(pub [u8; 32]);

impl NameHash {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

/// Hashes a raw name into its tree key.
pub fn hash_name(name: &[u8]) -> NameHash {
    NameHash(blake2b::digest256(name))
}

/// Whether `name` is a valid auctionable name: lower-case alphanumerics,
/// hyphen and underscore, 1–63 bytes, no leading or trailing hyphen.
pub fn is_name_valid(name: &[u8]) -> bool {
    if name.is_empty() || name.len() > MAX_NAME_SIZE {
        return false;
    }
    if name[0] == b'-' || name[name.len() - 1] == b'-' {
        return false;
    }
    name.iter()
        .all(|&b| b.is_ascii_lowercase() || b.is_ascii_digit() || b == b'-' || b == b'_')
}

impl fmt::Debug for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("NameHash").field(&hex::encode(&self.0)).finish()
    }
}

impl fmt::Display for NameHash {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&hex::encode(&self.0))
    }
}

impl HandshakeSerialize for NameHash {
    fn handshake_serialize<W: io::Write>(&self, target: W) -> Result<(), io::Error> {
        self.0.handshake_serialize(target)
    }
}

impl HandshakeDeserialize for NameHash {
    fn handshake_deserialize<R: io::Read>(reader: R) -> Result<Self, SerializationError> {
        Ok(NameHash(<[u8; 32]>::handshake_deserialize(reader)?))
    }
}

/// The covenant action types, in tag order.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CovenantType {
    /// Plain value transfer.
    None = 0,
    /// DNSSEC ownership-proof claim of a reserved name.
    Claim = 1,
    /// Begin an auction.
    Open = 2,
    /// A sealed (blinded) bid.
    Bid = 3,
    /// Open a prior bid.
    Reveal = 4,
    /// Reclaim a losing bid's lockup.
    Redeem = 5,
    /// Finalize a won auction and publish a resource.
    Register = 6,
    /// Replace the published resource.
    Update = 7,
    /// Extend the name's expiry.
    Renew = 8,
    /// Start a transfer to a new address.
    Transfer = 9,
    /// Complete a transfer after the lockup.
    Finalize = 10,
    /// Permanently burn the name.
    Revoke = 11,
}

impl TryFrom<u8> for CovenantType {
    type Error = SerializationError;

    fn try_from(tag: u8) -> Result<Self, SerializationError> {
        use CovenantType::*;
        Ok(match tag {
            0 => None,
            1 => Claim,
            2 => Open,
            3 => Bid,
            4 => Reveal,
            5 => Redeem,
            6 => Register,
            7 => Update,
            8 => Renew,
            9 => Transfer,
            10 => Finalize,
            11 => Revoke,
            _ => return Err(SerializationError::Parse("unknown covenant type")),
        })
    }
}

/// A covenant: a type tag plus its ordered byte-string items.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Covenant {
    pub kind: CovenantType,
    pub items: Vec<Vec<u8>>,
}

impl Covenant {
    /// A plain value-transfer covenant.
    pub fn none() -> Covenant {
        Covenant {
            kind: CovenantType::None,
            items: Vec::new(),
        }
    }

    /// Whether this output participates in the name system at all.
    pub fn is_name(&self) -> bool {
        self.kind != CovenantType::None
    }

    /// Whether this covenant must spend an earlier covenant output of the
    /// same name (everything from REVEAL onward, which consumes a BID,
    /// REVEAL, or owner output).
    pub fn is_linked(&self) -> bool {
        self.kind as u8 >= CovenantType::Reveal as u8
    }

    /// Whether an output carrying this covenant conveys name ownership.
    pub fn is_ownership(&self) -> bool {
        matches!(
            self.kind,
            CovenantType::Claim
                | CovenantType::Reveal
                | CovenantType::Register
                | CovenantType::Update
                | CovenantType::Renew
                | CovenantType::Transfer
                | CovenantType::Finalize
        )
    }

    /// The item count this covenant type requires.
    pub fn expected_items(&self) -> usize {
        use CovenantType::*;
        match self.kind {
            None => 0,
            Claim => 6,
            Open => 3,
            Bid => 4,
            Reveal => 3,
            Redeem => 2,
            Register => 4,
            Update => 3,
            Renew => 3,
            Transfer => 4,
            Finalize => 6,
            Revoke => 2,
        }
    }

    /// Structural validity: item count and per-item size limits. Says
    /// nothing about the name state; that is the chain's job.
    pub fn is_well_formed(&self) -> bool {
        self.items.len() == self.expected_items()
            && self.items.iter().all(|item| item.len() <= MAX_COVENANT_ITEM_SIZE)
    }

    fn item(&self, index: usize) -> Result<&[u8], SerializationError> {
        self.items
            .get(index)
            .map(Vec::as_slice)
            .ok_or(SerializationError::Parse("missing covenant item"))
    }

    /// Item `index` as a 32-byte hash.
    pub fn item_hash(&self, index: usize) -> Result<[u8; 32], SerializationError> {
        let item = self.item(index)?;
        if item.len() != 32 {
            return Err(SerializationError::Parse("covenant item is not a hash"));
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(item);
        Ok(out)
    }

    /// Item `index` as a little-endian u32.
    pub fn item_u32(&self, index: usize) -> Result<u32, SerializationError> {
        let item = self.item(index)?;
        if item.len() != 4 {
            return Err(SerializationError::Parse("covenant item is not a u32"));
        }
        let mut bytes = [0u8; 4];
        bytes.copy_from_slice(item);
        Ok(u32::from_le_bytes(bytes))
    }

    /// Item `index` as a single byte.
    pub fn item_u8(&self, index: usize) -> Result<u8, SerializationError> {
        let item = self.item(index)?;
        if item.len() != 1 {
            return Err(SerializationError::Parse("covenant item is not a byte"));
        }
        Ok(item[0])
    }

    /// Item `index` as raw bytes.
    pub fn item_bytes(&self, index: usize) -> Result<&[u8], SerializationError> {
        self.item(index)
    }

    /// Item 0 of every name covenant: the name hash.
    pub fn name_hash(&self) -> Result<NameHash, SerializationError> {
        Ok(NameHash(self.item_hash(0)?))
    }

    /// Item 1 of every name covenant except CLAIM: the auction start
    /// height the covenant claims to act against.
    pub fn start_height(&self) -> Result<u32, SerializationError> {
        self.item_u32(1)
    }

    /// Serialized length in bytes.
    pub fn serialized_size(&self) -> usize {
        let mut size = 1 + CompactInt::size(self.items.len());
        for item in &self.items {
            size += CompactInt::size(item.len()) + item.len();
        }
        size
    }
}

impl HandshakeSerialize for Covenant {
    fn handshake_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        writer.write_all(&[self.kind as u8])?;
        self.items.handshake_serialize(&mut writer)?;
        Ok(())
    }
}

impl HandshakeDeserialize for Covenant {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let kind = CovenantType::try_from(u8::handshake_deserialize(&mut reader)?)?;
        let items = Vec::<Vec<u8>>::handshake_deserialize(&mut reader)?;
        for item in &items {
            if item.len() > MAX_COVENANT_ITEM_SIZE {
                return Err(SerializationError::Parse("oversized covenant item"));
            }
        }
        Ok(Covenant { kind, items })
    }
}

#[cfg(any(test, feature = "proptest-impl"))]
impl proptest::arbitrary::Arbitrary for Covenant {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        use proptest::{collection::vec, prelude::*};
        // Arbitrary type/item combinations: serialization does not care
        // whether the item layout matches the type.
        (0u8..=11, vec(vec(any::<u8>(), 0..64), 0..6))
            .prop_map(|(tag, items)| Covenant {
                kind: CovenantType::try_from(tag).expect("tag is in range"),
                items,
            })
            .boxed()
    }

    type Strategy = proptest::strategy::BoxedStrategy<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_validity() {
        assert!(is_name_valid(b"alice"));
        assert!(is_name_valid(b"xn--55qx5d"));
        assert!(is_name_valid(b"a"));
        assert!(!is_name_valid(b""));
        assert!(!is_name_valid(b"Alice"));
        assert!(!is_name_valid(b"-alice"));
        assert!(!is_name_valid(b"alice-"));
        assert!(!is_name_valid(b"al ice"));
        assert!(!is_name_valid(&[b'a'; 64]));
    }

    #[test]
    fn unknown_tag_rejected() {
        let bytes = [12u8, 0];
        assert!(Covenant::handshake_deserialize(&bytes[..]).is_err());
    }

    #[test]
    fn linkage_classification() {
        let open = Covenant {
            kind: CovenantType::Open,
            items: vec![vec![0; 32], vec![0; 4], b"alice".to_vec()],
        };
        assert!(open.is_name());
        assert!(!open.is_linked());
        assert!(open.is_well_formed());

        let reveal = Covenant {
            kind: CovenantType::Reveal,
            items: vec![vec![0; 32], vec![0; 4], vec![0; 32]],
        };
        assert!(reveal.is_linked());
        assert!(!Covenant::none().is_name());
    }
}

#[cfg(test)]
mod proptests {
    use proptest::prelude::*;

    use super::*;
    use crate::serialization::HandshakeDeserializeInto;

    proptest! {
        #[test]
        fn covenant_roundtrip(covenant in any::<Covenant>()) {
            hns_test::init();

            let data = covenant.handshake_serialize_to_vec().expect("covenant should serialize");
            let covenant2: Covenant = data.as_slice().handshake_deserialize_into()
                .expect("randomized covenant should deserialize");

            prop_assert_eq![covenant, covenant2];
        }
    }
}
