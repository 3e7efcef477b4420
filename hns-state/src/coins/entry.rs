use std::io;

use serde::{Deserialize, Serialize};

use hns_chain::{
    address::Address,
    amount::Amount,
    compactint::CompactInt,
    covenant::Covenant,
    parameters::Network,
    transaction::{Output, Transaction},
    HandshakeDeserialize, HandshakeSerialize, SerializationError,
};

use super::compress::{compress_value, decompress_value};

/// A coin: one unspent transaction output, as tracked by the UTXO set.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CoinEntry {
    /// The version of the transaction that created this coin.
    pub version: u32,
    /// The height the coin was created at; -1 while unconfirmed.
    pub height: i32,
    /// The coin's value in base units.
    pub value: Amount,
    /// The address that may spend the coin.
    pub address: Address,
    /// The covenant carried by the creating output.
    pub covenant: Covenant,
    /// Whether the creating transaction was a coinbase.
    pub coinbase: bool,
}

impl CoinEntry {
    /// The coin for output `index` of `tx` confirmed at `height`.
    ///
    /// # Panics
    ///
    /// If `index` is out of range; callers enumerate real outputs.
    pub fn from_tx(tx: &Transaction, index: usize, height: i32) -> CoinEntry {
        let output = &tx.outputs[index];
        CoinEntry {
            version: tx.version,
            height,
            value: output.value,
            address: output.address.clone(),
            covenant: output.covenant.clone(),
            coinbase: tx.is_coinbase(),
        }
    }

    /// Reconstructs the creating output.
    pub fn to_output(&self) -> Output {
        Output {
            value: self.value,
            address: self.address.clone(),
            covenant: self.covenant.clone(),
        }
    }

    /// Whether a coinbase coin has aged past the spend embargo. Always
    /// true for non-coinbase coins.
    pub fn is_mature(&self, network: Network, spend_height: u32) -> bool {
        if !self.coinbase {
            return true;
        }
        if self.height < 0 {
            return false;
        }
        spend_height >= self.height as u32 + network.coinbase_maturity()
    }
}

/// The disk encoding packs the height and coinbase flag into one varint
/// (`(height + 1) << 1 | coinbase`, so the unconfirmed height -1 maps to
/// zero) and compresses the value.
impl HandshakeSerialize for CoinEntry {
    fn handshake_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.version.handshake_serialize(&mut writer)?;
        let code = (((self.height + 1) as i64 as u64) << 1) | self.coinbase as u64;
        CompactInt::from(code as usize).handshake_serialize(&mut writer)?;
        let compressed = compress_value(self.value.value());
        // Bounded by the money supply; see coins::compress.
        debug_assert!(compressed <= u64::max_value() as u128);
        CompactInt::from(compressed as usize).handshake_serialize(&mut writer)?;
        self.address.handshake_serialize(&mut writer)?;
        self.covenant.handshake_serialize(&mut writer)?;
        Ok(())
    }
}

impl HandshakeDeserialize for CoinEntry {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let version = u32::handshake_deserialize(&mut reader)?;
        let code = CompactInt::handshake_deserialize(&mut reader)?.value();
        let coinbase = code & 1 == 1;
        let height = (code >> 1) as i64 - 1;
        if height < i32::min_value() as i64 || height > i32::max_value() as i64 {
            return Err(SerializationError::Parse("coin height out of range"));
        }
        let compressed = CompactInt::handshake_deserialize(&mut reader)?.value();
        let value = decompress_value(compressed as u128)
            .ok_or(SerializationError::Parse("invalid compressed coin value"))?;
        Ok(CoinEntry {
            version,
            height: height as i32,
            value: Amount::from_raw(value),
            address: Address::handshake_deserialize(&mut reader)?,
            covenant: Covenant::handshake_deserialize(&mut reader)?,
            coinbase,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hns_chain::serialization::HandshakeDeserializeInto;
    use proptest::prelude::*;

    fn entry_strategy() -> impl Strategy<Value = CoinEntry> {
        (
            any::<u32>(),
            -1i32..=1_000_000,
            0u64..=hns_chain::amount::MAX_MONEY,
            any::<Address>(),
            any::<Covenant>(),
            any::<bool>(),
        )
            .prop_map(|(version, height, value, address, covenant, coinbase)| CoinEntry {
                version,
                height,
                value: Amount::from_raw(value),
                address,
                covenant,
                coinbase,
            })
    }

    proptest! {
        #[test]
        fn coin_entry_roundtrip(entry in entry_strategy()) {
            hns_test::init();

            let data = entry.handshake_serialize_to_vec().expect("entry should serialize");
            let entry2: CoinEntry = data.as_slice().handshake_deserialize_into()
                .expect("randomized entry should deserialize");

            prop_assert_eq![entry, entry2];
        }
    }

    #[test]
    fn unconfirmed_height_roundtrips() {
        hns_test::init();

        let entry = CoinEntry {
            version: 0,
            height: -1,
            value: Amount::from_raw(5),
            address: Address::new(0, vec![0; 20]).unwrap(),
            covenant: Covenant::none(),
            coinbase: false,
        };
        let data = entry.handshake_serialize_to_vec().unwrap();
        let entry2: CoinEntry = data.as_slice().handshake_deserialize_into().unwrap();
        assert_eq!(entry2.height, -1);
        assert!(!entry2.coinbase);
    }

    #[test]
    fn coinbase_maturity_embargo() {
        hns_test::init();

        let mut entry = CoinEntry {
            version: 0,
            height: 10,
            value: Amount::from_raw(5),
            address: Address::new(0, vec![0; 20]).unwrap(),
            covenant: Covenant::none(),
            coinbase: true,
        };
        let maturity = Network::Regtest.coinbase_maturity();
        assert!(!entry.is_mature(Network::Regtest, 10));
        assert!(!entry.is_mature(Network::Regtest, 10 + maturity - 1));
        assert!(entry.is_mature(Network::Regtest, 10 + maturity));

        entry.coinbase = false;
        assert!(entry.is_mature(Network::Regtest, 10));
    }
}
