//! Consensus parameters for each Handshake network.

pub mod genesis;

pub use genesis::{genesis_block, genesis_hash, GENESIS_PREVIOUS_BLOCK_HASH};

use serde::{Deserialize, Serialize};

use crate::block::Height;

/// The production network and its test-flavored siblings.
///
/// Every consensus constant hangs off this enum; there is no global
/// mutable "current network" anywhere in the workspace.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum Network {
    /// The production network.
    Mainnet,
    /// The public test network.
    Testnet,
    /// The local regression-test network: trivial proof-of-work and
    /// auction windows short enough for unit tests.
    Regtest,
    /// The simulation network.
    Simnet,
}

impl Default for Network {
    fn default() -> Self {
        Network::Mainnet
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Network::Mainnet => "main",
            Network::Testnet => "testnet",
            Network::Regtest => "regtest",
            Network::Simnet => "simnet",
        };
        f.write_str(name)
    }
}

impl Network {
    /// The four-byte message-framing magic.
    pub fn magic(self) -> u32 {
        match self {
            Network::Mainnet => 0xebf1_0ad8,
            Network::Testnet => 0x8efa_1fbe,
            Network::Regtest => 0xbcf1_73aa,
            Network::Simnet => 0x473b_d012,
        }
    }

    /// The default listening port.
    pub fn default_port(self) -> u16 {
        match self {
            Network::Mainnet => 12038,
            Network::Testnet => 13038,
            Network::Regtest => 14038,
            Network::Simnet => 15038,
        }
    }

    /// The human-readable part of bech32 address strings.
    pub fn address_hrp(self) -> &'static str {
        match self {
            Network::Mainnet => "hs",
            Network::Testnet => "ts",
            Network::Regtest => "rs",
            Network::Simnet => "ss",
        }
    }

    /// Blocks between subsidy halvings.
    pub fn halving_interval(self) -> Height {
        match self {
            Network::Regtest => Height(2_500),
            _ => Height(170_000),
        }
    }

    /// Blocks a coinbase output must wait before it can be spent.
    pub fn coinbase_maturity(self) -> u32 {
        match self {
            Network::Mainnet | Network::Testnet => 100,
            Network::Regtest => 2,
            Network::Simnet => 6,
        }
    }

    /// Target seconds between blocks.
    pub fn pow_target_spacing(self) -> u64 {
        600
    }

    /// Number of blocks in the retargeting window.
    pub fn pow_target_window(self) -> u32 {
        17
    }

    /// Whether difficulty is pinned to the proof-of-work limit.
    ///
    /// The local networks never retarget so tests can mine with a
    /// constant `bits` field.
    pub fn no_retargeting(self) -> bool {
        matches!(self, Network::Regtest | Network::Simnet)
    }

    /// Blocks after an OPEN during which no bids are accepted yet.
    pub fn open_period(self) -> u32 {
        match self {
            Network::Mainnet | Network::Testnet => 36,
            Network::Regtest => 5,
            Network::Simnet => 18,
        }
    }

    /// Length of the sealed-bid window, in blocks.
    pub fn bidding_period(self) -> u32 {
        match self {
            Network::Mainnet | Network::Testnet => 720,
            Network::Regtest => 5,
            Network::Simnet => 50,
        }
    }

    /// Length of the reveal window, in blocks.
    pub fn reveal_period(self) -> u32 {
        match self {
            Network::Mainnet | Network::Testnet => 1_440,
            Network::Regtest => 10,
            Network::Simnet => 100,
        }
    }

    /// Blocks before an unrenewed name expires.
    pub fn renewal_window(self) -> u32 {
        match self {
            Network::Mainnet | Network::Testnet => 105_120,
            Network::Regtest => 5_000,
            Network::Simnet => 10_000,
        }
    }

    /// Blocks a transfer must age before it can be finalized.
    pub fn transfer_lockup(self) -> u32 {
        match self {
            Network::Mainnet | Network::Testnet => 288,
            Network::Regtest => 10,
            Network::Simnet => 50,
        }
    }
}

#[cfg(any(test, feature = "proptest-impl"))]
impl proptest::arbitrary::Arbitrary for Network {
    type Parameters = ();

    fn arbitrary_with(_args: ()) -> Self::Strategy {
        use proptest::prelude::*;
        prop_oneof![
            Just(Network::Mainnet),
            Just(Network::Testnet),
            Just(Network::Regtest),
            Just(Network::Simnet),
        ]
        .boxed()
    }

    type Strategy = proptest::strategy::BoxedStrategy<Self>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magics_are_distinct() {
        use std::collections::HashSet;
        let magics: HashSet<u32> = [
            Network::Mainnet,
            Network::Testnet,
            Network::Regtest,
            Network::Simnet,
        ]
        .iter()
        .map(|network| network.magic())
        .collect();
        assert_eq!(magics.len(), 4);
    }

    #[test]
    fn auction_windows_are_ordered() {
        for &network in &[
            Network::Mainnet,
            Network::Testnet,
            Network::Regtest,
            Network::Simnet,
        ] {
            // Bidding opens strictly after the open period and reveals
            // strictly after bidding; zero-length windows would make
            // whole covenant types unreachable.
            assert!(network.open_period() > 0);
            assert!(network.bidding_period() > 0);
            assert!(network.reveal_period() > 0);
            assert!(network.transfer_lockup() > 0);
        }
    }
}
