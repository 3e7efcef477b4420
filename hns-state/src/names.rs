//! Per-name auction and ownership records.

use std::io;

use serde::{Deserialize, Serialize};

use hns_chain::{
    amount::Amount,
    covenant::NameHash,
    parameters::Network,
    transaction::OutPoint,
    HandshakeDeserialize, HandshakeSerialize, SerializationError,
};

/// Where a name currently sits in its auction.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum NamePhase {
    /// The OPEN has landed; bids are not yet accepted.
    Opening,
    /// Sealed bids are accepted.
    Bidding,
    /// Bids may be revealed.
    Revealing,
    /// The auction is over; registration and ownership operations apply.
    Closed,
}

/// Everything the chain tracks about one name.
///
/// Second-price semantics: `highest` is the largest revealed bid,
/// `value` the second largest, and the winner registers at `value` —
/// revealing more only ever changes *who* wins, not what the runner-up
/// forces them to pay.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct NameState {
    /// The raw name.
    pub name: Vec<u8>,
    /// The height the auction opened (or the claim landed).
    pub height: u32,
    /// The height of the last renewal-equivalent action.
    pub renewal: u32,
    /// The outpoint currently conveying ownership; null until a reveal
    /// takes the lead.
    pub owner: OutPoint,
    /// The highest revealed bid.
    pub highest: Amount,
    /// The second-highest revealed bid: the price actually paid.
    pub value: Amount,
    /// The latest resource blob.
    pub data: Vec<u8>,
    /// The height a transfer started; 0 when no transfer is pending.
    pub transfer: u32,
    /// The height the name was revoked; 0 when not revoked.
    pub revoked: u32,
    /// Whether the name was claimed with a DNSSEC proof rather than
    /// auctioned.
    pub claimed: bool,
    /// Whether the name has been registered (has a tree leaf).
    pub registered: bool,
}

impl Default for NameState {
    fn default() -> Self {
        NameState {
            name: Vec::new(),
            height: 0,
            renewal: 0,
            owner: OutPoint::null(),
            highest: Amount::ZERO,
            value: Amount::ZERO,
            data: Vec::new(),
            transfer: 0,
            revoked: 0,
            claimed: false,
            registered: false,
        }
    }
}

impl NameState {
    /// A fresh record for an auction opened at `height`.
    pub fn open(name: Vec<u8>, height: u32) -> NameState {
        NameState {
            name,
            height,
            renewal: height,
            owner: OutPoint::null(),
            ..NameState::default()
        }
    }

    /// A fresh record for a name claimed at `height`.
    pub fn claim(name: Vec<u8>, height: u32, owner: OutPoint) -> NameState {
        NameState {
            name,
            height,
            renewal: height,
            owner,
            claimed: true,
            ..NameState::default()
        }
    }

    pub fn is_revoked(&self) -> bool {
        self.revoked != 0
    }

    pub fn has_owner(&self) -> bool {
        !self.owner.is_null()
    }

    /// The auction phase as of `height`.
    ///
    /// Claimed names never auction; their phase is always `Closed`.
    pub fn phase(&self, network: Network, height: u32) -> NamePhase {
        if self.claimed {
            return NamePhase::Closed;
        }
        let open_end = self.height + network.open_period();
        let bid_end = open_end + network.bidding_period();
        let reveal_end = bid_end + network.reveal_period();
        if height < open_end {
            NamePhase::Opening
        } else if height < bid_end {
            NamePhase::Bidding
        } else if height < reveal_end {
            NamePhase::Revealing
        } else {
            NamePhase::Closed
        }
    }

    /// Whether the name has lapsed as of `height` and may be re-opened.
    ///
    /// Revoked names sit out a full renewal window from the revocation;
    /// everything else expires a renewal window after its last renewal.
    pub fn is_expired(&self, network: Network, height: u32) -> bool {
        if self.revoked != 0 {
            return height >= self.revoked + network.renewal_window();
        }
        height >= self.renewal + network.renewal_window()
    }

    /// The tree leaf this record implies: the resource blob for live
    /// registered names, nothing otherwise.
    pub fn tree_leaf(&self) -> Option<Vec<u8>> {
        if self.registered && self.revoked == 0 {
            Some(self.data.clone())
        } else {
            None
        }
    }
}

impl HandshakeSerialize for NameState {
    fn handshake_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        self.name.handshake_serialize(&mut writer)?;
        self.height.handshake_serialize(&mut writer)?;
        self.renewal.handshake_serialize(&mut writer)?;
        self.owner.handshake_serialize(&mut writer)?;
        self.highest.handshake_serialize(&mut writer)?;
        self.value.handshake_serialize(&mut writer)?;
        self.data.handshake_serialize(&mut writer)?;
        self.transfer.handshake_serialize(&mut writer)?;
        self.revoked.handshake_serialize(&mut writer)?;
        let flags = self.claimed as u8 | ((self.registered as u8) << 1);
        writer.write_all(&[flags])?;
        Ok(())
    }
}

impl HandshakeDeserialize for NameState {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let name = Vec::<u8>::handshake_deserialize(&mut reader)?;
        let height = u32::handshake_deserialize(&mut reader)?;
        let renewal = u32::handshake_deserialize(&mut reader)?;
        let owner = OutPoint::handshake_deserialize(&mut reader)?;
        let highest = Amount::handshake_deserialize(&mut reader)?;
        let value = Amount::handshake_deserialize(&mut reader)?;
        let data = Vec::<u8>::handshake_deserialize(&mut reader)?;
        let transfer = u32::handshake_deserialize(&mut reader)?;
        let revoked = u32::handshake_deserialize(&mut reader)?;
        let flags = u8::handshake_deserialize(&mut reader)?;
        if flags & !0b11 != 0 {
            return Err(SerializationError::Parse("unknown name-state flags"));
        }
        Ok(NameState {
            name,
            height,
            renewal,
            owner,
            highest,
            value,
            data,
            transfer,
            revoked,
            claimed: flags & 1 == 1,
            registered: flags & 0b10 != 0,
        })
    }
}

/// Prior per-name snapshots for one block, recorded the first time each
/// name is touched. `None` means the name had no record before the block.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct NameUndo {
    pub entries: Vec<(NameHash, Option<NameState>)>,
}

impl NameUndo {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl HandshakeSerialize for NameUndo {
    fn handshake_serialize<W: io::Write>(&self, mut writer: W) -> Result<(), io::Error> {
        (self.entries.len() as u32).handshake_serialize(&mut writer)?;
        for (name_hash, state) in &self.entries {
            name_hash.handshake_serialize(&mut writer)?;
            state.is_some().handshake_serialize(&mut writer)?;
            if let Some(state) = state {
                state.handshake_serialize(&mut writer)?;
            }
        }
        Ok(())
    }
}

impl HandshakeDeserialize for NameUndo {
    fn handshake_deserialize<R: io::Read>(mut reader: R) -> Result<Self, SerializationError> {
        let count = u32::handshake_deserialize(&mut reader)?;
        let mut entries = Vec::with_capacity(std::cmp::min(count as usize, 1024));
        for _ in 0..count {
            let name_hash = NameHash::handshake_deserialize(&mut reader)?;
            let state = if bool::handshake_deserialize(&mut reader)? {
                Some(NameState::handshake_deserialize(&mut reader)?)
            } else {
                None
            };
            entries.push((name_hash, state));
        }
        Ok(NameUndo { entries })
    }
}
