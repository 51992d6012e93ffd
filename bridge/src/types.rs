// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{BridgeError, BridgeResult};
pub use ethers::types::Address as EthAddress;
pub use ethers::types::H256 as EthTransactionHash;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use strum_macros::Display;

/// The two sides of the bridge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    #[strum(serialize = "eth")]
    Ethereum,
    #[strum(serialize = "polkadot")]
    Polkadot,
}

impl Chain {
    pub fn opposite(&self) -> Chain {
        match self {
            Chain::Ethereum => Chain::Polkadot,
            Chain::Polkadot => Chain::Ethereum,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SwapDirection {
    EthereumToPolkadot,
    PolkadotToEthereum,
}

impl SwapDirection {
    /// Chain the funds leave from (where the lock/burn is submitted)
    pub fn origin(&self) -> Chain {
        match self {
            SwapDirection::EthereumToPolkadot => Chain::Ethereum,
            SwapDirection::PolkadotToEthereum => Chain::Polkadot,
        }
    }

    pub fn destination(&self) -> Chain {
        self.origin().opposite()
    }

    pub fn swap(&self) -> SwapDirection {
        match self {
            SwapDirection::EthereumToPolkadot => SwapDirection::PolkadotToEthereum,
            SwapDirection::PolkadotToEthereum => SwapDirection::EthereumToPolkadot,
        }
    }
}

/// Relay path carrying the cross-chain message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    #[strum(serialize = "basic")]
    Basic,
    #[strum(serialize = "incentivized")]
    Incentivized,
}

impl Channel {
    pub const ALL: [Channel; 2] = [Channel::Basic, Channel::Incentivized];

    /// On-chain channel id passed to the app contracts and pallets
    pub fn channel_id(&self) -> u8 {
        match self {
            Channel::Basic => 0,
            Channel::Incentivized => 1,
        }
    }
}

/// 32-byte parachain account id (the raw public key behind an SS58 address)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AccountId32(pub [u8; 32]);

impl AccountId32 {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl FromStr for AccountId32 {
    type Err = BridgeError;

    fn from_str(s: &str) -> BridgeResult<Self> {
        let bytes = hex::decode(s.trim_start_matches("0x"))
            .map_err(|e| BridgeError::Generic(format!("Invalid account id {s}: {e}")))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            BridgeError::Generic(format!("Account id must be 32 bytes, got {}", v.len()))
        })?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for AccountId32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl fmt::Debug for AccountId32 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId32({})", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direction_origin_and_swap() {
        let d = SwapDirection::EthereumToPolkadot;
        assert_eq!(d.origin(), Chain::Ethereum);
        assert_eq!(d.destination(), Chain::Polkadot);
        assert_eq!(d.swap(), SwapDirection::PolkadotToEthereum);
        assert_eq!(d.swap().swap(), d);
    }

    #[test]
    fn test_channel_ids() {
        assert_eq!(Channel::Basic.channel_id(), 0);
        assert_eq!(Channel::Incentivized.channel_id(), 1);
        assert_eq!(Channel::Incentivized.to_string(), "incentivized");
        assert_eq!(Chain::Ethereum.to_string(), "eth");
    }

    #[test]
    fn test_account_id_parse() {
        let hex_id = format!("0x{}", "ab".repeat(32));
        let id = AccountId32::from_str(&hex_id).unwrap();
        assert_eq!(id.to_string(), hex_id);
        assert!(AccountId32::from_str("0x1234").is_err());
        assert!(AccountId32::from_str("not-hex").is_err());
    }
}
