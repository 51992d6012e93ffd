// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::error::{BridgeError, BridgeResult};
use crate::types::{Channel, EthAddress};
use polkaeth_bridge_config::Config;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Addresses of the bridge app and channel contracts on Ethereum
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct ContractAddresses {
    pub eth_app: EthAddress,
    pub erc20_app: EthAddress,
    pub erc721_app: EthAddress,
    pub dot_app: EthAddress,
    // Outbound channels emit the message nonce for Ethereum-origin transfers
    pub basic_outbound_channel: EthAddress,
    pub incentivized_outbound_channel: EthAddress,
    // Inbound channels emit MessageDispatched for Polkadot-origin transfers
    pub basic_inbound_channel: EthAddress,
    pub incentivized_inbound_channel: EthAddress,
}

impl ContractAddresses {
    /// Which outbound channel, if any, emitted a log at `address`
    pub fn outbound_channel(&self, address: &EthAddress) -> Option<Channel> {
        if *address == self.basic_outbound_channel {
            Some(Channel::Basic)
        } else if *address == self.incentivized_outbound_channel {
            Some(Channel::Incentivized)
        } else {
            None
        }
    }

    pub fn inbound_channel_address(&self, channel: Channel) -> EthAddress {
        match channel {
            Channel::Basic => self.basic_inbound_channel,
            Channel::Incentivized => self.incentivized_inbound_channel,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub struct BridgeConfig {
    // Ethereum confirmations before a lock counts as confirmed on the origin chain
    #[serde(default = "default_required_eth_confirmations")]
    pub required_eth_confirmations: u64,
    // Ethereum confirmations after which the origin transaction is reported finalized
    #[serde(default = "default_eth_finality_confirmations")]
    pub eth_finality_confirmations: u64,
    // The only Ethereum network id the wallet may be connected to
    pub permitted_eth_network_id: u64,
    // Destination parachain id passed to the Ethereum app contracts
    pub parachain_id: u32,
    // Relayer fee attached to incentivized lock calls (base units)
    #[serde(default)]
    pub transaction_fee: u64,
    pub contracts: ContractAddresses,
}

fn default_required_eth_confirmations() -> u64 {
    12
}

fn default_eth_finality_confirmations() -> u64 {
    64
}

impl Config for BridgeConfig {}

impl BridgeConfig {
    pub fn validate(&self) -> BridgeResult<()> {
        info!("Starting config validation");
        if self.required_eth_confirmations == 0 {
            return Err(BridgeError::Config(
                "required-eth-confirmations must be at least 1".to_string(),
            ));
        }
        if self.eth_finality_confirmations < self.required_eth_confirmations {
            return Err(BridgeError::Config(format!(
                "eth-finality-confirmations ({}) must not be below required-eth-confirmations ({})",
                self.eth_finality_confirmations, self.required_eth_confirmations
            )));
        }
        let contracts = &self.contracts;
        if contracts.basic_outbound_channel == contracts.incentivized_outbound_channel {
            return Err(BridgeError::Config(
                "basic and incentivized outbound channels share an address".to_string(),
            ));
        }
        if contracts.basic_inbound_channel == contracts.incentivized_inbound_channel {
            return Err(BridgeError::Config(
                "basic and incentivized inbound channels share an address".to_string(),
            ));
        }
        info!(
            "Config validated: network_id={}, required_confirmations={}, parachain_id={}",
            self.permitted_eth_network_id, self.required_eth_confirmations, self.parachain_id
        );
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_config() -> BridgeConfig {
        BridgeConfig {
            required_eth_confirmations: 5,
            eth_finality_confirmations: 12,
            permitted_eth_network_id: 15,
            parachain_id: 1000,
            transaction_fee: 0,
            contracts: ContractAddresses {
                eth_app: EthAddress::repeat_byte(0x01),
                erc20_app: EthAddress::repeat_byte(0x02),
                erc721_app: EthAddress::repeat_byte(0x03),
                dot_app: EthAddress::repeat_byte(0x04),
                basic_outbound_channel: EthAddress::repeat_byte(0x05),
                incentivized_outbound_channel: EthAddress::repeat_byte(0x06),
                basic_inbound_channel: EthAddress::repeat_byte(0x07),
                incentivized_inbound_channel: EthAddress::repeat_byte(0x08),
            },
        }
    }

    #[test]
    fn test_validate() {
        assert!(test_config().validate().is_ok());

        let mut config = test_config();
        config.required_eth_confirmations = 0;
        assert!(matches!(config.validate(), Err(BridgeError::Config(_))));

        let mut config = test_config();
        config.eth_finality_confirmations = 1;
        assert!(config.validate().is_err());

        let mut config = test_config();
        config.contracts.incentivized_outbound_channel = config.contracts.basic_outbound_channel;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_outbound_channel_lookup() {
        let contracts = test_config().contracts;
        assert_eq!(
            contracts.outbound_channel(&EthAddress::repeat_byte(0x05)),
            Some(Channel::Basic)
        );
        assert_eq!(
            contracts.outbound_channel(&EthAddress::repeat_byte(0x06)),
            Some(Channel::Incentivized)
        );
        assert_eq!(contracts.outbound_channel(&EthAddress::repeat_byte(0x09)), None);
    }

    #[test]
    fn test_load_yaml_with_defaults() {
        let yaml = r#"
permitted-eth-network-id: 15
parachain-id: 1000
contracts:
  eth-app: "0x0101010101010101010101010101010101010101"
  erc20-app: "0x0202020202020202020202020202020202020202"
  erc721-app: "0x0303030303030303030303030303030303030303"
  dot-app: "0x0404040404040404040404040404040404040404"
  basic-outbound-channel: "0x0505050505050505050505050505050505050505"
  incentivized-outbound-channel: "0x0606060606060606060606060606060606060606"
  basic-inbound-channel: "0x0707070707070707070707070707070707070707"
  incentivized-inbound-channel: "0x0808080808080808080808080808080808080808"
"#;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yaml");
        std::fs::write(&path, yaml).unwrap();

        let config = BridgeConfig::load(&path).unwrap();
        assert_eq!(config.required_eth_confirmations, 12);
        assert_eq!(config.eth_finality_confirmations, 64);
        assert_eq!(config.transaction_fee, 0);
        assert_eq!(config.contracts, test_config().contracts);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_uses_kebab_case_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bridge.yml");
        test_config().save(&path).unwrap();

        let raw: serde_yaml::Value =
            serde_yaml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["required-eth-confirmations"].as_u64(), Some(5));
        assert!(raw["contracts"]["basic-inbound-channel"].is_string());
        assert_eq!(BridgeConfig::load(&path).unwrap(), test_config());
    }
}
