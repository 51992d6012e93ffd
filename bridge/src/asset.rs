// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cross-chain asset model
//!
//! An [`Asset`] describes a token that exists natively on one chain and as a
//! wrapped token on the other. Which of the native/wrapped symbol and decimals
//! apply as "from" and "to" depends on the swap direction.

use crate::error::{BridgeError, BridgeResult};
use crate::types::{Chain, EthAddress, SwapDirection};
use anyhow::Context;
use async_trait::async_trait;
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Sentinel address representing Ether (the chain's native coin) in token lists
pub const ETHER_ADDRESS: &str = "0x0";

/// Length of a `0x`-prefixed Ethereum contract address
const CONTRACT_ADDRESS_LEN: usize = 42;

/// Ethereum chain id used for non-fungible assets when none is supplied
const DEFAULT_NFT_CHAIN_ID: u64 = 15;

/// Token list entry as published in the bridge token list JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenDescriptor {
    pub chain_id: u64,
    pub address: String,
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
    #[serde(rename = "logoURI", default)]
    pub logo_uri: String,
}

/// Fungible decimals pair or non-fungible id pair. Exactly one is ever populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    Fungible {
        /// native decimals
        decimals: u8,
        /// decimals of the wrapped token on the opposite chain
        wrapped_decimals: u8,
    },
    NonFungible {
        eth_id: String,
        sub_id: Option<String>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssetType {
    Erc20,
    Erc721,
}

/// Balance snapshot on each chain, in base units
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetBalance {
    pub eth: U256,
    pub polkadot: U256,
}

impl AssetBalance {
    pub fn get(&self, chain: Chain) -> U256 {
        match chain {
            Chain::Ethereum => self.eth,
            Chain::Polkadot => self.polkadot,
        }
    }

    pub fn set(&mut self, chain: Chain, value: U256) {
        match chain {
            Chain::Ethereum => self.eth = value,
            Chain::Polkadot => self.polkadot = value,
        }
    }
}

/// `from`/`to` pair resolved for a swap direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirectionalPair<T> {
    pub from: T,
    pub to: T,
}

impl<T> DirectionalPair<T> {
    pub fn swapped(self) -> Self {
        Self {
            from: self.to,
            to: self.from,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Asset {
    /// chain of the native asset
    pub chain: Chain,
    pub name: String,
    /// name of the wrapped token on the opposite chain
    pub wrapped_name: String,
    pub symbol: String,
    /// symbol of the wrapped token on the opposite chain
    pub wrapped_symbol: String,
    pub token: TokenKind,
    /// Ethereum contract address, or [`ETHER_ADDRESS`] for Ether
    pub address: String,
    /// Ethereum chain id the contract is deployed on
    pub chain_id: u64,
    pub logo_uri: String,
    pub balance: AssetBalance,
}

/// Source of ERC721 metadata, queried when a non-fungible asset is discovered
#[async_trait]
pub trait NftMetadataSource: Send + Sync {
    async fn token_name(&self, contract: EthAddress) -> BridgeResult<String>;
    async fn token_symbol(&self, contract: EthAddress) -> BridgeResult<String>;
}

/// Inputs for [`Asset::non_fungible`]
#[derive(Debug, Clone)]
pub struct NonFungibleParams {
    pub contract: EthAddress,
    pub chain: Chain,
    pub eth_id: String,
    pub sub_id: Option<String>,
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub chain_id: Option<u64>,
    pub logo_uri: Option<String>,
}

impl Asset {
    pub fn fungible(
        token: &TokenDescriptor,
        chain: Chain,
        wrapped_decimals: u8,
        contract: Option<EthAddress>,
    ) -> Self {
        let address = contract
            .map(|c| format!("{:?}", c))
            .unwrap_or_else(|| token.address.clone());
        Self {
            chain,
            name: token.name.clone(),
            wrapped_name: token.name.clone(),
            symbol: token.symbol.clone(),
            wrapped_symbol: token.symbol.clone(),
            token: TokenKind::Fungible {
                decimals: token.decimals,
                wrapped_decimals,
            },
            address,
            chain_id: token.chain_id,
            logo_uri: token.logo_uri.clone(),
            balance: AssetBalance::default(),
        }
    }

    /// Build a non-fungible asset, fetching name/symbol from the contract when not supplied
    pub async fn non_fungible(
        source: &dyn NftMetadataSource,
        params: NonFungibleParams,
    ) -> BridgeResult<Self> {
        let name = match params.name {
            Some(name) => name,
            None => source
                .token_name(params.contract)
                .await
                .map_err(|e| BridgeError::MetadataFetch(format!("name(): {e}")))?,
        };
        let symbol = match params.symbol {
            Some(symbol) => symbol,
            None => source
                .token_symbol(params.contract)
                .await
                .map_err(|e| BridgeError::MetadataFetch(format!("symbol(): {e}")))?,
        };
        debug!(
            "Discovered non-fungible asset {} ({}) id={} at {:?}",
            name, symbol, params.eth_id, params.contract
        );
        Ok(Self {
            chain: params.chain,
            wrapped_name: name.clone(),
            name,
            wrapped_symbol: symbol.clone(),
            symbol,
            token: TokenKind::NonFungible {
                eth_id: params.eth_id,
                sub_id: params.sub_id,
            },
            address: format!("{:?}", params.contract),
            chain_id: params.chain_id.unwrap_or(DEFAULT_NFT_CHAIN_ID),
            logo_uri: params.logo_uri.unwrap_or_default(),
            balance: AssetBalance::default(),
        })
    }

    pub fn asset_type(&self) -> AssetType {
        match self.token {
            TokenKind::Fungible { .. } => AssetType::Erc20,
            TokenKind::NonFungible { .. } => AssetType::Erc721,
        }
    }

    pub fn is_erc20(&self) -> bool {
        self.asset_type() == AssetType::Erc20
            && self.address.len() == CONTRACT_ADDRESS_LEN
            && self.chain == Chain::Ethereum
    }

    pub fn is_ether(&self) -> bool {
        !self.is_erc20() && self.chain == Chain::Ethereum && self.address == ETHER_ADDRESS
    }

    pub fn is_dot(&self) -> bool {
        self.chain == Chain::Polkadot && !self.is_erc20() && !self.is_ether()
    }

    pub fn is_non_fungible(&self) -> bool {
        matches!(self.token, TokenKind::NonFungible { .. })
    }

    /// Parsed contract address, `None` for Ether and malformed addresses
    pub fn contract_address(&self) -> Option<EthAddress> {
        if self.address.len() != CONTRACT_ADDRESS_LEN {
            return None;
        }
        self.address.parse().ok()
    }

    /// The chain on which the unwrapped token lives, judged structurally
    fn native_side(&self) -> Chain {
        if self.is_dot() {
            Chain::Polkadot
        } else {
            Chain::Ethereum
        }
    }

    pub fn symbols(&self, direction: SwapDirection) -> DirectionalPair<String> {
        let native_first = DirectionalPair {
            from: self.symbol.clone(),
            to: self.wrapped_symbol.clone(),
        };
        if direction.origin() == self.native_side() {
            native_first
        } else {
            native_first.swapped()
        }
    }

    pub fn decimals(&self, direction: SwapDirection) -> DirectionalPair<u8> {
        let TokenKind::Fungible {
            decimals,
            wrapped_decimals,
        } = self.token
        else {
            return DirectionalPair { from: 0, to: 0 };
        };
        let native_first = DirectionalPair {
            from: decimals,
            to: wrapped_decimals,
        };
        if direction.origin() == self.native_side() {
            native_first
        } else {
            native_first.swapped()
        }
    }

    /// Convert a user-entered amount to base units of the sending side
    pub fn parse_amount(&self, display: &str, direction: SwapDirection) -> BridgeResult<U256> {
        parse_amount(display, self.decimals(direction).from)
    }
}

pub fn parse_amount(display: &str, decimals: u8) -> BridgeResult<U256> {
    ethers::utils::parse_units(display.trim(), decimals as u32)
        .map(U256::from)
        .map_err(|e| BridgeError::Generic(format!("Invalid amount {display}: {e}")))
}

/// Read a token list JSON file (an array of [`TokenDescriptor`])
pub fn load_token_list(path: &Path) -> anyhow::Result<Vec<TokenDescriptor>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Unable to read token list {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Unable to parse token list {}", path.display()))
}

/// Build the fungible asset list for the connected Ethereum network.
///
/// Tokens deployed on other networks are dropped. Wrapped tokens keep the
/// native decimals.
pub fn initialize_assets(tokens: &[TokenDescriptor], network_chain_id: u64) -> Vec<Asset> {
    let assets: Vec<Asset> = tokens
        .iter()
        .filter(|t| t.chain_id == network_chain_id)
        .map(|t| Asset::fungible(t, Chain::Ethereum, t.decimals, None))
        .collect();
    info!(
        "Initialized {}/{} assets for chain_id={}",
        assets.len(),
        tokens.len(),
        network_chain_id
    );
    assets
}
