// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use crate::asset::Asset;
use crate::error::BridgeError;
use crate::eth_client::{EthClient, EthClientInner};
use crate::parachain_client::{ParachainClient, ParachainClientInner};
use crate::types::Chain;
use futures::future::join_all;
use tracing::{debug, warn};

/// Balance queries that failed for one asset
#[derive(Debug, Default)]
pub struct BalanceErrors {
    pub eth: Option<BridgeError>,
    pub polkadot: Option<BridgeError>,
}

impl BalanceErrors {
    pub fn is_empty(&self) -> bool {
        self.eth.is_none() && self.polkadot.is_none()
    }
}

/// Refresh both chain balances of `asset`. A failed query keeps the previous value.
pub async fn refresh_balance<E, P>(
    eth: &EthClient<E>,
    parachain: &ParachainClient<P>,
    asset: &mut Asset,
) -> BalanceErrors
where
    E: EthClientInner + 'static,
    P: ParachainClientInner + 'static,
{
    let (eth_balance, polkadot_balance) =
        futures::join!(eth.balance(asset), parachain.balance(asset));
    let mut errors = BalanceErrors::default();
    match eth_balance {
        Ok(balance) => asset.balance.set(Chain::Ethereum, balance),
        Err(e) => errors.eth = Some(e),
    }
    match polkadot_balance {
        Ok(balance) => asset.balance.set(Chain::Polkadot, balance),
        Err(e) => errors.polkadot = Some(e),
    }
    if !errors.is_empty() {
        warn!("Balance refresh for {} incomplete: {:?}", asset.symbol, errors);
    }
    errors
}

/// Refresh every asset concurrently; results are in asset order
pub async fn refresh_balances<E, P>(
    eth: &EthClient<E>,
    parachain: &ParachainClient<P>,
    assets: &mut [Asset],
) -> Vec<BalanceErrors>
where
    E: EthClientInner + 'static,
    P: ParachainClientInner + 'static,
{
    debug!("Refreshing balances of {} assets", assets.len());
    join_all(
        assets
            .iter_mut()
            .map(|asset| refresh_balance(eth, parachain, asset)),
    )
    .await
}
