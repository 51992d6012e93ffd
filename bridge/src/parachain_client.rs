// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Parachain connector
//!
//! Wraps the injected signer extension and the parachain RPC behind
//! [`ParachainClientInner`]. Extrinsic status callbacks are turned into
//! [`LifecycleEvent`]s; the outbound message nonce is taken from the named
//! `*OutboundChannel.MessageAccepted` event of the inclusion block.

use std::sync::Arc;

use crate::asset::Asset;
use crate::error::{BridgeError, BridgeResult, RejectionReason};
use crate::events::{ExtrinsicStatus, ExtrinsicUpdate, LifecycleEvent, MessageDispatched};
use crate::lifecycle::{RelayEventSource, TransferSubmitter, EVENT_CHANNEL_SIZE};
use crate::metrics::BridgeMetrics;
use crate::transactions::Transaction;
use crate::types::{Chain, Channel, EthAddress};
use async_trait::async_trait;
use ethers::types::U256;
use tap::TapFallible;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Extrinsic submitted on the parachain for a Polkadot-origin transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BurnCall {
    /// `ethApp.burn(channelId, recipient, amount)`
    BurnEth {
        channel_id: u8,
        recipient: EthAddress,
        amount: U256,
    },
    /// `erc20App.burn(channelId, token, recipient, amount)`
    BurnErc20 {
        channel_id: u8,
        token: EthAddress,
        recipient: EthAddress,
        amount: U256,
    },
    /// `dotApp.lock(channelId, recipient, amount)`
    LockDot {
        channel_id: u8,
        recipient: EthAddress,
        amount: U256,
    },
}

impl BurnCall {
    pub fn for_transaction(transaction: &Transaction) -> BridgeResult<Self> {
        let asset = &transaction.asset;
        if asset.is_non_fungible() {
            return Err(BridgeError::Generic(format!(
                "Non-fungible {} cannot be sent from the parachain",
                asset.symbol
            )));
        }
        let recipient = transaction.receiver.parse::<EthAddress>().map_err(|e| {
            BridgeError::Generic(format!("Invalid recipient {}: {e}", transaction.receiver))
        })?;
        let channel_id = transaction.channel.channel_id();
        let amount = transaction.amount;

        if asset.is_dot() {
            Ok(BurnCall::LockDot {
                channel_id,
                recipient,
                amount,
            })
        } else if asset.is_ether() {
            Ok(BurnCall::BurnEth {
                channel_id,
                recipient,
                amount,
            })
        } else {
            let token = asset.contract_address().ok_or_else(|| {
                BridgeError::Generic(format!("Invalid ERC20 contract {}", asset.address))
            })?;
            Ok(BurnCall::BurnErc20 {
                channel_id,
                token,
                recipient,
                amount,
            })
        }
    }
}

/// Balance a parachain account holds for an asset
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParachainAsset {
    /// Native DOT
    Native,
    /// Wrapped Ether
    Ether,
    /// Wrapped ERC20 token
    Erc20(EthAddress),
}

impl ParachainAsset {
    pub fn for_asset(asset: &Asset) -> Option<Self> {
        if asset.is_dot() {
            Some(ParachainAsset::Native)
        } else if asset.is_ether() {
            Some(ParachainAsset::Ether)
        } else {
            asset.contract_address().map(ParachainAsset::Erc20)
        }
    }
}

pub struct ParachainClient<P> {
    inner: Arc<P>,
    account: RwLock<Option<String>>,
    metrics: Arc<BridgeMetrics>,
}

impl<P> ParachainClient<P>
where
    P: ParachainClientInner + 'static,
{
    pub fn new(inner: P, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            inner: Arc::new(inner),
            account: RwLock::new(None),
            metrics,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub async fn account(&self) -> Option<String> {
        self.account.read().await.clone()
    }

    /// Enable the signer extension and select its first account
    pub async fn connect(&self) -> BridgeResult<String> {
        let accounts = self
            .inner
            .accounts()
            .await
            .map_err(|e| BridgeError::WalletConnection(e.to_string()))
            .tap_err(|e| self.record_error(e))?;
        let account = accounts
            .into_iter()
            .next()
            .ok_or_else(|| BridgeError::WalletConnection("No polkadot accounts found".to_string()))
            .tap_err(|e| self.record_error(e))?;
        info!("Connected polkadot account {}", account);
        *self.account.write().await = Some(account.clone());
        Ok(account)
    }

    pub async fn balance(&self, asset: &Asset) -> BridgeResult<U256> {
        let account = self
            .account()
            .await
            .ok_or_else(|| BridgeError::BalanceQuery("Polkadot account not set".to_string()))?;
        let parachain_asset = ParachainAsset::for_asset(asset).ok_or_else(|| {
            BridgeError::BalanceQuery(format!("No contract set for {}", asset.symbol))
        })?;
        self.inner
            .balance(&account, parachain_asset)
            .await
            .tap_err(|e| self.record_error(e))
    }

    fn record_error(&self, error: &BridgeError) {
        warn!("Parachain connector error: {:?}", error);
        self.metrics
            .connector_errors
            .with_label_values(&[&Chain::Polkadot.to_string(), error.error_type()])
            .inc();
    }
}

/// Lifecycle events carried by one extrinsic status callback
pub(crate) fn translate_update(update: &ExtrinsicUpdate) -> Vec<LifecycleEvent> {
    if let Some(dispatch_error) = &update.dispatch_error {
        warn!("Extrinsic dispatch error: {}", dispatch_error);
        return vec![LifecycleEvent::Failed(RejectionReason::Dispatch(
            dispatch_error.clone(),
        ))];
    }
    match update.status {
        ExtrinsicStatus::Ready => vec![LifecycleEvent::Accepted],
        ExtrinsicStatus::Broadcast => vec![],
        ExtrinsicStatus::InBlock(block) => {
            let nonce = update
                .events
                .iter()
                .find_map(|e| e.outbound_message_nonce())
                .map(|(channel, nonce)| {
                    info!(
                        "Outbound {} channel message nonce={} in block {:?}",
                        channel, nonce, block
                    );
                    nonce
                });
            if nonce.is_none() {
                warn!("No MessageAccepted event in block {:?}", block);
            }
            vec![LifecycleEvent::Included { nonce }]
        }
        ExtrinsicStatus::Finalized(block) => {
            debug!("Extrinsic finalized at block {:?}", block);
            vec![LifecycleEvent::Finalized]
        }
    }
}

#[async_trait]
impl<P> TransferSubmitter for ParachainClient<P>
where
    P: ParachainClientInner + 'static,
{
    async fn submit_transfer(
        &self,
        transaction: &Transaction,
    ) -> BridgeResult<mpsc::Receiver<LifecycleEvent>> {
        let call = BurnCall::for_transaction(transaction)?;
        info!("Submitting {:?} signed by {}", call, transaction.sender);

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        // The extension prompts for a signature inside submit
        tx.send(LifecycleEvent::Submitted)
            .await
            .map_err(|e| BridgeError::Generic(e.to_string()))?;

        let mut updates = self
            .inner
            .submit(call, &transaction.sender)
            .await
            .map_err(|message| {
                BridgeError::SubmissionRejected(RejectionReason::from_message(&message))
            })
            .tap_err(|e| self.record_error(e))?;

        tokio::spawn(async move {
            while let Some(update) = updates.recv().await {
                let finalized = matches!(update.status, ExtrinsicStatus::Finalized(_));
                for event in translate_update(&update) {
                    if tx.send(event).await.is_err() {
                        return;
                    }
                }
                // the subscription is dropped once the block is final
                if finalized {
                    break;
                }
            }
        });
        Ok(rx)
    }
}

#[async_trait]
impl<P> RelayEventSource for ParachainClient<P>
where
    P: ParachainClientInner + 'static,
{
    async fn message_dispatched(
        &self,
        channel: Channel,
    ) -> BridgeResult<mpsc::Receiver<MessageDispatched>> {
        self.inner
            .message_dispatched(channel)
            .await
            .tap_err(|e| self.record_error(e))
    }
}

// Use a trait to abstract over the signer extension / parachain RPC and the mock used in tests.
#[async_trait]
pub trait ParachainClientInner: Send + Sync {
    /// Accounts exposed by the signer extension
    async fn accounts(&self) -> BridgeResult<Vec<String>>;

    async fn balance(&self, account: &str, asset: ParachainAsset) -> BridgeResult<U256>;

    /// Sign and submit; on failure returns the raw extension/pool error message
    async fn submit(
        &self,
        call: BurnCall,
        signer: &str,
    ) -> Result<mpsc::Receiver<ExtrinsicUpdate>, String>;

    /// `{basic,incentivized}InboundChannel.MessageDispatched` events
    async fn message_dispatched(
        &self,
        channel: Channel,
    ) -> BridgeResult<mpsc::Receiver<MessageDispatched>>;
}
