// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use std::str::FromStr;
use std::sync::Arc;

use crate::asset::{Asset, NftMetadataSource, TokenKind};
use crate::config::{BridgeConfig, ContractAddresses};
use crate::error::{BridgeError, BridgeResult, RejectionReason};
use crate::events::{decode_outbound_log, EthTxEvent, LifecycleEvent, MessageDispatched, WalletEvent};
use crate::lifecycle::{RelayEventSource, TransferSubmitter, EVENT_CHANNEL_SIZE};
use crate::metrics::BridgeMetrics;
use crate::transactions::Transaction;
use crate::types::{AccountId32, Chain, Channel, EthAddress};
use async_trait::async_trait;
use ethers::types::{TransactionReceipt, U256, U64};
use tap::TapFallible;
use tokio::sync::{broadcast, mpsc, RwLock};

/// Gas limit attached to every lock/burn call
pub const LOCK_GAS_LIMIT: u64 = 500_000;

/// Contract call submitted on Ethereum for an Ethereum-origin transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LockCall {
    /// `ERC721App.lock(token, tokenId, recipient, channelId)`
    Erc721 {
        app: EthAddress,
        token: EthAddress,
        token_id: U256,
        recipient: AccountId32,
        channel_id: u8,
    },
    /// `ETHApp.lock(recipient, channelId, paraId, fee)`, amount sent as value
    Ether {
        app: EthAddress,
        recipient: AccountId32,
        channel_id: u8,
        para_id: u32,
        fee: U256,
        value: U256,
    },
    /// `ERC20App.lock(token, recipient, amount, channelId, paraId, fee)`
    Erc20 {
        app: EthAddress,
        token: EthAddress,
        recipient: AccountId32,
        amount: U256,
        channel_id: u8,
        para_id: u32,
        fee: U256,
    },
    /// `DOTApp.burn(recipient, amount, channelId)` for wrapped DOT
    BurnWrappedDot {
        app: EthAddress,
        recipient: AccountId32,
        amount: U256,
        channel_id: u8,
    },
}

impl LockCall {
    pub fn app(&self) -> EthAddress {
        match self {
            LockCall::Erc721 { app, .. }
            | LockCall::Ether { app, .. }
            | LockCall::Erc20 { app, .. }
            | LockCall::BurnWrappedDot { app, .. } => *app,
        }
    }

    /// Select the app contract call for an Ethereum-origin transaction
    pub fn for_transaction(
        transaction: &Transaction,
        config: &BridgeConfig,
    ) -> BridgeResult<Self> {
        let asset = &transaction.asset;
        let recipient = AccountId32::from_str(&transaction.receiver)?;
        let channel_id = transaction.channel.channel_id();
        let contracts = &config.contracts;
        let fee = U256::from(config.transaction_fee);

        if let TokenKind::NonFungible { eth_id, .. } = &asset.token {
            let token = asset.contract_address().ok_or_else(|| {
                BridgeError::Generic(format!("Invalid ERC721 contract {}", asset.address))
            })?;
            let token_id = U256::from_dec_str(eth_id)
                .map_err(|e| BridgeError::Generic(format!("Invalid token id {eth_id}: {e}")))?;
            return Ok(LockCall::Erc721 {
                app: contracts.erc721_app,
                token,
                token_id,
                recipient,
                channel_id,
            });
        }
        if asset.is_ether() {
            return Ok(LockCall::Ether {
                app: contracts.eth_app,
                recipient,
                channel_id,
                para_id: config.parachain_id,
                fee,
                value: transaction.amount,
            });
        }
        if asset.is_dot() {
            return Ok(LockCall::BurnWrappedDot {
                app: contracts.dot_app,
                recipient,
                amount: transaction.amount,
                channel_id,
            });
        }
        let token = asset.contract_address().ok_or_else(|| {
            BridgeError::Generic(format!("Invalid ERC20 contract {}", asset.address))
        })?;
        Ok(LockCall::Erc20 {
            app: contracts.erc20_app,
            token,
            recipient,
            amount: transaction.amount,
            channel_id,
            para_id: config.parachain_id,
            fee,
        })
    }
}

pub struct EthClient<P> {
    inner: Arc<P>,
    config: BridgeConfig,
    account: Arc<RwLock<Option<EthAddress>>>,
    metrics: Arc<BridgeMetrics>,
}

impl<P> EthClient<P>
where
    P: EthClientInner + 'static,
{
    pub fn new(inner: P, config: BridgeConfig, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            inner: Arc::new(inner),
            config,
            account: Arc::new(RwLock::new(None)),
            metrics,
        }
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }

    pub async fn account(&self) -> Option<EthAddress> {
        *self.account.read().await
    }

    /// Request wallet access and start following wallet notifications
    pub async fn connect(&self) -> BridgeResult<EthAddress> {
        let network_id = self
            .inner
            .network_id()
            .await
            .map_err(|e| BridgeError::WalletConnection(e.to_string()))?;
        if network_id != self.config.permitted_eth_network_id {
            let error = BridgeError::WalletConnection(format!(
                "Wallet is on network {}, expected {}",
                network_id, self.config.permitted_eth_network_id
            ));
            self.record_error(&error);
            return Err(error);
        }

        let accounts = self
            .inner
            .request_accounts()
            .await
            .map_err(|e| BridgeError::WalletConnection(e.to_string()))
            .tap_err(|e| self.record_error(e))?;
        let account = accounts
            .first()
            .copied()
            .ok_or_else(|| BridgeError::WalletConnection("Ethereum account not set".to_string()))
            .tap_err(|e| self.record_error(e))?;

        *self.account.write().await = Some(account);
        tracing::info!("Connected Ethereum account {:?} on network {}", account, network_id);

        tokio::spawn(watch_wallet(
            self.inner.wallet_events(),
            self.account.clone(),
            self.config.permitted_eth_network_id,
        ));
        Ok(account)
    }

    /// Balance of the connected account in base units
    pub async fn balance(&self, asset: &Asset) -> BridgeResult<U256> {
        let account = self
            .account()
            .await
            .ok_or_else(|| BridgeError::BalanceQuery("Ethereum account not set".to_string()))?;
        if asset.is_ether() {
            return self.inner.ether_balance(account).await;
        }
        let contract = asset.contract_address().ok_or_else(|| {
            BridgeError::BalanceQuery(format!("No contract set for {}", asset.symbol))
        })?;
        self.inner
            .erc20_balance(contract, account)
            .await
            .tap_err(|e| self.record_error(e))
    }

    fn record_error(&self, error: &BridgeError) {
        tracing::warn!("Ethereum connector error: {:?}", error);
        self.metrics
            .connector_errors
            .with_label_values(&[&Chain::Ethereum.to_string(), error.error_type()])
            .inc();
    }
}

async fn watch_wallet(
    mut events: broadcast::Receiver<WalletEvent>,
    account: Arc<RwLock<Option<EthAddress>>>,
    permitted_network_id: u64,
) {
    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(broadcast::error::RecvError::Lagged(n)) => {
                tracing::warn!("Wallet event watcher lagged by {} events", n);
                continue;
            }
            Err(broadcast::error::RecvError::Closed) => break,
        };
        match event {
            WalletEvent::AccountsChanged(accounts) => {
                let next = accounts.first().and_then(|a| a.parse::<EthAddress>().ok());
                tracing::info!("Wallet accounts changed, active account: {:?}", next);
                *account.write().await = next;
            }
            WalletEvent::Disconnected => {
                tracing::info!("Wallet disconnected");
                *account.write().await = None;
            }
            WalletEvent::ChainChanged(chain_id) if chain_id != permitted_network_id => {
                tracing::warn!(
                    "Wallet switched to network {}, expected {}; clearing account",
                    chain_id,
                    permitted_network_id
                );
                *account.write().await = None;
            }
            WalletEvent::ChainChanged(_) => {}
        }
    }
}

/// Translates contract call events into lifecycle events for one transfer
pub(crate) struct EthEventTranslator {
    contracts: ContractAddresses,
    finality_confirmations: u64,
    finalized: bool,
    metrics: Arc<BridgeMetrics>,
}

impl EthEventTranslator {
    pub(crate) fn new(config: &BridgeConfig, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            contracts: config.contracts.clone(),
            finality_confirmations: config.eth_finality_confirmations,
            finalized: false,
            metrics,
        }
    }

    pub(crate) fn translate(&mut self, event: EthTxEvent) -> Vec<LifecycleEvent> {
        match event {
            EthTxEvent::Sending => vec![LifecycleEvent::Submitted],
            EthTxEvent::Sent => {
                tracing::debug!("Transaction sent");
                vec![]
            }
            EthTxEvent::TransactionHash(hash) => {
                vec![LifecycleEvent::HashAssigned(format!("{:?}", hash))]
            }
            EthTxEvent::Receipt(receipt) => self.handle_receipt(&receipt),
            EthTxEvent::Confirmation { confirmations, .. } => {
                let mut events = vec![LifecycleEvent::Confirmation(confirmations)];
                if !self.finalized && confirmations >= self.finality_confirmations {
                    self.finalized = true;
                    events.push(LifecycleEvent::Finalized);
                }
                events
            }
            EthTxEvent::Error(error) => {
                tracing::warn!(
                    "Transaction error (hash={:?}): {}",
                    error.transaction_hash,
                    error.message
                );
                vec![LifecycleEvent::Failed(RejectionReason::from_message(
                    &error.message,
                ))]
            }
        }
    }

    fn handle_receipt(&self, receipt: &TransactionReceipt) -> Vec<LifecycleEvent> {
        if receipt.status == Some(U64::zero()) {
            return vec![LifecycleEvent::Failed(RejectionReason::Other(format!(
                "Transaction {:?} reverted",
                receipt.transaction_hash
            )))];
        }
        let mut nonce = None;
        for log in &receipt.logs {
            match decode_outbound_log(log, &self.contracts) {
                Some(Ok((channel, decoded))) => {
                    tracing::info!("Outbound {} channel message nonce={}", channel, decoded);
                    nonce = Some(decoded);
                }
                Some(Err(e)) => {
                    tracing::warn!("Skipping channel log: {:?}", e);
                    self.metrics.unrecognized_logs.inc();
                }
                None => {}
            }
        }
        if nonce.is_none() {
            tracing::warn!(
                "No outbound channel nonce in receipt {:?}",
                receipt.transaction_hash
            );
        }
        vec![LifecycleEvent::Included { nonce }]
    }
}

#[async_trait]
impl<P> TransferSubmitter for EthClient<P>
where
    P: EthClientInner + 'static,
{
    async fn submit_transfer(
        &self,
        transaction: &Transaction,
    ) -> BridgeResult<mpsc::Receiver<LifecycleEvent>> {
        let from = transaction
            .sender
            .parse::<EthAddress>()
            .map_err(|e| BridgeError::Generic(format!("Invalid sender {}: {e}", transaction.sender)))?;
        let call = LockCall::for_transaction(transaction, &self.config)?;
        tracing::info!("Submitting {:?} from {:?}", call, from);

        let mut raw = self
            .inner
            .lock(call, from, LOCK_GAS_LIMIT)
            .await
            .tap_err(|e| self.record_error(e))?;

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
        let mut translator = EthEventTranslator::new(&self.config, self.metrics.clone());
        tokio::spawn(async move {
            while let Some(event) = raw.recv().await {
                for lifecycle_event in translator.translate(event) {
                    if tx.send(lifecycle_event).await.is_err() {
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }
}

#[async_trait]
impl<P> RelayEventSource for EthClient<P>
where
    P: EthClientInner + 'static,
{
    async fn message_dispatched(
        &self,
        channel: Channel,
    ) -> BridgeResult<mpsc::Receiver<MessageDispatched>> {
        let address = self.config.contracts.inbound_channel_address(channel);
        self.inner
            .message_dispatched(channel, address)
            .await
            .tap_err(|e| self.record_error(e))
    }
}

#[async_trait]
impl<P> NftMetadataSource for EthClient<P>
where
    P: EthClientInner + 'static,
{
    async fn token_name(&self, contract: EthAddress) -> BridgeResult<String> {
        self.inner.token_name(contract).await
    }

    async fn token_symbol(&self, contract: EthAddress) -> BridgeResult<String> {
        self.inner.token_symbol(contract).await
    }
}

// Use a trait to abstract over the injected wallet provider and the mock used in tests.
#[async_trait]
pub trait EthClientInner: Send + Sync {
    /// Prompt the wallet for account access
    async fn request_accounts(&self) -> BridgeResult<Vec<EthAddress>>;

    async fn network_id(&self) -> BridgeResult<u64>;

    fn wallet_events(&self) -> broadcast::Receiver<WalletEvent>;

    async fn ether_balance(&self, account: EthAddress) -> BridgeResult<U256>;

    /// `balanceOf(account)` on a token contract
    async fn erc20_balance(&self, token: EthAddress, account: EthAddress) -> BridgeResult<U256>;

    async fn token_name(&self, contract: EthAddress) -> BridgeResult<String>;

    async fn token_symbol(&self, contract: EthAddress) -> BridgeResult<String>;

    /// Send an app contract call and stream its progress
    async fn lock(
        &self,
        call: LockCall,
        from: EthAddress,
        gas_limit: u64,
    ) -> BridgeResult<mpsc::Receiver<EthTxEvent>>;

    /// `MessageDispatched` events of an inbound channel contract
    async fn message_dispatched(
        &self,
        channel: Channel,
        inbound_channel: EthAddress,
    ) -> BridgeResult<mpsc::Receiver<MessageDispatched>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::tests::{dot, erc20, ether};
    use crate::config::tests::test_config;
    use crate::events::EthTxError;
    use crate::test_utils::{init_for_testing, outbound_log, EthMockClient};
    use crate::types::SwapDirection;
    use std::time::Duration;

    fn recipient() -> String {
        format!("0x{}", "cd".repeat(32))
    }

    fn transaction(asset: Asset) -> Transaction {
        Transaction::new(
            format!("{:?}", EthAddress::repeat_byte(0xee)),
            recipient(),
            U256::from(1_000u64),
            asset,
            SwapDirection::EthereumToPolkadot,
            Channel::Incentivized,
        )
    }

    fn client(mock: EthMockClient) -> EthClient<EthMockClient> {
        EthClient::new(mock, test_config(), Arc::new(BridgeMetrics::new_for_testing()))
    }

    #[tokio::test]
    async fn test_connect_rejects_wrong_network() {
        init_for_testing();
        let mock = EthMockClient::new(1);
        mock.set_accounts(vec![EthAddress::repeat_byte(0xee)]);
        let client = client(mock);
        let err = client.connect().await.unwrap_err();
        assert!(matches!(err, BridgeError::WalletConnection(_)));
        assert!(client.account().await.is_none());
    }

    #[tokio::test]
    async fn test_connect_requires_account() {
        init_for_testing();
        let client = client(EthMockClient::new(15));
        assert!(matches!(
            client.connect().await,
            Err(BridgeError::WalletConnection(_))
        ));
    }

    #[tokio::test]
    async fn test_wallet_events_update_account() {
        init_for_testing();
        let mock = EthMockClient::new(15);
        mock.set_accounts(vec![EthAddress::repeat_byte(0xee)]);
        let client = client(mock);
        assert_eq!(client.connect().await.unwrap(), EthAddress::repeat_byte(0xee));

        let other = EthAddress::repeat_byte(0xab);
        client
            .inner()
            .emit_wallet_event(WalletEvent::AccountsChanged(vec![format!("{:?}", other)]));
        wait_for_account(&client, Some(other)).await;

        client.inner().emit_wallet_event(WalletEvent::ChainChanged(15));
        client.inner().emit_wallet_event(WalletEvent::Disconnected);
        wait_for_account(&client, None).await;
    }

    async fn wait_for_account(client: &EthClient<EthMockClient>, expected: Option<EthAddress>) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while client.account().await != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_balance_requires_account_and_contract() {
        init_for_testing();
        let mock = EthMockClient::new(15);
        mock.set_accounts(vec![EthAddress::repeat_byte(0xee)]);
        mock.set_ether_balance(U256::from(77u64));
        let client = client(mock);

        assert!(matches!(
            client.balance(&ether()).await,
            Err(BridgeError::BalanceQuery(_))
        ));

        client.connect().await.unwrap();
        assert_eq!(client.balance(&ether()).await.unwrap(), U256::from(77u64));
        client
            .inner()
            .set_erc20_balance(EthAddress::repeat_byte(0x11), U256::from(5u64));
        assert_eq!(client.balance(&erc20()).await.unwrap(), U256::from(5u64));
        assert!(matches!(
            client.balance(&dot()).await,
            Err(BridgeError::BalanceQuery(_))
        ));
    }

    #[test]
    fn test_lock_call_selection() {
        let config = test_config();

        let call = LockCall::for_transaction(&transaction(ether()), &config).unwrap();
        assert!(matches!(
            call,
            LockCall::Ether { app, channel_id: 1, para_id: 1000, value, .. }
                if app == config.contracts.eth_app && value == U256::from(1_000u64)
        ));

        let call = LockCall::for_transaction(&transaction(erc20()), &config).unwrap();
        assert!(matches!(
            call,
            LockCall::Erc20 { token, .. } if token == EthAddress::repeat_byte(0x11)
        ));
        assert_eq!(call.app(), config.contracts.erc20_app);

        let call = LockCall::for_transaction(&transaction(dot()), &config).unwrap();
        assert_eq!(call.app(), config.contracts.dot_app);

        let mut bad = transaction(ether());
        bad.receiver = "5GrwvaEF".to_string();
        assert!(LockCall::for_transaction(&bad, &config).is_err());
    }

    #[test]
    fn test_translate_receipt_decodes_nonce_by_address() {
        let config = test_config();
        let metrics = Arc::new(BridgeMetrics::new_for_testing());
        let mut translator = EthEventTranslator::new(&config, metrics.clone());

        let malformed = ethers::types::Log {
            address: config.contracts.basic_outbound_channel,
            data: vec![1u8, 2, 3].into(),
            ..Default::default()
        };
        let receipt = TransactionReceipt {
            status: Some(U64::one()),
            logs: vec![
                outbound_log(EthAddress::repeat_byte(0x99), 1, false),
                malformed,
                outbound_log(config.contracts.incentivized_outbound_channel, 42, true),
            ],
            ..Default::default()
        };
        assert_eq!(
            translator.translate(EthTxEvent::Receipt(receipt)),
            vec![LifecycleEvent::Included { nonce: Some(42) }]
        );
        assert_eq!(metrics.unrecognized_logs.get(), 1);
    }

    #[test]
    fn test_translate_reverted_receipt_and_errors() {
        let config = test_config();
        let mut translator =
            EthEventTranslator::new(&config, Arc::new(BridgeMetrics::new_for_testing()));
        let reverted = TransactionReceipt {
            status: Some(U64::zero()),
            ..Default::default()
        };
        assert!(matches!(
            translator.translate(EthTxEvent::Receipt(reverted)).as_slice(),
            [LifecycleEvent::Failed(RejectionReason::Other(_))]
        ));
        assert_eq!(
            translator.translate(EthTxEvent::Error(EthTxError {
                message: "insufficient funds for gas".to_string(),
                transaction_hash: None,
            })),
            vec![LifecycleEvent::Failed(RejectionReason::InsufficientFunds(
                "insufficient funds for gas".to_string()
            ))]
        );
    }

    #[test]
    fn test_translate_confirmations_emits_finalized_once() {
        let config = test_config();
        let mut translator =
            EthEventTranslator::new(&config, Arc::new(BridgeMetrics::new_for_testing()));
        let hash = Default::default();
        let mut finalized = 0;
        for confirmations in 1..=20 {
            let events = translator.translate(EthTxEvent::Confirmation {
                confirmations,
                transaction_hash: hash,
            });
            assert_eq!(events[0], LifecycleEvent::Confirmation(confirmations));
            if events.contains(&LifecycleEvent::Finalized) {
                assert!(confirmations >= config.eth_finality_confirmations);
                finalized += 1;
            }
        }
        assert_eq!(finalized, 1);
    }

    #[tokio::test]
    async fn test_submit_transfer_streams_translated_events() {
        init_for_testing();
        let mock = EthMockClient::new(15);
        let (events_tx, events_rx) = mpsc::channel(10);
        mock.set_lock_events(events_rx);
        let client = client(mock);

        let mut rx = client.submit_transfer(&transaction(ether())).await.unwrap();
        events_tx.send(EthTxEvent::Sending).await.unwrap();
        events_tx.send(EthTxEvent::Sent).await.unwrap();
        events_tx
            .send(EthTxEvent::TransactionHash(ethers::types::H256::repeat_byte(0x01)))
            .await
            .unwrap();
        drop(events_tx);

        assert_eq!(rx.recv().await, Some(LifecycleEvent::Submitted));
        assert!(matches!(
            rx.recv().await,
            Some(LifecycleEvent::HashAssigned(hash)) if hash.starts_with("0x0101")
        ));
        assert_eq!(rx.recv().await, None);

        let calls = client.inner().lock_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1, LOCK_GAS_LIMIT);
    }

    #[tokio::test]
    async fn test_submit_without_wallet_response_is_an_error() {
        init_for_testing();
        let client = client(EthMockClient::new(15));
        let err = client.submit_transfer(&transaction(ether())).await.unwrap_err();
        assert!(matches!(err, BridgeError::SubmissionRejected(_)));
    }
}
