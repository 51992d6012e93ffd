// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Mock wallet/chain backends and helpers shared by unit tests.

use crate::asset::NftMetadataSource;
use crate::error::{BridgeError, BridgeResult, RejectionReason};
use crate::eth_client::{EthClientInner, LockCall};
use crate::events::{EthTxEvent, ExtrinsicUpdate, MessageDispatched, WalletEvent};
use crate::lifecycle::RelayEventSource;
use crate::parachain_client::{BurnCall, ParachainAsset, ParachainClientInner};
use crate::transactions::{TransactionStore, TransactionsState};
use crate::types::{Channel, EthAddress};
use async_trait::async_trait;
use ethers::abi::Token;
use ethers::types::{Log, U256};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tracing_subscriber::EnvFilter;

/// Send tracing output to the test harness. `RUST_LOG` overrides the default level.
pub fn init_for_testing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

/// Outbound channel log as emitted by the basic or incentivized channel contract
pub fn outbound_log(address: EthAddress, nonce: u64, incentivized: bool) -> Log {
    let mut tokens = vec![
        Token::Address(EthAddress::repeat_byte(0xaa)),
        Token::Uint(U256::from(nonce)),
    ];
    if incentivized {
        tokens.push(Token::Uint(U256::from(1_000u64)));
    }
    tokens.push(Token::Bytes(vec![0xde, 0xad]));
    Log {
        address,
        data: ethers::abi::encode(&tokens).into(),
        ..Default::default()
    }
}

/// Wait (at most 5s) until `f` holds for the store state
pub async fn wait_until(store: &TransactionStore, f: impl Fn(&TransactionsState) -> bool) {
    let mut rx = store.subscribe();
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            let done = f(&rx.borrow_and_update());
            if done {
                return;
            }
            tokio::select! {
                _ = rx.changed() => {}
                _ = tokio::time::sleep(Duration::from_millis(10)) => {}
            }
        }
    })
    .await
    .expect("condition not reached in time");
}

pub struct MockNftMetadata {
    name: Option<String>,
    symbol: Option<String>,
}

impl MockNftMetadata {
    pub fn new(name: &str, symbol: &str) -> Self {
        Self {
            name: Some(name.to_string()),
            symbol: Some(symbol.to_string()),
        }
    }

    pub fn failing() -> Self {
        Self {
            name: None,
            symbol: None,
        }
    }
}

#[async_trait]
impl NftMetadataSource for MockNftMetadata {
    async fn token_name(&self, contract: EthAddress) -> BridgeResult<String> {
        self.name
            .clone()
            .ok_or_else(|| BridgeError::Provider(format!("execution reverted at {:?}", contract)))
    }

    async fn token_symbol(&self, contract: EthAddress) -> BridgeResult<String> {
        self.symbol
            .clone()
            .ok_or_else(|| BridgeError::Provider(format!("execution reverted at {:?}", contract)))
    }
}

/// Relay event source that replays past dispatches to late subscribers
#[derive(Default)]
pub struct MockRelaySource {
    history: Mutex<Vec<MessageDispatched>>,
    subscribers: Mutex<Vec<(Channel, mpsc::Sender<MessageDispatched>)>>,
}

impl MockRelaySource {
    pub fn emit(&self, channel: Channel, nonce: u64) {
        let event = MessageDispatched { channel, nonce };
        self.history.lock().unwrap().push(event);
        for (subscribed, tx) in self.subscribers.lock().unwrap().iter() {
            if *subscribed == channel {
                let _ = tx.try_send(event);
            }
        }
    }

    /// Subscriptions whose receiving end is still alive
    pub fn open_subscriptions(&self) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, tx)| !tx.is_closed())
            .count()
    }
}

#[async_trait]
impl RelayEventSource for MockRelaySource {
    async fn message_dispatched(
        &self,
        channel: Channel,
    ) -> BridgeResult<mpsc::Receiver<MessageDispatched>> {
        let (tx, rx) = mpsc::channel(100);
        // hold the history lock so no emit slips between replay and registration
        let history = self.history.lock().unwrap();
        for event in history.iter().filter(|e| e.channel == channel) {
            let _ = tx.try_send(*event);
        }
        self.subscribers.lock().unwrap().push((channel, tx));
        drop(history);
        Ok(rx)
    }
}

// Mock wallet provider used in test environments.
pub struct EthMockClient {
    network_id: u64,
    accounts: Mutex<Vec<EthAddress>>,
    ether_balance: Mutex<U256>,
    erc20_balances: Mutex<HashMap<EthAddress, U256>>,
    wallet_events: broadcast::Sender<WalletEvent>,
    lock_events: Mutex<Option<mpsc::Receiver<EthTxEvent>>>,
    lock_calls: Mutex<Vec<(LockCall, u64)>>,
    relay: MockRelaySource,
}

impl EthMockClient {
    pub fn new(network_id: u64) -> Self {
        Self {
            network_id,
            accounts: Default::default(),
            ether_balance: Default::default(),
            erc20_balances: Default::default(),
            wallet_events: broadcast::channel(100).0,
            lock_events: Default::default(),
            lock_calls: Default::default(),
            relay: MockRelaySource::default(),
        }
    }

    pub fn set_accounts(&self, accounts: Vec<EthAddress>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn set_ether_balance(&self, balance: U256) {
        *self.ether_balance.lock().unwrap() = balance;
    }

    pub fn set_erc20_balance(&self, token: EthAddress, balance: U256) {
        self.erc20_balances.lock().unwrap().insert(token, balance);
    }

    /// Events returned for the next lock call
    pub fn set_lock_events(&self, events: mpsc::Receiver<EthTxEvent>) {
        *self.lock_events.lock().unwrap() = Some(events);
    }

    pub fn lock_calls(&self) -> Vec<(LockCall, u64)> {
        self.lock_calls.lock().unwrap().clone()
    }

    pub fn emit_wallet_event(&self, event: WalletEvent) {
        let _ = self.wallet_events.send(event);
    }

    /// Emit `MessageDispatched` on an Ethereum inbound channel
    pub fn emit_dispatch(&self, channel: Channel, nonce: u64) {
        self.relay.emit(channel, nonce);
    }
}

#[async_trait]
impl EthClientInner for EthMockClient {
    async fn request_accounts(&self) -> BridgeResult<Vec<EthAddress>> {
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn network_id(&self) -> BridgeResult<u64> {
        Ok(self.network_id)
    }

    fn wallet_events(&self) -> broadcast::Receiver<WalletEvent> {
        self.wallet_events.subscribe()
    }

    async fn ether_balance(&self, _account: EthAddress) -> BridgeResult<U256> {
        Ok(*self.ether_balance.lock().unwrap())
    }

    async fn erc20_balance(&self, token: EthAddress, _account: EthAddress) -> BridgeResult<U256> {
        Ok(self
            .erc20_balances
            .lock()
            .unwrap()
            .get(&token)
            .copied()
            .unwrap_or_default())
    }

    async fn token_name(&self, contract: EthAddress) -> BridgeResult<String> {
        Ok(format!("Token {:?}", contract))
    }

    async fn token_symbol(&self, _contract: EthAddress) -> BridgeResult<String> {
        Ok("NFT".to_string())
    }

    async fn lock(
        &self,
        call: LockCall,
        _from: EthAddress,
        gas_limit: u64,
    ) -> BridgeResult<mpsc::Receiver<EthTxEvent>> {
        self.lock_calls.lock().unwrap().push((call, gas_limit));
        self.lock_events
            .lock()
            .unwrap()
            .take()
            .ok_or(BridgeError::SubmissionRejected(RejectionReason::Cancelled))
    }

    async fn message_dispatched(
        &self,
        channel: Channel,
        _inbound_channel: EthAddress,
    ) -> BridgeResult<mpsc::Receiver<MessageDispatched>> {
        self.relay.message_dispatched(channel).await
    }
}

// Mock signer extension / parachain RPC used in test environments.
#[derive(Default)]
pub struct ParachainMockClient {
    accounts: Mutex<Vec<String>>,
    balances: Mutex<HashMap<ParachainAsset, U256>>,
    submit_error: Mutex<Option<String>>,
    submit_updates: Mutex<Option<mpsc::Receiver<ExtrinsicUpdate>>>,
    submitted: Mutex<Vec<(BurnCall, String)>>,
    relay: MockRelaySource,
}

impl ParachainMockClient {
    pub fn set_accounts(&self, accounts: Vec<String>) {
        *self.accounts.lock().unwrap() = accounts;
    }

    pub fn set_balance(&self, asset: ParachainAsset, balance: U256) {
        self.balances.lock().unwrap().insert(asset, balance);
    }

    /// Make every following submission fail with `message`
    pub fn set_submit_error(&self, message: &str) {
        *self.submit_error.lock().unwrap() = Some(message.to_string());
    }

    /// Status updates returned for the next submission
    pub fn set_submit_updates(&self, updates: mpsc::Receiver<ExtrinsicUpdate>) {
        *self.submit_error.lock().unwrap() = None;
        *self.submit_updates.lock().unwrap() = Some(updates);
    }

    pub fn submitted_calls(&self) -> Vec<(BurnCall, String)> {
        self.submitted.lock().unwrap().clone()
    }

    /// Emit `MessageDispatched` on a parachain inbound channel
    pub fn emit_dispatch(&self, channel: Channel, nonce: u64) {
        self.relay.emit(channel, nonce);
    }

    pub fn open_relay_subscriptions(&self) -> usize {
        self.relay.open_subscriptions()
    }
}

#[async_trait]
impl ParachainClientInner for ParachainMockClient {
    async fn accounts(&self) -> BridgeResult<Vec<String>> {
        Ok(self.accounts.lock().unwrap().clone())
    }

    async fn balance(&self, _account: &str, asset: ParachainAsset) -> BridgeResult<U256> {
        Ok(self
            .balances
            .lock()
            .unwrap()
            .get(&asset)
            .copied()
            .unwrap_or_default())
    }

    async fn submit(
        &self,
        call: BurnCall,
        signer: &str,
    ) -> Result<mpsc::Receiver<ExtrinsicUpdate>, String> {
        self.submitted
            .lock()
            .unwrap()
            .push((call, signer.to_string()));
        if let Some(message) = self.submit_error.lock().unwrap().clone() {
            return Err(message);
        }
        self.submit_updates
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| "Cancelled".to_string())
    }

    async fn message_dispatched(
        &self,
        channel: Channel,
    ) -> BridgeResult<mpsc::Receiver<MessageDispatched>> {
        self.relay.message_dispatched(channel).await
    }
}
