// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::relay::subscribe_relay;
use super::ChainConnector;
use crate::asset::Asset;
use crate::error::{BridgeError, BridgeResult, RejectionReason};
use crate::events::{LifecycleEvent, MessageDispatched};
use crate::metrics::BridgeMetrics;
use crate::transactions::{
    Transaction, TransactionAction, TransactionStatus, TransactionStore,
};
use crate::types::{Chain, Channel, SwapDirection};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// A user-initiated transfer
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub asset: Asset,
    pub direction: SwapDirection,
    /// Amount as entered by the user, in display units of the sending side
    pub amount: String,
    pub sender: String,
    pub receiver: String,
    pub channel: Channel,
}

/// Handle to the task tracking one transfer
pub struct TransferHandle {
    handle: JoinHandle<Transaction>,
}

impl TransferHandle {
    /// Wait for tracking to stop and return the last known state of the transfer
    pub async fn join(self) -> BridgeResult<Transaction> {
        self.handle
            .await
            .map_err(|e| BridgeError::Generic(format!("Transfer tracker failed: {e}")))
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// Starts transfers and tracks each one in its own task
#[derive(Clone)]
pub struct TransactionEngine {
    store: Arc<TransactionStore>,
    ethereum: Arc<dyn ChainConnector>,
    polkadot: Arc<dyn ChainConnector>,
    metrics: Arc<BridgeMetrics>,
}

impl TransactionEngine {
    pub fn new(
        store: Arc<TransactionStore>,
        ethereum: Arc<dyn ChainConnector>,
        polkadot: Arc<dyn ChainConnector>,
        metrics: Arc<BridgeMetrics>,
    ) -> Self {
        Self {
            store,
            ethereum,
            polkadot,
            metrics,
        }
    }

    pub fn store(&self) -> &Arc<TransactionStore> {
        &self.store
    }

    fn connector(&self, chain: Chain) -> Arc<dyn ChainConnector> {
        match chain {
            Chain::Ethereum => self.ethereum.clone(),
            Chain::Polkadot => self.polkadot.clone(),
        }
    }

    /// Submit a transfer. Returns once tracking has started; progress is
    /// published through the store.
    pub fn transfer(&self, request: TransferRequest) -> BridgeResult<TransferHandle> {
        let amount = request
            .asset
            .parse_amount(&request.amount, request.direction)?;
        let transaction = Transaction::new(
            request.sender,
            request.receiver,
            amount,
            request.asset,
            request.direction,
            request.channel,
        );
        let origin = transaction.chain;
        info!(
            "[TransactionEngine] New {:?} transfer of {} {}",
            request.direction,
            request.amount,
            transaction.asset.symbols(request.direction).from
        );
        self.metrics
            .transactions_created
            .with_label_values(&[&origin.to_string()])
            .inc();

        let tracker = TransferTracker {
            transaction,
            store: self.store.clone(),
            origin: self.connector(origin),
            destination: self.connector(origin.opposite()),
            metrics: self.metrics.clone(),
        };
        Ok(TransferHandle {
            handle: tokio::spawn(tracker.run()),
        })
    }
}

enum Step {
    Origin(Option<LifecycleEvent>),
    Relay(Option<MessageDispatched>),
}

async fn next_relay(
    relay: &mut Option<mpsc::Receiver<MessageDispatched>>,
) -> Option<MessageDispatched> {
    match relay {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

/// Applies the events of a single transfer to the store
struct TransferTracker {
    /// Local copy; the store holds the authoritative state once a hash is assigned
    transaction: Transaction,
    store: Arc<TransactionStore>,
    origin: Arc<dyn ChainConnector>,
    destination: Arc<dyn ChainConnector>,
    metrics: Arc<BridgeMetrics>,
}

impl TransferTracker {
    async fn run(mut self) -> Transaction {
        let mut events = match self.origin.submit_transfer(&self.transaction).await {
            Ok(events) => events,
            Err(e) => {
                error!("[TransferTracker] Submission failed: {:?}", e);
                self.reject(e.rejection_message());
                return self.current();
            }
        };

        let mut relay: Option<mpsc::Receiver<MessageDispatched>> = None;
        let mut origin_open = true;
        loop {
            let step = tokio::select! {
                event = events.recv(), if origin_open => Step::Origin(event),
                dispatched = next_relay(&mut relay), if relay.is_some() => Step::Relay(dispatched),
                else => break,
            };
            match step {
                Step::Origin(Some(event)) => {
                    if let Some(nonce) = self.apply(event) {
                        if relay.is_none() {
                            relay = self.subscribe(nonce).await;
                        }
                    }
                }
                Step::Origin(None) => {
                    debug!(
                        "[TransferTracker] Origin event stream closed for hash={}",
                        self.transaction.hash
                    );
                    origin_open = false;
                }
                Step::Relay(Some(dispatched)) => self.apply_dispatch(dispatched),
                Step::Relay(None) => relay = None,
            }
            if self.is_done(origin_open, relay.is_some()) {
                break;
            }
        }
        let current = self.current();
        info!(
            "[TransferTracker] Stopped tracking hash={} status={}",
            current.hash, current.status
        );
        current
    }

    /// Apply one origin chain event. Returns the nonce to watch on the
    /// destination chain when it becomes known.
    fn apply(&mut self, event: LifecycleEvent) -> Option<u64> {
        debug!("[TransferTracker] Applying {} event", event.name());
        match event {
            LifecycleEvent::Submitted => {
                self.store
                    .dispatch(TransactionAction::SetPending(self.transaction.clone()));
                None
            }
            LifecycleEvent::HashAssigned(hash) => {
                self.assign_hash(hash);
                None
            }
            LifecycleEvent::Accepted => {
                // display-only placeholder until the parachain reports a block
                let placeholder = format!("0x{}", hex::encode(rand::random::<[u8; 32]>()));
                self.assign_hash(placeholder);
                None
            }
            LifecycleEvent::Included { nonce } => {
                if !self.has_hash() {
                    warn!("[TransferTracker] Inclusion reported before a hash was assigned");
                    return None;
                }
                let hash = self.transaction.hash.clone();
                if let Some(nonce) = nonce {
                    self.transaction.nonce = Some(nonce);
                    self.store.dispatch(TransactionAction::SetNonce {
                        hash: hash.clone(),
                        nonce,
                    });
                }
                if self.transaction.chain == Chain::Polkadot {
                    self.store.dispatch(TransactionAction::SetStatus {
                        hash,
                        status: TransactionStatus::WaitingForRelay,
                    });
                }
                nonce
            }
            LifecycleEvent::Confirmation(confirmations) => {
                self.store.dispatch(TransactionAction::SetConfirmations {
                    hash: self.transaction.hash.clone(),
                    confirmations,
                });
                None
            }
            LifecycleEvent::Finalized => {
                self.store.dispatch(TransactionAction::OriginFinalized {
                    hash: self.transaction.hash.clone(),
                });
                None
            }
            LifecycleEvent::Failed(reason) => {
                self.fail(reason);
                None
            }
        }
    }

    fn apply_dispatch(&mut self, dispatched: MessageDispatched) {
        info!(
            "[TransferTracker] Relay dispatched nonce={} on {} channel for hash={}",
            dispatched.nonce, dispatched.channel, self.transaction.hash
        );
        self.store.dispatch(TransactionAction::MessageDispatched {
            hash: self.transaction.hash.clone(),
            nonce: dispatched.nonce,
            channel: dispatched.channel,
        });
    }

    async fn subscribe(&self, nonce: u64) -> Option<mpsc::Receiver<MessageDispatched>> {
        match subscribe_relay(self.destination.as_ref(), nonce, self.metrics.clone()).await {
            Ok(rx) => {
                info!(
                    "[TransferTracker] Watching {} for relay of nonce={}",
                    self.transaction.direction.destination(),
                    nonce
                );
                Some(rx)
            }
            Err(e) => {
                error!(
                    "[TransferTracker] Failed to subscribe to relay events for nonce={}: {:?}",
                    nonce, e
                );
                None
            }
        }
    }

    fn has_hash(&self) -> bool {
        !self.transaction.hash.is_empty()
    }

    fn assign_hash(&mut self, hash: String) {
        if self.has_hash() {
            debug!(
                "[TransferTracker] Ignoring second hash {} for hash={}",
                hash, self.transaction.hash
            );
            return;
        }
        self.transaction.hash = hash;
        self.transaction.confirmations = 0;
        self.transaction.status = TransactionStatus::WaitingForConfirmation;
        info!(
            "[TransferTracker] Transaction created hash={}",
            self.transaction.hash
        );
        self.store
            .dispatch(TransactionAction::Add(self.transaction.clone()));
    }

    fn fail(&mut self, reason: RejectionReason) {
        let error = BridgeError::from(reason);
        self.reject(error.rejection_message());
    }

    fn reject(&mut self, message: String) {
        warn!(
            "[TransferTracker] Transfer rejected (hash={:?}): {}",
            self.transaction.hash, message
        );
        self.metrics
            .transactions_rejected
            .with_label_values(&[&self.transaction.chain.to_string(), "submission_rejected"])
            .inc();
        if self.has_hash() {
            let hash = self.transaction.hash.clone();
            self.store.dispatch(TransactionAction::SetError {
                hash: hash.clone(),
                error: message,
            });
            self.store.dispatch(TransactionAction::SetStatus {
                hash,
                status: TransactionStatus::Rejected,
            });
        } else {
            self.transaction.status = TransactionStatus::Rejected;
            self.transaction.error = Some(message);
            self.store
                .dispatch(TransactionAction::SetPending(self.transaction.clone()));
        }
    }

    fn current(&self) -> Transaction {
        if self.has_hash() {
            if let Some(transaction) = self.store.get_by_hash(&self.transaction.hash) {
                return transaction;
            }
        }
        self.transaction.clone()
    }

    fn is_done(&self, origin_open: bool, relay_open: bool) -> bool {
        let current = self.current();
        if current.status.is_terminal() {
            return true;
        }
        !origin_open && (!relay_open || current.is_relayed())
    }
}
