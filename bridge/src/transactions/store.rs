// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transaction store - session-lifetime history of transfers
//!
//! State changes only through [`TransactionsState::reduce`], a total function
//! of the current state and an action. Lookups that match nothing leave the
//! state unchanged. Entries are never removed.

use super::types::*;
use crate::metrics::BridgeMetrics;
use crate::types::{Chain, Channel};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionsState {
    /// Transfers with an assigned hash, in submission order
    pub transactions: Vec<Transaction>,
    /// Transfer awaiting its hash (or rejected before getting one)
    pub pending_transaction: Option<Transaction>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransactionAction {
    Add(Transaction),
    SetPending(Transaction),
    UpdateByHash {
        hash: String,
        update: TransactionUpdate,
    },
    UpdateByNonce {
        nonce: u64,
        update: TransactionUpdate,
    },
    SetConfirmations {
        hash: String,
        confirmations: u64,
    },
    SetStatus {
        hash: String,
        status: TransactionStatus,
    },
    SetError {
        hash: String,
        error: String,
    },
    SetNonce {
        hash: String,
        nonce: u64,
    },
    OriginFinalized {
        hash: String,
    },
    /// Relay of the transfer `hash` was dispatched on its destination chain
    MessageDispatched {
        hash: String,
        nonce: u64,
        channel: Channel,
    },
}

impl TransactionsState {
    pub fn find_by_hash(&self, hash: &str) -> Option<&Transaction> {
        if hash.is_empty() {
            return None;
        }
        self.transactions.iter().find(|t| t.hash == hash)
    }

    pub fn find_by_nonce(&self, nonce: u64) -> Option<&Transaction> {
        self.transactions.iter().find(|t| t.nonce == Some(nonce))
    }

    /// Compute the state that results from applying `action`
    pub fn reduce(&self, action: &TransactionAction, required_confirmations: u64) -> Self {
        let mut next = self.clone();
        match action {
            TransactionAction::Add(transaction) => {
                if next.find_by_hash(&transaction.hash).is_some() {
                    warn!(
                        "[TransactionStore] Duplicate add for hash={}, ignoring",
                        transaction.hash
                    );
                    return next;
                }
                next.transactions.push(transaction.clone());
                next.pending_transaction = None;
            }
            TransactionAction::SetPending(transaction) => {
                next.pending_transaction = Some(transaction.clone());
            }
            TransactionAction::UpdateByHash { hash, update } => {
                next.for_hash(hash, |t| t.apply_update(update));
            }
            TransactionAction::UpdateByNonce { nonce, update } => {
                next.for_nonce(*nonce, |t| t.apply_update(update));
            }
            TransactionAction::SetConfirmations {
                hash,
                confirmations,
            } => {
                next.for_hash(hash, |t| {
                    if t.is_rejected() {
                        return;
                    }
                    t.confirmations = *confirmations;
                    let status = t.status_for_confirmations(*confirmations, required_confirmations);
                    t.advance(status);
                    t.promote_finalized();
                });
            }
            TransactionAction::SetStatus { hash, status } => {
                next.for_hash(hash, |t| {
                    t.advance(*status);
                });
            }
            TransactionAction::SetError { hash, error } => {
                next.for_hash(hash, |t| t.error = Some(error.clone()));
            }
            TransactionAction::SetNonce { hash, nonce } => {
                next.for_hash(hash, |t| t.nonce = Some(*nonce));
            }
            TransactionAction::OriginFinalized { hash } => {
                next.for_hash(hash, |t| {
                    if t.is_rejected() {
                        return;
                    }
                    t.origin_finalized = true;
                    t.promote_finalized();
                });
            }
            TransactionAction::MessageDispatched {
                hash,
                nonce,
                channel,
            } => {
                next.for_hash(hash, |t| {
                    if t.nonce != Some(*nonce) || t.is_rejected() || t.is_relayed() {
                        return;
                    }
                    match t.chain {
                        Chain::Ethereum => t.is_minted = true,
                        Chain::Polkadot => t.is_burned = true,
                    }
                    t.dispatch_channel = Some(*channel);
                    if t.origin_confirmed(required_confirmations) {
                        t.advance(TransactionStatus::Relayed);
                        t.promote_finalized();
                    }
                });
            }
        }
        next
    }

    fn for_hash(&mut self, hash: &str, f: impl FnMut(&mut Transaction)) {
        if hash.is_empty() {
            return;
        }
        self.transactions
            .iter_mut()
            .filter(|t| t.hash == hash)
            .for_each(f);
    }

    fn for_nonce(&mut self, nonce: u64, f: impl FnMut(&mut Transaction)) {
        self.transactions
            .iter_mut()
            .filter(|t| t.nonce == Some(nonce))
            .for_each(f);
    }
}

/// Shared handle to the transaction history.
///
/// Writers are serialized; readers get immutable snapshots and can subscribe
/// to be woken on every change.
pub struct TransactionStore {
    required_confirmations: u64,
    state: watch::Sender<Arc<TransactionsState>>,
    metrics: Arc<BridgeMetrics>,
}

impl TransactionStore {
    pub fn new(required_confirmations: u64, metrics: Arc<BridgeMetrics>) -> Self {
        let (state, _) = watch::channel(Arc::new(TransactionsState::default()));
        info!(
            "TransactionStore initialized with required_confirmations={}",
            required_confirmations
        );
        Self {
            required_confirmations,
            state,
            metrics,
        }
    }

    pub fn required_confirmations(&self) -> u64 {
        self.required_confirmations
    }

    /// Apply an action; returns whether the state changed
    pub fn dispatch(&self, action: TransactionAction) -> bool {
        let metrics = &self.metrics;
        let required = self.required_confirmations;
        let changed = self.state.send_if_modified(|state| {
            let next = state.reduce(&action, required);
            if next == **state {
                return false;
            }
            for (before, after) in state.transactions.iter().zip(next.transactions.iter()) {
                if before.status != after.status {
                    debug!(
                        "[TransactionStore] hash={} status {} -> {}",
                        after.hash, before.status, after.status
                    );
                    metrics
                        .status_transitions
                        .with_label_values(&[after.status.label()])
                        .inc();
                }
            }
            metrics
                .tracked_transactions
                .set(next.transactions.len() as i64);
            *state = Arc::new(next);
            true
        });
        if !changed {
            debug!("[TransactionStore] No-op action: {:?}", action);
        }
        changed
    }

    pub fn snapshot(&self) -> Arc<TransactionsState> {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<TransactionsState>> {
        self.state.subscribe()
    }

    pub fn get_by_hash(&self, hash: &str) -> Option<Transaction> {
        self.state.borrow().find_by_hash(hash).cloned()
    }

    pub fn get_by_nonce(&self, nonce: u64) -> Option<Transaction> {
        self.state.borrow().find_by_nonce(nonce).cloned()
    }

    pub fn pending_transaction(&self) -> Option<Transaction> {
        self.state.borrow().pending_transaction.clone()
    }
}
