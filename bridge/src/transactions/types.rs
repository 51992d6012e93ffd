// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Type definitions for tracked cross-chain transactions

use crate::asset::Asset;
use crate::types::{Chain, Channel, SwapDirection};
use ethers::types::U256;
use serde::{Deserialize, Serialize};
use strum_macros::Display;

/// Status of a cross-chain transfer.
///
/// Statuses advance in declaration order. `Rejected` may be entered from any
/// non-final status and is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum TransactionStatus {
    SubmittingToChain,
    WaitingForConfirmation,
    Confirming,
    ConfirmedOnOriginChain,
    WaitingForRelay,
    Relayed,
    Finalized,
    Rejected,
}

impl TransactionStatus {
    fn rank(&self) -> u8 {
        match self {
            TransactionStatus::SubmittingToChain => 0,
            TransactionStatus::WaitingForConfirmation => 1,
            TransactionStatus::Confirming => 2,
            TransactionStatus::ConfirmedOnOriginChain => 3,
            TransactionStatus::WaitingForRelay => 4,
            TransactionStatus::Relayed => 5,
            TransactionStatus::Finalized => 6,
            TransactionStatus::Rejected => u8::MAX,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransactionStatus::Finalized | TransactionStatus::Rejected
        )
    }

    /// Whether moving from `self` to `next` respects the state machine
    pub fn can_advance_to(&self, next: TransactionStatus) -> bool {
        if self.is_terminal() {
            return false;
        }
        next == TransactionStatus::Rejected || next.rank() > self.rank()
    }

    /// Snake-case label used for metrics
    pub fn label(&self) -> &'static str {
        match self {
            TransactionStatus::SubmittingToChain => "submitting_to_chain",
            TransactionStatus::WaitingForConfirmation => "waiting_for_confirmation",
            TransactionStatus::Confirming => "confirming",
            TransactionStatus::ConfirmedOnOriginChain => "confirmed_on_origin_chain",
            TransactionStatus::WaitingForRelay => "waiting_for_relay",
            TransactionStatus::Relayed => "relayed",
            TransactionStatus::Finalized => "finalized",
            TransactionStatus::Rejected => "rejected",
        }
    }
}

/// One cross-chain transfer attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    /// Origin chain transaction hash, empty until assigned
    pub hash: String,
    pub confirmations: u64,
    pub sender: String,
    pub receiver: String,
    /// Base units of the origin chain
    pub amount: U256,
    /// Origin chain
    pub chain: Chain,
    pub direction: SwapDirection,
    pub asset: Asset,
    pub status: TransactionStatus,
    pub is_minted: bool,
    pub is_burned: bool,
    /// Channel selected for the transfer
    pub channel: Channel,
    /// Outbound channel message nonce, used to correlate the relay dispatch
    pub nonce: Option<u64>,
    /// Channel on which the relay dispatch was observed
    pub dispatch_channel: Option<Channel>,
    pub origin_finalized: bool,
    pub error: Option<String>,
}

impl Transaction {
    pub fn new(
        sender: impl Into<String>,
        receiver: impl Into<String>,
        amount: U256,
        asset: Asset,
        direction: SwapDirection,
        channel: Channel,
    ) -> Self {
        Self {
            hash: String::new(),
            confirmations: 0,
            sender: sender.into(),
            receiver: receiver.into(),
            amount,
            chain: direction.origin(),
            direction,
            asset,
            status: TransactionStatus::SubmittingToChain,
            is_minted: false,
            is_burned: false,
            channel,
            nonce: None,
            dispatch_channel: None,
            origin_finalized: false,
            error: None,
        }
    }

    /// Whether the destination chain has reported the relay dispatch
    pub fn is_relayed(&self) -> bool {
        self.is_minted || self.is_burned
    }

    pub fn is_rejected(&self) -> bool {
        self.status == TransactionStatus::Rejected
    }

    /// Whether the origin chain has confirmed the transaction.
    ///
    /// Ethereum counts confirmations against the threshold; the parachain has no
    /// confirmation count and is confirmed once included in a block.
    pub fn origin_confirmed(&self, required_confirmations: u64) -> bool {
        match self.chain {
            Chain::Ethereum => self.confirmations >= required_confirmations,
            Chain::Polkadot => matches!(
                self.status,
                TransactionStatus::WaitingForRelay
                    | TransactionStatus::Relayed
                    | TransactionStatus::Finalized
            ),
        }
    }

    /// Status implied by a confirmation count
    pub fn status_for_confirmations(
        &self,
        confirmations: u64,
        required_confirmations: u64,
    ) -> TransactionStatus {
        if confirmations < required_confirmations {
            TransactionStatus::Confirming
        } else if self.is_relayed() {
            TransactionStatus::Relayed
        } else {
            TransactionStatus::ConfirmedOnOriginChain
        }
    }

    /// Move to `next` if the state machine allows it; returns whether the status changed
    pub(crate) fn advance(&mut self, next: TransactionStatus) -> bool {
        if self.status.can_advance_to(next) {
            self.status = next;
            true
        } else {
            false
        }
    }

    /// Promote a relayed transaction whose origin block is final
    pub(crate) fn promote_finalized(&mut self) {
        if self.status == TransactionStatus::Relayed && self.origin_finalized {
            self.advance(TransactionStatus::Finalized);
        }
    }

    pub(crate) fn apply_update(&mut self, update: &TransactionUpdate) {
        if let Some(hash) = &update.hash {
            self.hash = hash.clone();
        }
        if let Some(nonce) = update.nonce {
            self.nonce = Some(nonce);
        }
        if let Some(confirmations) = update.confirmations {
            self.confirmations = confirmations;
        }
        if let Some(error) = &update.error {
            self.error = Some(error.clone());
        }
        if let Some(status) = update.status {
            self.advance(status);
        }
    }
}

/// Partial update applied by hash or nonce. `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionUpdate {
    pub hash: Option<String>,
    pub status: Option<TransactionStatus>,
    pub nonce: Option<u64>,
    pub confirmations: Option<u64>,
    pub error: Option<String>,
}

impl TransactionUpdate {
    pub fn status(status: TransactionStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }
}
