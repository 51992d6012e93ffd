// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Typed events flowing between the chain connectors and the lifecycle engine.
//!
//! Each chain SDK reports progress in its own vocabulary ([`EthTxEvent`] for
//! contract calls, [`ExtrinsicUpdate`] for parachain extrinsics). Connectors
//! translate them into the chain-agnostic [`LifecycleEvent`] sequence the
//! engine consumes.

use crate::config::ContractAddresses;
use crate::error::{BridgeError, BridgeResult, RejectionReason};
use crate::types::{Channel, EthTransactionHash};
use ethers::abi::ParamType;
use ethers::types::{Log, TransactionReceipt, H256};
use serde::{Deserialize, Serialize};

/// Progress of a lock/burn as seen by the engine, independent of the origin chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// Handed to the wallet for signing
    Submitted,
    /// Origin chain assigned the transaction hash
    HashAssigned(String),
    /// Accepted by the origin chain before a usable hash is known
    Accepted,
    /// Included in a block; carries the outbound channel nonce when it was found
    Included { nonce: Option<u64> },
    /// Number of blocks mined on top of the inclusion block
    Confirmation(u64),
    /// Origin chain reports the inclusion block as final
    Finalized,
    Failed(RejectionReason),
}

impl LifecycleEvent {
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::Submitted => "submitted",
            LifecycleEvent::HashAssigned(_) => "hash_assigned",
            LifecycleEvent::Accepted => "accepted",
            LifecycleEvent::Included { .. } => "included",
            LifecycleEvent::Confirmation(_) => "confirmation",
            LifecycleEvent::Finalized => "finalized",
            LifecycleEvent::Failed(_) => "failed",
        }
    }
}

/// Events emitted while an Ethereum contract call is sent and mined
#[derive(Debug, Clone)]
pub enum EthTxEvent {
    Sending,
    Sent,
    TransactionHash(EthTransactionHash),
    Receipt(TransactionReceipt),
    Confirmation {
        confirmations: u64,
        transaction_hash: EthTransactionHash,
    },
    Error(EthTxError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EthTxError {
    pub message: String,
    /// Set when the transaction was mined and reverted
    pub transaction_hash: Option<EthTransactionHash>,
}

/// Status reported by the parachain for a submitted extrinsic
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtrinsicStatus {
    Ready,
    Broadcast,
    InBlock(H256),
    Finalized(H256),
}

/// One callback invocation of a parachain extrinsic subscription
#[derive(Debug, Clone)]
pub struct ExtrinsicUpdate {
    pub status: ExtrinsicStatus,
    pub events: Vec<RuntimeEvent>,
    pub dispatch_error: Option<String>,
}

/// Event record emitted by a parachain pallet, e.g. `basicOutboundChannel.MessageAccepted(7)`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeEvent {
    pub pallet: String,
    pub variant: String,
    pub fields: Vec<String>,
}

const BASIC_OUTBOUND_PALLET: &str = "basicOutboundChannel";
const INCENTIVIZED_OUTBOUND_PALLET: &str = "incentivizedOutboundChannel";
const MESSAGE_ACCEPTED: &str = "MessageAccepted";

impl RuntimeEvent {
    pub fn new(pallet: &str, variant: &str, fields: Vec<String>) -> Self {
        Self {
            pallet: pallet.to_string(),
            variant: variant.to_string(),
            fields,
        }
    }

    /// Channel and nonce if this is an outbound channel `MessageAccepted` event
    pub fn outbound_message_nonce(&self) -> Option<(Channel, u64)> {
        if self.variant != MESSAGE_ACCEPTED {
            return None;
        }
        let channel = match self.pallet.as_str() {
            BASIC_OUTBOUND_PALLET => Channel::Basic,
            INCENTIVIZED_OUTBOUND_PALLET => Channel::Incentivized,
            _ => return None,
        };
        let nonce = self.fields.first()?.replace(',', "").parse().ok()?;
        Some((channel, nonce))
    }
}

/// Relay completion on the destination chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageDispatched {
    pub channel: Channel,
    pub nonce: u64,
}

/// Wallet provider notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WalletEvent {
    AccountsChanged(Vec<String>),
    Disconnected,
    ChainChanged(u64),
}

fn outbound_log_layout(channel: Channel) -> Vec<ParamType> {
    match channel {
        // Message(address source, uint64 nonce, bytes payload)
        Channel::Basic => vec![ParamType::Address, ParamType::Uint(64), ParamType::Bytes],
        // Message(address source, uint64 nonce, uint256 fee, bytes payload)
        Channel::Incentivized => vec![
            ParamType::Address,
            ParamType::Uint(64),
            ParamType::Uint(256),
            ParamType::Bytes,
        ],
    }
}

/// Decode the message nonce from an outbound channel log.
///
/// Returns `None` for logs emitted by any other contract and `Some(Err)` for a
/// channel log whose data does not match the channel's layout.
pub fn decode_outbound_log(
    log: &Log,
    contracts: &ContractAddresses,
) -> Option<BridgeResult<(Channel, u64)>> {
    let channel = contracts.outbound_channel(&log.address)?;
    let decoded = ethers::abi::decode(&outbound_log_layout(channel), &log.data)
        .map_err(|e| BridgeError::Generic(format!("Undecodable {channel} channel log: {e}")))
        .and_then(|tokens| {
            tokens
                .get(1)
                .cloned()
                .and_then(|t| t.into_uint())
                .map(|nonce| (channel, nonce.low_u64()))
                .ok_or_else(|| {
                    BridgeError::Generic(format!("Missing nonce in {channel} channel log"))
                })
        });
    Some(decoded)
}
