// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transfer lifecycle module
//!
//! This module drives a single lock/burn from submission to relay:
//! - Submits the transfer through the origin chain connector
//! - Translates origin chain [`LifecycleEvent`]s into store actions
//! - Subscribes to relay dispatch events on the destination chain once the
//!   outbound message nonce is known
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   LifecycleEvent    ┌─────────────────┐
//! │ origin connector │ ──────────────────► │                 │
//! └──────────────────┘                     │ TransferTracker │ ──► TransactionStore
//! ┌──────────────────┐  MessageDispatched  │                 │
//! │ relay source x2  │ ──────────────────► │                 │
//! └──────────────────┘                     └─────────────────┘
//! ```

mod engine;
mod relay;

pub use engine::{TransactionEngine, TransferHandle, TransferRequest};
pub use relay::RelayEventSource;

use crate::error::BridgeResult;
use crate::events::LifecycleEvent;
use crate::transactions::Transaction;
use async_trait::async_trait;
use tokio::sync::mpsc;

/// Buffer size of the per-transfer event channels
pub(crate) const EVENT_CHANNEL_SIZE: usize = 100;

/// Origin chain side of a connector: submits the lock/burn for a transaction
#[async_trait]
pub trait TransferSubmitter: Send + Sync {
    /// Submit the lock/burn described by `transaction`.
    ///
    /// Errors returned here happen before anything reached the chain (wallet
    /// refused to sign, invalid recipient, pool rejected the extrinsic).
    async fn submit_transfer(
        &self,
        transaction: &Transaction,
    ) -> BridgeResult<mpsc::Receiver<LifecycleEvent>>;
}

/// A chain connector usable both as transfer origin and as relay destination
pub trait ChainConnector: TransferSubmitter + RelayEventSource {}

impl<T: TransferSubmitter + RelayEventSource> ChainConnector for T {}
