// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use super::EVENT_CHANNEL_SIZE;
use crate::error::BridgeResult;
use crate::events::MessageDispatched;
use crate::metrics::BridgeMetrics;
use crate::types::Channel;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info};

/// Destination chain source of relay completion events
#[async_trait]
pub trait RelayEventSource: Send + Sync {
    /// Stream of every `MessageDispatched` seen on `channel` from now on
    async fn message_dispatched(
        &self,
        channel: Channel,
    ) -> BridgeResult<mpsc::Receiver<MessageDispatched>>;
}

/// Subscribe to both channels of `source` and forward dispatches carrying `nonce`.
///
/// Each channel forwards at most one matching event.
pub(crate) async fn subscribe_relay<S: RelayEventSource + ?Sized>(
    source: &S,
    nonce: u64,
    metrics: Arc<BridgeMetrics>,
) -> BridgeResult<mpsc::Receiver<MessageDispatched>> {
    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_SIZE);
    for channel in Channel::ALL {
        let mut stream = source.message_dispatched(channel).await?;
        let tx = tx.clone();
        let metrics = metrics.clone();
        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    event = stream.recv() => event,
                    _ = tx.closed() => {
                        debug!(
                            "[RelaySubscription] Tracker for nonce={} went away, releasing {} channel",
                            nonce, channel
                        );
                        break;
                    }
                };
                let Some(event) = event else {
                    break;
                };
                if event.nonce != nonce {
                    metrics
                        .relay_dispatch_events
                        .with_label_values(&[&channel.to_string(), "ignored"])
                        .inc();
                    continue;
                }
                metrics
                    .relay_dispatch_events
                    .with_label_values(&[&channel.to_string(), "matched"])
                    .inc();
                info!(
                    "[RelaySubscription] MessageDispatched on {} channel for nonce={}",
                    channel, nonce
                );
                let _ = tx.send(event).await;
                break;
            }
            debug!(
                "[RelaySubscription] {} channel subscription for nonce={} ended",
                channel, nonce
            );
        });
    }
    Ok(rx)
}
