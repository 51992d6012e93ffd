// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use prometheus::{
    register_int_counter_vec_with_registry, register_int_counter_with_registry,
    register_int_gauge_with_registry, IntCounter, IntCounterVec, IntGauge, Registry,
};

#[derive(Clone, Debug)]
pub struct BridgeMetrics {
    pub(crate) transactions_created: IntCounterVec,
    pub(crate) transactions_rejected: IntCounterVec,
    pub(crate) status_transitions: IntCounterVec,
    pub(crate) relay_dispatch_events: IntCounterVec,
    pub(crate) unrecognized_logs: IntCounter,
    pub(crate) connector_errors: IntCounterVec,
    pub(crate) tracked_transactions: IntGauge,
}

impl BridgeMetrics {
    pub fn new(registry: &Registry) -> Self {
        Self {
            transactions_created: register_int_counter_vec_with_registry!(
                "bridge_transactions_created",
                "Total number of transfers submitted, by origin chain",
                &["origin"],
                registry,
            )
            .unwrap(),
            transactions_rejected: register_int_counter_vec_with_registry!(
                "bridge_transactions_rejected",
                "Total number of transfers rejected, by origin chain and error type",
                &["origin", "error_type"],
                registry,
            )
            .unwrap(),
            status_transitions: register_int_counter_vec_with_registry!(
                "bridge_status_transitions",
                "Total number of transaction status transitions, by target status",
                &["status"],
                registry,
            )
            .unwrap(),
            relay_dispatch_events: register_int_counter_vec_with_registry!(
                "bridge_relay_dispatch_events",
                "Relay MessageDispatched events seen by subscriptions, by channel and outcome",
                &["channel", "outcome"],
                registry,
            )
            .unwrap(),
            unrecognized_logs: register_int_counter_with_registry!(
                "bridge_unrecognized_logs",
                "Receipt logs from a channel contract that could not be decoded",
                registry,
            )
            .unwrap(),
            connector_errors: register_int_counter_vec_with_registry!(
                "bridge_connector_errors",
                "Errors raised by chain connectors, by chain and error type",
                &["chain", "error_type"],
                registry,
            )
            .unwrap(),
            tracked_transactions: register_int_gauge_with_registry!(
                "bridge_tracked_transactions",
                "Number of transactions held in the session store",
                registry,
            )
            .unwrap(),
        }
    }

    pub fn new_for_testing() -> Self {
        let registry = Registry::new();
        Self::new(&registry)
    }
}
