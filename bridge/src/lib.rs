// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

pub mod asset;
pub mod balances;
pub mod config;
pub mod error;
pub mod eth_client;
pub mod events;
pub mod lifecycle;
pub mod metrics;
pub mod parachain_client;
pub mod transactions;
pub mod types;

#[cfg(test)]
pub mod test_utils;
