// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Transactions Module
//!
//! Session-lifetime record of every transfer the user started:
//! - Ordered, append-only list keyed by origin chain hash
//! - One pending slot for a transfer that has not been assigned a hash yet
//! - Status state machine shared by both transfer directions
//!
//! ## Design Principles
//!
//! 1. **Pure reducer**: every mutation is a [`TransactionAction`] applied by
//!    [`TransactionsState::reduce`]; actions never fail and unmatched lookups are no-ops
//! 2. **Single writer**: [`TransactionStore`] serializes writers and hands out
//!    immutable snapshots
//! 3. **No eviction**: entries live for the whole session

mod store;
mod types;

pub use store::{TransactionAction, TransactionStore, TransactionsState};
pub use types::{Transaction, TransactionStatus, TransactionUpdate};
