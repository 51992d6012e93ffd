// Copyright (c) Starcoin, Inc.
// SPDX-License-Identifier: Apache-2.0

use thiserror::Error;

/// Marker text returned by the signing extension when the user dismisses the prompt
const CANCELLED_MARKER: &str = "Cancelled";
/// Transaction pool error for a pending extrinsic with the same nonce
const PRIORITY_TOO_LOW_MARKER: &str = "1014: Priority is too low";

/// Why a submitted lock/burn did not make it onto the origin chain
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectionReason {
    #[error("The transaction was cancelled")]
    Cancelled,
    #[error("Please wait for the current pending transaction to complete")]
    PriorityTooLow,
    #[error("Insufficient funds: {0}")]
    InsufficientFunds(String),
    #[error("Dispatch error: {0}")]
    Dispatch(String),
    #[error("{0}")]
    Other(String),
}

impl RejectionReason {
    /// Classify a raw wallet/SDK error message
    pub fn from_message(message: &str) -> Self {
        let trimmed = message.trim();
        if trimmed == CANCELLED_MARKER || trimmed == "Error: Cancelled" {
            RejectionReason::Cancelled
        } else if trimmed.contains(PRIORITY_TOO_LOW_MARKER) {
            RejectionReason::PriorityTooLow
        } else if trimmed.to_ascii_lowercase().contains("insufficient funds") {
            RejectionReason::InsufficientFunds(trimmed.to_string())
        } else {
            RejectionReason::Other(trimmed.to_string())
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    // User cancelled the wallet prompt or no compatible wallet/account exists
    #[error("Wallet connection failed: {0}")]
    WalletConnection(String),
    // Account or token contract not set when querying a balance
    #[error("Balance query failed: {0}")]
    BalanceQuery(String),
    // Name/symbol lookup for a non-fungible token failed
    #[error("Failed to fetch token metadata: {0}")]
    MetadataFetch(String),
    // Signature rejected, insufficient funds, priority conflict, dispatch error
    #[error("Submission rejected: {0}")]
    SubmissionRejected(RejectionReason),
    // Chain provider / RPC failure
    #[error("Provider error: {0}")]
    Provider(String),
    // Invalid configuration value
    #[error("Invalid config: {0}")]
    Config(String),
    // Uncategorized error
    #[error("{0}")]
    Generic(String),
}

impl BridgeError {
    /// Returns a short string identifying the error type for metrics labels
    pub fn error_type(&self) -> &'static str {
        match self {
            BridgeError::WalletConnection(_) => "wallet_connection",
            BridgeError::BalanceQuery(_) => "balance_query",
            BridgeError::MetadataFetch(_) => "metadata_fetch",
            BridgeError::SubmissionRejected(_) => "submission_rejected",
            BridgeError::Provider(_) => "provider_error",
            BridgeError::Config(_) => "config_error",
            BridgeError::Generic(_) => "generic",
        }
    }

    /// Human-readable reason recorded on a rejected transaction
    pub fn rejection_message(&self) -> String {
        match self {
            BridgeError::SubmissionRejected(reason) => reason.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<RejectionReason> for BridgeError {
    fn from(reason: RejectionReason) -> Self {
        BridgeError::SubmissionRejected(reason)
    }
}

pub type BridgeResult<T> = Result<T, BridgeError>;
