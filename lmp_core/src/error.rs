// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::primitives::U256;
use lmp_eip712_message::Eip712Error;
use thiserror::Error;

use crate::contract::RevertReason;

/// Errors returned by the issuer and the orchestrator.
///
/// The variants follow the caller-facing taxonomy: validation problems are
/// user-correctable and rejected before any side effect, conflicts are
/// idempotency guards that are safe to retry as reads, upstream failures are
/// retriable with backoff, and `Forbidden` deliberately carries no detail
/// about which authorization check failed.
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid {field}: {message}")]
    Validation {
        field: &'static str,
        message: String,
    },

    #[error("no receipt found with id {receipt_id}")]
    ReceiptNotFound { receipt_id: u64 },

    #[error("receipt {receipt_id} has no voucher to claim")]
    VoucherNotFound { receipt_id: u64 },

    #[error("a voucher was already issued for receipt {receipt_id}")]
    AlreadyIssued { receipt_id: u64 },

    #[error("token {token_id} is already minted")]
    TokenAlreadyMinted { token_id: U256 },

    #[error("no recipient address given and the caller has no linked wallet")]
    MissingRecipient,

    #[error("upstream dependency failed: {source_error}")]
    Upstream { source_error: anyhow::Error },

    #[error("forbidden")]
    Forbidden,

    #[error("chain call reverted: {0}")]
    ChainRevert(RevertReason),

    #[error("failed to sign voucher: {0}")]
    Signing(#[from] Eip712Error),

    #[error("failed to get current system time: {source_error_message}")]
    InvalidSystemTime { source_error_message: String },

    #[error("error from adapter: {source_error}")]
    AdapterError { source_error: anyhow::Error },
}

impl Error {
    /// Wraps an adapter error, preserving the source chain.
    pub fn adapter<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::AdapterError {
            source_error: anyhow::Error::new(err),
        }
    }

    /// Wraps a failure of an external dependency (content store, chain RPC).
    pub fn upstream<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Error::Upstream {
            source_error: anyhow::Error::new(err),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
