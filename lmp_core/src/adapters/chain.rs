// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::primitives::{Address, B256, U256};
use async_trait::async_trait;
use lmp_voucher::SignedVoucher;
use serde::{Deserialize, Serialize};

use crate::contract::RevertReason;

/// Transaction hash on the chain the claim registry is deployed on.
pub type TxHash = B256;

/// What the chain reports for a token id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainTokenState {
    pub minted: bool,
    pub owner: Option<Address>,
    pub receipt_id: Option<U256>,
}

/// Terminal status of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxStatus {
    Confirmed { block_number: u64 },
    Reverted(RevertReason),
}

/// Client for the chain hosting the claim registry.
///
/// Submission and confirmation are split so the orchestrator can wait with a
/// timeout: the ledger is only ever updated after a confirmation, never on
/// submission alone.
#[async_trait]
pub trait ChainClient {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    /// Submits a lazy-mint transaction for `voucher` and returns its hash
    /// once the node accepted it. Does not wait for confirmation.
    async fn submit_lazy_mint(
        &self,
        voucher: SignedVoucher,
    ) -> Result<TxHash, Self::AdapterError>;

    /// Resolves once the transaction is confirmed or known to have reverted.
    async fn confirmation(&self, tx_hash: TxHash) -> Result<TxStatus, Self::AdapterError>;

    /// Current chain state for a token id, `None` while unminted. The chain
    /// is the exclusive source of truth for `minted` and `owner`.
    async fn token_state(
        &self,
        token_id: U256,
    ) -> Result<Option<ChainTokenState>, Self::AdapterError>;

    /// Whether a voucher nonce has been consumed on-chain.
    async fn is_nonce_used(&self, nonce: U256) -> Result<bool, Self::AdapterError>;
}
