// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::primitives::Address;
use async_trait::async_trait;
use lmp_voucher::Receipt;

use crate::ledger::{NftStatus, NftStatusPatch, VoucherIssuance};

/// Reads receipts from the application ledger.
#[async_trait]
pub trait ReceiptRead {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    /// Fetches a receipt by its ledger id, `None` if it does not exist.
    async fn receipt_by_id(&self, receipt_id: u64)
        -> Result<Option<Receipt>, Self::AdapterError>;
}

/// Stores and patches the per-receipt NFT status mirror.
#[async_trait]
pub trait NftStatusStore {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    /// Atomically creates the status row for a freshly issued voucher.
    ///
    /// This is the issuance uniqueness constraint: the insert must be
    /// first-writer-wins on `receipt_id`. Returns `true` if this call created
    /// the row, `false` if a row already existed; racing issuers must never
    /// both see `true`.
    async fn init_voucher(
        &self,
        receipt_id: u64,
        issuance: VoucherIssuance,
    ) -> Result<bool, Self::AdapterError>;

    /// Fetches the status row for a receipt, `None` if no voucher was issued.
    async fn nft_status(&self, receipt_id: u64)
        -> Result<Option<NftStatus>, Self::AdapterError>;

    /// Applies a forward-only lifecycle patch to an existing row.
    ///
    /// A patch that would move a lifecycle flag backwards is an error; see
    /// [`crate::ledger::NftStatus::apply`].
    async fn apply_patch(
        &self,
        receipt_id: u64,
        patch: NftStatusPatch,
    ) -> Result<(), Self::AdapterError>;

    /// Reconciliation-only escape hatch: overwrites the `minted`/`claimed`/
    /// `owner` columns with what the chain reports, bypassing the monotonic
    /// patch. `claimable` and the stored voucher are left untouched: the
    /// ledger stays authoritative for voucher existence.
    async fn force_chain_truth(
        &self,
        receipt_id: u64,
        minted: bool,
        owner: Option<Address>,
    ) -> Result<(), Self::AdapterError>;

    /// Snapshot of every status row, used by reconciliation and statistics.
    async fn status_snapshot(&self) -> Result<Vec<(u64, NftStatus)>, Self::AdapterError>;
}
