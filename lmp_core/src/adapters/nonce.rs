// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

/// Allocates voucher nonces.
///
/// Nonces are process-wide single-writer state: a persisted, atomically
/// incremented counter (or an atomic upsert against the ledger). Two
/// concurrent calls must never observe the same value, and a value must
/// never repeat for the lifetime of the signing key, including across
/// process restarts, which rules out wall-clock-only schemes.
#[async_trait]
pub trait NonceAllocator {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    /// Returns the next nonce.
    async fn next_nonce(&self) -> Result<u64, Self::AdapterError>;
}
