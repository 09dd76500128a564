// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use async_trait::async_trait;

/// Content-addressed storage for token metadata documents.
#[async_trait]
pub trait ContentStore {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    /// Pins `bytes` and returns their content-addressed URI.
    ///
    /// Pinning is idempotent by content hash, so retrying after a transport
    /// failure is always safe. Issuance never signs a voucher before this
    /// call has returned a URI.
    async fn pin(&self, bytes: Vec<u8>) -> Result<String, Self::AdapterError>;
}
