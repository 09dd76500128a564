// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use alloy::primitives::Address;
use async_trait::async_trait;

/// Lookup into the external identity provider.
///
/// Authentication itself happens outside this library; callers arrive here
/// already authenticated, identified by an opaque account id.
#[async_trait]
pub trait Identity {
    /// Defines the user-specified error type.
    ///
    /// This error type should implement the `Error` and `Debug` traits from
    /// the standard library.
    /// Errors of this type are returned to the user when an operation fails.
    type AdapterError: std::error::Error + std::fmt::Debug + Send + Sync + 'static;

    /// The wallet linked to an account, used as the default voucher
    /// recipient when the caller does not name one.
    async fn linked_wallet(&self, account: &str)
        -> Result<Option<Address>, Self::AdapterError>;
}
