// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Context adapters for the claim orchestrator.
//!
//! Each adapter is defined by the user of the library based on their
//! specific storage, identity and chain backends. The receipt ledger, the
//! content store and the identity provider are external collaborators; the
//! traits here are the seams they plug into, which also makes every one of
//! them mockable in tests.

mod chain;
mod content;
mod identity;
mod ledger;
mod nonce;

pub use chain::{ChainClient, ChainTokenState, TxHash, TxStatus};
pub use content::ContentStore;
pub use identity::Identity;
pub use ledger::{NftStatusStore, ReceiptRead};
pub use nonce::NonceAllocator;
