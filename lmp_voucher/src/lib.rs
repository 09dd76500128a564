// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # LMP wire types
//!
//! Value types exchanged between the voucher issuer, the claim registry and
//! the receipt ledger: the canonical [`MintVoucher`] struct, the application
//! [`Receipt`] it redeems, and the deterministic [`TokenMetadata`] document
//! pinned to the content store.

use alloy::{dyn_abi::Eip712Domain, sol_types::eip712_domain};

mod metadata;
mod receipt;
mod voucher;

pub use metadata::{AttributeValue, MetadataAttribute, MetadataError, TokenMetadata};
pub use receipt::Receipt;
pub use voucher::{MintVoucher, SignedVoucher};

/// The EIP712 domain separator builder for the lazy-mint protocol.
///
/// Binding the domain to the chain id and the verifying contract address is
/// what blocks cross-contract and cross-chain voucher replay: a signature
/// produced for one registry deployment recovers to garbage everywhere else.
///
/// The domain separator is defined as:
/// - `name`: "LMP"
/// - `version`: "1"
/// - `chain_id`: The chain ID of the chain the claim registry is deployed on.
/// - `verifying_contract`: The address of the claim registry.
pub fn lmp_eip712_domain(
    chain_id: u64,
    verifying_contract_address: alloy::primitives::Address,
) -> Eip712Domain {
    eip712_domain! {
        name: "LMP",
        version: "1",
        chain_id: chain_id,
        verifying_contract: verifying_contract_address,
    }
}
