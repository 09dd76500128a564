// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Receipt NFT status mirror
//!
//! The ledger keeps one NFT-status row per receipt, mirroring what the claim
//! registry knows. The lifecycle of a row is strictly monotonic:
//!
//! ```text
//! none -> voucher-issued (claimable) -> claimed (claimed + minted)
//! ```
//!
//! [`NftStatusPatch`] can only move flags forward; divergence between a row
//! and the chain is a recoverable inconsistency handled by reconciliation,
//! never by regressing a row through the public patch interface.

use alloy::primitives::{Address, B256, U256};
use lmp_voucher::SignedVoucher;
use serde::{Deserialize, Serialize};

/// The row written when a voucher is issued: `claimable = true` plus the
/// voucher fields, persisted in one atomic insert.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VoucherIssuance {
    pub voucher: SignedVoucher,
    pub metadata_uri: String,
}

/// Ledger mirror of a receipt's NFT lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct NftStatus {
    pub claimable: bool,
    pub claimed: bool,
    pub minted: bool,
    pub token_id: Option<U256>,
    pub nonce: Option<U256>,
    pub metadata_uri: Option<String>,
    pub owner: Option<Address>,
    pub tx_hash: Option<B256>,
    /// The signed voucher as issued; bearer credential, present from the
    /// claimable state onwards.
    pub voucher: Option<SignedVoucher>,
}

impl NftStatus {
    /// The row a fresh issuance writes.
    pub fn from_issuance(issuance: VoucherIssuance) -> Self {
        let message = &issuance.voucher.message;
        Self {
            claimable: true,
            claimed: false,
            minted: false,
            token_id: Some(message.tokenId),
            nonce: Some(message.nonce),
            metadata_uri: Some(issuance.metadata_uri.clone()),
            owner: None,
            tx_hash: None,
            voucher: Some(issuance.voucher),
        }
    }

    /// Applies a forward-only patch.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleViolation`] if the patch would lower a lifecycle
    /// flag that is already set.
    pub fn apply(&mut self, patch: &NftStatusPatch) -> Result<(), LifecycleViolation> {
        apply_flag(&mut self.claimed, patch.claimed, "claimed")?;
        apply_flag(&mut self.minted, patch.minted, "minted")?;
        if let Some(owner) = patch.owner {
            self.owner = Some(owner);
        }
        if let Some(tx_hash) = patch.tx_hash {
            self.tx_hash = Some(tx_hash);
        }
        Ok(())
    }
}

fn apply_flag(
    current: &mut bool,
    requested: Option<bool>,
    field: &'static str,
) -> Result<(), LifecycleViolation> {
    match requested {
        Some(true) => {
            *current = true;
            Ok(())
        }
        Some(false) if *current => Err(LifecycleViolation { field }),
        _ => Ok(()),
    }
}

/// Partial update of an [`NftStatus`] row that only moves the lifecycle
/// forward. `Some(false)` on a set flag is rejected, not applied.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct NftStatusPatch {
    pub claimed: Option<bool>,
    pub minted: Option<bool>,
    pub owner: Option<Address>,
    pub tx_hash: Option<B256>,
}

/// Rejected attempt to move a lifecycle flag backwards.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("nft status patch would move `{field}` backwards")]
pub struct LifecycleViolation {
    pub field: &'static str,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn claimable_row() -> NftStatus {
        NftStatus {
            claimable: true,
            claimed: false,
            minted: false,
            token_id: Some(U256::from(9u64)),
            nonce: Some(U256::from(1u64)),
            metadata_uri: Some("ipfs://test".into()),
            owner: None,
            tx_hash: None,
            voucher: None,
        }
    }

    #[test]
    fn patch_moves_lifecycle_forward() {
        let mut row = claimable_row();
        let owner = Address::from([0xab; 20]);
        row.apply(&NftStatusPatch {
            claimed: Some(true),
            minted: Some(true),
            owner: Some(owner),
            tx_hash: Some(B256::from([0x01; 32])),
        })
        .unwrap();

        assert!(row.claimed && row.minted);
        assert_eq!(row.owner, Some(owner));
    }

    #[test]
    fn patch_cannot_regress_a_set_flag() {
        let mut row = claimable_row();
        row.apply(&NftStatusPatch {
            claimed: Some(true),
            minted: Some(true),
            ..Default::default()
        })
        .unwrap();

        let err = row
            .apply(&NftStatusPatch {
                minted: Some(false),
                ..Default::default()
            })
            .unwrap_err();
        assert_eq!(err.field, "minted");
        assert!(row.minted);
    }

    #[test]
    fn empty_patch_is_a_no_op() {
        let mut row = claimable_row();
        let before = row.clone();
        row.apply(&NftStatusPatch::default()).unwrap();
        assert_eq!(row, before);
    }
}
