// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Claim orchestrator
//!
//! Coordinates the issuer's output with ledger writes and reconciles
//! on-chain truth back into the ledger. The ledger and the chain fail
//! independently, so they can diverge; divergence is a recoverable
//! condition repaired by [`Orchestrator::reconcile`], with the chain
//! authoritative for `minted`/`owner` and the ledger authoritative for
//! `claimable` and voucher existence.

use std::time::Duration;

use alloy::{dyn_abi::Eip712Domain, primitives::U256};
use lmp_eip712_message::Eip712Signer;
use serde::{Deserialize, Serialize};

use crate::{
    adapters::{
        ChainClient, ContentStore, Identity, NftStatusStore, NonceAllocator, ReceiptRead,
        TxHash, TxStatus,
    },
    error::{Error, Result},
    issuer::{IssuedVoucher, VoucherIssuer},
    ledger::{NftStatus, NftStatusPatch},
};

/// Tuning for backend-submitted claims.
#[derive(Debug, Clone)]
pub struct ClaimConfig {
    /// How long a claim call waits for chain confirmation before returning
    /// a pending outcome. The request thread is never blocked past this.
    pub confirmation_timeout: Duration,
}

impl Default for ClaimConfig {
    fn default() -> Self {
        Self {
            confirmation_timeout: Duration::from_secs(30),
        }
    }
}

/// Result of a backend-submitted claim.
///
/// `Pending` means the transaction was submitted but not confirmed within
/// the timeout; the ledger is left untouched and reconciliation finalizes
/// the row once the chain settles.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ClaimOutcome {
    Confirmed {
        tx_hash: TxHash,
        token_id: U256,
        block_number: u64,
    },
    Pending {
        tx_hash: TxHash,
    },
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Rows with a voucher that were checked against the chain
    pub examined: u64,
    /// Rows moved forward to match a chain-confirmed mint
    pub repaired: u64,
    /// Rows that claimed a mint the chain does not know about
    pub divergent: u64,
}

/// Read-only aggregate over the ledger snapshot. Advisory only, never an input
/// to correctness decisions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollectionStats {
    pub vouchers_issued: u64,
    pub tokens_minted: u64,
    pub pending_claims: u64,
    pub percent_minted: f64,
}

pub struct Orchestrator<E, S> {
    /// Context that implements the adapters
    context: E,

    issuer: VoucherIssuer<E, S>,

    config: ClaimConfig,
}

impl<E, S> Orchestrator<E, S>
where
    E: ReceiptRead
        + NftStatusStore
        + ContentStore
        + Identity
        + NonceAllocator
        + ChainClient
        + Clone,
    S: Eip712Signer,
{
    /// Creates a new orchestrator around `context`; the issuer receives its
    /// own handle on the same context plus the injected signer.
    pub fn new(
        domain_separator: Eip712Domain,
        context: E,
        signer: S,
        config: ClaimConfig,
    ) -> Self {
        Self {
            issuer: VoucherIssuer::new(domain_separator, context.clone(), signer),
            context,
            config,
        }
    }

    /// Issues a voucher and persists `claimable = true` plus the voucher
    /// fields in one ledger operation. Never sets `minted` here.
    pub async fn create_voucher(
        &self,
        receipt_id: u64,
        recipient: Option<&str>,
        account: &str,
    ) -> Result<IssuedVoucher> {
        self.issuer.create_voucher(receipt_id, recipient, account).await
    }

    /// Submits the stored voucher for `receipt_id` on the caller's behalf
    /// and waits for confirmation up to the configured timeout.
    ///
    /// The ledger flips to `claimed = true, minted = true`, with the
    /// transaction hash recorded atomically with that flip, only after a
    /// confirmation. On timeout the row is untouched and the outcome is
    /// [`ClaimOutcome::Pending`].
    pub async fn claim(&self, receipt_id: u64) -> Result<ClaimOutcome> {
        let status = self
            .context
            .nft_status(receipt_id)
            .await
            .map_err(Error::adapter)?
            .ok_or(Error::VoucherNotFound { receipt_id })?;
        let voucher = status
            .voucher
            .clone()
            .ok_or(Error::VoucherNotFound { receipt_id })?;
        let token_id = voucher.message.tokenId;
        let recipient = voucher.message.recipient;

        if status.claimed || status.minted {
            return Err(Error::TokenAlreadyMinted { token_id });
        }

        let tx_hash = self
            .context
            .submit_lazy_mint(voucher)
            .await
            .map_err(Error::upstream)?;

        let waited =
            tokio::time::timeout(self.config.confirmation_timeout, self.context.confirmation(tx_hash))
                .await;
        match waited {
            Err(_elapsed) => {
                log::info!(
                    "claim for receipt {receipt_id} unconfirmed after {:?}; returning pending",
                    self.config.confirmation_timeout
                );
                Ok(ClaimOutcome::Pending { tx_hash })
            }
            Ok(Err(err)) => Err(Error::adapter(err)),
            Ok(Ok(TxStatus::Reverted(reason))) => {
                if reason.is_authorization() {
                    log::warn!(
                        "audit: claim for receipt {receipt_id} rejected by registry: {reason}"
                    );
                    return Err(Error::Forbidden);
                }
                Err(Error::ChainRevert(reason))
            }
            Ok(Ok(TxStatus::Confirmed { block_number })) => {
                let patch = NftStatusPatch {
                    claimed: Some(true),
                    minted: Some(true),
                    owner: Some(recipient),
                    tx_hash: Some(tx_hash),
                };
                self.context
                    .apply_patch(receipt_id, patch)
                    .await
                    .map_err(Error::adapter)?;
                Ok(ClaimOutcome::Confirmed {
                    tx_hash,
                    token_id,
                    block_number,
                })
            }
        }
    }

    /// Repair pass re-reading on-chain state for every ledger row that has
    /// a voucher. Forward repairs (chain minted, ledger behind) go through
    /// the monotonic patch; rows that ran ahead of the chain are restored
    /// to chain truth and counted as divergent.
    pub async fn reconcile(&self) -> Result<ReconcileReport> {
        let snapshot = self
            .context
            .status_snapshot()
            .await
            .map_err(Error::adapter)?;

        let mut report = ReconcileReport::default();
        for (receipt_id, status) in snapshot {
            let Some(voucher) = status.voucher.as_ref() else {
                continue;
            };
            report.examined += 1;
            let token_id = voucher.message.tokenId;
            let chain = self
                .context
                .token_state(token_id)
                .await
                .map_err(Error::adapter)?;

            let chain_minted = chain.as_ref().is_some_and(|state| state.minted);
            if chain_minted && !(status.claimed && status.minted) {
                let patch = NftStatusPatch {
                    claimed: Some(true),
                    minted: Some(true),
                    owner: chain.and_then(|state| state.owner),
                    tx_hash: None,
                };
                self.context
                    .apply_patch(receipt_id, patch)
                    .await
                    .map_err(Error::adapter)?;
                log::info!(
                    "reconcile: receipt {receipt_id} repaired to minted (token {token_id})"
                );
                report.repaired += 1;
            } else if !chain_minted && (status.claimed || status.minted) {
                // The claim transaction failed or was reorganized away after
                // the ledger was updated.
                log::warn!(
                    "reconcile: receipt {receipt_id} marks token {token_id} minted but the chain disagrees; restoring chain truth"
                );
                self.context
                    .force_chain_truth(receipt_id, false, None)
                    .await
                    .map_err(Error::adapter)?;
                report.divergent += 1;
            }
        }
        Ok(report)
    }

    /// Ledger mirror for one receipt.
    pub async fn nft_status(&self, receipt_id: u64) -> Result<Option<NftStatus>> {
        self.context
            .nft_status(receipt_id)
            .await
            .map_err(Error::adapter)
    }

    /// Aggregates the ledger snapshot into collection statistics.
    pub async fn collection_stats(&self) -> Result<CollectionStats> {
        let snapshot = self
            .context
            .status_snapshot()
            .await
            .map_err(Error::adapter)?;

        let vouchers_issued = snapshot
            .iter()
            .filter(|(_, status)| status.voucher.is_some())
            .count() as u64;
        let tokens_minted = snapshot
            .iter()
            .filter(|(_, status)| status.minted)
            .count() as u64;
        let pending_claims = snapshot
            .iter()
            .filter(|(_, status)| status.claimable && !status.minted)
            .count() as u64;
        let percent_minted = if vouchers_issued == 0 {
            0.0
        } else {
            tokens_minted as f64 * 100.0 / vouchers_issued as f64
        };

        Ok(CollectionStats {
            vouchers_issued,
            tokens_minted,
            pending_claims,
            percent_minted,
        })
    }
}
