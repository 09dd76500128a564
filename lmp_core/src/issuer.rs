// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Voucher issuer
//!
//! Issues signed, single-use mint vouchers against ledger receipts. The
//! sequence is strict: metadata is pinned to the content store first, ids
//! are allocated second, the voucher is signed third, and the ledger row is
//! written last, so a failure at any step leaves no signed voucher behind,
//! and the atomic ledger insert is what makes issuance at-most-once per
//! receipt under concurrency.

use std::{
    str::FromStr,
    time::{SystemTime, UNIX_EPOCH},
};

use alloy::{
    dyn_abi::Eip712Domain,
    primitives::{Address, U256},
};
use lmp_eip712_message::{Eip712SignedMessage, Eip712Signer};
use lmp_voucher::{MintVoucher, SignedVoucher, TokenMetadata};
use rand::{rng, Rng};
use serde::{Deserialize, Serialize};

use crate::{
    adapters::{ContentStore, Identity, NftStatusStore, NonceAllocator, ReceiptRead},
    error::{Error, Result},
    ledger::VoucherIssuance,
};

/// A freshly issued voucher plus the metadata URI it points at.
///
/// The signed voucher is a bearer credential for its recipient: deliver it
/// only to the authenticated caller that owns the receipt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IssuedVoucher {
    pub voucher: SignedVoucher,
    pub metadata_uri: String,
}

pub struct VoucherIssuer<E, S> {
    /// Context that implements the ledger, content-store, identity and
    /// nonce adapters
    context: E,

    /// The injected custodian signing capability
    signer: S,

    domain_separator: Eip712Domain,
}

impl<E, S> VoucherIssuer<E, S>
where
    E: ReceiptRead + NftStatusStore + ContentStore + Identity + NonceAllocator,
    S: Eip712Signer,
{
    /// Creates a new issuer signing under `domain_separator`, which must be
    /// the domain of the claim registry the vouchers will be redeemed
    /// against.
    pub fn new(domain_separator: Eip712Domain, context: E, signer: S) -> Self {
        Self {
            context,
            signer,
            domain_separator,
        }
    }

    /// Issues the voucher for `receipt_id`.
    ///
    /// `recipient` must be a well-formed address when given; otherwise the
    /// caller's linked wallet is used. At most one voucher is ever issued
    /// per receipt: a second call returns [`Error::AlreadyIssued`] and never
    /// produces a second signature.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] if the content store fails; nothing is
    /// signed or persisted in that case.
    pub async fn create_voucher(
        &self,
        receipt_id: u64,
        recipient: Option<&str>,
        account: &str,
    ) -> Result<IssuedVoucher> {
        let receipt = self
            .context
            .receipt_by_id(receipt_id)
            .await
            .map_err(Error::adapter)?
            .ok_or(Error::ReceiptNotFound { receipt_id })?;

        // Cheap early guard; the atomic insert below is the real one.
        if let Some(status) = self
            .context
            .nft_status(receipt_id)
            .await
            .map_err(Error::adapter)?
        {
            if status.claimable || status.minted {
                return Err(Error::AlreadyIssued { receipt_id });
            }
        }

        let recipient = self.resolve_recipient(recipient, account).await?;

        // Pin before signing: a signed voucher must never point at metadata
        // that was not stored.
        let metadata = TokenMetadata::for_receipt(&receipt).map_err(|err| Error::Validation {
            field: "receipt",
            message: err.to_string(),
        })?;
        let bytes = metadata.canonical_bytes().map_err(|err| Error::Validation {
            field: "receipt",
            message: err.to_string(),
        })?;
        let metadata_uri = self.context.pin(bytes).await.map_err(Error::upstream)?;

        let token_id = allocate_token_id()?;
        let nonce = self
            .context
            .next_nonce()
            .await
            .map_err(Error::adapter)?;

        let voucher = MintVoucher {
            tokenId: token_id,
            uri: metadata_uri.clone(),
            recipient,
            receiptId: U256::from(receipt_id),
            nonce: U256::from(nonce),
        };
        let signed = Eip712SignedMessage::new(&self.domain_separator, voucher, &self.signer)?;

        let created = self
            .context
            .init_voucher(
                receipt_id,
                VoucherIssuance {
                    voucher: signed.clone(),
                    metadata_uri: metadata_uri.clone(),
                },
            )
            .await
            .map_err(Error::adapter)?;
        if !created {
            // Lost the issuance race; the first writer's voucher stands.
            return Err(Error::AlreadyIssued { receipt_id });
        }

        log::debug!(
            "issued voucher for receipt {receipt_id}: token {token_id}, nonce {nonce}"
        );
        Ok(IssuedVoucher {
            voucher: signed,
            metadata_uri,
        })
    }

    async fn resolve_recipient(&self, explicit: Option<&str>, account: &str) -> Result<Address> {
        let address = match explicit {
            Some(raw) => {
                Address::from_str(raw.trim()).map_err(|_| Error::Validation {
                    field: "recipient",
                    message: format!("not a valid address: {raw}"),
                })?
            }
            None => self
                .context
                .linked_wallet(account)
                .await
                .map_err(Error::adapter)?
                .ok_or(Error::MissingRecipient)?,
        };
        if address == Address::ZERO {
            return Err(Error::Validation {
                field: "recipient",
                message: "recipient must not be the zero address".into(),
            });
        }
        Ok(address)
    }
}

/// Issuer-side token id: milliseconds since the epoch scaled up, plus a
/// random sub-millisecond component. Collision-resistant only: true
/// uniqueness is enforced by the registry at mint time, and of two vouchers
/// carrying the same id only one can ever mint.
fn allocate_token_id() -> Result<U256> {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|err| Error::InvalidSystemTime {
            source_error_message: err.to_string(),
        })?
        .as_millis() as u64;
    let entropy = rng().random_range(0..1_000_000u64);
    Ok(U256::from(millis) * U256::from(1_000_000u64) + U256::from(entropy))
}
