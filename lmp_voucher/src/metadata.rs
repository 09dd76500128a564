// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Token metadata
//!
//! The metadata document a voucher's content URI points at. The document is
//! deterministic in the receipt it describes: issuing twice for the same
//! receipt produces byte-identical JSON, which keeps content-store pinning
//! idempotent by content hash.

use chrono::{DateTime, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::Receipt;

/// Platform tag stamped into every metadata document.
pub const PLATFORM_TAG: &str = "LMP";

#[derive(thiserror::Error, Debug)]
pub enum MetadataError {
    /// Receipt timestamp cannot be represented as a calendar date
    #[error("receipt {receipt_id} has an out-of-range timestamp: {timestamp}")]
    TimestampOutOfRange { receipt_id: u64, timestamp: i64 },

    /// JSON serialization failed
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

/// One entry in the metadata attribute list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MetadataAttribute {
    pub trait_type: String,
    pub value: AttributeValue,
}

/// Attribute values are either numeric or text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum AttributeValue {
    Number(u64),
    Text(String),
}

/// The metadata document uploaded for a receipt's token.
///
/// Field order is the canonical serialization order; do not reorder fields
/// without a protocol version bump.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenMetadata {
    pub name: String,
    pub description: String,
    pub attributes: Vec<MetadataAttribute>,
    pub receipt_id: u64,
    pub platform: String,
}

impl TokenMetadata {
    /// Builds the deterministic metadata document for `receipt`.
    pub fn for_receipt(receipt: &Receipt) -> Result<Self, MetadataError> {
        let issued_at = DateTime::from_timestamp(receipt.timestamp, 0).ok_or(
            MetadataError::TimestampOutOfRange {
                receipt_id: receipt.id,
                timestamp: receipt.timestamp,
            },
        )?;

        Ok(Self {
            name: format!("Receipt #{}", receipt.id),
            description: format!(
                "{} - ${} paid by {} from pot {}",
                receipt.description,
                receipt.amount_display(),
                receipt.payer,
                receipt.pot
            ),
            attributes: vec![
                MetadataAttribute {
                    trait_type: "amount_cents".into(),
                    value: AttributeValue::Number(receipt.amount_cents),
                },
                MetadataAttribute {
                    trait_type: "issued_at".into(),
                    value: AttributeValue::Text(
                        issued_at.to_rfc3339_opts(SecondsFormat::Secs, true),
                    ),
                },
                MetadataAttribute {
                    trait_type: "payer".into(),
                    value: AttributeValue::Text(receipt.payer.clone()),
                },
                MetadataAttribute {
                    trait_type: "pot".into(),
                    value: AttributeValue::Text(receipt.pot.clone()),
                },
            ],
            receipt_id: receipt.id,
            platform: PLATFORM_TAG.into(),
        })
    }

    /// Canonical bytes of the document, the unit the content store pins.
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, MetadataError> {
        Ok(serde_json::to_vec(self)?)
    }
}

#[cfg(test)]
mod tests {
    use rstest::*;

    use super::*;

    #[fixture]
    fn receipt() -> Receipt {
        Receipt {
            id: 42,
            amount_cents: 2550,
            payer: "ada".into(),
            pot: "ski-trip".into(),
            timestamp: 1_700_000_000,
            description: "lift tickets".into(),
        }
    }

    #[rstest]
    fn document_is_deterministic(receipt: Receipt) {
        let first = TokenMetadata::for_receipt(&receipt).unwrap();
        let second = TokenMetadata::for_receipt(&receipt).unwrap();

        assert_eq!(
            first.canonical_bytes().unwrap(),
            second.canonical_bytes().unwrap()
        );
    }

    #[rstest]
    fn document_carries_receipt_facts(receipt: Receipt) {
        let metadata = TokenMetadata::for_receipt(&receipt).unwrap();

        assert_eq!(metadata.name, "Receipt #42");
        assert_eq!(metadata.receipt_id, 42);
        assert_eq!(metadata.platform, PLATFORM_TAG);
        assert!(metadata
            .attributes
            .iter()
            .any(|a| a.trait_type == "amount_cents"
                && a.value == AttributeValue::Number(2550)));
        assert!(metadata
            .attributes
            .iter()
            .any(|a| a.trait_type == "issued_at"
                && a.value == AttributeValue::Text("2023-11-14T22:13:20Z".into())));
    }

    #[rstest]
    fn out_of_range_timestamp_is_rejected(mut receipt: Receipt) {
        receipt.timestamp = i64::MAX;
        assert!(matches!(
            TokenMetadata::for_receipt(&receipt),
            Err(MetadataError::TimestampOutOfRange { receipt_id: 42, .. })
        ));
    }
}
