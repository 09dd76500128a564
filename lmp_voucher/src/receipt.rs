// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

use serde::{Deserialize, Serialize};

/// A shared-purchase receipt as recorded by the application ledger.
///
/// Receipts are produced by an external collaborator and are immutable here;
/// only the NFT-status mirror attached to a receipt ever changes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    /// Ledger-assigned receipt id
    pub id: u64,
    /// Purchase amount in cents
    pub amount_cents: u64,
    /// Display name of the member who paid
    pub payer: String,
    /// Pot the purchase was made from
    pub pot: String,
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// Free-form purchase description
    pub description: String,
}

impl Receipt {
    /// Amount formatted as a dollar string, e.g. `"25.50"`.
    pub fn amount_display(&self) -> String {
        format!("{}.{:02}", self.amount_cents / 100, self.amount_cents % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amount_display_pads_cents() {
        let receipt = Receipt {
            id: 42,
            amount_cents: 2550,
            payer: "ada".into(),
            pot: "ski-trip".into(),
            timestamp: 1_700_000_000,
            description: "lift tickets".into(),
        };
        assert_eq!(receipt.amount_display(), "25.50");

        let small = Receipt {
            amount_cents: 205,
            ..receipt
        };
        assert_eq!(small.amount_display(), "2.05");
    }
}
