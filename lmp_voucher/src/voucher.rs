// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Mint voucher

use alloy::sol;
use lmp_eip712_message::Eip712SignedMessage;
use serde::{Deserialize, Serialize};

/// A voucher plus the custodian signature that makes it redeemable
pub type SignedVoucher = Eip712SignedMessage<MintVoucher>;

sol! {
    /// Single-use authorization to mint one token to one recipient,
    /// redeemable against the claim registry by whoever holds it.
    ///
    /// We use camelCase for field names to match the Ethereum ABI encoding
    #[derive(Debug, Serialize, Deserialize, Eq, PartialEq)]
    struct MintVoucher {
        /// Token id chosen at issuance; global uniqueness is enforced at mint time
        uint256 tokenId;
        /// Content-addressed URI of the token metadata document
        string uri;
        /// Wallet the token mints to
        address recipient;
        /// Ledger receipt this voucher redeems
        uint256 receiptId;
        /// Single-use counter value, never repeated for the signing key lifetime
        uint256 nonce;
    }
}
