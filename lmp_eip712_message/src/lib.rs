// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # EIP712 signed messages
//!
//! This crate contains the [`Eip712SignedMessage`] struct, which pairs any
//! `SolStruct` with the ECDSA signature over its EIP712 hash, and the
//! [`Eip712Signer`] capability trait through which messages are signed.
//!
//! The signer is a trait rather than a concrete wallet on purpose: the one
//! authorized custodian key is injected where signatures are produced, so a
//! software wallet can back it in tests while a hardware-backed signer backs
//! it in production. [`alloy::signers::local::PrivateKeySigner`] implements
//! the trait out of the box.

use alloy::{
    dyn_abi::Eip712Domain,
    primitives::{Address, Signature, B256},
    signers::{local::PrivateKeySigner, SignerSync},
    sol_types::SolStruct,
};
use serde::{Deserialize, Serialize};

/// Errors returned by signing, recovery and verification of messages
#[derive(thiserror::Error, Debug)]
pub enum Eip712Error {
    /// `alloy` signer error
    #[error(transparent)]
    SignerError(#[from] alloy::signers::Error),

    /// `alloy` signature error
    #[error(transparent)]
    SignatureError(#[from] alloy::primitives::SignatureError),

    /// The signature recovered to an address other than the expected one
    #[error("signature does not recover to the expected signer {expected}")]
    WrongSigner { expected: Address },
}

/// Capability to sign precomputed EIP712 signing hashes with one key.
///
/// The key behind an implementation is process-wide mutable state; owning it
/// through this narrow interface keeps it swappable and mockable.
pub trait Eip712Signer: Send + Sync {
    /// Address that signatures produced by this signer recover to.
    fn address(&self) -> Address;

    /// Signs a precomputed EIP712 signing hash.
    fn sign_prehash(&self, hash: B256) -> Result<Signature, Eip712Error>;
}

impl Eip712Signer for PrivateKeySigner {
    fn address(&self) -> Address {
        PrivateKeySigner::address(self)
    }

    fn sign_prehash(&self, hash: B256) -> Result<Signature, Eip712Error> {
        Ok(self.sign_hash_sync(&hash)?)
    }
}

/// EIP712 signed message
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Eip712SignedMessage<M: SolStruct> {
    /// Message to be signed
    pub message: M,
    /// ECDSA Signature of eip712 hash of message
    pub signature: Signature,
}

/// Signature in canonical low-S form, usable as a set or map key.
#[derive(Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct SignatureBytes([u8; 65]);

/// Extension for [`Signature`] to return [`SignatureBytes`]
pub trait SignatureBytesExt {
    fn get_signature_bytes(&self) -> SignatureBytes;
}

impl SignatureBytesExt for Signature {
    fn get_signature_bytes(&self) -> SignatureBytes {
        // Canonicalize to low-S form before returning bytes
        let canonical = self.normalized_s();
        SignatureBytes(canonical.as_bytes())
    }
}

/// Unique identifier for a message
///
/// This is the hash of the contents of a message, excluding the signature,
/// so the same message signed by two different keys shares one id.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct MessageId(pub [u8; 32]);

impl<M: SolStruct> Eip712SignedMessage<M> {
    /// Creates a signed message with signed EIP712 hash of `message` using `signer`
    ///
    /// # Errors
    ///
    /// Returns [`Eip712Error::SignerError`] if the signer refuses the hash
    pub fn new<S>(
        domain_separator: &Eip712Domain,
        message: M,
        signer: &S,
    ) -> Result<Self, Eip712Error>
    where
        S: Eip712Signer + ?Sized,
    {
        let recovery_message_hash = message.eip712_signing_hash(domain_separator);

        let signature = signer.sign_prehash(recovery_message_hash)?;

        Ok(Self { message, signature })
    }

    /// Recovers and returns the signer of the message from the signature.
    pub fn recover_signer(&self, domain_separator: &Eip712Domain) -> Result<Address, Eip712Error> {
        let recovery_message_hash = self.message.eip712_signing_hash(domain_separator);
        let recovered_address = self
            .signature
            .recover_address_from_prehash(&recovery_message_hash)?;
        Ok(recovered_address)
    }

    /// Checks that the signature recovers to `expected`.
    pub fn verify(
        &self,
        domain_separator: &Eip712Domain,
        expected: Address,
    ) -> Result<(), Eip712Error> {
        let recovered = self.recover_signer(domain_separator)?;
        if recovered != expected {
            return Err(Eip712Error::WrongSigner { expected });
        }
        Ok(())
    }

    /// Hash over the message contents, excluding the signature.
    pub fn unique_hash(&self) -> MessageId {
        MessageId(self.message.eip712_hash_struct().into())
    }
}

#[cfg(test)]
mod tests {
    use alloy::{
        primitives::{address, U256},
        sol,
        sol_types::eip712_domain,
    };
    use rstest::*;

    use super::*;

    sol! {
        struct TestPayload {
            uint256 id;
            address beneficiary;
        }
    }

    #[fixture]
    fn domain_separator() -> Eip712Domain {
        eip712_domain! {
            name: "LMP",
            version: "1",
            chain_id: 1,
            verifying_contract: Address::from([0x11u8; 20]),
        }
    }

    #[fixture]
    fn payload() -> TestPayload {
        TestPayload {
            id: U256::from(7u64),
            beneficiary: address!("abababababababababababababababababababab"),
        }
    }

    #[rstest]
    fn signed_message_recovers_to_signer(domain_separator: Eip712Domain, payload: TestPayload) {
        let wallet = PrivateKeySigner::random();
        let signed = Eip712SignedMessage::new(&domain_separator, payload, &wallet).unwrap();

        assert_eq!(
            signed.recover_signer(&domain_separator).unwrap(),
            wallet.address()
        );
        assert!(signed.verify(&domain_separator, wallet.address()).is_ok());
    }

    #[rstest]
    fn verify_rejects_other_signer(domain_separator: Eip712Domain, payload: TestPayload) {
        let wallet = PrivateKeySigner::random();
        let other = PrivateKeySigner::random().address();
        let signed = Eip712SignedMessage::new(&domain_separator, payload, &wallet).unwrap();

        assert!(matches!(
            signed.verify(&domain_separator, other),
            Err(Eip712Error::WrongSigner { .. })
        ));
    }

    #[rstest]
    fn same_contents_share_a_message_id(domain_separator: Eip712Domain, payload: TestPayload) {
        let first = Eip712SignedMessage::new(
            &domain_separator,
            payload.clone(),
            &PrivateKeySigner::random(),
        )
        .unwrap();
        let second =
            Eip712SignedMessage::new(&domain_separator, payload, &PrivateKeySigner::random())
                .unwrap();

        assert_eq!(first.unique_hash(), second.unique_hash());
    }

    #[rstest]
    fn domain_binds_the_signature(payload: TestPayload) {
        let wallet = PrivateKeySigner::random();
        let home = eip712_domain! {
            name: "LMP",
            version: "1",
            chain_id: 1,
            verifying_contract: Address::from([0x11u8; 20]),
        };
        let foreign = eip712_domain! {
            name: "LMP",
            version: "1",
            chain_id: 5,
            verifying_contract: Address::from([0x11u8; 20]),
        };

        let signed = Eip712SignedMessage::new(&home, payload, &wallet).unwrap();

        // Recovery under another chain id yields a different address, so the
        // expected-signer check fails.
        assert!(signed.verify(&foreign, wallet.address()).is_err());
    }
}
