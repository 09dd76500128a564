// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! In-memory context implementation for the claim orchestrator.
//!
//! This module provides an in-memory implementation of every adapter the
//! orchestrator needs, backed by a [`ClaimRegistry`] standing in for the
//! chain. It is useful for testing and development purposes.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, RwLock,
    },
    time::Duration,
};

use alloy::primitives::{keccak256, Address, U256};
use async_trait::async_trait;
use lmp_voucher::{Receipt, SignedVoucher};
use thiserror::Error;

use crate::{
    adapters::{
        ChainClient, ChainTokenState, ContentStore, Identity, NftStatusStore, NonceAllocator,
        ReceiptRead, TxHash, TxStatus,
    },
    contract::ClaimRegistry,
    ledger::{NftStatus, NftStatusPatch, VoucherIssuance},
};

pub type ReceiptStorage = Arc<RwLock<HashMap<u64, Receipt>>>;
pub type StatusStorage = Arc<RwLock<HashMap<u64, NftStatus>>>;
pub type WalletDirectory = Arc<RwLock<HashMap<String, Address>>>;
pub type PinStorage = Arc<RwLock<HashMap<String, Vec<u8>>>>;

#[derive(Debug, Error)]
pub enum InMemoryError {
    #[error("something went wrong: {error}")]
    AdapterError { error: String },
}

/// All adapters in one clonable bundle. Clones share state.
#[derive(Clone)]
pub struct InMemoryContext {
    receipts: ReceiptStorage,
    statuses: StatusStorage,
    wallets: WalletDirectory,
    pins: PinStorage,
    /// Stands in for the persisted issuance counter; an AtomicU64 gives the
    /// same single-writer guarantee within one process.
    nonce_counter: Arc<AtomicU64>,
    registry: Arc<ClaimRegistry>,
    tx_outcomes: Arc<RwLock<HashMap<TxHash, TxStatus>>>,
    blocks_mined: Arc<AtomicU64>,
    confirmation_delay: Duration,
}

impl InMemoryContext {
    pub fn new(registry: Arc<ClaimRegistry>) -> Self {
        Self {
            receipts: Arc::new(RwLock::new(HashMap::new())),
            statuses: Arc::new(RwLock::new(HashMap::new())),
            wallets: Arc::new(RwLock::new(HashMap::new())),
            pins: Arc::new(RwLock::new(HashMap::new())),
            nonce_counter: Arc::new(AtomicU64::new(0)),
            registry,
            tx_outcomes: Arc::new(RwLock::new(HashMap::new())),
            blocks_mined: Arc::new(AtomicU64::new(0)),
            confirmation_delay: Duration::ZERO,
        }
    }

    /// Delays confirmations so tests can exercise the pending claim path.
    pub fn with_confirmation_delay(mut self, delay: Duration) -> Self {
        self.confirmation_delay = delay;
        self
    }

    pub fn registry(&self) -> &Arc<ClaimRegistry> {
        &self.registry
    }

    /// Feed from the external receipt ledger.
    pub fn insert_receipt(&self, receipt: Receipt) {
        self.receipts.write().unwrap().insert(receipt.id, receipt);
    }

    /// Links an account to a wallet in the identity directory.
    pub fn link_wallet(&self, account: &str, wallet: Address) {
        self.wallets
            .write()
            .unwrap()
            .insert(account.to_owned(), wallet);
    }

    /// Bytes behind a pinned URI, if any.
    pub fn pinned_bytes(&self, uri: &str) -> Option<Vec<u8>> {
        self.pins.read().unwrap().get(uri).cloned()
    }
}

#[async_trait]
impl ReceiptRead for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn receipt_by_id(
        &self,
        receipt_id: u64,
    ) -> Result<Option<Receipt>, Self::AdapterError> {
        Ok(self.receipts.read().unwrap().get(&receipt_id).cloned())
    }
}

#[async_trait]
impl NftStatusStore for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn init_voucher(
        &self,
        receipt_id: u64,
        issuance: VoucherIssuance,
    ) -> Result<bool, Self::AdapterError> {
        let mut statuses = self.statuses.write().unwrap();
        if statuses.contains_key(&receipt_id) {
            return Ok(false);
        }
        statuses.insert(receipt_id, NftStatus::from_issuance(issuance));
        Ok(true)
    }

    async fn nft_status(
        &self,
        receipt_id: u64,
    ) -> Result<Option<NftStatus>, Self::AdapterError> {
        Ok(self.statuses.read().unwrap().get(&receipt_id).cloned())
    }

    async fn apply_patch(
        &self,
        receipt_id: u64,
        patch: NftStatusPatch,
    ) -> Result<(), Self::AdapterError> {
        let mut statuses = self.statuses.write().unwrap();
        let status = statuses
            .get_mut(&receipt_id)
            .ok_or(InMemoryError::AdapterError {
                error: format!("no nft status row for receipt {receipt_id}"),
            })?;
        status.apply(&patch).map_err(|err| InMemoryError::AdapterError {
            error: err.to_string(),
        })
    }

    async fn force_chain_truth(
        &self,
        receipt_id: u64,
        minted: bool,
        owner: Option<Address>,
    ) -> Result<(), Self::AdapterError> {
        let mut statuses = self.statuses.write().unwrap();
        let status = statuses
            .get_mut(&receipt_id)
            .ok_or(InMemoryError::AdapterError {
                error: format!("no nft status row for receipt {receipt_id}"),
            })?;
        status.minted = minted;
        status.claimed = minted;
        status.owner = owner;
        if !minted {
            status.tx_hash = None;
        }
        Ok(())
    }

    async fn status_snapshot(&self) -> Result<Vec<(u64, NftStatus)>, Self::AdapterError> {
        Ok(self
            .statuses
            .read()
            .unwrap()
            .iter()
            .map(|(&id, status)| (id, status.clone()))
            .collect())
    }
}

#[async_trait]
impl ContentStore for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn pin(&self, bytes: Vec<u8>) -> Result<String, Self::AdapterError> {
        // Content-addressed key: the same bytes always land on the same URI,
        // which is what makes retries idempotent.
        let uri = format!("ipfs://{:x}", keccak256(&bytes));
        self.pins.write().unwrap().insert(uri.clone(), bytes);
        Ok(uri)
    }
}

#[async_trait]
impl Identity for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn linked_wallet(
        &self,
        account: &str,
    ) -> Result<Option<Address>, Self::AdapterError> {
        Ok(self.wallets.read().unwrap().get(account).copied())
    }
}

#[async_trait]
impl NonceAllocator for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn next_nonce(&self) -> Result<u64, Self::AdapterError> {
        Ok(self.nonce_counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl ChainClient for InMemoryContext {
    type AdapterError = InMemoryError;

    async fn submit_lazy_mint(
        &self,
        voucher: SignedVoucher,
    ) -> Result<TxHash, Self::AdapterError> {
        // The simulated chain executes at submission; the outcome becomes
        // visible to callers once the confirmation lands.
        let tx_hash = keccak256(voucher.signature.as_bytes());
        let status = match self.registry.lazy_mint(&voucher) {
            Ok(_) => TxStatus::Confirmed {
                block_number: self.blocks_mined.fetch_add(1, Ordering::SeqCst) + 1,
            },
            Err(reason) => TxStatus::Reverted(reason),
        };
        self.tx_outcomes.write().unwrap().insert(tx_hash, status);
        Ok(tx_hash)
    }

    async fn confirmation(&self, tx_hash: TxHash) -> Result<TxStatus, Self::AdapterError> {
        if !self.confirmation_delay.is_zero() {
            tokio::time::sleep(self.confirmation_delay).await;
        }
        self.tx_outcomes
            .read()
            .unwrap()
            .get(&tx_hash)
            .cloned()
            .ok_or(InMemoryError::AdapterError {
                error: format!("unknown transaction {tx_hash}"),
            })
    }

    async fn token_state(
        &self,
        token_id: U256,
    ) -> Result<Option<ChainTokenState>, Self::AdapterError> {
        if !self.registry.is_minted(token_id) {
            return Ok(None);
        }
        Ok(Some(ChainTokenState {
            minted: true,
            owner: self.registry.owner_of(token_id),
            receipt_id: self.registry.receipt_id_of(token_id),
        }))
    }

    async fn is_nonce_used(&self, nonce: U256) -> Result<bool, Self::AdapterError> {
        Ok(self.registry.is_nonce_used(nonce))
    }
}
