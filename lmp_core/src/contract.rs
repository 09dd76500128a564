// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Claim registry
//!
//! The on-chain side of the protocol: a token registry that redeems signed
//! mint vouchers exactly once. Per token id the state machine is
//! `Unminted -> Minted` (terminal, unless burned); per nonce it is
//! `Unused -> Used` (terminal). Every call validates all of its
//! preconditions under one lock before touching state, so a failed call
//! reverts with zero state change, the same atomicity a contract gets from
//! its transaction context.
//!
//! Authorization decouples from cost: vouchers are signed off-chain for free
//! by a minter-role key, and the chain only charges whoever redeems one.
//! Replay across deployments is blocked because the registry verifies
//! signatures against an EIP-712 domain bound to its own chain id and
//! address.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use alloy::{
    dyn_abi::Eip712Domain,
    primitives::{Address, U256},
};
use lmp_voucher::{lmp_eip712_domain, SignedVoucher};

/// Gas-bounded maximum number of items in one batch mint.
pub const MAX_BATCH_MINT: usize = 100;

/// Token ids handed out by the direct and batch mint paths start here;
/// lazy-mint ids are issuer-chosen and live far above this range.
const FIRST_SERIAL_ID: u64 = 1;

/// Access-control roles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// Grants/revokes roles and pauses the registry.
    Admin,
    /// May mint directly and is the required signer identity for vouchers.
    Minter,
}

/// Registry record for a minted token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenRecord {
    pub owner: Address,
    pub uri: String,
    pub receipt_id: U256,
    pub burned: bool,
}

/// Events emitted by successful registry calls, in emission order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContractEvent {
    NftLazyMinted {
        token_id: U256,
        recipient: Address,
        receipt_id: U256,
        uri: String,
    },
    BatchMinted {
        start_id: U256,
        count: u64,
        recipient: Address,
    },
    ContractPaused {
        actor: Address,
    },
    ContractUnpaused {
        actor: Address,
    },
}

/// Why a registry call reverted. A revert leaves no state change behind.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum RevertReason {
    #[error("mint paths are paused")]
    Paused,
    #[error("registry is not paused")]
    NotPaused,
    #[error("nonce {nonce} already used")]
    NonceAlreadyUsed { nonce: U256 },
    #[error("token {token_id} already minted")]
    TokenAlreadyMinted { token_id: U256 },
    #[error("voucher signature is invalid")]
    InvalidSignature,
    #[error("voucher signer does not hold the minter role")]
    SignerNotMinter,
    #[error("caller does not hold the minter role")]
    CallerNotMinter,
    #[error("caller does not hold the admin role")]
    CallerNotAdmin,
    #[error("caller does not own token {token_id}")]
    NotTokenOwner { token_id: U256 },
    #[error("recipient must not be the zero address")]
    ZeroRecipient,
    #[error("batch arrays differ in length: {uris} uris, {receipt_ids} receipt ids")]
    BatchLengthMismatch { uris: usize, receipt_ids: usize },
    #[error("batch of {len} exceeds the {max} item bound")]
    BatchTooLarge { len: usize, max: usize },
    #[error("empty batch")]
    EmptyBatch,
    #[error("no token {token_id}")]
    UnknownToken { token_id: U256 },
    #[error("token {token_id} is already burned")]
    TokenBurned { token_id: U256 },
}

impl RevertReason {
    /// Reasons that are authorization failures. Surfaces to callers as an
    /// opaque `Forbidden`; the concrete reason only goes to the audit log.
    pub fn is_authorization(&self) -> bool {
        matches!(
            self,
            RevertReason::InvalidSignature
                | RevertReason::SignerNotMinter
                | RevertReason::CallerNotMinter
                | RevertReason::CallerNotAdmin
                | RevertReason::NotTokenOwner { .. }
        )
    }
}

pub type CallResult<T> = Result<T, RevertReason>;

struct RegistryState {
    paused: bool,
    next_serial_id: U256,
    tokens: HashMap<U256, TokenRecord>,
    used_nonces: HashSet<U256>,
    roles: HashMap<Role, HashSet<Address>>,
    events: Vec<ContractEvent>,
}

impl RegistryState {
    fn has_role(&self, role: Role, account: Address) -> bool {
        self.roles
            .get(&role)
            .is_some_and(|members| members.contains(&account))
    }
}

/// The claim registry instance for one deployment.
pub struct ClaimRegistry {
    address: Address,
    domain_separator: Eip712Domain,
    state: Mutex<RegistryState>,
}

impl ClaimRegistry {
    /// Deploys a registry on `chain_id` at `address`; `deployer` receives
    /// both the admin and the minter role.
    pub fn new(chain_id: u64, address: Address, deployer: Address) -> Self {
        let mut roles: HashMap<Role, HashSet<Address>> = HashMap::new();
        roles.entry(Role::Admin).or_default().insert(deployer);
        roles.entry(Role::Minter).or_default().insert(deployer);

        Self {
            address,
            domain_separator: lmp_eip712_domain(chain_id, address),
            state: Mutex::new(RegistryState {
                paused: false,
                next_serial_id: U256::from(FIRST_SERIAL_ID),
                tokens: HashMap::new(),
                used_nonces: HashSet::new(),
                roles,
                events: Vec::new(),
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// The EIP-712 domain voucher signatures are verified against.
    pub fn domain_separator(&self) -> &Eip712Domain {
        &self.domain_separator
    }

    /// Redeems a signed voucher. Callable by anyone holding the voucher.
    ///
    /// Preconditions: signature recovers to a minter-role address, nonce
    /// unused, token id unminted, recipient non-zero, registry not paused.
    /// On success the nonce is consumed and the token mints to the voucher's
    /// recipient in one atomic transition.
    pub fn lazy_mint(&self, voucher: &SignedVoucher) -> CallResult<U256> {
        let mut state = self.state.lock().unwrap();

        if state.paused {
            return Err(RevertReason::Paused);
        }
        let signer = voucher
            .recover_signer(&self.domain_separator)
            .map_err(|_| RevertReason::InvalidSignature)?;
        if !state.has_role(Role::Minter, signer) {
            return Err(RevertReason::SignerNotMinter);
        }

        let message = &voucher.message;
        if message.recipient == Address::ZERO {
            return Err(RevertReason::ZeroRecipient);
        }
        if state.used_nonces.contains(&message.nonce) {
            return Err(RevertReason::NonceAlreadyUsed {
                nonce: message.nonce,
            });
        }
        if state.tokens.contains_key(&message.tokenId) {
            return Err(RevertReason::TokenAlreadyMinted {
                token_id: message.tokenId,
            });
        }

        state.used_nonces.insert(message.nonce);
        state.tokens.insert(
            message.tokenId,
            TokenRecord {
                owner: message.recipient,
                uri: message.uri.clone(),
                receipt_id: message.receiptId,
                burned: false,
            },
        );
        state.events.push(ContractEvent::NftLazyMinted {
            token_id: message.tokenId,
            recipient: message.recipient,
            receipt_id: message.receiptId,
            uri: message.uri.clone(),
        });

        Ok(message.tokenId)
    }

    /// Minter-gated direct mint, bypassing voucher, signature and nonce
    /// checks. Operator/migration path; allocates the next serial token id.
    pub fn mint(
        &self,
        caller: Address,
        recipient: Address,
        uri: &str,
        receipt_id: U256,
    ) -> CallResult<U256> {
        let mut state = self.state.lock().unwrap();

        if state.paused {
            return Err(RevertReason::Paused);
        }
        if !state.has_role(Role::Minter, caller) {
            return Err(RevertReason::CallerNotMinter);
        }
        if recipient == Address::ZERO {
            return Err(RevertReason::ZeroRecipient);
        }
        let token_id = state.next_serial_id;
        if state.tokens.contains_key(&token_id) {
            return Err(RevertReason::TokenAlreadyMinted { token_id });
        }

        state.tokens.insert(
            token_id,
            TokenRecord {
                owner: recipient,
                uri: uri.to_owned(),
                receipt_id,
                burned: false,
            },
        );
        state.next_serial_id += U256::from(1u64);

        Ok(token_id)
    }

    /// Minter-gated batch mint of consecutive serial token ids.
    ///
    /// `uris` and `receipt_ids` must have equal length, at most
    /// [`MAX_BATCH_MINT`]. All items mint or none do; a single violated
    /// precondition reverts the whole batch.
    pub fn batch_mint(
        &self,
        caller: Address,
        recipient: Address,
        uris: &[String],
        receipt_ids: &[U256],
    ) -> CallResult<U256> {
        let mut state = self.state.lock().unwrap();

        if state.paused {
            return Err(RevertReason::Paused);
        }
        if !state.has_role(Role::Minter, caller) {
            return Err(RevertReason::CallerNotMinter);
        }
        if uris.len() != receipt_ids.len() {
            return Err(RevertReason::BatchLengthMismatch {
                uris: uris.len(),
                receipt_ids: receipt_ids.len(),
            });
        }
        if uris.is_empty() {
            return Err(RevertReason::EmptyBatch);
        }
        if uris.len() > MAX_BATCH_MINT {
            return Err(RevertReason::BatchTooLarge {
                len: uris.len(),
                max: MAX_BATCH_MINT,
            });
        }
        if recipient == Address::ZERO {
            return Err(RevertReason::ZeroRecipient);
        }

        let start_id = state.next_serial_id;
        // validate the whole id range before the first insert
        for offset in 0..uris.len() {
            let token_id = start_id + U256::from(offset as u64);
            if state.tokens.contains_key(&token_id) {
                return Err(RevertReason::TokenAlreadyMinted { token_id });
            }
        }

        for (offset, (uri, receipt_id)) in uris.iter().zip(receipt_ids).enumerate() {
            let token_id = start_id + U256::from(offset as u64);
            state.tokens.insert(
                token_id,
                TokenRecord {
                    owner: recipient,
                    uri: uri.clone(),
                    receipt_id: *receipt_id,
                    burned: false,
                },
            );
        }
        state.next_serial_id = start_id + U256::from(uris.len() as u64);
        state.events.push(ContractEvent::BatchMinted {
            start_id,
            count: uris.len() as u64,
            recipient,
        });

        Ok(start_id)
    }

    /// Owner-only burn. The token id and its nonce stay consumed forever;
    /// a burned id can never be reminted.
    pub fn burn(&self, caller: Address, token_id: U256) -> CallResult<()> {
        let mut state = self.state.lock().unwrap();

        let record = state
            .tokens
            .get_mut(&token_id)
            .ok_or(RevertReason::UnknownToken { token_id })?;
        if record.burned {
            return Err(RevertReason::TokenBurned { token_id });
        }
        if record.owner != caller {
            return Err(RevertReason::NotTokenOwner { token_id });
        }

        record.burned = true;
        Ok(())
    }

    /// Admin-gated pause of all three mint paths. Reads and burn are
    /// unaffected.
    pub fn pause(&self, caller: Address) -> CallResult<()> {
        let mut state = self.state.lock().unwrap();

        if !state.has_role(Role::Admin, caller) {
            return Err(RevertReason::CallerNotAdmin);
        }
        if state.paused {
            return Err(RevertReason::Paused);
        }

        state.paused = true;
        state
            .events
            .push(ContractEvent::ContractPaused { actor: caller });
        Ok(())
    }

    /// Admin-gated unpause.
    pub fn unpause(&self, caller: Address) -> CallResult<()> {
        let mut state = self.state.lock().unwrap();

        if !state.has_role(Role::Admin, caller) {
            return Err(RevertReason::CallerNotAdmin);
        }
        if !state.paused {
            return Err(RevertReason::NotPaused);
        }

        state.paused = false;
        state
            .events
            .push(ContractEvent::ContractUnpaused { actor: caller });
        Ok(())
    }

    /// Admin-gated role grant.
    pub fn grant_role(&self, caller: Address, role: Role, account: Address) -> CallResult<()> {
        let mut state = self.state.lock().unwrap();

        if !state.has_role(Role::Admin, caller) {
            return Err(RevertReason::CallerNotAdmin);
        }
        state.roles.entry(role).or_default().insert(account);
        Ok(())
    }

    /// Admin-gated role revocation.
    pub fn revoke_role(&self, caller: Address, role: Role, account: Address) -> CallResult<()> {
        let mut state = self.state.lock().unwrap();

        if !state.has_role(Role::Admin, caller) {
            return Err(RevertReason::CallerNotAdmin);
        }
        if let Some(members) = state.roles.get_mut(&role) {
            members.remove(&account);
        }
        Ok(())
    }

    /// Owner of a token, `None` if unminted or burned.
    pub fn owner_of(&self, token_id: U256) -> Option<Address> {
        let state = self.state.lock().unwrap();
        state
            .tokens
            .get(&token_id)
            .filter(|record| !record.burned)
            .map(|record| record.owner)
    }

    /// Metadata URI of a token, `None` if unminted or burned.
    pub fn token_uri(&self, token_id: U256) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .tokens
            .get(&token_id)
            .filter(|record| !record.burned)
            .map(|record| record.uri.clone())
    }

    /// Receipt a token was minted for. Survives burning.
    pub fn receipt_id_of(&self, token_id: U256) -> Option<U256> {
        let state = self.state.lock().unwrap();
        state.tokens.get(&token_id).map(|record| record.receipt_id)
    }

    /// Whether a token id has ever been minted. Burned tokens stay minted.
    pub fn is_minted(&self, token_id: U256) -> bool {
        let state = self.state.lock().unwrap();
        state.tokens.contains_key(&token_id)
    }

    /// Whether a voucher nonce has been consumed.
    pub fn is_nonce_used(&self, nonce: U256) -> bool {
        let state = self.state.lock().unwrap();
        state.used_nonces.contains(&nonce)
    }

    pub fn is_paused(&self) -> bool {
        self.state.lock().unwrap().paused
    }

    pub fn has_role(&self, role: Role, account: Address) -> bool {
        self.state.lock().unwrap().has_role(role, account)
    }

    /// Number of tokens ever minted, burned ones included.
    pub fn total_minted(&self) -> u64 {
        self.state.lock().unwrap().tokens.len() as u64
    }

    /// Emitted events in emission order.
    pub fn events(&self) -> Vec<ContractEvent> {
        self.state.lock().unwrap().events.clone()
    }
}
