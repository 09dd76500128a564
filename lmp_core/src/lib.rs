// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

#![doc = include_str!("../README.md")]
//! ## Getting started
//!
//! Take a look at the [`orchestrator`] module to see how voucher issuance,
//! claiming and reconciliation are coordinated, and at [`adapters`] for the
//! traits a storage/chain backend has to implement. An in-memory backend for
//! tests and development lives in [`context::memory`].

mod error;

pub mod adapters;
pub mod contract;
pub mod context;
pub mod issuer;
pub mod ledger;
pub mod orchestrator;

pub use error::{Error, Result};
