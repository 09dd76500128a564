// Copyright 2023-, Semiotic AI, Inc.
// SPDX-License-Identifier: Apache-2.0

//! Context implementations bundling the adapters the orchestrator needs.

pub mod memory;
