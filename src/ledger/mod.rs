// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ledger integration for Nano/Banano nodes.
//!
//! This module provides functionality for:
//! - Validating and encoding account addresses
//! - The block and confirmation types exchanged with the node
//! - Synchronous RPC calls against the node's action API

pub mod address;
pub mod client;
pub mod types;

pub use address::{AddressError, CurrencyMode};
pub use client::{AccountInfo, NodeClient, NodeError, NodeRpc};
pub use types::*;
