// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Nano Wallet Gateway - light-wallet backend for Nano/Banano nodes
//!
//! Sits between wallet apps and a node: re-exposes a constrained subset of
//! the node RPC, validates and enriches block submissions, and pushes
//! confirmations and prices to subscribed wallet sockets.
//!
//! ## Modules
//!
//! - `api` - HTTP and websocket handlers (Axum)
//! - `ledger` - Address validation, block types, node RPC client
//! - `work` - Proof-of-work arbitration across providers
//! - `relay` - Upstream confirmation stream from the node websocket
//! - `submission` - Block validation and `process` forwarding
//! - `hub` - Wallet socket registry, confirmation fan-out, price pushes
//! - `push` - Push-token bookkeeping and node callback notifications

pub mod api;
pub mod config;
pub mod error;
pub mod hub;
pub mod ledger;
pub mod models;
pub mod prices;
pub mod push;
pub mod relay;
pub mod state;
pub mod submission;
pub mod work;

#[cfg(test)]
mod test_support;
