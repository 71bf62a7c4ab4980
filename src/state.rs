// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use std::sync::Arc;

use tokio::sync::watch;

use crate::hub::SubscriptionHub;
use crate::ledger::{CurrencyMode, NodeRpc};
use crate::push::CallbackProcessor;
use crate::relay::RelayState;
use crate::submission::SubmissionPipeline;

/// Shared handles passed to every handler. Everything is built once in `main`.
#[derive(Clone)]
pub struct AppState {
    pub node: Arc<dyn NodeRpc>,
    pub submissions: SubmissionPipeline,
    pub hub: Arc<SubscriptionHub>,
    pub callbacks: CallbackProcessor,
    /// `None` when no node websocket is configured.
    pub relay_state: Option<watch::Receiver<RelayState>>,
    pub mode: CurrencyMode,
    pub max_count: u64,
}

impl AppState {
    pub fn relay_state(&self) -> Option<RelayState> {
        self.relay_state.as_ref().map(|rx| *rx.borrow())
    }
}
