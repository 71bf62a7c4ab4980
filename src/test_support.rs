// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! In-process doubles shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::hub::SubscriptionHub;
use crate::ledger::{CurrencyMode, NodeError, NodeRpc};
use crate::prices::InMemoryPriceCache;
use crate::push::{CallbackProcessor, InMemoryTokenStore, LogNotifier};
use crate::state::AppState;
use crate::submission::SubmissionPipeline;
use crate::work::{DifficultyTier, WorkArbiter, WorkError, WorkProvider};

/// Nano-mode state wired to `node`, with in-memory prices and tokens.
pub fn test_state(node: Arc<FakeNode>, providers: Vec<Arc<dyn WorkProvider>>) -> AppState {
    let mode = CurrencyMode::Nano;
    let tokens = Arc::new(InMemoryTokenStore::new());
    let prices = Arc::new(InMemoryPriceCache::new(64, Duration::from_secs(300)));
    AppState {
        node: node.clone(),
        submissions: SubmissionPipeline::new(
            node.clone(),
            WorkArbiter::new(providers),
            mode,
            Duration::from_secs(5),
        ),
        hub: Arc::new(SubscriptionHub::new(
            node.clone(),
            prices,
            tokens.clone(),
            mode,
        )),
        callbacks: CallbackProcessor::new(node, tokens, Arc::new(LogNotifier), mode),
        relay_state: None,
        mode,
        max_count: 1000,
    }
}

/// A node that answers from a per-action script and records every request.
#[derive(Default)]
pub struct FakeNode {
    responses: Mutex<HashMap<String, Result<Value, NodeError>>>,
    calls: Mutex<Vec<Value>>,
}

impl FakeNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(self, action: &str, response: Value) -> Self {
        self.set(action, Ok(response));
        self
    }

    pub fn fail(self, action: &str, error: NodeError) -> Self {
        self.set(action, Err(error));
        self
    }

    pub fn set(&self, action: &str, response: Result<Value, NodeError>) {
        self.responses
            .lock()
            .unwrap()
            .insert(action.to_string(), response);
    }

    pub fn calls(&self) -> Vec<Value> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_for(&self, action: &str) -> Vec<Value> {
        self.calls()
            .into_iter()
            .filter(|c| c["action"] == action)
            .collect()
    }
}

#[async_trait]
impl NodeRpc for FakeNode {
    async fn request(&self, body: Value) -> Result<Value, NodeError> {
        let action = body["action"].as_str().unwrap_or_default().to_string();
        self.calls.lock().unwrap().push(body);
        self.responses
            .lock()
            .unwrap()
            .get(&action)
            .cloned()
            .unwrap_or_else(|| Err(NodeError::Transport(format!("no scripted response for {action}"))))
    }
}

/// A work provider returning a fixed value and recording requested jobs.
pub struct FixedWork {
    pub work: Result<String, WorkError>,
    pub jobs: Mutex<Vec<(String, DifficultyTier)>>,
    pub cancels: AtomicUsize,
}

impl FixedWork {
    pub fn ok(work: &str) -> Arc<Self> {
        Arc::new(Self {
            work: Ok(work.to_string()),
            jobs: Mutex::new(Vec::new()),
            cancels: AtomicUsize::new(0),
        })
    }

    pub fn jobs(&self) -> Vec<(String, DifficultyTier)> {
        self.jobs.lock().unwrap().clone()
    }

    pub fn cancel_count(&self) -> usize {
        self.cancels.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WorkProvider for FixedWork {
    fn name(&self) -> &str {
        "fixed"
    }

    async fn generate(&self, hash: &str, tier: DifficultyTier) -> Result<String, WorkError> {
        self.jobs.lock().unwrap().push((hash.to_string(), tier));
        self.work.clone()
    }

    async fn cancel(&self, _hash: &str) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
    }
}
