// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Block Submission
//!
//! Validates and enriches a signed state block before it is handed to the
//! node's `process` action. Every step is a hard gate:
//!
//! 1. Only `state` blocks are accepted.
//! 2. A caller subtype must be one of change/open/receive/send. Without one,
//!    an all-zero link means `change`; otherwise the node infers it.
//! 3. A zero `previous` opens the account: the work base is the account's
//!    public key and the subtype becomes `open`. Any other `previous` is the
//!    work base and must equal the node's frontier for accounts with history.
//! 4. Difficulty tier from the subtype (banano always uses the low tier).
//! 5. Work is generated when requested and missing.
//! 6. A block without work is never forwarded.
//! 7. The node's response is authoritative; a response without `hash` is a
//!    rejection whose payload goes back to the caller unchanged.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::ledger::address::{self, CurrencyMode};
use crate::ledger::{is_zero_hash, AccountInfo, NodeError, NodeRpc, StateBlock, Subtype};
use crate::work::{DifficultyTier, WorkArbiter, WorkError};

/// A signed block plus the caller's hints.
#[derive(Debug, Clone)]
pub struct SubmissionRequest {
    pub block: StateBlock,
    pub subtype: Option<String>,
    pub do_work: bool,
}

/// A block that passed every gate and carries work.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedSubmission {
    pub block: StateBlock,
    pub subtype: Option<Subtype>,
    pub tier: DifficultyTier,
}

impl PreparedSubmission {
    /// The `process` request forwarded to the node.
    pub fn process_request(&self) -> Value {
        let mut request = json!({
            "action": "process",
            "json_block": true,
            "block": self.block,
        });
        if let Some(subtype) = self.subtype {
            request["subtype"] = Value::String(subtype.to_string());
        }
        request
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SubmissionError {
    #[error("Only state blocks are supported")]
    UnsupportedBlockType,

    #[error("Invalid subtype {0}")]
    InvalidSubtype(String),

    #[error("Invalid account {0}")]
    InvalidAccount(String),

    #[error("Invalid frontier {0}")]
    FrontierMismatch(String),

    #[error("Work is required")]
    MissingWork,

    #[error("Error making {context} request: {source}")]
    Node {
        context: &'static str,
        #[source]
        source: NodeError,
    },

    #[error("Error generating work: {0}")]
    Work(#[from] WorkError),

    /// The node refused the block; the payload is its own response.
    #[error("Node rejected block")]
    Rejected(Map<String, Value>),
}

/// Pick the difficulty tier for a block.
pub fn select_tier(mode: CurrencyMode, subtype: Option<Subtype>) -> DifficultyTier {
    if mode.is_banano() {
        return DifficultyTier::Low;
    }
    match subtype {
        Some(Subtype::Open | Subtype::Receive) => DifficultyTier::Low,
        // Change, send and undetermined subtypes use the stricter target.
        _ => DifficultyTier::High,
    }
}

#[derive(Clone)]
pub struct SubmissionPipeline {
    node: Arc<dyn NodeRpc>,
    arbiter: WorkArbiter,
    mode: CurrencyMode,
    work_deadline: Duration,
}

impl SubmissionPipeline {
    pub fn new(
        node: Arc<dyn NodeRpc>,
        arbiter: WorkArbiter,
        mode: CurrencyMode,
        work_deadline: Duration,
    ) -> Self {
        Self {
            node,
            arbiter,
            mode,
            work_deadline,
        }
    }

    pub fn arbiter(&self) -> &WorkArbiter {
        &self.arbiter
    }

    /// Run gates 1 to 6.
    pub async fn prepare(
        &self,
        request: SubmissionRequest,
    ) -> Result<PreparedSubmission, SubmissionError> {
        let SubmissionRequest {
            mut block,
            subtype,
            do_work,
        } = request;

        if block.block_type != "state" {
            return Err(SubmissionError::UnsupportedBlockType);
        }

        let mut subtype = match subtype {
            Some(raw) => Some(
                raw.parse::<Subtype>()
                    .map_err(SubmissionError::InvalidSubtype)?,
            ),
            None if is_zero_hash(&block.link) => Some(Subtype::Change),
            None => None,
        };

        let work_base = if block.opens_account() {
            let public_key = address::to_public_key_for(&block.account, self.mode)
                .map_err(|_| SubmissionError::InvalidAccount(block.account.clone()))?;
            subtype = Some(Subtype::Open);
            hex::encode_upper(public_key)
        } else {
            self.check_frontier(&block).await?;
            block.previous.clone()
        };

        let tier = select_tier(self.mode, subtype);

        if do_work && !block.has_work() {
            let work = self
                .arbiter
                .generate(&work_base, tier, self.work_deadline)
                .await?;
            block.work = Some(work);
        }

        if !block.has_work() {
            return Err(SubmissionError::MissingWork);
        }

        Ok(PreparedSubmission {
            block,
            subtype,
            tier,
        })
    }

    /// Gate 7: forward to the node.
    pub async fn submit(&self, prepared: &PreparedSubmission) -> Result<Value, SubmissionError> {
        let response = self
            .node
            .request(prepared.process_request())
            .await
            .map_err(|source| SubmissionError::Node {
                context: "process",
                source,
            })?;

        match response {
            Value::Object(map) if map.get("hash").is_some_and(Value::is_string) => {
                info!(hash = %map["hash"], account = %prepared.block.account, "Processed block");
                Ok(Value::Object(map))
            }
            Value::Object(map) => {
                warn!(response = ?map, "Node rejected block");
                Err(SubmissionError::Rejected(map))
            }
            other => Err(SubmissionError::Node {
                context: "process",
                source: NodeError::InvalidResponse(other.to_string()),
            }),
        }
    }

    /// Prepare then forward.
    pub async fn process(&self, request: SubmissionRequest) -> Result<Value, SubmissionError> {
        let prepared = self.prepare(request).await?;
        self.submit(&prepared).await
    }

    async fn check_frontier(&self, block: &StateBlock) -> Result<(), SubmissionError> {
        let info = self
            .node
            .account_info(&block.account)
            .await
            .map_err(|source| SubmissionError::Node {
                context: "account info",
                source,
            })?;

        if let AccountInfo::Opened(_) = &info {
            let frontier = info.frontier().unwrap_or_default();
            if !frontier.eq_ignore_ascii_case(&block.previous) {
                warn!(
                    account = %block.account,
                    previous = %block.previous,
                    frontier = %frontier,
                    "Submitted block does not extend the frontier"
                );
                return Err(SubmissionError::FrontierMismatch(block.previous.clone()));
            }
        }
        Ok(())
    }
}
