// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Node RPC client.
//!
//! [`NodeRpc`] is the seam between the gateway and the node's action API. The
//! only required method is [`NodeRpc::request`]; the typed helpers build on it so
//! test doubles only have to answer raw JSON.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::address::CurrencyMode;
use super::types::StateBlock;

/// Node error text for an account with no blocks yet.
pub const ACCOUNT_NOT_FOUND: &str = "Account not found";

/// Maximum receivable blocks counted for a subscriber (anti-spam cap).
pub const RECEIVABLE_COUNT_CAP: u32 = 51;

const NANO_RECEIVABLE_THRESHOLD: &str = "1000000000000000000000000";
const BANANO_RECEIVABLE_THRESHOLD: &str = "1000000000000000000000000000";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors talking to the node.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NodeError {
    #[error("Node transport error: {0}")]
    Transport(String),

    #[error("Node response was invalid: {0}")]
    InvalidResponse(String),

    #[error("Node rejected request: {0}")]
    Rejected(String),
}

/// Result of an `account_info` call.
#[derive(Debug, Clone, PartialEq)]
pub enum AccountInfo {
    /// Account has at least one block.
    Opened(Map<String, Value>),
    /// Node answered "Account not found"; the raw payload is kept for callers
    /// that forward it.
    Unopened(Map<String, Value>),
}

impl AccountInfo {
    pub fn frontier(&self) -> Option<&str> {
        match self {
            AccountInfo::Opened(map) => map.get("frontier").and_then(Value::as_str),
            AccountInfo::Unopened(_) => None,
        }
    }

    pub fn into_map(self) -> Map<String, Value> {
        match self {
            AccountInfo::Opened(map) | AccountInfo::Unopened(map) => map,
        }
    }
}

#[async_trait]
pub trait NodeRpc: Send + Sync {
    /// POST a raw action to the node and return its JSON response.
    async fn request(&self, body: Value) -> Result<Value, NodeError>;

    async fn account_info(&self, account: &str) -> Result<AccountInfo, NodeError> {
        let response = self
            .request(json!({
                "action": "account_info",
                "account": account,
                "pending": true,
                "representative": true,
            }))
            .await?;

        let Value::Object(map) = response else {
            return Err(NodeError::InvalidResponse(
                "account_info response is not an object".to_string(),
            ));
        };

        if map.contains_key("frontier") {
            return Ok(AccountInfo::Opened(map));
        }
        match map.get("error").and_then(Value::as_str) {
            Some(ACCOUNT_NOT_FOUND) => Ok(AccountInfo::Unopened(map)),
            Some(error) => Err(NodeError::Rejected(error.to_string())),
            None => Err(NodeError::InvalidResponse(
                "account_info response has neither frontier nor error".to_string(),
            )),
        }
    }

    /// Number of confirmed receivable blocks above the anti-spam threshold,
    /// capped at [`RECEIVABLE_COUNT_CAP`].
    async fn receivable_count(&self, account: &str, mode: CurrencyMode) -> Result<usize, NodeError> {
        let threshold = match mode {
            CurrencyMode::Nano => NANO_RECEIVABLE_THRESHOLD,
            CurrencyMode::Banano => BANANO_RECEIVABLE_THRESHOLD,
        };
        let response = self
            .request(json!({
                "action": "receivable",
                "account": account,
                "threshold": threshold,
                "count": RECEIVABLE_COUNT_CAP,
                "include_only_confirmed": true,
            }))
            .await?;

        if let Some(error) = response.get("error").and_then(Value::as_str) {
            return Err(NodeError::Rejected(error.to_string()));
        }
        // The node reports an empty set as `"blocks": ""`.
        Ok(match response.get("blocks") {
            Some(Value::Object(blocks)) => blocks.len(),
            Some(Value::Array(blocks)) => blocks.len(),
            _ => 0,
        })
    }

    /// Fetch a block's contents in JSON form.
    async fn block_info(&self, hash: &str) -> Result<StateBlock, NodeError> {
        let response = self
            .request(json!({
                "action": "block_info",
                "hash": hash,
                "json_block": true,
            }))
            .await?;

        if let Some(error) = response.get("error").and_then(Value::as_str) {
            return Err(NodeError::Rejected(error.to_string()));
        }
        let contents = response
            .get("contents")
            .cloned()
            .ok_or_else(|| NodeError::InvalidResponse("block_info without contents".to_string()))?;
        serde_json::from_value(contents).map_err(|e| NodeError::InvalidResponse(e.to_string()))
    }
}

/// HTTP client for the node's RPC endpoint.
#[derive(Debug, Clone)]
pub struct NodeClient {
    url: String,
    http: reqwest::Client,
}

impl NodeClient {
    pub fn new(url: impl Into<String>) -> Result<Self, NodeError> {
        let http = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| NodeError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            url: url.into(),
            http,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl NodeRpc for NodeClient {
    async fn request(&self, body: Value) -> Result<Value, NodeError> {
        let action = body
            .get("action")
            .and_then(Value::as_str)
            .unwrap_or("unknown")
            .to_string();

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| NodeError::Transport(e.to_string()))?;

        let status = response.status();
        let value: Value = response
            .json()
            .await
            .map_err(|e| NodeError::InvalidResponse(e.to_string()))?;

        tracing::debug!(action = %action, status = %status, "Node RPC call completed");
        Ok(value)
    }
}
