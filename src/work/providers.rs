// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Work provider backends: a node-style work server and the BoomPoW GraphQL
//! service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{DifficultyTier, WorkError, WorkProvider};

pub const DEFAULT_BPOW_URL: &str = "https://boompow.banano.cc/graphql";

const GENERATE_TIMEOUT: Duration = Duration::from_secs(30);
const CANCEL_TIMEOUT: Duration = Duration::from_secs(5);

const WORK_GENERATE_MUTATION: &str =
    "mutation workGenerate($input: WorkGenerateInput!) { workGenerate(input: $input) }";

fn build_client() -> Result<Client, WorkError> {
    Client::builder()
        .timeout(GENERATE_TIMEOUT)
        .build()
        .map_err(|e| WorkError::Provider(format!("failed to build HTTP client: {e}")))
}

/// A work server speaking the node RPC dialect (`work_generate`/`work_cancel`).
#[derive(Debug, Clone)]
pub struct NodeWorkProvider {
    url: String,
    http: Client,
}

#[derive(Deserialize)]
struct WorkGenerateResponse {
    #[serde(default)]
    work: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl NodeWorkProvider {
    pub fn new(url: impl Into<String>) -> Result<Self, WorkError> {
        Ok(Self {
            url: url.into(),
            http: build_client()?,
        })
    }
}

#[async_trait]
impl WorkProvider for NodeWorkProvider {
    fn name(&self) -> &str {
        "work-server"
    }

    async fn generate(&self, hash: &str, tier: DifficultyTier) -> Result<String, WorkError> {
        let response = self
            .http
            .post(&self.url)
            .json(&json!({
                "action": "work_generate",
                "hash": hash,
                "difficulty": tier.threshold(),
            }))
            .send()
            .await
            .map_err(|e| WorkError::Provider(format!("work_generate failed: {e}")))?;

        let status = response.status();
        let body: WorkGenerateResponse = response
            .json()
            .await
            .map_err(|e| WorkError::Provider(format!("work_generate returned {status}: {e}")))?;

        match (body.work, body.error) {
            (Some(work), _) if !work.is_empty() => Ok(work),
            (_, Some(error)) => Err(WorkError::Provider(error)),
            _ => Err(WorkError::Provider("work_generate returned no work".to_string())),
        }
    }

    async fn cancel(&self, hash: &str) {
        let result = self
            .http
            .post(&self.url)
            .timeout(CANCEL_TIMEOUT)
            .json(&json!({ "action": "work_cancel", "hash": hash }))
            .send()
            .await;
        match result {
            Ok(response) => debug!(hash = %hash, status = %response.status(), "work_cancel sent"),
            Err(e) => warn!(hash = %hash, error = %e, "work_cancel failed"),
        }
    }
}

/// The BoomPoW distributed work service. Authenticated with a service key;
/// the computation cannot be cancelled once requested.
#[derive(Debug, Clone)]
pub struct BoomPowProvider {
    url: String,
    key: String,
    http: Client,
}

#[derive(Deserialize)]
struct GraphQlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Vec<GraphQlError>,
}

#[derive(Deserialize)]
struct GraphQlError {
    message: String,
}

impl BoomPowProvider {
    pub fn new(url: impl Into<String>, key: impl Into<String>) -> Result<Self, WorkError> {
        Ok(Self {
            url: url.into(),
            key: key.into(),
            http: build_client()?,
        })
    }
}

#[async_trait]
impl WorkProvider for BoomPowProvider {
    fn name(&self) -> &str {
        "boompow"
    }

    async fn generate(&self, hash: &str, tier: DifficultyTier) -> Result<String, WorkError> {
        let response = self
            .http
            .post(&self.url)
            .header("Authorization", &self.key)
            .json(&json!({
                "operationName": "workGenerate",
                "query": WORK_GENERATE_MUTATION,
                "variables": {
                    "input": {
                        "hash": hash,
                        "difficultyMultiplier": tier.multiplier(),
                        "blockAward": false,
                    }
                }
            }))
            .send()
            .await
            .map_err(|e| WorkError::Provider(format!("boompow request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(WorkError::Provider(format!("boompow returned {status}: {body}")));
        }

        let body: GraphQlResponse = response
            .json()
            .await
            .map_err(|e| WorkError::Provider(format!("boompow invalid JSON: {e}")))?;

        if let Some(error) = body.errors.first() {
            return Err(WorkError::Provider(error.message.clone()));
        }
        body.data
            .as_ref()
            .and_then(|d| d.get("workGenerate"))
            .and_then(Value::as_str)
            .filter(|work| !work.is_empty())
            .map(str::to_string)
            .ok_or_else(|| WorkError::Provider("boompow returned no work".to_string()))
    }
}
