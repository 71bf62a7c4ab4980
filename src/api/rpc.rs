// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # RPC Passthrough
//!
//! `POST /api` mirrors the node's action API for a fixed allow-list of
//! actions. A few actions are rewritten on the way through:
//!
//! - `count` is clamped to the configured maximum on every action.
//! - `pending`/`receivable` only ever return confirmed blocks.
//! - `account_history` validates the account before touching the node.
//! - `process` goes through the submission pipeline.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};
use tracing::{debug, error, info};

use crate::{
    error::ApiError,
    ledger::{address, StateBlock},
    models::RpcRequest,
    state::AppState,
    submission::{SubmissionError, SubmissionRequest},
};

/// Actions forwarded to the node.
pub const SUPPORTED_ACTIONS: [&str; 33] = [
    "account_history",
    "process",
    "pending",
    "receivable",
    "account_balance",
    "account_block_count",
    "account_check",
    "account_info",
    "account_representative",
    "account_subscribe",
    "account_weight",
    "accounts_balances",
    "accounts_frontiers",
    "accounts_pending",
    "available_supply",
    "block",
    "block_hash",
    "blocks",
    "block_info",
    "blocks_info",
    "block_account",
    "block_count",
    "block_count_type",
    "chain",
    "frontiers",
    "frontier_count",
    "history",
    "key_expand",
    "representatives",
    "republish",
    "peers",
    "version",
    "pending_exists",
];

/// Clamp a caller-supplied `count`. `None` when the value is not an integer.
pub fn clamp_count(value: &Value, max: u64) -> Option<u64> {
    let count = match value {
        Value::Number(n) => n.as_i64()?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    Some(match u64::try_from(count) {
        Ok(count) if count <= max => count,
        _ => max,
    })
}

#[utoipa::path(
    post,
    path = "/api",
    request_body = RpcRequest,
    tag = "RPC",
    responses(
        (status = 200, description = "Node response, or an unsupported-action error"),
        (status = 400, description = "Malformed or rejected request"),
        (status = 500, description = "Node or work provider failure"),
        (status = 503, description = "No work available")
    )
)]
pub async fn handle_action(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Ok(Value::Object(mut request)) = serde_json::from_slice::<Value>(&body) else {
        debug!("Undecodable RPC body");
        return Err(ApiError::invalid_request());
    };
    let Some(action) = request
        .get("action")
        .and_then(Value::as_str)
        .map(str::to_ascii_lowercase)
    else {
        return Err(ApiError::invalid_request());
    };

    if !SUPPORTED_ACTIONS.contains(&action.as_str()) {
        info!(action = %action, "Unsupported RPC action");
        return Err(ApiError::unsupported_action());
    }
    info!(action = %action, "Received RPC action");
    request.insert("action".into(), Value::String(action.clone()));

    if let Some(count) = request.get("count") {
        let clamped = clamp_count(count, state.max_count).ok_or_else(ApiError::invalid_request)?;
        request.insert("count".into(), Value::from(clamped));
    }

    match action.as_str() {
        "process" => return process(&state, &request).await,
        "account_history" => {
            let valid = request
                .get("account")
                .and_then(Value::as_str)
                .is_some_and(|a| address::validate(a, state.mode));
            if !valid {
                return Err(ApiError::invalid_request());
            }
        }
        "pending" | "receivable" => {
            request.insert("include_only_confirmed".into(), Value::Bool(true));
            let missing_count = request
                .get("count")
                .and_then(Value::as_u64)
                .is_none_or(|c| c == 0);
            if action == "pending" && missing_count {
                request.insert("count".into(), Value::from(state.max_count));
            }
        }
        _ => {}
    }

    forward(&state, &action, request).await
}

async fn forward(
    state: &AppState,
    action: &str,
    request: Map<String, Value>,
) -> Result<Response, ApiError> {
    let response = state
        .node
        .request(Value::Object(request))
        .await
        .map_err(|e| {
            error!(action = %action, error = %e, "Node request failed");
            ApiError::internal(format!("Error making {action} request"))
        })?;
    Ok(Json(response).into_response())
}

async fn process(state: &AppState, request: &Map<String, Value>) -> Result<Response, ApiError> {
    let submission = parse_process(request)?;
    match state.submissions.process(submission).await {
        Ok(response) => Ok(Json(response).into_response()),
        Err(SubmissionError::Rejected(node_response)) => {
            Ok((StatusCode::BAD_REQUEST, Json(Value::Object(node_response))).into_response())
        }
        Err(e) => {
            error!(error = %e, "Block submission failed");
            Err(e.into())
        }
    }
}

/// Decode the loosely-typed `process` body. `block` may be an object or a
/// JSON-encoded string.
fn parse_process(request: &Map<String, Value>) -> Result<SubmissionRequest, ApiError> {
    match request.get("json_block") {
        None | Some(Value::Bool(_)) => {}
        Some(Value::String(s)) if s == "true" || s == "false" => {}
        Some(_) => return Err(ApiError::bad_request("json_block must be true or false")),
    }

    let block = match request.get("block") {
        Some(Value::String(raw)) => serde_json::from_str::<StateBlock>(raw),
        Some(value @ Value::Object(_)) => serde_json::from_value::<StateBlock>(value.clone()),
        _ => return Err(ApiError::invalid_request()),
    }
    .map_err(|e| ApiError::bad_request(e.to_string()))?;

    let subtype = match request.get("subtype") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    };
    let do_work = match request.get("do_work") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
        _ => false,
    };

    Ok(SubmissionRequest {
        block,
        subtype,
        do_work,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::NodeError;
    use crate::test_support::{test_state, FakeNode, FixedWork};
    use crate::work::WorkProvider;
    use axum::body::to_bytes;
    use serde_json::json;
    use std::sync::Arc;

    const ACCOUNT: &str = "nano_1zyb1s96twbtycqwgh1o6wsnpsksgdoohokikgjqjaz63pxnju457pz8tm3r";
    const FRONTIER: &str = "80A6745762493FA21A22718ABFA4F635656A707B48B3324198AC7F3938DE6D4F";
    const LINK: &str = "5D1AA8A45F8736519D707FCB375976A7F9AF795091021D7E9C7548D6F45DD8D5";
    const HASH: &str = "E02A2D5FCD3EFD6A7E3DB63A9D7B4D5E20FD8C2BE15FD6CA5D4B7C3AF2C1F9A1";

    async fn call(state: &AppState, body: Value) -> (StatusCode, Value) {
        let response = match handle_action(State(state.clone()), Bytes::from(body.to_string())).await
        {
            Ok(response) => response,
            Err(e) => e.into_response(),
        };
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    fn send_block() -> Value {
        json!({
            "type": "state",
            "account": ACCOUNT,
            "previous": FRONTIER,
            "representative": ACCOUNT,
            "balance": "1000",
            "link": LINK,
            "signature": "00",
        })
    }

    #[test]
    fn count_clamp() {
        assert_eq!(clamp_count(&json!(10), 1000), Some(10));
        assert_eq!(clamp_count(&json!("25"), 1000), Some(25));
        assert_eq!(clamp_count(&json!(5000), 1000), Some(1000));
        assert_eq!(clamp_count(&json!(-1), 1000), Some(1000));
        assert_eq!(clamp_count(&json!("ten"), 1000), None);
        assert_eq!(clamp_count(&json!(1.5), 1000), None);
    }

    #[tokio::test]
    async fn malformed_and_unsupported_requests() {
        let state = test_state(Arc::new(FakeNode::new()), Vec::new());

        let response = handle_action(State(state.clone()), Bytes::from_static(b"{oops"))
            .await
            .unwrap_err();
        assert_eq!(response.status, StatusCode::BAD_REQUEST);

        let (status, body) = call(&state, json!({"account": ACCOUNT})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "The request was invalid and not recognized");

        let (status, body) = call(&state, json!({"action": "wallet_create"})).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["error"], "The requested action is not supported in this API");

        let (status, _) = call(&state, json!({"action": "blocks", "count": "lots"})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn passthrough_clamps_count() {
        let node = Arc::new(FakeNode::new().respond("chain", json!({"blocks": []})));
        let state = test_state(node.clone(), Vec::new());

        let (status, body) = call(
            &state,
            json!({"action": "CHAIN", "block": FRONTIER, "count": 99999}),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"blocks": []}));

        let sent = &node.calls_for("chain")[0];
        assert_eq!(sent["count"], 1000);
        assert_eq!(sent["block"], FRONTIER);
    }

    #[tokio::test]
    async fn pending_forces_confirmed_and_default_count() {
        let node = Arc::new(
            FakeNode::new()
                .respond("pending", json!({"blocks": ""}))
                .respond("receivable", json!({"blocks": ""})),
        );
        let state = test_state(node.clone(), Vec::new());

        call(
            &state,
            json!({"action": "pending", "account": ACCOUNT, "include_only_confirmed": false}),
        )
        .await;
        let sent = &node.calls_for("pending")[0];
        assert_eq!(sent["include_only_confirmed"], true);
        assert_eq!(sent["count"], 1000);

        call(&state, json!({"action": "receivable", "account": ACCOUNT, "count": 5})).await;
        let sent = &node.calls_for("receivable")[0];
        assert_eq!(sent["include_only_confirmed"], true);
        assert_eq!(sent["count"], 5);
    }

    #[tokio::test]
    async fn account_history_requires_valid_account() {
        let node = Arc::new(FakeNode::new().respond("account_history", json!({"history": ""})));
        let state = test_state(node.clone(), Vec::new());

        let (status, _) = call(
            &state,
            json!({"action": "account_history", "account": "nano_invalid"}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(node.calls().is_empty());

        let (status, _) =
            call(&state, json!({"action": "account_history", "account": ACCOUNT})).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn node_failure_is_internal_error() {
        let node = Arc::new(FakeNode::new().fail("version", NodeError::Transport("down".into())));
        let state = test_state(node, Vec::new());
        let (status, body) = call(&state, json!({"action": "version"})).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Error making version request");
    }

    #[tokio::test]
    async fn process_accepts_string_block_and_generates_work() {
        let node = Arc::new(
            FakeNode::new()
                .respond("account_info", json!({"frontier": FRONTIER}))
                .respond("process", json!({"hash": HASH})),
        );
        let work = FixedWork::ok("2bf29ef00786a6bc");
        let providers: Vec<Arc<dyn WorkProvider>> = vec![work.clone()];
        let state = test_state(node.clone(), providers);

        let (status, body) = call(
            &state,
            json!({
                "action": "process",
                "json_block": "false",
                "block": send_block().to_string(),
                "subtype": "send",
                "do_work": true,
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["hash"], HASH);

        let forwarded = &node.calls_for("process")[0];
        assert_eq!(forwarded["json_block"], true);
        assert_eq!(forwarded["subtype"], "send");
        assert_eq!(forwarded["block"]["work"], "2bf29ef00786a6bc");
        assert_eq!(work.jobs().len(), 1);
    }

    #[tokio::test]
    async fn process_validation_errors() {
        let node = Arc::new(FakeNode::new().respond("account_info", json!({"frontier": FRONTIER})));
        let state = test_state(node, Vec::new());

        let (status, body) = call(
            &state,
            json!({"action": "process", "json_block": "yes", "block": send_block()}),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "json_block must be true or false");

        let mut legacy = send_block();
        legacy["type"] = json!("send");
        let (_, body) = call(&state, json!({"action": "process", "block": legacy})).await;
        assert_eq!(body["error"], "Only state blocks are supported");

        let (_, body) = call(
            &state,
            json!({"action": "process", "block": send_block(), "subtype": "epoch"}),
        )
        .await;
        assert_eq!(body["error"], "Invalid subtype epoch");

        let (status, body) =
            call(&state, json!({"action": "process", "block": send_block()})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Work is required");

        let (status, _) = call(
            &state,
            json!({"action": "process", "block": send_block(), "do_work": true}),
        )
        .await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn node_rejection_is_returned_verbatim() {
        let node = Arc::new(
            FakeNode::new()
                .respond("account_info", json!({"frontier": FRONTIER}))
                .respond("process", json!({"error": "Fork"})),
        );
        let state = test_state(node, Vec::new());
        let mut block = send_block();
        block["work"] = json!("2bf29ef00786a6bc");

        let (status, body) = call(&state, json!({"action": "process", "block": block})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({"error": "Fork"}));
    }
}
