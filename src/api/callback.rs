// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{body::Bytes, extract::State, http::StatusCode};
use tracing::{debug, warn};

use crate::{models::NodeCallback, state::AppState};

/// Node HTTP callback. The node does not retry, so every outcome is a 200.
#[utoipa::path(
    post,
    path = "/callback",
    request_body = NodeCallback,
    tag = "Callback",
    responses((status = 200))
)]
pub async fn node_callback(State(state): State<AppState>, body: Bytes) -> StatusCode {
    let callback: NodeCallback = match serde_json::from_slice(&body) {
        Ok(callback) => callback,
        Err(e) => {
            warn!(error = %e, "Undecodable node callback");
            return StatusCode::OK;
        }
    };

    match state.callbacks.process(&callback).await {
        Ok(delivered) => debug!(hash = %callback.hash, delivered, "Node callback handled"),
        Err(e) => warn!(hash = %callback.hash, error = %e, "Node callback failed"),
    }
    StatusCode::OK
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, FakeNode};
    use serde_json::json;
    use std::sync::Arc;

    const SENDER: &str = "nano_1ipx847tk8o46pwxt5qjdbncjqcbwcc1rrmqnkztrfjy5k7z4imsrata9est";
    const RECEIVER: &str = "nano_1qato4k7z3spc8gq1zyd8xeqfbzsoxwo36a45ozbrxcatut7up8ohyardu1z";
    const PREVIOUS: &str = "CE898C131AAEE25E05362F247760F8A3ACF34A9796A5AE0D9204E86B0637965E";

    #[tokio::test]
    async fn garbage_is_acknowledged() {
        let node = Arc::new(FakeNode::new());
        let state = test_state(node.clone(), Vec::new());
        let status = node_callback(State(state), Bytes::from_static(b"not json")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(node.calls().is_empty());
    }

    #[tokio::test]
    async fn send_callback_looks_up_previous_block() {
        let node = Arc::new(FakeNode::new().respond(
            "block_info",
            json!({"contents": {
                "type": "state",
                "account": SENDER,
                "previous": "0",
                "link": "0",
                "balance": "5000000000000000000000000000000",
            }}),
        ));
        let state = test_state(node.clone(), Vec::new());
        state.callbacks.tokens().add_or_update("t1", RECEIVER).await.unwrap();

        let body = json!({
            "account": SENDER,
            "hash": "E02A2D5FCD3EFD6A7E3DB63A9D7B4D5E20FD8C2BE15FD6CA5D4B7C3AF2C1F9A1",
            "block": json!({
                "type": "state",
                "previous": PREVIOUS,
                "balance": "1000000000000000000000000000000",
                "link_as_account": RECEIVER,
            })
            .to_string(),
            "amount": "4000000000000000000000000000000",
            "is_send": "true",
        });
        let status = node_callback(State(state), Bytes::from(body.to_string())).await;
        assert_eq!(status, StatusCode::OK);

        let lookups = node.calls_for("block_info");
        assert_eq!(lookups.len(), 1);
        assert_eq!(lookups[0]["hash"], PREVIOUS);
    }

    #[tokio::test]
    async fn node_failure_is_still_acknowledged() {
        let state = test_state(Arc::new(FakeNode::new()), Vec::new());
        let body = json!({
            "block": json!({"type": "state", "previous": PREVIOUS, "balance": "1", "link_as_account": RECEIVER}).to_string(),
        });
        let status = node_callback(State(state), Bytes::from(body.to_string())).await;
        assert_eq!(status, StatusCode::OK);
    }
}
