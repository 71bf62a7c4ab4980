// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::HeaderName,
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use crate::{
    ledger::{ConfirmationBlock, StateBlock, Subtype},
    models::{
        AccountSubscribeRequest, ConfirmationPush, FcmUpdateRequest, NodeCallback, PriceMessage,
        RpcRequest,
    },
    relay::RelayState,
    state::AppState,
};

pub mod callback;
pub mod health;
pub mod rpc;
pub mod ws;

const REQUEST_ID_HEADER: &str = "x-request-id";

pub fn router(state: AppState) -> Router {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .route("/", get(ws::upgrade))
        .route("/api", post(rpc::handle_action))
        .route("/callback", post(callback::node_callback))
        .route("/health", get(health::health))
        .route("/health/live", get(health::liveness))
        .with_state(state)
        .merge(SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi()))
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::new(request_id, MakeRequestUuid))
        .layer(CorsLayer::permissive())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        rpc::handle_action,
        callback::node_callback,
        health::health,
        health::liveness
    ),
    components(
        schemas(
            AccountSubscribeRequest,
            FcmUpdateRequest,
            ConfirmationPush,
            ConfirmationBlock,
            PriceMessage,
            NodeCallback,
            RpcRequest,
            StateBlock,
            Subtype,
            RelayState,
            health::ReadyResponse,
            health::HealthChecks,
            health::HealthResponse
        )
    ),
    tags(
        (name = "RPC", description = "Node action passthrough and block submission"),
        (name = "Callback", description = "Node confirmation callback"),
        (name = "Health", description = "Service health probes")
    )
)]
struct ApiDoc;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, FakeNode};
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
    };
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    #[tokio::test]
    async fn router_serves_rpc_with_request_id() {
        let node = Arc::new(FakeNode::new().respond("block_count", json!({"count": "1000"})));
        let app = router(test_state(node, Vec::new()));

        let response = app
            .oneshot(
                Request::post("/api")
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"action":"block_count"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(REQUEST_ID_HEADER));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["count"], "1000");
    }

    #[tokio::test]
    async fn router_serves_health_and_docs() {
        let app = router(test_state(Arc::new(FakeNode::new()), Vec::new()));

        let response = app
            .clone()
            .oneshot(Request::get("/health/live").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(
                Request::get("/api-doc/openapi.json")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let doc: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(doc["paths"]["/api"]["post"]["requestBody"].is_object());
        assert!(doc["components"]["schemas"]["RpcRequest"].is_object());
    }

    #[tokio::test]
    async fn plain_get_on_root_is_not_an_upgrade() {
        let app = router(test_state(Arc::new(FakeNode::new()), Vec::new()));
        let response = app
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert!(response.status().is_client_error());
    }
}
