// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use utoipa::ToSchema;

use crate::ledger::CurrencyMode;
use crate::relay::RelayState;
use crate::state::AppState;

/// Health check response with individual component status.
#[derive(Debug, Serialize, ToSchema)]
pub struct ReadyResponse {
    /// Overall health status ("ok" or "degraded").
    pub status: String,
    pub checks: HealthChecks,
}

/// Individual health check results.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthChecks {
    pub service: String,
    /// Upstream confirmation stream. Absent when no node websocket is configured.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relay: Option<RelayState>,
    pub subscribers: usize,
    pub work_providers: usize,
    #[schema(value_type = String)]
    pub mode: CurrencyMode,
}

/// Simple health check response for liveness probes.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}

/// Health check endpoint handler.
///
/// Returns 503 while the relay is configured but not streaming.
#[utoipa::path(
    get,
    path = "/health",
    tag = "Health",
    responses(
        (status = 200, description = "Service is healthy", body = ReadyResponse),
        (status = 503, description = "Confirmation stream is down", body = ReadyResponse)
    )
)]
pub async fn health(State(state): State<AppState>) -> (StatusCode, Json<ReadyResponse>) {
    let relay = state.relay_state();
    let relay_ok = relay.is_none_or(|s| s == RelayState::Streaming);

    let response = ReadyResponse {
        status: if relay_ok { "ok" } else { "degraded" }.to_string(),
        checks: HealthChecks {
            service: "ok".to_string(),
            relay,
            subscribers: state.hub.subscriber_count(),
            work_providers: state.submissions.arbiter().provider_count(),
            mode: state.mode,
        },
    };

    let status = if relay_ok {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(response))
}

/// Liveness probe handler.
///
/// Always returns 200 if the process is running.
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "Health",
    responses(
        (status = 200, description = "Service is alive", body = HealthResponse)
    )
)]
pub async fn liveness() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{test_state, FakeNode};
    use std::sync::Arc;
    use tokio::sync::watch;

    #[tokio::test]
    async fn healthy_without_relay() {
        let state = test_state(Arc::new(FakeNode::new()), Vec::new());
        let (status, Json(body)) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.status, "ok");
        assert!(body.checks.relay.is_none());
        assert_eq!(body.checks.subscribers, 0);
    }

    #[tokio::test]
    async fn degraded_while_relay_reconnects() {
        let mut state = test_state(Arc::new(FakeNode::new()), Vec::new());
        let (tx, rx) = watch::channel(RelayState::Connecting);
        state.relay_state = Some(rx);

        let (status, Json(body)) = health(State(state.clone())).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body.status, "degraded");

        tx.send(RelayState::Streaming).unwrap();
        let (status, _) = health(State(state)).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn liveness_is_always_ok() {
        let Json(body) = liveness().await;
        assert_eq!(body.status, "ok");
    }
}
