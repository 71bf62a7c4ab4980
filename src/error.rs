// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

use crate::submission::SubmissionError;
use crate::work::WorkError;

/// Generic reply for anything that fails to decode or names no known action.
pub const INVALID_REQUEST_MESSAGE: &str = "The request was invalid and not recognized";

pub const UNSUPPORTED_ACTION_MESSAGE: &str = "The requested action is not supported in this API";

#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn invalid_request() -> Self {
        Self::bad_request(INVALID_REQUEST_MESSAGE)
    }

    /// Wallets treat this as a soft failure, so it is sent with 200.
    pub fn unsupported_action() -> Self {
        Self::new(StatusCode::OK, UNSUPPORTED_ACTION_MESSAGE)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.message,
        });
        (self.status, body).into_response()
    }
}

impl From<SubmissionError> for ApiError {
    fn from(err: SubmissionError) -> Self {
        match err {
            SubmissionError::UnsupportedBlockType
            | SubmissionError::InvalidSubtype(_)
            | SubmissionError::InvalidAccount(_)
            | SubmissionError::FrontierMismatch(_)
            | SubmissionError::MissingWork => Self::bad_request(err.to_string()),
            SubmissionError::Rejected(ref map) => Self::bad_request(
                map.get("error")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| err.to_string()),
            ),
            SubmissionError::Work(WorkError::NoProviders | WorkError::Timeout(_)) => {
                Self::service_unavailable(err.to_string())
            }
            SubmissionError::Work(_) | SubmissionError::Node { .. } => {
                Self::internal(err.to_string())
            }
        }
    }
}
