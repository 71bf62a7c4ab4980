// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Wire Models
//!
//! Messages exchanged with wallet clients and the node callback. Inbound socket
//! messages decode once into [`ClientAction`]; unknown actions become
//! [`ClientAction::Unknown`] instead of a lookup miss.
//!
//! ## Model Categories
//!
//! - **Socket actions**: `account_subscribe`, `fcm_update`
//! - **Outbound pushes**: confirmation pushes and price updates
//! - **Node callback**: HTTP callback body posted by the node

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::ledger::{ConfirmationBlock, ConfirmationEvent, Subtype};

// =============================================================================
// Socket Actions
// =============================================================================

/// `account_subscribe` request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct AccountSubscribeRequest {
    pub account: String,
    /// Resume an earlier session. Kept as text; see [`Self::session_id`].
    #[serde(default)]
    pub uuid: Option<String>,
    /// Display currency code; unknown values fall back to USD.
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default, rename = "fcm_token_v2")]
    pub fcm_token: Option<String>,
    #[serde(default)]
    pub notification_enabled: bool,
}

impl AccountSubscribeRequest {
    /// The session id to resume, if the client sent a well-formed one.
    pub fn session_id(&self) -> Option<Uuid> {
        self.uuid.as_deref().and_then(|raw| Uuid::parse_str(raw.trim()).ok())
    }
}

/// `fcm_update` request.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct FcmUpdateRequest {
    pub account: String,
    #[serde(default, rename = "fcm_token_v2")]
    pub fcm_token: Option<String>,
    #[serde(default)]
    pub enabled: bool,
}

/// Every message a wallet may send over the socket.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ClientAction {
    AccountSubscribe(AccountSubscribeRequest),
    FcmUpdate(FcmUpdateRequest),
    #[serde(other)]
    Unknown,
}

// =============================================================================
// Outbound Pushes
// =============================================================================

/// Pushed to subscribers of the destination account of a confirmed send.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct ConfirmationPush {
    pub account: String,
    pub block: ConfirmationBlock,
    pub hash: String,
    /// Always `"true"`; wallets compare the string form.
    pub is_send: String,
    pub amount: String,
}

impl From<&ConfirmationEvent> for ConfirmationPush {
    fn from(event: &ConfirmationEvent) -> Self {
        Self {
            account: event.account.clone(),
            block: event.block.clone(),
            hash: event.hash.clone(),
            is_send: "true".to_string(),
            amount: event.amount.clone(),
        }
    }
}

/// Periodic price update.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct PriceMessage {
    pub currency: String,
    pub price: f64,
    pub btc: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nano: Option<f64>,
}

// =============================================================================
// RPC Passthrough
// =============================================================================

/// Documented shape of `POST /api`. The handler reads the raw object so every
/// other field reaches the node untouched.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct RpcRequest {
    /// One of the supported node actions, case-insensitive.
    pub action: String,
    /// Clamped to the configured maximum.
    #[serde(default)]
    pub count: Option<i64>,
    #[serde(default)]
    pub account: Option<String>,
    /// `process` only: the block as an object or a JSON-encoded string.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub block: Option<serde_json::Value>,
    #[serde(default)]
    pub subtype: Option<Subtype>,
    /// `process` only: ask the gateway to attach proof of work.
    #[serde(default)]
    pub do_work: Option<bool>,
}

// =============================================================================
// Node Callback
// =============================================================================

/// Body the node POSTs to `/callback` for every confirmed block.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct NodeCallback {
    #[serde(default)]
    pub account: String,
    #[serde(default)]
    pub hash: String,
    /// The block, JSON-encoded as a string.
    pub block: String,
    #[serde(default)]
    pub amount: String,
    #[serde(default)]
    pub is_send: Option<String>,
    #[serde(default)]
    pub subtype: Option<String>,
}

/// Fields of the callback block used for notifications.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, PartialEq)]
pub struct CallbackBlock {
    #[serde(default)]
    pub link_as_account: String,
    pub balance: String,
    pub previous: String,
    #[serde(default)]
    pub subtype: Option<String>,
}
