// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Push Notifications
//!
//! Push-token bookkeeping and the node callback that turns confirmed sends into
//! "funds received" notifications.
//!
//! Token persistence ([`TokenStore`]) and delivery ([`PushNotifier`]) are
//! external; in-memory and logging implementations are provided for single-node
//! deployments and tests.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::ledger::{format_raw, CurrencyMode, NodeError, NodeRpc};
use crate::models::{CallbackBlock, NodeCallback};

/// Sends at or below this many raw are not worth a notification.
pub const NOTIFICATION_THRESHOLD_RAW: u128 = 1_000_000_000_000_000_000_000_000;

#[derive(Debug, thiserror::Error)]
pub enum PushError {
    #[error("Token store error: {0}")]
    Store(String),

    #[error("Delivery failed: {0}")]
    Delivery(String),

    #[error("Invalid callback: {0}")]
    InvalidCallback(String),

    #[error(transparent)]
    Node(#[from] NodeError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushToken {
    pub token: String,
    pub account: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[async_trait]
pub trait TokenStore: Send + Sync {
    /// Register `token` for `account`, or refresh `updated_at` if present.
    async fn add_or_update(&self, token: &str, account: &str) -> Result<(), PushError>;

    /// Remove `token` for every account.
    async fn delete(&self, token: &str) -> Result<(), PushError>;

    async fn tokens_for_account(&self, account: &str) -> Result<Vec<PushToken>, PushError>;
}

#[derive(Default)]
pub struct InMemoryTokenStore {
    tokens: RwLock<Vec<PushToken>>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TokenStore for InMemoryTokenStore {
    async fn add_or_update(&self, token: &str, account: &str) -> Result<(), PushError> {
        let mut tokens = self.tokens.write().await;
        let now = Utc::now();
        match tokens
            .iter_mut()
            .find(|t| t.token == token && t.account == account)
        {
            Some(existing) => existing.updated_at = now,
            None => tokens.push(PushToken {
                token: token.to_string(),
                account: account.to_string(),
                created_at: now,
                updated_at: now,
            }),
        }
        Ok(())
    }

    async fn delete(&self, token: &str) -> Result<(), PushError> {
        self.tokens.write().await.retain(|t| t.token != token);
        Ok(())
    }

    async fn tokens_for_account(&self, account: &str) -> Result<Vec<PushToken>, PushError> {
        Ok(self
            .tokens
            .read()
            .await
            .iter()
            .filter(|t| t.account == account)
            .cloned()
            .collect())
    }
}

/// Apply a client's notification preference for `(token, account)`.
pub async fn apply_token_preference(
    store: &dyn TokenStore,
    token: Option<&str>,
    account: &str,
    enabled: bool,
) -> Result<(), PushError> {
    let Some(token) = token.filter(|t| !t.is_empty()) else {
        return Ok(());
    };
    if enabled {
        store.add_or_update(token, account).await
    } else {
        store.delete(token).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PushNotification {
    pub token: String,
    pub title: String,
    pub body: String,
    /// Receiving account; also used as the collapse tag.
    pub account: String,
}

#[async_trait]
pub trait PushNotifier: Send + Sync {
    async fn send(&self, notification: &PushNotification) -> Result<(), PushError>;
}

/// Notifier that only records deliveries in the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl PushNotifier for LogNotifier {
    async fn send(&self, notification: &PushNotification) -> Result<(), PushError> {
        info!(
            account = %notification.account,
            title = %notification.title,
            "Push notification"
        );
        Ok(())
    }
}

/// Title and body for a received amount.
pub fn notification_text(amount_raw: u128, mode: CurrencyMode) -> (String, String) {
    let amount = format_raw(amount_raw, mode);
    match mode {
        CurrencyMode::Nano => (
            format!("Received Ӿ{amount}"),
            "Open Natrium to receive this transaction.".to_string(),
        ),
        CurrencyMode::Banano => (
            format!("Received {amount} BANANO"),
            "Open Kalium to receive this transaction.".to_string(),
        ),
    }
}

/// Handles node HTTP callbacks.
#[derive(Clone)]
pub struct CallbackProcessor {
    node: Arc<dyn NodeRpc>,
    tokens: Arc<dyn TokenStore>,
    notifier: Arc<dyn PushNotifier>,
    mode: CurrencyMode,
}

impl CallbackProcessor {
    pub fn new(
        node: Arc<dyn NodeRpc>,
        tokens: Arc<dyn TokenStore>,
        notifier: Arc<dyn PushNotifier>,
        mode: CurrencyMode,
    ) -> Self {
        Self {
            node,
            tokens,
            notifier,
            mode,
        }
    }

    pub fn tokens(&self) -> &Arc<dyn TokenStore> {
        &self.tokens
    }

    /// Notify the receiving account's devices of a confirmed send. Returns the
    /// number of notifications delivered.
    pub async fn process(&self, callback: &NodeCallback) -> Result<usize, PushError> {
        let block: CallbackBlock = serde_json::from_str(&callback.block)
            .map_err(|e| PushError::InvalidCallback(e.to_string()))?;
        if block.link_as_account.is_empty() {
            return Ok(0);
        }

        let previous = self.node.block_info(&block.previous).await?;
        let current = parse_raw(&block.balance)?;
        let before = parse_raw(&previous.balance)?;
        let Some(sent) = before.checked_sub(current) else {
            return Ok(0);
        };
        if sent <= NOTIFICATION_THRESHOLD_RAW {
            return Ok(0);
        }

        let tokens = self.tokens.tokens_for_account(&block.link_as_account).await?;
        if tokens.is_empty() {
            return Ok(0);
        }

        let (title, body) = notification_text(sent, self.mode);
        let mut delivered = 0;
        for token in tokens {
            let notification = PushNotification {
                token: token.token,
                title: title.clone(),
                body: body.clone(),
                account: block.link_as_account.clone(),
            };
            match self.notifier.send(&notification).await {
                Ok(()) => delivered += 1,
                Err(e) => warn!(account = %notification.account, error = %e, "Push delivery failed"),
            }
        }
        debug!(hash = %callback.hash, delivered, "Callback processed");
        Ok(delivered)
    }
}

fn parse_raw(value: &str) -> Result<u128, PushError> {
    value
        .parse::<u128>()
        .map_err(|_| PushError::InvalidCallback(format!("invalid balance {value}")))
}
