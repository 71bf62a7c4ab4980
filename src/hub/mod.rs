// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Subscription Hub
//!
//! Owns every live wallet socket, each tagged with the accounts it watches and
//! a display currency.
//!
//! ## Flow
//!
//! - `account_subscribe` validates the address, registers the connection and
//!   answers once with account info, prices and the receivable count.
//! - Confirmed sends from the relay are pushed to every connection watching
//!   the destination account. Other subtypes are not pushed.
//! - A periodic tick pushes the current price for each connection's currency.
//!
//! Outbound queues are bounded. A full or closed queue unregisters the
//! connection; the dispatcher never waits on a slow socket.

pub mod registry;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::INVALID_REQUEST_MESSAGE;
use crate::ledger::{address, ConfirmationEvent, CurrencyMode, NodeError, NodeRpc, Subtype};
use crate::models::{
    AccountSubscribeRequest, ClientAction, ConfirmationPush, FcmUpdateRequest, PriceMessage,
};
use crate::prices::{price_key, resolve_currency, PriceCache, PriceSnapshot};
use crate::push::{apply_token_preference, TokenStore};

pub use registry::{ConnectionId, Registry, Subscriber};

/// Per-connection outbound queue bound.
pub const OUTBOUND_QUEUE_CAPACITY: usize = 256;

/// Default interval between price pushes.
pub const DEFAULT_PRICE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, thiserror::Error)]
pub enum HubError {
    #[error("Invalid account")]
    InvalidAccount,

    #[error("subscribe error")]
    Subscribe(#[source] NodeError),

    #[error("{}", INVALID_REQUEST_MESSAGE)]
    InvalidRequest,
}

impl HubError {
    /// Inline error frame sent back on the same socket.
    pub fn to_frame(&self) -> Value {
        json!({ "error": self.to_string() })
    }
}

/// A socket's link to the hub. Dropping it does not unregister; call
/// [`SubscriptionHub::unsubscribe`].
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbound: mpsc::Sender<String>,
    closed: CancellationToken,
}

impl ConnectionHandle {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Cancelled when the hub drops this connection.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    /// Queue a frame without waiting. False when the queue is full or closed.
    pub fn try_send(&self, frame: String) -> bool {
        self.outbound.try_send(frame).is_ok()
    }
}

pub struct SubscriptionHub {
    registry: Registry,
    node: Arc<dyn NodeRpc>,
    prices: Arc<dyn PriceCache>,
    tokens: Arc<dyn TokenStore>,
    mode: CurrencyMode,
    next_id: AtomicU64,
}

impl SubscriptionHub {
    pub fn new(
        node: Arc<dyn NodeRpc>,
        prices: Arc<dyn PriceCache>,
        tokens: Arc<dyn TokenStore>,
        mode: CurrencyMode,
    ) -> Self {
        Self {
            registry: Registry::new(),
            node,
            prices,
            tokens,
            mode,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.registry.len()
    }

    pub fn subscriber(&self, id: ConnectionId) -> Option<Subscriber> {
        self.registry.get(id)
    }

    /// Open a connection slot. Nothing is registered until a subscribe succeeds.
    pub fn connect(&self) -> (ConnectionHandle, mpsc::Receiver<String>) {
        self.connect_with_capacity(OUTBOUND_QUEUE_CAPACITY)
    }

    pub fn connect_with_capacity(
        &self,
        capacity: usize,
    ) -> (ConnectionHandle, mpsc::Receiver<String>) {
        let (outbound, rx) = mpsc::channel(capacity.max(1));
        let handle = ConnectionHandle {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            outbound,
            closed: CancellationToken::new(),
        };
        (handle, rx)
    }

    /// Handle one text frame from a socket. Returns the reply to send, if any.
    pub async fn handle_frame(&self, handle: &ConnectionHandle, text: &str) -> Option<Value> {
        let action = match serde_json::from_str::<ClientAction>(text) {
            Ok(action) => action,
            Err(e) => {
                debug!(connection = handle.id, error = %e, "Undecodable socket frame");
                return Some(HubError::InvalidRequest.to_frame());
            }
        };

        match action {
            ClientAction::AccountSubscribe(request) => {
                Some(match self.subscribe(handle, request).await {
                    Ok(response) => response,
                    Err(e) => e.to_frame(),
                })
            }
            ClientAction::FcmUpdate(request) => {
                self.fcm_update(request).await.err().map(|e| e.to_frame())
            }
            ClientAction::Unknown => {
                debug!(connection = handle.id, "Unknown socket action");
                Some(HubError::InvalidRequest.to_frame())
            }
        }
    }

    /// Register the connection for `request.account` and build the merged
    /// subscribe response.
    pub async fn subscribe(
        &self,
        handle: &ConnectionHandle,
        request: AccountSubscribeRequest,
    ) -> Result<Value, HubError> {
        if !address::validate(&request.account, self.mode) {
            return Err(HubError::InvalidAccount);
        }
        let account = address::normalize(&request.account, self.mode);

        if request.uuid.is_some() && request.session_id().is_none() {
            debug!(connection = handle.id, "Malformed session id, issuing a new one");
        }
        let session_id = request.session_id().unwrap_or_else(Uuid::new_v4);
        let currency = resolve_currency(request.currency.as_deref());

        self.registry.upsert(
            handle.id,
            session_id,
            currency.clone(),
            handle.outbound.clone(),
            handle.closed.clone(),
        );
        self.registry.add_account(handle.id, &account);
        info!(connection = handle.id, account = %account, currency = %currency, "Account subscribed");

        let info = self.node.account_info(&account).await.map_err(|e| {
            warn!(account = %account, error = %e, "account_info failed during subscribe");
            HubError::Subscribe(e)
        })?;
        let mut response = info.into_map();

        let snapshot = PriceSnapshot::lookup(self.prices.as_ref(), self.mode, &currency);
        response.insert("uuid".into(), json!(session_id));
        response.insert("currency".into(), json!(snapshot.currency));
        response.insert("price".into(), json!(snapshot.price));
        response.insert("btc".into(), json!(snapshot.btc));
        if self.mode.is_banano() {
            response.insert("nano".into(), json!(snapshot.nano));
        }

        let pending_count = match self.node.receivable_count(&account, self.mode).await {
            Ok(count) => count,
            Err(e) => {
                warn!(account = %account, error = %e, "Receivable count failed");
                0
            }
        };
        response.insert("pending_count".into(), json!(pending_count));

        if let Err(e) = apply_token_preference(
            self.tokens.as_ref(),
            request.fcm_token.as_deref(),
            &account,
            request.notification_enabled,
        )
        .await
        {
            warn!(account = %account, error = %e, "Push token update failed");
        }

        Ok(Value::Object(response))
    }

    pub async fn fcm_update(&self, request: FcmUpdateRequest) -> Result<(), HubError> {
        if !address::validate(&request.account, self.mode) {
            return Err(HubError::InvalidAccount);
        }
        let account = address::normalize(&request.account, self.mode);
        if let Err(e) = apply_token_preference(
            self.tokens.as_ref(),
            request.fcm_token.as_deref(),
            &account,
            request.enabled,
        )
        .await
        {
            warn!(account = %account, error = %e, "Push token update failed");
        }
        Ok(())
    }

    /// Drop a connection and close its outbound queue.
    pub fn unsubscribe(&self, id: ConnectionId) {
        if let Some(subscriber) = self.registry.remove(id) {
            subscriber.closed.cancel();
            debug!(connection = id, "Connection unregistered");
        }
    }

    /// Push a confirmation to every watcher of its destination. Returns the
    /// number of connections the push was queued for.
    pub fn dispatch(&self, event: &ConfirmationEvent) -> usize {
        if event.subtype() != Subtype::Send {
            return 0;
        }
        let Some(destination) = event.destination() else {
            return 0;
        };
        let targets = self.registry.targets_for(destination);
        if targets.is_empty() {
            return 0;
        }

        let frame = match serde_json::to_string(&ConfirmationPush::from(event)) {
            Ok(frame) => frame,
            Err(e) => {
                warn!(hash = %event.hash, error = %e, "Failed to encode confirmation push");
                return 0;
            }
        };

        let mut delivered = 0;
        for target in targets {
            if target.outbound.try_send(frame.clone()).is_ok() {
                delivered += 1;
            } else {
                warn!(connection = target.id, "Subscriber queue full or closed, dropping connection");
                self.unsubscribe(target.id);
            }
        }
        debug!(hash = %event.hash, destination = %destination, delivered, "Confirmation dispatched");
        delivered
    }

    /// Push current prices to every connection. Returns the number of
    /// connections updated.
    pub fn price_tick(&self) -> usize {
        let Some(btc) = self.prices.get(&price_key(self.mode, "btc")) else {
            warn!("BTC price unavailable, skipping price push");
            return 0;
        };
        let nano = if self.mode.is_banano() {
            match self.prices.get(&price_key(self.mode, "nano")) {
                Some(price) => Some(price),
                None => {
                    warn!("NANO cross price unavailable, skipping price push");
                    return 0;
                }
            }
        } else {
            None
        };

        let mut updated = 0;
        for target in self.registry.all_targets() {
            let Some(price) = self.prices.get(&price_key(self.mode, &target.currency)) else {
                debug!(connection = target.id, currency = %target.currency, "No price for currency");
                continue;
            };
            let message = PriceMessage {
                currency: target.currency.clone(),
                price,
                btc,
                nano,
            };
            let Ok(frame) = serde_json::to_string(&message) else {
                continue;
            };
            if target.outbound.try_send(frame).is_ok() {
                updated += 1;
            } else {
                warn!(connection = target.id, "Subscriber queue full or closed, dropping connection");
                self.unsubscribe(target.id);
            }
        }
        updated
    }

    /// Consume relay events and run the price timer until `shutdown`.
    pub async fn run(
        self: Arc<Self>,
        mut events: mpsc::Receiver<ConfirmationEvent>,
        price_interval: Duration,
        shutdown: CancellationToken,
    ) {
        info!(
            interval_secs = price_interval.as_secs(),
            "Subscription hub starting"
        );
        let mut ticker = tokio::time::interval_at(Instant::now() + price_interval, price_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut events_open = true;

        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        self.dispatch(&event);
                    }
                    None => {
                        warn!("Relay channel closed, confirmations will no longer be pushed");
                        events_open = false;
                    }
                },
                _ = ticker.tick() => {
                    let updated = self.price_tick();
                    debug!(updated, "Price tick");
                }
            }
        }

        for subscriber in self.registry.drain() {
            subscriber.closed.cancel();
        }
        info!("Subscription hub shutting down");
    }
}
