// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Upstream Relay
//!
//! Keeps one websocket open to the node, subscribed to the whole
//! `confirmation` topic, and forwards every decoded confirmation onto a
//! bounded channel consumed by the subscription hub.
//!
//! ## State machine
//!
//! ```text
//! Disconnected -> Connecting -> SubscribedPending -> Streaming
//!       ^                                                |
//!       +------------- read/write error or close --------+
//! ```
//!
//! `SubscribedPending` only covers the subscribe write. Once the frame is on
//! the wire the relay is `Streaming`, whether or not confirmations arrive.
//!
//! Reconnection uses a fixed backoff and never gives up. A frame that fails to
//! decode marks the stream as desynchronised: a fresh subscribe request goes
//! out before the next read, on the same socket.
//!
//! ## Shutdown
//!
//! Only the cancellation token stops the relay.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::ledger::ConfirmationEvent;

/// Node websocket topic carrying block confirmations.
pub const CONFIRMATION_TOPIC: &str = "confirmation";

/// Capacity of the relay -> hub channel.
pub const EVENT_CHANNEL_CAPACITY: usize = 100;

/// Delay before each reconnection attempt.
pub const RECONNECT_BACKOFF: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum RelayState {
    Disconnected,
    Connecting,
    SubscribedPending,
    Streaming,
}

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("Frame decode error: {0}")]
    Decode(String),

    #[error("Connection closed")]
    ConnectionClosed,
}

/// Envelope of every frame pushed by the node (`{topic, time, message}`).
#[derive(Debug, Deserialize)]
struct Envelope {
    topic: String,
    #[serde(default)]
    message: Value,
}

/// Create the bounded channel between relay and hub.
pub fn channel() -> (mpsc::Sender<ConfirmationEvent>, mpsc::Receiver<ConfirmationEvent>) {
    mpsc::channel(EVENT_CHANNEL_CAPACITY)
}

/// Subscribe control frame with a fresh correlation id. No per-account filter is
/// sent; the hub filters by account.
pub fn subscribe_frame() -> Value {
    json!({
        "action": "subscribe",
        "topic": CONFIRMATION_TOPIC,
        "ack": false,
        "id": Uuid::new_v4().to_string(),
    })
}

/// Decode one text frame. Frames on other topics yield `Ok(None)`.
pub fn decode_frame(text: &str) -> Result<Option<ConfirmationEvent>, RelayError> {
    let envelope: Envelope =
        serde_json::from_str(text).map_err(|e| RelayError::Decode(e.to_string()))?;
    if envelope.topic != CONFIRMATION_TOPIC {
        return Ok(None);
    }
    serde_json::from_value(envelope.message)
        .map(Some)
        .map_err(|e| RelayError::Decode(e.to_string()))
}

/// Why a single connection ended without error.
enum StreamEnd {
    Shutdown,
    ConsumerGone,
}

pub struct UpstreamRelay {
    url: String,
    backoff: Duration,
    state: watch::Sender<RelayState>,
}

impl UpstreamRelay {
    pub fn new(url: impl Into<String>) -> Self {
        let (state, _) = watch::channel(RelayState::Disconnected);
        Self {
            url: url.into(),
            backoff: RECONNECT_BACKOFF,
            state,
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    /// Observe state transitions (used by the health endpoint).
    pub fn state(&self) -> watch::Receiver<RelayState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: RelayState) {
        self.state.send_replace(state);
    }

    /// Run the reconnect loop until `shutdown` is cancelled.
    pub async fn run(self, events: mpsc::Sender<ConfirmationEvent>, shutdown: CancellationToken) {
        info!(url = %self.url, "Upstream relay starting");

        loop {
            match self.stream_once(&events, &shutdown).await {
                Ok(StreamEnd::Shutdown) => break,
                Ok(StreamEnd::ConsumerGone) => {
                    warn!("Confirmation consumer dropped, stopping relay");
                    break;
                }
                Err(e) => {
                    self.set_state(RelayState::Disconnected);
                    warn!(
                        error = %e,
                        backoff_ms = self.backoff.as_millis() as u64,
                        "Node websocket disconnected, reconnecting"
                    );
                }
            }

            tokio::select! {
                _ = tokio::time::sleep(self.backoff) => {}
                _ = shutdown.cancelled() => break,
            }
        }

        self.set_state(RelayState::Disconnected);
        info!("Upstream relay shutting down");
    }

    async fn stream_once(
        &self,
        events: &mpsc::Sender<ConfirmationEvent>,
        shutdown: &CancellationToken,
    ) -> Result<StreamEnd, RelayError> {
        self.set_state(RelayState::Connecting);
        let connected = tokio::select! {
            result = connect_async(self.url.as_str()) => result,
            _ = shutdown.cancelled() => return Ok(StreamEnd::Shutdown),
        };
        let (ws_stream, _) = connected.map_err(|e| RelayError::ConnectionFailed(e.to_string()))?;
        let (mut write, mut read) = ws_stream.split();
        info!(url = %self.url, "Connected to node websocket");

        let mut subscribed = false;
        loop {
            if !subscribed {
                self.set_state(RelayState::SubscribedPending);
                let frame = subscribe_frame();
                write
                    .send(Message::Text(frame.to_string().into()))
                    .await
                    .map_err(|e| RelayError::SubscriptionFailed(e.to_string()))?;
                debug!(id = %frame["id"], "Subscribed to confirmation topic");
                subscribed = true;
                self.set_state(RelayState::Streaming);
            }

            let msg = tokio::select! {
                msg = read.next() => msg,
                _ = shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(StreamEnd::Shutdown);
                }
            };

            match msg {
                Some(Ok(Message::Text(text))) => match decode_frame(text.as_str()) {
                    Ok(Some(event)) => {
                        debug!(hash = %event.hash, subtype = %event.subtype(), "Confirmation received");
                        tokio::select! {
                            sent = events.send(event) => {
                                if sent.is_err() {
                                    return Ok(StreamEnd::ConsumerGone);
                                }
                            }
                            _ = shutdown.cancelled() => return Ok(StreamEnd::Shutdown),
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(error = %e, "Undecodable node frame, resubscribing");
                        subscribed = false;
                    }
                },
                Some(Ok(Message::Ping(data))) => {
                    write
                        .send(Message::Pong(data))
                        .await
                        .map_err(|e| RelayError::ConnectionFailed(e.to_string()))?;
                }
                Some(Ok(Message::Close(_))) | None => return Err(RelayError::ConnectionClosed),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(RelayError::ConnectionFailed(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::Subtype;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    const SEND_FRAME: &str = r#"{
        "topic": "confirmation",
        "time": "1564935350664",
        "message": {
            "account": "nano_1tgkjkq9r96zd3pg8oyrxskadefaer3pmnnbbhfkr1yds1kntp3z8o7sxkik",
            "amount": "1000000000000000000000000",
            "hash": "E02A2D5FCD3EFD6A7E3DB63A9D7B4D5E20FD8C2BE15FD6CA5D4B7C3AF2C1F9A1",
            "confirmation_type": "active_quorum",
            "block": {
                "type": "state",
                "account": "nano_1tgkjkq9r96zd3pg8oyrxskadefaer3pmnnbbhfkr1yds1kntp3z8o7sxkik",
                "previous": "4E5004CA4F1C2A4A0A8D5B9C1A0D7A36C4C02E1A0F0F7E1A6E1B1E2C3D4E5F60",
                "representative": "nano_1stofnrxuz3cai7ze75o174bpm7scwj9jn3nxsn8ntzg784jf1gzn1jjdkou",
                "balance": "5606157000000000000000000000000000000",
                "link": "5D1AA8A45F8736519D707FCB375976A7F9AF795091021D7E9C7548D6F45DD8D5",
                "link_as_account": "nano_1qato4k7z3spc8gq1zyd8xeqfbzsoxwo36a45ozbrxcatut7up8ohyardu1z",
                "signature": "82D41BC16F313E4B2243D14DFFA2FB04679C540C2095FEE7EAE0F2F26880AD56DD48D87A7CC5DD760C5B2D76EE2C205506AA557BF00B60D8DEE312EC7343A501",
                "work": "8a142e07a10996d5",
                "subtype": "send"
            }
        }
    }"#;

    #[test]
    fn decodes_confirmation_frame() {
        let event = decode_frame(SEND_FRAME).unwrap().unwrap();
        assert_eq!(event.subtype(), Subtype::Send);
        assert_eq!(
            event.destination(),
            Some("nano_1qato4k7z3spc8gq1zyd8xeqfbzsoxwo36a45ozbrxcatut7up8ohyardu1z")
        );
        assert_eq!(event.amount, "1000000000000000000000000");
    }

    #[test]
    fn other_topics_are_dropped() {
        let frame = r#"{"topic":"vote","time":"1","message":{"account":"x"}}"#;
        assert!(decode_frame(frame).unwrap().is_none());
    }

    #[test]
    fn malformed_frames_are_decode_errors() {
        assert!(matches!(decode_frame("not json"), Err(RelayError::Decode(_))));
        let bad_message = r#"{"topic":"confirmation","time":"1","message":{"hash":7}}"#;
        assert!(matches!(decode_frame(bad_message), Err(RelayError::Decode(_))));
    }

    #[test]
    fn subscribe_frames_carry_fresh_ids() {
        let a = subscribe_frame();
        let b = subscribe_frame();
        assert_eq!(a["action"], "subscribe");
        assert_eq!(a["topic"], "confirmation");
        assert_eq!(a["ack"], false);
        assert!(a.get("options").is_none());
        assert_ne!(a["id"], b["id"]);
    }

    async fn expect_subscribe<S>(ws: &mut S) -> String
    where
        S: futures_util::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>>
            + Unpin,
    {
        let msg = ws.next().await.unwrap().unwrap();
        let value: Value = serde_json::from_str(msg.to_text().unwrap()).unwrap();
        assert_eq!(value["action"], "subscribe");
        value["id"].as_str().unwrap().to_string()
    }

    #[tokio::test]
    async fn relays_events_resubscribes_and_reconnects() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let relay = UpstreamRelay::new(url).with_backoff(Duration::from_millis(20));
        let mut state = relay.state();
        let (tx, mut rx) = channel();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(relay.run(tx, shutdown.clone()));

        // First connection: subscribe, garbage frame forces a resubscribe, then an event.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let first_id = expect_subscribe(&mut ws).await;
        ws.send(Message::Text("{garbage".into())).await.unwrap();
        let resubscribe_id = expect_subscribe(&mut ws).await;
        assert_ne!(first_id, resubscribe_id);
        ws.send(Message::Text(SEND_FRAME.into())).await.unwrap();

        let event = rx.recv().await.unwrap();
        assert_eq!(event.subtype(), Subtype::Send);
        state
            .wait_for(|s| *s == RelayState::Streaming)
            .await
            .unwrap();

        // Drop the connection; the relay must dial again and resubscribe.
        drop(ws);
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        let reconnect_id = expect_subscribe(&mut ws).await;
        assert_ne!(reconnect_id, resubscribe_id);

        shutdown.cancel();
        handle.await.unwrap();
        assert_eq!(*state.borrow(), RelayState::Disconnected);
    }

    #[tokio::test]
    async fn quiet_stream_reports_streaming_after_subscribe() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let url = format!("ws://{}", listener.local_addr().unwrap());

        let relay = UpstreamRelay::new(url).with_backoff(Duration::from_millis(20));
        let mut state = relay.state();
        let (tx, _rx) = channel();
        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(relay.run(tx, shutdown.clone()));

        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        expect_subscribe(&mut ws).await;

        // No confirmation is ever sent on this socket.
        tokio::time::timeout(
            Duration::from_secs(5),
            state.wait_for(|s| *s == RelayState::Streaming),
        )
        .await
        .expect("streaming without events")
        .unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*state.borrow(), RelayState::Streaming);

        shutdown.cancel();
        handle.await.unwrap();
    }
}
