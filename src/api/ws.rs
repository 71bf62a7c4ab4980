// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Wallet websocket sessions.
//!
//! Each socket gets a writer task draining its bounded hub queue plus a
//! keepalive ping, and a read loop feeding frames to the hub. Either side
//! ending cancels the session token, which stops the other.
//!
//! The read loop allows [`PONG_WAIT`] between inbound frames. Pongs to the
//! keepalive count, so a live client never hits it; a half-open socket does.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Bytes,
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
    Error,
};
use futures_util::{SinkExt, Stream, StreamExt};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{
    hub::{ConnectionHandle, SubscriptionHub},
    state::AppState,
};

/// Largest inbound message accepted from a wallet.
pub const MAX_FRAME_BYTES: usize = 4096;

pub const PING_INTERVAL: Duration = Duration::from_secs(54);

/// Longest silence tolerated from a wallet. Must exceed [`PING_INTERVAL`].
pub const PONG_WAIT: Duration = Duration::from_secs(60);

/// Why the read loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReadEnd {
    Cancelled,
    Closed,
    TimedOut,
    Failed,
    QueueFull,
}

pub async fn upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    ws.max_message_size(MAX_FRAME_BYTES)
        .max_frame_size(MAX_FRAME_BYTES)
        .on_upgrade(move |socket| serve_socket(socket, state.hub))
}

async fn serve_socket(socket: WebSocket, hub: Arc<SubscriptionHub>) {
    let (handle, mut outbound) = hub.connect();
    let id = handle.id();
    let closed = handle.closed();
    let (mut sink, mut stream) = socket.split();
    info!(connection = id, "Wallet connected");

    let writer = tokio::spawn({
        let closed = closed.clone();
        async move {
            let mut ping = tokio::time::interval_at(Instant::now() + PING_INTERVAL, PING_INTERVAL);
            loop {
                let message = tokio::select! {
                    _ = closed.cancelled() => break,
                    frame = outbound.recv() => match frame {
                        Some(text) => Message::Text(text.into()),
                        None => break,
                    },
                    _ = ping.tick() => Message::Ping(Bytes::new()),
                };
                if let Err(e) = sink.send(message).await {
                    debug!(connection = id, error = %e, "Socket write failed");
                    break;
                }
            }
            closed.cancel();
            let _ = sink.close().await;
        }
    });

    let end = read_frames(&mut stream, &hub, &handle, &closed, PONG_WAIT).await;

    hub.unsubscribe(id);
    closed.cancel();
    let _ = writer.await;
    info!(connection = id, reason = ?end, "Wallet disconnected");
}

async fn read_frames<S>(
    stream: &mut S,
    hub: &SubscriptionHub,
    handle: &ConnectionHandle,
    closed: &CancellationToken,
    pong_wait: Duration,
) -> ReadEnd
where
    S: Stream<Item = Result<Message, Error>> + Unpin,
{
    let id = handle.id();
    loop {
        let message = tokio::select! {
            _ = closed.cancelled() => return ReadEnd::Cancelled,
            message = tokio::time::timeout(pong_wait, stream.next()) => match message {
                Ok(message) => message,
                Err(_) => {
                    info!(connection = id, "No frame within pong wait, dropping socket");
                    return ReadEnd::TimedOut;
                }
            },
        };
        match message {
            Some(Ok(Message::Text(text))) => {
                if let Some(reply) = hub.handle_frame(handle, text.as_str()).await {
                    if !handle.try_send(reply.to_string()) {
                        warn!(connection = id, "Outbound queue full, closing socket");
                        return ReadEnd::QueueFull;
                    }
                }
            }
            Some(Ok(Message::Close(_))) | None => return ReadEnd::Closed,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(connection = id, error = %e, "Socket read failed");
                return ReadEnd::Failed;
            }
        }
    }
}
