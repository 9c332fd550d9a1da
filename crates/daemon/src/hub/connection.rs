// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-connection reader/writer pair (`spec.md` §5: "the session hub owns
//! one reader task and one writer task per connection").
//!
//! The reader task decodes inbound frames and dispatches them; the writer
//! task is the sole owner of the WebSocket sink, draining an `mpsc` queue
//! fed by the reader (for RPC responses), subscription forwarders (for
//! pushes), and the terminal raw-output bridge (for binary frames). Nothing
//! but the writer task ever calls `.send()` on the socket, so interleaved
//! JSON and binary frames never race each other onto the wire.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use tokio::net::{TcpStream, UnixStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use paseo_core::CheckoutDiffMode;
use paseo_wire::{Inbound, InboundMessage, Push, ResponseEnvelope};

use super::{dispatch, multiplex, now_ms, HubCtx};

/// A connection's unique id, assigned by the hub on accept. Re-exported as
/// the type subscriptions are keyed by.
pub type ConnectionId = u64;

const OUTBOUND_CHANNEL_CAPACITY: usize = 512;

/// Either transport this hub accepts a WebSocket upgrade over.
pub enum Stream {
    Tcp(WebSocketStream<TcpStream>),
    Unix(WebSocketStream<UnixStream>),
}

impl From<WebSocketStream<TcpStream>> for Stream {
    fn from(s: WebSocketStream<TcpStream>) -> Self {
        Stream::Tcp(s)
    }
}

impl From<WebSocketStream<UnixStream>> for Stream {
    fn from(s: WebSocketStream<UnixStream>) -> Self {
        Stream::Unix(s)
    }
}

/// A frame queued for the writer task.
pub(crate) enum OutFrame {
    Json(String),
    Binary(Vec<u8>),
}

/// Per-connection bookkeeping the dispatch table needs: outbound queue
/// handle, and enough state to release resources on teardown that
/// [`crate::subscriptions::SubscriptionHub::remove_connection`] alone
/// doesn't know about (checkout watchers are refcounted separately; see
/// `spec.md` §4.6 / `crate::checkout`).
pub(crate) struct ConnectionState {
    pub id: ConnectionId,
    pub out_tx: mpsc::Sender<OutFrame>,
    /// subscription_id -> (cwd, mode), so unsubscribe/disconnect can release
    /// the matching checkout watcher refcount.
    pub checkout_subs: Mutex<HashMap<String, (String, CheckoutDiffMode)>>,
    /// subscription_id -> cancellation handle for a terminal subscription's
    /// state/raw-output forwarder tasks, so unsubscribe/disconnect actually
    /// stops delivery instead of only tearing down the (unused) binding in
    /// `SubscriptionHub` (terminal pushes bypass it entirely; see
    /// `hub::dispatch::subscribe_terminal`).
    pub terminal_subs: Mutex<HashMap<String, CancellationToken>>,
    next_stream_id: AtomicU32,
    last_heartbeat_ms: Mutex<Option<u64>>,
}

impl ConnectionState {
    pub fn send_json(&self, value: &impl serde::Serialize) {
        match serde_json::to_string(value) {
            Ok(text) => {
                let _ = self.out_tx.try_send(OutFrame::Json(text));
            }
            Err(e) => warn!(error = %e, "failed to serialize outbound frame"),
        }
    }

    pub fn send_push(&self, push: Push) {
        self.send_json(&push);
    }

    /// Allocates a fresh stream id for a new binary-multiplex stream this
    /// connection originates (one per terminal subscription).
    pub fn next_stream_id(&self) -> u32 {
        self.next_stream_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn record_heartbeat(&self, at_ms: u64) {
        *self.last_heartbeat_ms.lock() = Some(at_ms);
    }
}

/// Drives one accepted connection end to end: sends `welcome`, then races
/// the read loop against the shared shutdown signal, tearing down every
/// subscription this connection owns when either side closes.
pub(crate) async fn run(ctx: Arc<HubCtx>, stream: impl Into<Stream>, shutdown: CancellationToken) {
    let id = ctx.next_connection_id();
    let (out_tx, out_rx) = mpsc::channel(OUTBOUND_CHANNEL_CAPACITY);
    let state = Arc::new(ConnectionState {
        id,
        out_tx,
        checkout_subs: Mutex::new(HashMap::new()),
        terminal_subs: Mutex::new(HashMap::new()),
        next_stream_id: AtomicU32::new(1),
        last_heartbeat_ms: Mutex::new(None),
    });

    state.send_push(Push::Welcome {
        server_id: ctx.server_id.clone(),
        hostname: ctx.hostname.clone(),
        version: super::PROTOCOL_VERSION.to_string(),
        resumed: false,
    });

    match stream.into() {
        Stream::Tcp(ws) => drive(ctx.clone(), ws, state.clone(), out_rx, shutdown).await,
        Stream::Unix(ws) => drive(ctx.clone(), ws, state.clone(), out_rx, shutdown).await,
    }

    ctx.subscriptions.remove_connection(id);
    let checkout_subs = state.checkout_subs.lock().clone();
    for (_, (cwd, mode)) in checkout_subs {
        ctx.checkout.release(&cwd, mode);
    }
    for (_, token) in state.terminal_subs.lock().drain() {
        token.cancel();
    }
    debug!(connection_id = id, "connection closed, subscriptions released");
}

async fn drive<S>(
    ctx: Arc<HubCtx>,
    ws: WebSocketStream<S>,
    state: Arc<ConnectionState>,
    mut out_rx: mpsc::Receiver<OutFrame>,
    shutdown: CancellationToken,
) where
    S: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    let (mut sink, mut source) = ws.split();

    let writer = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let msg = match frame {
                OutFrame::Json(text) => Message::Text(text.into()),
                OutFrame::Binary(bytes) => Message::Binary(bytes.into()),
            };
            if sink.send(msg).await.is_err() {
                break;
            }
        }
        let _ = sink.close().await;
    });

    loop {
        tokio::select! {
            _ = shutdown.cancelled() => break,
            frame = source.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => handle_text(&ctx, &state, &text).await,
                    Some(Ok(Message::Binary(bytes))) => handle_binary(&ctx, &state, &bytes),
                    Some(Ok(Message::Ping(_) | Message::Pong(_))) => {}
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Frame(_))) => {}
                    Some(Err(e)) => {
                        debug!(connection_id = state.id, error = %e, "read error, closing");
                        break;
                    }
                }
            }
        }
    }

    drop(state.out_tx.clone());
    let _ = writer.await;
}

async fn handle_text(ctx: &Arc<HubCtx>, state: &Arc<ConnectionState>, text: &str) {
    let inbound: Inbound = match serde_json::from_str(text) {
        Ok(msg) => msg,
        Err(e) => {
            warn!(connection_id = state.id, error = %e, "malformed inbound message");
            return;
        }
    };

    if let InboundMessage::Heartbeat { .. } = &inbound.body {
        state.record_heartbeat(now_ms());
        state.send_push(Push::HeartbeatAck { server_time_ms: now_ms() });
        return;
    }

    let request_id = inbound.request_id.clone();
    let result = dispatch::handle(ctx, state, inbound.body).await;

    if let Some(request_id) = request_id {
        let envelope = match result {
            Ok(payload) => ResponseEnvelope::ok(request_id, payload),
            Err(err) => ResponseEnvelope::err(request_id, &err),
        };
        state.send_json(&envelope);
    } else if let Err(err) = result {
        warn!(connection_id = state.id, error = %err, "uncorrelated request failed");
    }
}

fn handle_binary(ctx: &Arc<HubCtx>, state: &Arc<ConnectionState>, bytes: &[u8]) {
    if !multiplex::looks_multiplexed(bytes) {
        warn!(connection_id = state.id, "binary frame missing multiplex magic, dropping");
        return;
    }
    match multiplex::decode(bytes) {
        // Clients only ever send Ack frames back on this transport
        // (`spec.md` §4.5); there's no flow-control gating in this host, so
        // acks are observed for diagnostics only.
        Ok((header, _payload)) => {
            debug!(
                connection_id = state.id,
                stream_id = header.stream_id,
                offset = header.offset,
                "received client ack frame"
            );
        }
        Err(e) => warn!(connection_id = state.id, error = %e, "failed to decode multiplex frame"),
    }
    let _ = ctx;
}
