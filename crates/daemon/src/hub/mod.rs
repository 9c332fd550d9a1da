// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session hub: the single `/ws` entry point clients use to drive every
//! other subsystem (`spec.md` §4.4, §6.1).
//!
//! One reader task and one writer task are spawned per accepted connection
//! (`spec.md` §5), mirroring the teacher's `listener::run` accept loop
//! (`examples/alfredjeanlab-oddjobs/crates/daemon/src/listener/mod.rs`)
//! generalized from a length-prefixed unix-socket RPC frame to a WebSocket
//! endpoint carrying both JSON text frames and the binary multiplex.

mod connection;
mod dispatch;
mod multiplex;

use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::net::{TcpListener, UnixListener};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use paseo_core::{Clock, SystemClock};

use crate::agent_manager::AgentManager;
use crate::checkout::CheckoutEngine;
use crate::config::{Config, ListenAddress};
use crate::error::DaemonError;
use crate::files::DownloadTokenStore;
use crate::subscriptions::SubscriptionHub;
use paseo_term::TerminalService;

pub use connection::ConnectionId;

/// Version string embedded in the `welcome` frame. Independent of the crate
/// version on purpose: this is the wire protocol surface, not the binary.
pub const PROTOCOL_VERSION: &str = "1";

/// Shared daemon state every connection's dispatch table reads from. Mirrors
/// the teacher's `ListenCtx` (`examples/alfredjeanlab-oddjobs/crates/daemon/
/// src/listener/mod.rs`): one struct threaded by `Arc` into every handler
/// instead of global statics.
pub struct HubCtx {
    pub server_id: String,
    pub hostname: String,
    pub paseo_home: PathBuf,
    pub config: Config,
    pub agents: Arc<AgentManager>,
    pub terminals: Arc<TerminalService>,
    pub checkout: Arc<CheckoutEngine>,
    pub downloads: Arc<DownloadTokenStore>,
    pub subscriptions: Arc<SubscriptionHub>,
    next_connection_id: AtomicU64,
}

impl HubCtx {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        server_id: String,
        paseo_home: PathBuf,
        config: Config,
        agents: Arc<AgentManager>,
        terminals: Arc<TerminalService>,
        checkout: Arc<CheckoutEngine>,
        downloads: Arc<DownloadTokenStore>,
        subscriptions: Arc<SubscriptionHub>,
    ) -> Self {
        let hostname = std::env::var("HOSTNAME")
            .or_else(|_| std::env::var("HOST"))
            .unwrap_or_else(|_| "localhost".to_string());
        Self {
            server_id,
            hostname,
            paseo_home,
            config,
            agents,
            terminals,
            checkout,
            downloads,
            subscriptions,
            next_connection_id: AtomicU64::new(1),
        }
    }

    fn next_connection_id(&self) -> ConnectionId {
        self.next_connection_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Runs the `/ws` accept loop until `shutdown` fires. Binds TCP or a UNIX
/// socket depending on [`ListenAddress`] (`spec.md` §6.1).
pub async fn serve(ctx: Arc<HubCtx>, shutdown: CancellationToken) -> Result<(), DaemonError> {
    match ctx.config.listen.clone() {
        ListenAddress::Tcp { host, port } => {
            let addr = format!("{host}:{port}");
            let listener = TcpListener::bind(&addr)
                .await
                .map_err(|e| DaemonError::BindFailed(addr.clone(), e))?;
            info!(%addr, "listening on /ws");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, peer)) => spawn_tcp_connection(ctx.clone(), stream, peer, shutdown.clone()),
                            Err(e) => error!(error = %e, "accept failed"),
                        }
                    }
                }
            }
        }
        ListenAddress::Unix { path } => {
            let _ = std::fs::remove_file(&path);
            let listener = UnixListener::bind(&path)
                .map_err(|e| DaemonError::BindFailed(path.display().to_string(), e))?;
            info!(path = %path.display(), "listening on /ws (unix)");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    accepted = listener.accept() => {
                        match accepted {
                            Ok((stream, _)) => spawn_unix_connection(ctx.clone(), stream, shutdown.clone()),
                            Err(e) => error!(error = %e, "accept failed"),
                        }
                    }
                }
            }
        }
    }
    info!("hub listener stopped");
    Ok(())
}

fn spawn_tcp_connection(
    ctx: Arc<HubCtx>,
    stream: tokio::net::TcpStream,
    peer: std::net::SocketAddr,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(%peer, error = %e, "websocket upgrade failed");
                return;
            }
        };
        connection::run(ctx, ws, shutdown).await;
    });
}

fn spawn_unix_connection(
    ctx: Arc<HubCtx>,
    stream: tokio::net::UnixStream,
    shutdown: CancellationToken,
) {
    tokio::spawn(async move {
        let ws = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!(error = %e, "websocket upgrade failed");
                return;
            }
        };
        connection::run(ctx, ws, shutdown).await;
    });
}

/// Drains every subscription the hub owns and sends abort to every agent
/// (`spec.md` §5 host shutdown); called by `main` before the process exits.
pub async fn shutdown_agents(ctx: &HubCtx) {
    for agent in ctx.agents.fetch_agents() {
        if matches!(
            agent.status,
            paseo_core::AgentStatus::Running | paseo_core::AgentStatus::AwaitingPermission
        ) {
            let _ = ctx.agents.cancel_turn(&agent.id).await;
        }
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemClock.epoch_ms()
}
