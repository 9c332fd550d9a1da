// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end checks against the `/ws` protocol surface (`spec.md` §8
//! "Concrete scenarios"), driving a real in-process host over a real
//! WebSocket client the way `tests/specs.rs` exercises the teacher's own
//! listener in its integration suite.
//!
//! Scenarios 1-3 (agent lifecycle/permission/cancel) need a real provider
//! CLI on `$PATH` and are exercised by `paseo-daemon`'s own unit/agent
//! manager tests against a fake `ProviderAdapter` instead; this file covers
//! the scenarios whose dependencies (a shell, `git`) are always present:
//! terminal auto-create + input echo (scenario 4), checkout-diff
//! deterministic ordering (scenario 5), plus the bootstrap/subscription
//! invariants from §6.1 and §8 that don't require a provider at all.

use std::path::Path;
use std::sync::atomic::{AtomicU16, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serial_test::serial;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

use paseo_daemon::agent_manager::AgentManager;
use paseo_daemon::checkout::CheckoutEngine;
use paseo_daemon::config::{Config, ListenAddress};
use paseo_daemon::files::DownloadTokenStore;
use paseo_daemon::hub::{self, HubCtx};
use paseo_daemon::subscriptions::SubscriptionHub;
use paseo_daemon::timeline_store::TimelineStore;
use paseo_term::TerminalService;
use paseo_wire::{Inbound, InboundMessage, Push, ResponseEnvelope};

/// Picks a free localhost TCP port by binding then immediately releasing it.
/// Good enough for serial integration tests; a real collision would show up
/// as a bind failure in `start_host` and fail the test loudly rather than
/// silently passing.
async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind ephemeral port");
    listener.local_addr().expect("local_addr").port()
}

struct TestHost {
    port: u16,
    shutdown: CancellationToken,
}

impl Drop for TestHost {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn start_host() -> TestHost {
    let port = free_port().await;
    let mut config = Config::default();
    config.listen = ListenAddress::Tcp { host: "127.0.0.1".to_string(), port };

    let subscriptions = Arc::new(SubscriptionHub::new());
    let timeline = Arc::new(TimelineStore::new());
    let paseo_home = std::env::temp_dir().join(format!("paseo-spec-test-{}", unique_suffix()));
    let agents = Arc::new(AgentManager::new(paseo_home.clone(), timeline, subscriptions.clone()));
    let terminals = Arc::new(TerminalService::new());
    let checkout = Arc::new(CheckoutEngine::new(subscriptions.clone()));
    let downloads = Arc::new(DownloadTokenStore::new());

    let ctx = Arc::new(HubCtx::new(
        "test-server".to_string(),
        paseo_home,
        config,
        agents,
        terminals.clone(),
        checkout,
        downloads,
        subscriptions,
    ));

    let shutdown = CancellationToken::new();
    let serve_shutdown = shutdown.clone();
    tokio::spawn(async move {
        let _ = hub::serve(ctx, serve_shutdown).await;
    });

    // Give the accept loop a moment to bind before the first connect.
    tokio::time::sleep(Duration::from_millis(50)).await;

    TestHost { port, shutdown }
}

fn unique_suffix() -> u64 {
    static COUNTER: AtomicU16 = AtomicU16::new(0);
    let n = COUNTER.fetch_add(1, Ordering::Relaxed);
    std::process::id() as u64 * 100_000 + n as u64
}

type WsStream = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

async fn connect(host: &TestHost) -> WsStream {
    let url = format!("ws://127.0.0.1:{}/ws", host.port);
    let (ws, _resp) = tokio_tungstenite::connect_async(&url).await.expect("connect");
    ws
}

async fn send(ws: &mut WsStream, msg: &Inbound) {
    let text = serde_json::to_string(msg).expect("serialize inbound");
    ws.send(Message::Text(text.into())).await.expect("send");
}

/// Reads JSON text frames until one parses as a [`Push`] matching `pred`,
/// ignoring RPC response envelopes and binary frames along the way. Panics
/// if the connection closes or no match arrives within `timeout`.
async fn next_push(ws: &mut WsStream, timeout: Duration, pred: impl Fn(&Push) -> bool) -> Push {
    tokio::time::timeout(timeout, async {
        loop {
            match ws.next().await.expect("stream ended").expect("ws error") {
                Message::Text(text) => {
                    if let Ok(push) = serde_json::from_str::<Push>(&text) {
                        if pred(&push) {
                            return push;
                        }
                    }
                }
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                Message::Close(_) => panic!("connection closed while waiting for push"),
            }
        }
    })
    .await
    .expect("timed out waiting for push")
}

async fn recv_response(ws: &mut WsStream, request_id: &str, timeout: Duration) -> ResponseEnvelope {
    tokio::time::timeout(timeout, async {
        loop {
            match ws.next().await.expect("stream ended").expect("ws error") {
                Message::Text(text) => {
                    if let Ok(envelope) = serde_json::from_str::<ResponseEnvelope>(&text) {
                        if envelope.request_id == request_id {
                            return envelope;
                        }
                    }
                }
                Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                Message::Close(_) => panic!("connection closed while waiting for response"),
            }
        }
    })
    .await
    .expect("timed out waiting for response")
}

/// Collects concatenated binary-multiplex payload bytes until `pred` matches
/// the accumulated text, or `timeout` elapses.
async fn collect_binary_until(ws: &mut WsStream, timeout: Duration, pred: impl Fn(&[u8]) -> bool) -> Vec<u8> {
    let mut acc = Vec::new();
    tokio::time::timeout(timeout, async {
        loop {
            match ws.next().await.expect("stream ended").expect("ws error") {
                Message::Binary(bytes) => {
                    // Multiplex header is 24 bytes (`spec.md` §4.4, §6.1
                    // scenario 6); the payload follows immediately.
                    if bytes.len() >= paseo_wire::HEADER_LEN {
                        acc.extend_from_slice(&bytes[paseo_wire::HEADER_LEN..]);
                    }
                    if pred(&acc) {
                        return acc.clone();
                    }
                }
                Message::Text(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                Message::Close(_) => panic!("connection closed while collecting binary output"),
            }
        }
    })
    .await
    .expect("timed out collecting binary output")
}

/// §6.1: "Initial server->client frame is a `welcome`".
#[tokio::test]
#[serial]
async fn welcome_is_the_first_frame() {
    let host = start_host().await;
    let mut ws = connect(&host).await;
    let push = next_push(&mut ws, Duration::from_secs(2), |p| matches!(p, Push::Welcome { .. })).await;
    match push {
        Push::Welcome { server_id, resumed, .. } => {
            assert_eq!(server_id, "test-server");
            assert!(!resumed);
        }
        other => panic!("expected welcome, got {other:?}"),
    }
}

/// §4.4 heartbeats: "the hub updates directory presence" and replies with a
/// `heartbeat_ack`.
#[tokio::test]
#[serial]
async fn heartbeat_is_acknowledged() {
    let host = start_host().await;
    let mut ws = connect(&host).await;
    let _welcome = next_push(&mut ws, Duration::from_secs(2), |p| matches!(p, Push::Welcome { .. })).await;

    send(
        &mut ws,
        &Inbound {
            request_id: None,
            body: InboundMessage::Heartbeat {
                device_type: "cli".to_string(),
                focused_agent_id: None,
                app_visible: true,
                last_activity_at_ms: 0,
            },
        },
    )
    .await;

    let push = next_push(&mut ws, Duration::from_secs(2), |p| matches!(p, Push::HeartbeatAck { .. })).await;
    assert!(matches!(push, Push::HeartbeatAck { .. }));
}

/// §8 scenario 4: first `list_terminals` for a fresh `cwd` auto-creates
/// "Terminal 1"; input written to it is echoed back in the grid/output.
#[tokio::test]
#[serial]
async fn terminal_auto_create_and_input_echo() {
    let host = start_host().await;
    let mut ws = connect(&host).await;
    let _welcome = next_push(&mut ws, Duration::from_secs(2), |p| matches!(p, Push::Welcome { .. })).await;

    let cwd = std::env::temp_dir()
        .join(format!("paseo-spec-term-{}", unique_suffix()))
        .to_string_lossy()
        .to_string();
    std::fs::create_dir_all(&cwd).expect("create cwd");

    send(
        &mut ws,
        &Inbound {
            request_id: Some("r1".to_string()),
            body: InboundMessage::ListTerminals { cwd: cwd.clone() },
        },
    )
    .await;
    let envelope = recv_response(&mut ws, "r1", Duration::from_secs(5)).await;
    assert!(envelope.error.is_none(), "list_terminals failed: {:?}", envelope.error);
    let terminal_id = match envelope.payload {
        paseo_wire::Response::TerminalsResponse { terminals } => {
            assert_eq!(terminals.len(), 1, "exactly one auto-created terminal");
            assert_eq!(terminals[0].name, "Terminal 1");
            assert_eq!(terminals[0].cwd, cwd);
            terminals[0].id.to_string()
        }
        other => panic!("unexpected response: {other:?}"),
    };

    // A second listing of the same cwd must not create a second terminal.
    send(
        &mut ws,
        &Inbound {
            request_id: Some("r2".to_string()),
            body: InboundMessage::ListTerminals { cwd: cwd.clone() },
        },
    )
    .await;
    let envelope = recv_response(&mut ws, "r2", Duration::from_secs(5)).await;
    match envelope.payload {
        paseo_wire::Response::TerminalsResponse { terminals } => assert_eq!(terminals.len(), 1),
        other => panic!("unexpected response: {other:?}"),
    }

    send(
        &mut ws,
        &Inbound {
            request_id: Some("r3".to_string()),
            body: InboundMessage::SubscribeTerminal {
                subscription_id: "sub1".to_string(),
                terminal_id: terminal_id.clone(),
                rows: Some(24),
                cols: Some(80),
            },
        },
    )
    .await;
    let envelope = recv_response(&mut ws, "r3", Duration::from_secs(5)).await;
    assert!(envelope.error.is_none(), "subscribe_terminal failed: {:?}", envelope.error);

    let push = next_push(&mut ws, Duration::from_secs(5), |p| matches!(p, Push::TerminalState { .. })).await;
    match push {
        Push::TerminalState { rows, cols, cursor, .. } => {
            assert_eq!((rows, cols), (24, 80));
            assert!(cursor.row < rows && cursor.col < cols);
        }
        other => panic!("expected terminal_state, got {other:?}"),
    }

    send(
        &mut ws,
        &Inbound {
            request_id: None,
            body: InboundMessage::SendTerminalInput {
                terminal_id,
                input: paseo_wire::TerminalInput::Input { data: "echo hello\r".to_string() },
            },
        },
    )
    .await;

    let output = collect_binary_until(&mut ws, Duration::from_secs(5), |acc| {
        String::from_utf8_lossy(acc).contains("hello")
    })
    .await;
    assert!(String::from_utf8_lossy(&output).contains("hello"));
}

/// `unsubscribe_terminal` must actually stop delivery, not just tear down
/// the (unused) `SubscriptionHub` binding: once unsubscribed, neither
/// `terminal_state` pushes nor raw PTY bytes for that subscription should
/// keep arriving (`spec.md` §4.4/§5).
#[tokio::test]
#[serial]
async fn unsubscribe_terminal_stops_delivery() {
    let host = start_host().await;
    let mut ws = connect(&host).await;
    let _welcome = next_push(&mut ws, Duration::from_secs(2), |p| matches!(p, Push::Welcome { .. })).await;

    let cwd = std::env::temp_dir()
        .join(format!("paseo-spec-unsub-{}", unique_suffix()))
        .to_string_lossy()
        .to_string();
    std::fs::create_dir_all(&cwd).expect("create cwd");

    send(
        &mut ws,
        &Inbound { request_id: Some("r1".to_string()), body: InboundMessage::ListTerminals { cwd: cwd.clone() } },
    )
    .await;
    let envelope = recv_response(&mut ws, "r1", Duration::from_secs(5)).await;
    let terminal_id = match envelope.payload {
        paseo_wire::Response::TerminalsResponse { terminals } => terminals[0].id.to_string(),
        other => panic!("unexpected response: {other:?}"),
    };

    send(
        &mut ws,
        &Inbound {
            request_id: Some("r2".to_string()),
            body: InboundMessage::SubscribeTerminal {
                subscription_id: "sub1".to_string(),
                terminal_id: terminal_id.clone(),
                rows: Some(24),
                cols: Some(80),
            },
        },
    )
    .await;
    let envelope = recv_response(&mut ws, "r2", Duration::from_secs(5)).await;
    assert!(envelope.error.is_none());
    let _initial_state = next_push(&mut ws, Duration::from_secs(5), |p| matches!(p, Push::TerminalState { .. })).await;

    send(
        &mut ws,
        &Inbound {
            request_id: Some("r3".to_string()),
            body: InboundMessage::UnsubscribeTerminal { subscription_id: "sub1".to_string() },
        },
    )
    .await;
    let envelope = recv_response(&mut ws, "r3", Duration::from_secs(5)).await;
    assert!(envelope.error.is_none());

    send(
        &mut ws,
        &Inbound {
            request_id: None,
            body: InboundMessage::SendTerminalInput {
                terminal_id,
                input: paseo_wire::TerminalInput::Input { data: "echo should-not-arrive\r".to_string() },
            },
        },
    )
    .await;

    // Nothing related to this subscription should show up within a window
    // generous enough for the shell to have echoed and run the command.
    let timed_out = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match ws.next().await.expect("stream ended").expect("ws error") {
                Message::Binary(_) => panic!("raw terminal output delivered after unsubscribe"),
                Message::Text(text) => {
                    if let Ok(Push::TerminalState { .. }) = serde_json::from_str::<Push>(&text) {
                        panic!("terminal_state delivered after unsubscribe");
                    }
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
                Message::Close(_) => break,
            }
        }
    })
    .await
    .is_err();
    assert!(timed_out, "expected no further frames after unsubscribe");
}

/// §8 scenario 5: checkout-diff subscriptions prime with the current state
/// and report newly created files in lexicographic order.
#[tokio::test]
#[serial]
async fn checkout_diff_orders_files_lexicographically() {
    let dir = std::env::temp_dir().join(format!("paseo-spec-git-{}", unique_suffix()));
    std::fs::create_dir_all(&dir).expect("create repo dir");
    let cwd = dir.to_string_lossy().to_string();

    run_git(&dir, &["init", "-q"]);
    run_git(&dir, &["config", "user.email", "test@example.com"]);
    run_git(&dir, &["config", "user.name", "Test"]);
    std::fs::write(dir.join("base.txt"), "base\n").expect("write base.txt");
    run_git(&dir, &["add", "base.txt"]);
    run_git(&dir, &["commit", "-q", "-m", "base"]);

    let host = start_host().await;
    let mut ws = connect(&host).await;
    let _welcome = next_push(&mut ws, Duration::from_secs(2), |p| matches!(p, Push::Welcome { .. })).await;

    send(
        &mut ws,
        &Inbound {
            request_id: Some("sub".to_string()),
            body: InboundMessage::SubscribeCheckoutDiff {
                subscription_id: "diff1".to_string(),
                cwd: cwd.clone(),
                mode: paseo_core::CheckoutDiffMode::Uncommitted,
            },
        },
    )
    .await;
    let envelope = recv_response(&mut ws, "sub", Duration::from_secs(5)).await;
    assert!(envelope.error.is_none(), "subscribe_checkout_diff failed: {:?}", envelope.error);

    let initial = next_push(&mut ws, Duration::from_secs(5), |p| matches!(p, Push::CheckoutDiffUpdate { .. })).await;
    match initial {
        Push::CheckoutDiffUpdate { files, .. } => assert!(files.is_empty(), "no dirty files yet"),
        other => panic!("expected checkout_diff_update, got {other:?}"),
    }

    std::fs::write(dir.join("zeta.txt"), "z\n").expect("write zeta.txt");
    std::fs::write(dir.join("alpha.txt"), "a\n").expect("write alpha.txt");

    let update = next_push(&mut ws, Duration::from_secs(5), |p| {
        matches!(p, Push::CheckoutDiffUpdate { files, .. } if !files.is_empty())
    })
    .await;
    match update {
        Push::CheckoutDiffUpdate { files, .. } => {
            let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
            assert_eq!(paths, vec!["alpha.txt", "zeta.txt"]);
            assert!(files.iter().all(|f| f.is_new));
        }
        other => panic!("expected checkout_diff_update, got {other:?}"),
    }
}

/// §8 round-trip property: re-subscribing the same `subscriptionId` on one
/// connection replaces the previous binding rather than stacking a second.
#[tokio::test]
#[serial]
async fn resubscribe_with_same_id_replaces_previous_binding() {
    let dir = std::env::temp_dir().join(format!("paseo-spec-resub-{}", unique_suffix()));
    std::fs::create_dir_all(&dir).expect("create repo dir");
    let cwd = dir.to_string_lossy().to_string();
    run_git(&dir, &["init", "-q"]);

    let host = start_host().await;
    let mut ws = connect(&host).await;
    let _welcome = next_push(&mut ws, Duration::from_secs(2), |p| matches!(p, Push::Welcome { .. })).await;

    for i in 0..2 {
        send(
            &mut ws,
            &Inbound {
                request_id: Some(format!("sub{i}")),
                body: InboundMessage::SubscribeCheckoutDiff {
                    subscription_id: "same-id".to_string(),
                    cwd: cwd.clone(),
                    mode: paseo_core::CheckoutDiffMode::Uncommitted,
                },
            },
        )
        .await;
        let envelope = recv_response(&mut ws, &format!("sub{i}"), Duration::from_secs(5)).await;
        assert!(envelope.error.is_none());
        let _initial =
            next_push(&mut ws, Duration::from_secs(5), |p| matches!(p, Push::CheckoutDiffUpdate { .. })).await;
    }

    // Only one watcher/subscription should remain live: touching the repo
    // should produce exactly one further update, not two independent ones
    // racing on the same socket.
    std::fs::write(dir.join("only.txt"), "x\n").expect("write only.txt");
    let update = next_push(&mut ws, Duration::from_secs(5), |p| {
        matches!(p, Push::CheckoutDiffUpdate { files, .. } if !files.is_empty())
    })
    .await;
    match update {
        Push::CheckoutDiffUpdate { files, .. } => assert_eq!(files.len(), 1),
        other => panic!("unexpected push: {other:?}"),
    }
}

fn run_git(dir: &Path, args: &[&str]) {
    let status = std::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("spawn git");
    assert!(status.success(), "git {args:?} failed");
}
