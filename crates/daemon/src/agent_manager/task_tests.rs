// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use paseo_adapters::{AdapterError, ModeInfo, ProviderAdapter, StreamEvent, TurnContext, TurnHandle};
use paseo_core::{AgentId, PermissionKind, ProviderKind, SessionPersistenceKind, SubscriptionTarget};
use parking_lot::Mutex as ParkingMutex;
use tokio::process::Command;
use tokio::sync::{mpsc, oneshot};

use super::*;
use crate::subscriptions::SubscriptionHub;
use crate::timeline_store::TimelineStore;

struct FakeAdapterInner {
    events_tx: ParkingMutex<Option<mpsc::Sender<StreamEvent>>>,
    resolved: ParkingMutex<Vec<(String, PermissionDecision)>>,
    canceled: AtomicUsize,
}

/// Test double standing in for a provider subprocess: wires a real `cat`
/// child into a [`TurnHandle`] (via [`TurnHandle::new`]) but drives turn
/// progress entirely through [`FakeAdapter::push`], scripted by each test.
#[derive(Clone)]
struct FakeAdapter(Arc<FakeAdapterInner>);

impl FakeAdapter {
    fn new() -> Self {
        Self(Arc::new(FakeAdapterInner {
            events_tx: ParkingMutex::new(None),
            resolved: ParkingMutex::new(Vec::new()),
            canceled: AtomicUsize::new(0),
        }))
    }

    async fn push(&self, event: StreamEvent) {
        let tx = self.0.events_tx.lock().clone();
        if let Some(tx) = tx {
            let _ = tx.send(event).await;
        }
    }

    fn canceled_count(&self) -> usize {
        self.0.canceled.load(Ordering::SeqCst)
    }

    fn resolved_decisions(&self) -> Vec<(String, PermissionDecision)> {
        self.0.resolved.lock().clone()
    }
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn session_persistence_kind(&self) -> SessionPersistenceKind {
        SessionPersistenceKind::SessionId
    }

    fn supported_modes(&self) -> Vec<ModeInfo> {
        vec![ModeInfo { id: "plan".into(), display_name: "Plan".into() }]
    }

    async fn start_turn(&self, _ctx: TurnContext, events: mpsc::Sender<StreamEvent>) -> Result<TurnHandle, AdapterError> {
        *self.0.events_tx.lock() = Some(events);
        let child = Command::new("cat")
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::null())
            .stderr(std::process::Stdio::null())
            .kill_on_drop(true)
            .spawn()?;
        let (stdin_tx, _rx) = mpsc::channel(1);
        Ok(TurnHandle::new(child, stdin_tx))
    }

    async fn resolve_permission(
        &self,
        _handle: &TurnHandle,
        permission_request_id: &str,
        decision: PermissionDecision,
    ) -> Result<(), AdapterError> {
        self.0.resolved.lock().push((permission_request_id.to_string(), decision));
        Ok(())
    }

    async fn cancel(&self, _handle: &TurnHandle) -> Result<(), AdapterError> {
        self.0.canceled.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<paseo_wire::ModelInfo>, AdapterError> {
        Ok(Vec::new())
    }

    async fn close(&self, _handle: TurnHandle) -> Result<(), AdapterError> {
        Ok(())
    }
}

struct Harness {
    cmd_tx: mpsc::Sender<AgentCommand>,
    snapshot: Arc<ParkingMutex<Agent>>,
    adapter: FakeAdapter,
    subscriptions: Arc<SubscriptionHub>,
    _tmp: tempfile::TempDir,
}

impl Harness {
    async fn send(&self, build: impl FnOnce(oneshot::Sender<Result<(), HostError>>) -> AgentCommand) -> Result<(), HostError> {
        let (tx, rx) = oneshot::channel();
        self.cmd_tx.send(build(tx)).await.expect("agent task alive");
        rx.await.expect("agent task replies")
    }

    fn agent(&self) -> Agent {
        self.snapshot.lock().clone()
    }

    fn subscribe(&self) -> mpsc::Receiver<Push> {
        let target = SubscriptionTarget::AgentStream { agent_id: self.agent().id };
        self.subscriptions.subscribe(1, "test".into(), &target)
    }
}

async fn wait_for_status(rx: &mut mpsc::Receiver<Push>, status: AgentStatus) {
    loop {
        match tokio::time::timeout(Duration::from_secs(2), rx.recv()).await {
            Ok(Some(Push::AgentState { agent })) if agent.status == status => return,
            Ok(Some(_)) => continue,
            other => panic!("timed out waiting for status {status:?}, got {other:?}"),
        }
    }
}

fn spawn_harness() -> Harness {
    let tmp = tempfile::tempdir().expect("tempdir");
    let agent = Agent::new(AgentId::new(), ProviderKind::Claude, "/tmp/x", "A", "plan", 1_000);
    let snapshot = Arc::new(ParkingMutex::new(agent.clone()));
    let timeline = Arc::new(TimelineStore::new());
    let subscriptions = Arc::new(SubscriptionHub::new());
    let (cmd_tx, cmd_rx) = mpsc::channel(64);
    let adapter = FakeAdapter::new();
    let adapter_for_pick = adapter.clone();
    let ctx = AgentContext::with_adapter(
        agent,
        snapshot.clone(),
        timeline,
        subscriptions.clone(),
        tmp.path().to_path_buf(),
        cmd_tx.clone(),
        move |_kind| Box::new(adapter_for_pick) as Box<dyn ProviderAdapter>,
    );
    tokio::spawn(run(ctx, cmd_rx));
    Harness { cmd_tx, snapshot, adapter, subscriptions, _tmp: tmp }
}

#[tokio::test]
async fn send_message_starts_a_turn_and_marks_the_agent_running() {
    let h = spawn_harness();
    h.send(|reply| AgentCommand::SendMessage { text: "hi".into(), images: Vec::new(), reply })
        .await
        .expect("turn starts");
    assert_eq!(h.agent().status, AgentStatus::Running);
}

#[tokio::test]
async fn second_send_message_while_running_is_rejected_as_busy() {
    let h = spawn_harness();
    h.send(|reply| AgentCommand::SendMessage { text: "hi".into(), images: Vec::new(), reply })
        .await
        .expect("turn starts");

    let err = h
        .send(|reply| AgentCommand::SendMessage { text: "again".into(), images: Vec::new(), reply })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "busy");
}

#[tokio::test]
async fn turn_completed_event_returns_agent_to_idle() {
    let h = spawn_harness();
    let mut rx = h.subscribe();
    h.send(|reply| AgentCommand::SendMessage { text: "hi".into(), images: Vec::new(), reply })
        .await
        .expect("turn starts");

    h.adapter.push(StreamEvent::AssistantMessage { text: "hello".into() }).await;
    h.adapter.push(StreamEvent::TurnCompleted).await;

    wait_for_status(&mut rx, AgentStatus::Idle).await;
}

#[tokio::test]
async fn turn_failed_event_marks_agent_in_error() {
    let h = spawn_harness();
    let mut rx = h.subscribe();
    h.send(|reply| AgentCommand::SendMessage { text: "hi".into(), images: Vec::new(), reply })
        .await
        .expect("turn starts");

    h.adapter.push(StreamEvent::TurnFailed { message: "boom".into() }).await;

    wait_for_status(&mut rx, AgentStatus::Error).await;
}

#[tokio::test]
async fn permission_cycle_parks_then_resumes_the_turn() {
    let h = spawn_harness();
    let mut rx = h.subscribe();
    h.send(|reply| AgentCommand::SendMessage { text: "run ls".into(), images: Vec::new(), reply })
        .await
        .expect("turn starts");

    h.adapter
        .push(StreamEvent::PermissionRequested {
            name: "Bash".into(),
            kind: PermissionKind::Tool,
            title: None,
            description: None,
            input: serde_json::json!({"command": "ls"}),
        })
        .await;
    wait_for_status(&mut rx, AgentStatus::AwaitingPermission).await;

    let request_id = h.agent().pending_permissions[0].id;
    h.send(|reply| AgentCommand::RespondToPermission { request_id, decision: PermissionDecision::Allow, reply })
        .await
        .expect("resolves");

    wait_for_status(&mut rx, AgentStatus::Running).await;
    assert!(h.agent().pending_permissions.is_empty());
    assert_eq!(h.adapter.resolved_decisions(), vec![(request_id.to_string(), PermissionDecision::Allow)]);

    h.adapter.push(StreamEvent::TurnCompleted).await;
    wait_for_status(&mut rx, AgentStatus::Idle).await;
}

#[tokio::test]
async fn responding_to_an_unknown_permission_request_is_not_found() {
    let h = spawn_harness();
    let err = h
        .send(|reply| AgentCommand::RespondToPermission {
            request_id: paseo_core::PermissionRequestId::new(),
            decision: PermissionDecision::Allow,
            reply,
        })
        .await
        .unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn cancel_turn_denies_pending_permissions_and_returns_idle() {
    let h = spawn_harness();
    let mut rx = h.subscribe();
    h.send(|reply| AgentCommand::SendMessage { text: "run ls".into(), images: Vec::new(), reply })
        .await
        .expect("turn starts");
    h.adapter
        .push(StreamEvent::PermissionRequested {
            name: "Bash".into(),
            kind: PermissionKind::Tool,
            title: None,
            description: None,
            input: serde_json::json!({}),
        })
        .await;
    wait_for_status(&mut rx, AgentStatus::AwaitingPermission).await;
    let request_id = h.agent().pending_permissions[0].id;

    h.send(|reply| AgentCommand::CancelTurn { reply }).await.expect("cancel succeeds");

    wait_for_status(&mut rx, AgentStatus::Idle).await;
    assert!(h.agent().pending_permissions.is_empty());
    assert_eq!(h.adapter.canceled_count(), 1);
    assert_eq!(
        h.adapter.resolved_decisions(),
        vec![(
            request_id.to_string(),
            PermissionDecision::Deny { message: Some("canceled".to_string()), interrupt: true }
        )]
    );
}

#[tokio::test]
async fn cancel_turn_on_an_idle_agent_is_a_no_op() {
    let h = spawn_harness();
    h.send(|reply| AgentCommand::CancelTurn { reply }).await.expect("no-op cancel");
    assert_eq!(h.agent().status, AgentStatus::Initializing);
    assert_eq!(h.adapter.canceled_count(), 0);
}

#[tokio::test]
async fn archive_stops_the_turn_and_marks_the_agent_archived() {
    let h = spawn_harness();
    h.send(|reply| AgentCommand::SendMessage { text: "hi".into(), images: Vec::new(), reply })
        .await
        .expect("turn starts");

    h.send(|reply| AgentCommand::Archive { reply }).await.expect("archive succeeds");

    let agent = h.agent();
    assert_eq!(agent.status, AgentStatus::Archived);
    assert!(agent.archived_at_ms.is_some());
    assert_eq!(h.adapter.canceled_count(), 1);
}
