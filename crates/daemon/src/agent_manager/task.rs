// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-agent actor (`spec.md` §4.1, §5, §9): a single task that owns one
//! agent's mutable state and serializes every mutation of it through a
//! command queue, exactly as the design notes describe ("a per-agent task
//! with a message queue of operations ... the task serializes mutations;
//! all reads of agent state take a snapshot").

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use paseo_adapters::{ProviderAdapter, StreamEvent, TurnContext};
use paseo_core::{
    Agent, AgentId, AgentStatus, Clock, HostError, PermissionDecision, PermissionKind,
    PermissionOutcome, PermissionRequest, PermissionRequestId, SessionPersistenceKind,
    SystemClock, TimelineError, TimelineItem, ToolCallDetail, ToolCallId, ToolCallStatus,
};
use parking_lot::Mutex as ParkingMutex;
use tokio::sync::{mpsc, oneshot};

use super::permission_broker::{BrokerResolution, PermissionBroker};
use crate::persistence;
use crate::subscriptions::SubscriptionHub;
use crate::timeline_store::TimelineStore;
use paseo_wire::{CommandInfo, Push};

/// Client resolution requests are given 5 minutes to arrive during
/// initialization (`spec.md` §4.3, `SPEC_FULL.md` §9 Open Questions); a
/// request opened on a later, already-initialized turn waits indefinitely.
const INIT_PERMISSION_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Operations the agent manager forwards onto one agent's task, serialized
/// through a single `mpsc` queue (`spec.md` §9).
pub(crate) enum AgentCommand {
    SendMessage { text: String, images: Vec<String>, reply: oneshot::Sender<Result<(), HostError>> },
    CancelTurn { reply: oneshot::Sender<Result<(), HostError>> },
    RespondToPermission {
        request_id: PermissionRequestId,
        decision: PermissionDecision,
        reply: oneshot::Sender<Result<(), HostError>>,
    },
    Archive { reply: oneshot::Sender<Result<(), HostError>> },
    UpdateAgent { title: Option<String>, labels: Option<BTreeMap<String, String>>, reply: oneshot::Sender<Agent> },
    SetMode { mode_id: String, reply: oneshot::Sender<Result<(), HostError>> },
    EnsureInitialized { reply: oneshot::Sender<Agent> },
    RefreshAgent { reply: oneshot::Sender<Agent> },
    ListCommands { reply: oneshot::Sender<Vec<CommandInfo>> },
    PermissionTimedOut { request_id: PermissionRequestId },
    DeliverPermissionDecision { request_id: PermissionRequestId, decision: PermissionDecision },
    Shutdown { reply: oneshot::Sender<()> },
}

struct TurnState {
    events_rx: mpsc::Receiver<StreamEvent>,
    handle: paseo_adapters::TurnHandle,
    /// Tracks which in-flight tool calls are still `running`, so `cancelTurn`
    /// can mark them `canceled` (`spec.md` §4.1 edge policies).
    running_tool_calls: Vec<ToolCallId>,
}

pub(crate) struct AgentContext {
    agent: Agent,
    snapshot: Arc<ParkingMutex<Agent>>,
    timeline: Arc<TimelineStore>,
    subscriptions: Arc<SubscriptionHub>,
    paseo_home: PathBuf,
    adapter: Box<dyn ProviderAdapter>,
    broker: PermissionBroker,
    turn: Option<TurnState>,
    /// Set once the first `ensureAgentInitialized` turn has concluded; gates
    /// the init-only permission auto-deny timeout.
    initialized: bool,
    /// Fired once the in-flight turn reaches a terminal state
    /// (`refreshAgent` is "complete current turn, then reload", never
    /// preempting; `SPEC_FULL.md` §9 Open Questions).
    pending_refresh: Vec<oneshot::Sender<Agent>>,
    cmd_tx: mpsc::Sender<AgentCommand>,
}

impl AgentContext {
    pub(crate) fn new(
        agent: Agent,
        snapshot: Arc<ParkingMutex<Agent>>,
        timeline: Arc<TimelineStore>,
        subscriptions: Arc<SubscriptionHub>,
        paseo_home: PathBuf,
        cmd_tx: mpsc::Sender<AgentCommand>,
    ) -> Self {
        Self::with_adapter(agent, snapshot, timeline, subscriptions, paseo_home, cmd_tx, paseo_adapters::adapter_for)
    }

    /// Builds a context with an adapter chosen by `pick`; production code
    /// always uses [`paseo_adapters::adapter_for`], tests substitute a
    /// stand-in implementing [`ProviderAdapter`].
    pub(crate) fn with_adapter(
        agent: Agent,
        snapshot: Arc<ParkingMutex<Agent>>,
        timeline: Arc<TimelineStore>,
        subscriptions: Arc<SubscriptionHub>,
        paseo_home: PathBuf,
        cmd_tx: mpsc::Sender<AgentCommand>,
        pick: impl FnOnce(paseo_core::ProviderKind) -> Box<dyn ProviderAdapter>,
    ) -> Self {
        let adapter = pick(agent.provider);
        Self {
            agent,
            snapshot,
            timeline,
            subscriptions,
            paseo_home,
            adapter,
            broker: PermissionBroker::new(),
            turn: None,
            initialized: false,
            pending_refresh: Vec::new(),
            cmd_tx,
        }
    }

    fn now_ms(&self) -> u64 {
        SystemClock.epoch_ms()
    }

    fn topic(&self) -> String {
        super::agent_stream_topic(&self.agent.id)
    }

    async fn publish_state(&self) {
        self.subscriptions.publish(&self.topic(), Push::AgentState { agent: self.agent.clone() }).await;
        *self.snapshot.lock() = self.agent.clone();
        let _ = persistence::save_agent_snapshot(&self.paseo_home, &self.agent);
    }

    async fn publish_directory(&self, before: Option<&Agent>) {
        if let Some((agent, removed)) = crate::directory::membership_delta(before, &self.agent) {
            self.subscriptions.publish("agent_directory", Push::AgentDirectoryUpdate { agent, removed }).await;
        }
    }

    async fn append_item(&mut self, item: TimelineItem) {
        let cursor = self.timeline.append(&self.agent.id, item.clone());
        self.agent.timeline_cursor = cursor;
        self.subscriptions
            .publish(&self.topic(), Push::AgentStream { agent_id: self.agent.id.clone(), cursor, item: item.clone() })
            .await;
        let _ = persistence::append_timeline_item(&self.paseo_home, &self.agent.id, cursor.epoch, &item);
    }

    /// Starts a new turn against the provider: builds context, spawns it,
    /// and wires its event stream (`spec.md` §4.1 key algorithm, step 1).
    fn can_start_turn(&self) -> bool {
        self.turn.is_none()
            && matches!(self.agent.status, AgentStatus::Idle | AgentStatus::Error | AgentStatus::Initializing)
    }

    async fn start_turn(&mut self, text: String, images: Vec<String>) -> Result<(), HostError> {
        if !self.can_start_turn() {
            return Err(HostError::busy(format!("agent {} is not idle", self.agent.id)));
        }

        let before = self.agent.clone();
        self.append_item(TimelineItem::UserMessage { text: text.clone(), images: images.clone() }).await;
        self.append_item(TimelineItem::TurnStarted).await;
        self.agent.status = AgentStatus::Running;
        self.agent.touch(self.now_ms());
        self.agent.unobserved_completion = false;

        let ctx = TurnContext {
            agent_id: self.agent.id.to_string(),
            cwd: self.agent.cwd.clone(),
            mode_id: self.agent.mode_id.clone(),
            model: self.agent.model.clone(),
            resume_session_id: self.agent.labels.get("session_id").cloned(),
            prompt: text,
            images,
        };
        let (events_tx, events_rx) = mpsc::channel(256);
        match self.adapter.start_turn(ctx, events_tx).await {
            Ok(handle) => {
                self.turn = Some(TurnState { events_rx, handle, running_tool_calls: Vec::new() });
                self.publish_state().await;
                self.publish_directory(Some(&before)).await;
                Ok(())
            }
            Err(err) => {
                let err: HostError = err.into();
                self.fail_turn(err.to_string()).await;
                Err(err)
            }
        }
    }

    async fn fail_turn(&mut self, message: String) {
        self.append_item(TimelineItem::TurnFailed { error: TimelineError::new(message) }).await;
        self.agent.status = AgentStatus::Error;
        self.agent.touch(self.now_ms());
        self.turn = None;
        self.initialized = true;
        self.publish_state().await;
        self.resolve_pending_refresh();
    }

    fn resolve_pending_refresh(&mut self) {
        for reply in self.pending_refresh.drain(..) {
            let _ = reply.send(self.agent.clone());
        }
    }

    async fn next_stream_event(&mut self) -> Option<StreamEvent> {
        match &mut self.turn {
            Some(turn) => turn.events_rx.recv().await,
            None => std::future::pending().await,
        }
    }

    pub(crate) async fn handle_command(&mut self, cmd: AgentCommand) {
        match cmd {
            AgentCommand::SendMessage { text, images, reply } => {
                let result = self.start_turn(text, images).await;
                let _ = reply.send(result);
            }
            AgentCommand::CancelTurn { reply } => {
                let _ = reply.send(self.cancel_turn().await);
            }
            AgentCommand::RespondToPermission { request_id, decision, reply } => {
                let _ = reply.send(self.respond_to_permission(request_id, decision));
            }
            AgentCommand::Archive { reply } => {
                let _ = reply.send(self.archive().await);
            }
            AgentCommand::UpdateAgent { title, labels, reply } => {
                let before = self.agent.clone();
                if let Some(title) = title {
                    self.agent.title = title;
                }
                if let Some(labels) = labels {
                    self.agent.labels = labels;
                }
                self.agent.touch(self.now_ms());
                self.publish_state().await;
                self.publish_directory(Some(&before)).await;
                let _ = reply.send(self.agent.clone());
            }
            AgentCommand::SetMode { mode_id, reply } => {
                let result = self.set_mode(mode_id);
                let _ = reply.send(result);
            }
            AgentCommand::EnsureInitialized { reply } => {
                self.ensure_initialized(reply).await;
            }
            AgentCommand::RefreshAgent { reply } => {
                if self.turn.is_some() {
                    self.pending_refresh.push(reply);
                } else {
                    let _ = reply.send(self.agent.clone());
                }
            }
            AgentCommand::ListCommands { reply } => {
                // No provider currently exposes a slash-command catalog over
                // the streaming-JSON surface; the RPC shape is real, the
                // catalog is just always empty (`SPEC_FULL.md`, supplemented
                // features).
                let _ = reply.send(Vec::new());
            }
            AgentCommand::PermissionTimedOut { request_id } => {
                self.broker.timeout(&request_id);
            }
            AgentCommand::DeliverPermissionDecision { request_id, decision } => {
                self.deliver_permission_decision(request_id, decision).await;
            }
            AgentCommand::Shutdown { reply } => {
                if self.turn.is_some() {
                    let _ = self.cancel_turn().await;
                }
                let _ = reply.send(());
            }
        }
    }

    /// This host's providers spawn per-turn rather than as a persistent
    /// session (`paseo-adapters`), so there is no separate provider process
    /// to stand up ahead of the first turn: `ensureAgentInitialized` only
    /// settles `initializing -> idle`. `self.initialized` stays false until
    /// the agent's actual first turn concludes, so permission requests
    /// raised during that turn are still subject to the init timeout
    /// (`spec.md` §4.3, `SPEC_FULL.md` §9 Open Questions).
    async fn ensure_initialized(&mut self, reply: oneshot::Sender<Agent>) {
        if self.agent.status == AgentStatus::Initializing {
            self.agent.status = AgentStatus::Idle;
            self.publish_state().await;
        }
        let _ = reply.send(self.agent.clone());
    }

    async fn cancel_turn(&mut self) -> Result<(), HostError> {
        let Some(turn) = self.turn.take() else {
            return Ok(());
        };
        for id in self.broker.cancel_all() {
            // Tell the provider itself, not just our subscribers: a
            // still-running subprocess may be blocked on this permission
            // callback and must be unblocked with a deny (`spec.md` §4.3
            // step 4, §4.1 edge policies "provider is informed
            // deny(reason=\"canceled\")").
            let _ = self
                .adapter
                .resolve_permission(
                    &turn.handle,
                    id.as_str(),
                    PermissionDecision::Deny { message: Some("canceled".to_string()), interrupt: true },
                )
                .await;
            self.subscriptions
                .publish(
                    &self.topic(),
                    Push::PermissionResolved { id, agent_id: self.agent.id.clone(), outcome: PermissionOutcome::Canceled },
                )
                .await;
        }
        self.agent.pending_permissions.clear();

        let _ = self.adapter.cancel(&turn.handle).await;
        for call_id in &turn.running_tool_calls {
            self.append_item(TimelineItem::ToolCall {
                call_id: *call_id,
                name: String::new(),
                status: ToolCallStatus::Canceled,
                detail: ToolCallDetail::Unknown,
                error: None,
            })
            .await;
        }
        let _ = self.adapter.close(turn.handle).await;

        self.append_item(TimelineItem::TurnCompleted).await;
        self.agent.status = AgentStatus::Idle;
        self.agent.touch(self.now_ms());
        self.publish_state().await;
        self.resolve_pending_refresh();
        Ok(())
    }

    fn respond_to_permission(&mut self, request_id: PermissionRequestId, decision: PermissionDecision) -> Result<(), HostError> {
        if !self.broker.is_pending(&request_id) {
            return Err(HostError::not_found(format!("permission request {request_id} not found or already resolved")));
        }
        self.broker.resolve(&request_id, decision)
    }

    /// Delivers a terminal permission resolution (client decision, timeout,
    /// or cancellation already published) to the provider and resumes the
    /// turn (`spec.md` §4.3, step 4-5).
    async fn deliver_permission_decision(&mut self, request_id: PermissionRequestId, decision: PermissionDecision) {
        self.agent.pending_permissions.retain(|p| p.id != request_id);
        if self.agent.pending_permissions.is_empty() && self.agent.status == AgentStatus::AwaitingPermission {
            self.agent.status = if self.turn.is_some() { AgentStatus::Running } else { AgentStatus::Idle };
        }
        if let Some(turn) = &self.turn {
            let _ = self
                .adapter
                .resolve_permission(&turn.handle, request_id.as_str(), decision.clone())
                .await;
        }
        self.publish_state().await;
        if decision.should_interrupt() {
            let _ = self.cancel_turn().await;
        }
    }

    async fn archive(&mut self) -> Result<(), HostError> {
        if self.turn.is_some() {
            self.cancel_turn().await?;
        }
        let before = self.agent.clone();
        self.agent.archived_at_ms = Some(self.now_ms());
        self.agent.status = AgentStatus::Archived;
        self.publish_state().await;
        self.publish_directory(Some(&before)).await;
        Ok(())
    }

    fn set_mode(&mut self, mode_id: String) -> Result<(), HostError> {
        let supported = self.adapter.supported_modes();
        if !supported.iter().any(|m| m.id == mode_id) {
            return Err(HostError::validation(format!("mode {mode_id:?} is not supported by {}", self.adapter.kind())));
        }
        self.agent.mode_id = mode_id;
        self.agent.touch(self.now_ms());
        Ok(())
    }

    pub(crate) async fn handle_stream_event(&mut self, event: StreamEvent) {
        self.agent.touch(self.now_ms());
        match event {
            StreamEvent::AssistantDelta { text } => {
                self.append_item(TimelineItem::AssistantMessage { text, partial: true }).await;
            }
            StreamEvent::AssistantMessage { text } => {
                self.append_item(TimelineItem::AssistantMessage { text, partial: false }).await;
            }
            StreamEvent::ToolCallStarted { call_id, name, detail } => {
                if let Some(turn) = &mut self.turn {
                    turn.running_tool_calls.push(call_id);
                }
                self.append_item(TimelineItem::ToolCall { call_id, name, status: ToolCallStatus::Running, detail, error: None })
                    .await;
            }
            StreamEvent::ToolCallUpdated { call_id, status, error } => {
                if status != ToolCallStatus::Running {
                    if let Some(turn) = &mut self.turn {
                        turn.running_tool_calls.retain(|id| id != &call_id);
                    }
                }
                self.append_item(TimelineItem::ToolCall {
                    call_id,
                    name: String::new(),
                    status,
                    detail: ToolCallDetail::Unknown,
                    error: error.map(TimelineError::new),
                })
                .await;
            }
            StreamEvent::PermissionRequested { name, kind, title, description, input } => {
                self.handle_permission_requested(name, kind, title, description, input).await;
            }
            StreamEvent::SessionId { session_id } => {
                if self.adapter.session_persistence_kind() == SessionPersistenceKind::SessionId {
                    self.agent.labels.insert("session_id".to_string(), session_id);
                }
            }
            StreamEvent::TurnCompleted => {
                self.append_item(TimelineItem::TurnCompleted).await;
                self.agent.status = AgentStatus::Idle;
                self.initialized = true;
                if let Some(turn) = self.turn.take() {
                    let _ = self.adapter.close(turn.handle).await;
                }
                if !self.subscriptions.has_subscribers(&self.topic()) {
                    self.agent.unobserved_completion = true;
                }
                self.publish_state().await;
                self.resolve_pending_refresh();
            }
            StreamEvent::TurnFailed { message } => {
                if let Some(turn) = self.turn.take() {
                    let _ = self.adapter.close(turn.handle).await;
                }
                self.fail_turn(message).await;
            }
        }
    }

    /// A permission request arrives mid-turn; park the agent and register it
    /// with the broker (`spec.md` §4.3). The resolution is awaited on a
    /// detached task so the main select loop is never blocked: the decision
    /// (or timeout/cancellation) comes back in through `cmd_tx` by resolving
    /// the provider's callback out-of-band via the adapter.
    async fn handle_permission_requested(
        &mut self,
        name: String,
        kind: PermissionKind,
        title: Option<String>,
        description: Option<String>,
        input: serde_json::Value,
    ) {
        let request_id = PermissionRequestId::new();
        let request = PermissionRequest {
            id: request_id,
            agent_id: self.agent.id.clone(),
            kind,
            name,
            title,
            description,
            input,
            metadata: std::collections::HashMap::new(),
            created_at_ms: self.now_ms(),
        };
        self.agent.pending_permissions.push(request.clone());
        self.agent.status = AgentStatus::AwaitingPermission;
        self.append_item(TimelineItem::PermissionRequest { id: request_id, kind }).await;
        self.subscriptions.publish(&self.topic(), Push::PermissionRequested { request }).await;
        self.publish_state().await;

        let rx = self.broker.register(request_id);
        let init_scoped = !self.initialized;
        let cmd_tx = self.cmd_tx.clone();
        if init_scoped {
            tokio::spawn(async move {
                tokio::time::sleep(INIT_PERMISSION_TIMEOUT).await;
                let _ = cmd_tx.send(AgentCommand::PermissionTimedOut { request_id }).await;
            });
        }

        let agent_id = self.agent.id.clone();
        let subscriptions = self.subscriptions.clone();
        let topic = self.topic();
        let cmd_tx = self.cmd_tx.clone();
        tokio::spawn(async move {
            let resolution = rx.await.unwrap_or(BrokerResolution::Canceled);
            let outcome = match &resolution {
                BrokerResolution::Decision(_) => PermissionOutcome::Resolved,
                BrokerResolution::Canceled => PermissionOutcome::Canceled,
                BrokerResolution::TimedOut => PermissionOutcome::TimedOut,
            };
            subscriptions
                .publish(&topic, Push::PermissionResolved { id: request_id, agent_id: agent_id.clone(), outcome })
                .await;
            let decision = match resolution {
                BrokerResolution::Decision(d) => d,
                BrokerResolution::Canceled => return,
                BrokerResolution::TimedOut => {
                    PermissionDecision::Deny { message: Some("timeout".to_string()), interrupt: false }
                }
            };
            let _ = cmd_tx.send(AgentCommand::DeliverPermissionDecision { request_id, decision }).await;
        });
    }
}

pub(crate) async fn run(mut ctx: AgentContext, mut cmd_rx: mpsc::Receiver<AgentCommand>) {
    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                match cmd {
                    Some(cmd) => ctx.handle_command(cmd).await,
                    None => break,
                }
            }
            event = ctx.next_stream_event() => {
                match event {
                    Some(event) => ctx.handle_stream_event(event).await,
                    None if ctx.turn.is_some() => {
                        // Provider stdio closed without a terminal event
                        // (`spec.md` §4.1 key algorithm, step 3).
                        ctx.handle_provider_closed().await;
                    }
                    None => {}
                }
            }
        }
    }
}

impl AgentContext {
    async fn handle_provider_closed(&mut self) {
        let Some(turn) = self.turn.take() else { return };
        let _ = self.adapter.close(turn.handle).await;

        let can_rehydrate = self.adapter.session_persistence_kind() == SessionPersistenceKind::SessionId
            && self.agent.labels.contains_key("session_id");
        if can_rehydrate {
            let new_cursor = self.timeline.bump_epoch(&self.agent.id);
            self.agent.timeline_cursor = new_cursor;
            self.append_item(TimelineItem::SessionRehydrated { new_epoch: new_cursor.epoch }).await;
            self.agent.status = AgentStatus::Idle;
            self.initialized = true;
            self.publish_state().await;
        } else {
            self.fail_turn("provider exited".to_string()).await;
        }
        self.resolve_pending_refresh();
    }
}

#[cfg(test)]
#[path = "task_tests.rs"]
mod tests;
