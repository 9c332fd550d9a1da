// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent manager (`spec.md` §4.1): owns the runtime set of agents, spawns
//! one task per agent (`spec.md` §5, §9), and exposes the lifecycle
//! operations the session hub dispatches onto.
//!
//! Each agent's task serializes every mutation of its own state (`task`
//! module); the manager itself only indexes tasks by id and forwards
//! commands, mirroring the "per-agent task with a message queue of
//! operations" design note.

mod permission_broker;
mod task;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use paseo_core::{
    Agent, AgentId, AgentStatus, Clock, HostError, PermissionDecision, PermissionRequestId,
    ProviderKind, SubscriptionTarget, SystemClock,
};
use parking_lot::Mutex as ParkingMutex;
use tokio::sync::{mpsc, oneshot};

use crate::directory;
use crate::persistence;
use crate::subscriptions::SubscriptionHub;
use crate::timeline_store::TimelineStore;
use paseo_wire::{CommandInfo, ModelInfo, Push};

pub(crate) use task::AgentCommand;

const COMMAND_CHANNEL_CAPACITY: usize = 128;

fn default_mode(provider: ProviderKind) -> String {
    match provider {
        ProviderKind::Claude => "plan",
        ProviderKind::Codex => "suggest",
        ProviderKind::Opencode => "build",
    }
    .to_string()
}

struct AgentHandle {
    cmd_tx: mpsc::Sender<AgentCommand>,
    snapshot: Arc<ParkingMutex<Agent>>,
}

/// Owns every live agent's task handle and is the sole entry point the
/// session hub uses to drive agent lifecycle operations (`spec.md` §4.1).
pub struct AgentManager {
    agents: ParkingMutex<std::collections::HashMap<AgentId, AgentHandle>>,
    timeline: Arc<TimelineStore>,
    subscriptions: Arc<SubscriptionHub>,
    paseo_home: PathBuf,
}

impl AgentManager {
    pub fn new(
        paseo_home: PathBuf,
        timeline: Arc<TimelineStore>,
        subscriptions: Arc<SubscriptionHub>,
    ) -> Self {
        Self { agents: ParkingMutex::new(std::collections::HashMap::new()), timeline, subscriptions, paseo_home }
    }

    /// Rehydrates every agent with a snapshot on disk, restarting a task for
    /// each (used at startup; `spec.md` §6.3). Archived agents get a task
    /// too, so their timeline stays queryable, but it never starts a turn.
    pub fn load_from_disk(&self) -> Result<(), HostError> {
        for id in persistence::list_agent_ids(&self.paseo_home)? {
            let Some(agent) = persistence::load_agent_snapshot(&self.paseo_home, &id)? else {
                continue;
            };
            for (epoch_cursor, item) in (0..=agent.timeline_cursor.epoch).flat_map(|epoch| {
                persistence::load_timeline_shard(&self.paseo_home, &id, epoch)
                    .unwrap_or_default()
                    .into_iter()
                    .map(move |item| (epoch, item))
            }) {
                let _ = epoch_cursor;
                self.timeline.append(&id, item);
            }
            self.spawn_task(agent);
        }
        Ok(())
    }

    fn spawn_task(&self, agent: Agent) {
        let id = agent.id.clone();
        let snapshot = Arc::new(ParkingMutex::new(agent.clone()));
        let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_CHANNEL_CAPACITY);
        let ctx = task::AgentContext::new(
            agent,
            snapshot.clone(),
            self.timeline.clone(),
            self.subscriptions.clone(),
            self.paseo_home.clone(),
            cmd_tx.clone(),
        );
        tokio::spawn(task::run(ctx, cmd_rx));
        self.agents.lock().insert(id, AgentHandle { cmd_tx, snapshot });
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn create_agent(
        &self,
        provider: ProviderKind,
        cwd: String,
        title: Option<String>,
        mode_id: Option<String>,
        model: Option<String>,
        labels: BTreeMap<String, String>,
    ) -> Result<Agent, HostError> {
        let now = SystemClock.epoch_ms();
        let id = AgentId::new();
        let title = title.unwrap_or_else(|| format!("{provider} session"));
        let mode_id = mode_id.unwrap_or_else(|| default_mode(provider));
        let mut agent = Agent::new(id.clone(), provider, cwd, title, mode_id, now);
        agent.model = model;
        agent.labels = labels;
        // createAgent spawns the provider, publishes a snapshot, and enters
        // idle (`spec.md` §4.1); this host's providers spawn per-turn
        // subprocesses rather than a persistent one, so "spawning" here is
        // just the bookkeeping transition.
        agent.status = AgentStatus::Idle;
        persistence::save_agent_snapshot(&self.paseo_home, &agent)?;

        self.spawn_task(agent.clone());
        self.subscriptions
            .publish(&agent_stream_topic(&id), Push::AgentState { agent: agent.clone() })
            .await;
        if let Some((dir_agent, removed)) = directory::membership_delta(None, &agent) {
            self.subscriptions.publish("agent_directory", Push::AgentDirectoryUpdate { agent: dir_agent, removed }).await;
        }
        Ok(agent)
    }

    fn handle(&self, id: &AgentId) -> Result<(mpsc::Sender<AgentCommand>, Arc<ParkingMutex<Agent>>), HostError> {
        let agents = self.agents.lock();
        let h = agents.get(id).ok_or_else(|| HostError::not_found(format!("agent {id} not found")))?;
        Ok((h.cmd_tx.clone(), h.snapshot.clone()))
    }

    async fn call<T>(
        &self,
        id: &AgentId,
        build: impl FnOnce(oneshot::Sender<T>) -> AgentCommand,
    ) -> Result<T, HostError> {
        let (cmd_tx, _) = self.handle(id)?;
        let (tx, rx) = oneshot::channel();
        cmd_tx
            .send(build(tx))
            .await
            .map_err(|_| HostError::not_found(format!("agent {id} is no longer running")))?;
        rx.await.map_err(|_| HostError::HostFatal(format!("agent {id} task dropped a reply")))
    }

    pub async fn send_message(
        &self,
        id: &AgentId,
        text: String,
        images: Vec<String>,
    ) -> Result<(), HostError> {
        self.call(id, |reply| AgentCommand::SendMessage { text, images, reply }).await?
    }

    pub async fn cancel_turn(&self, id: &AgentId) -> Result<(), HostError> {
        self.call(id, |reply| AgentCommand::CancelTurn { reply }).await?
    }

    pub async fn respond_to_permission(
        &self,
        id: &AgentId,
        request_id: PermissionRequestId,
        decision: PermissionDecision,
    ) -> Result<(), HostError> {
        self.call(id, |reply| AgentCommand::RespondToPermission { request_id, decision, reply }).await?
    }

    pub async fn archive_agent(&self, id: &AgentId) -> Result<(), HostError> {
        self.call(id, |reply| AgentCommand::Archive { reply }).await?
    }

    pub async fn update_agent(
        &self,
        id: &AgentId,
        title: Option<String>,
        labels: Option<BTreeMap<String, String>>,
    ) -> Result<Agent, HostError> {
        self.call(id, |reply| AgentCommand::UpdateAgent { title, labels, reply }).await
    }

    pub async fn set_mode(&self, id: &AgentId, mode_id: String) -> Result<(), HostError> {
        self.call(id, |reply| AgentCommand::SetMode { mode_id, reply }).await?
    }

    pub async fn ensure_agent_initialized(&self, id: &AgentId) -> Result<Agent, HostError> {
        self.call(id, |reply| AgentCommand::EnsureInitialized { reply }).await
    }

    pub async fn refresh_agent(&self, id: &AgentId) -> Result<Agent, HostError> {
        self.call(id, |reply| AgentCommand::RefreshAgent { reply }).await
    }

    pub async fn list_commands(&self, id: &AgentId) -> Result<Vec<CommandInfo>, HostError> {
        self.call(id, |reply| AgentCommand::ListCommands { reply }).await
    }

    /// Lists a provider's model catalog without requiring a live agent.
    pub async fn list_provider_models(&self, provider: ProviderKind) -> Result<Vec<ModelInfo>, HostError> {
        paseo_adapters::adapter_for(provider).list_models().await.map_err(HostError::from)
    }

    /// Deletes an agent outright: stops its task and removes its on-disk
    /// directory (distinct from archival, which keeps it read-only).
    pub async fn delete_agent(&self, id: &AgentId) -> Result<(), HostError> {
        let (cmd_tx, snapshot) = self.handle(id)?;
        let (tx, rx) = oneshot::channel();
        let _ = cmd_tx.send(AgentCommand::Shutdown { reply: tx }).await;
        let _ = rx.await;

        let agent = snapshot.lock().clone();
        self.agents.lock().remove(id);
        persistence::delete_agent(&self.paseo_home, id)?;

        if let Some((dir_agent, removed)) = directory::deletion_update(&agent) {
            self.subscriptions.publish("agent_directory", Push::AgentDirectoryUpdate { agent: dir_agent, removed }).await;
        }
        Ok(())
    }

    pub fn fetch_agents(&self) -> Vec<Agent> {
        self.agents.lock().values().map(|h| h.snapshot.lock().clone()).collect()
    }

    pub fn fetch_agent(&self, id: &AgentId) -> Result<Agent, HostError> {
        let agents = self.agents.lock();
        agents
            .get(id)
            .map(|h| h.snapshot.lock().clone())
            .ok_or_else(|| HostError::not_found(format!("agent {id} not found")))
    }

    /// The user-facing agent directory (`labels.ui == "true"`, not archived).
    pub fn fetch_directory(&self) -> Vec<Agent> {
        self.fetch_agents().into_iter().filter(|a| a.is_ui_facing() && !a.is_archived()).collect()
    }

    pub fn timeline(&self) -> &Arc<TimelineStore> {
        &self.timeline
    }

    pub fn subscriptions(&self) -> &Arc<SubscriptionHub> {
        &self.subscriptions
    }
}

pub(crate) fn agent_stream_topic(id: &AgentId) -> String {
    SubscriptionTarget::AgentStream { agent_id: id.clone() }.topic_key()
}
