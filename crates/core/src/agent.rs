// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity and state: a managed coding-agent subprocess together with
//! its labels, mode, and lifecycle status.

use crate::permission::PermissionRequest;
use crate::provider::ProviderKind;
use crate::timeline::TimelineCursor;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

crate::define_id! {
    /// Unique identifier for an agent, stable across host restarts.
    pub struct AgentId("agt-");
}

/// Label key that marks an agent as user-facing (listed in the UI directory)
/// when set to `"true"`. See [`Agent::is_ui_facing`].
pub const UI_LABEL_KEY: &str = "ui";
pub const UI_LABEL_TRUE: &str = "true";

/// Lifecycle status of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    Initializing,
    Idle,
    Running,
    AwaitingPermission,
    Error,
    Archived,
}

impl AgentStatus {
    pub fn is_terminal_for_turn(&self) -> bool {
        matches!(self, AgentStatus::Idle | AgentStatus::Error)
    }
}

/// A managed coding-agent subprocess and its observable state.
///
/// See `§3.1` for the field-level contract. Mutation is owned exclusively by
/// the agent manager; all other readers operate on a cloned snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub provider: ProviderKind,
    /// Absolute path the subprocess is spawned in; never relative.
    pub cwd: String,
    pub title: String,
    pub status: AgentStatus,
    pub mode_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thinking_option_id: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    pub created_at_ms: u64,
    pub last_activity_at_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pending_permissions: Vec<PermissionRequest>,
    pub timeline_cursor: TimelineCursor,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archived_at_ms: Option<u64>,
    /// True once an active turn has completed without being observed by any
    /// subscribed client; cleared the next time a client subscribes and
    /// drains the unseen tail.
    #[serde(default)]
    pub unobserved_completion: bool,
}

impl Agent {
    pub fn new(
        id: AgentId,
        provider: ProviderKind,
        cwd: impl Into<String>,
        title: impl Into<String>,
        mode_id: impl Into<String>,
        now_ms: u64,
    ) -> Self {
        Self {
            id,
            provider,
            cwd: cwd.into(),
            title: title.into(),
            status: AgentStatus::Initializing,
            mode_id: mode_id.into(),
            model: None,
            thinking_option_id: None,
            labels: BTreeMap::new(),
            created_at_ms: now_ms,
            last_activity_at_ms: now_ms,
            pending_permissions: Vec::new(),
            timeline_cursor: TimelineCursor::START,
            archived_at_ms: None,
            unobserved_completion: false,
        }
    }

    /// `labels.ui == "true"`: lists this agent in the UI directory and
    /// enables the `set_title` self-identification tool injection.
    pub fn is_ui_facing(&self) -> bool {
        self.labels.get(UI_LABEL_KEY).map(String::as_str) == Some(UI_LABEL_TRUE)
    }

    pub fn is_archived(&self) -> bool {
        self.archived_at_ms.is_some()
    }

    /// `pendingPermissions` is non-empty iff `status == awaiting_permission`.
    pub fn pending_permissions_consistent(&self) -> bool {
        !self.pending_permissions.is_empty() == (self.status == AgentStatus::AwaitingPermission)
    }

    /// Derived flag: true iff status is `awaiting_permission`, `error`, or
    /// the most recent turn completed unobserved.
    pub fn requires_attention(&self) -> bool {
        matches!(self.status, AgentStatus::AwaitingPermission | AgentStatus::Error)
            || self.unobserved_completion
    }

    pub fn touch(&mut self, now_ms: u64) {
        self.last_activity_at_ms = now_ms;
    }
}
