// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Internal event bus vocabulary.
//!
//! These are the events the agent manager, permission broker, and
//! subscription engine publish; the session hub fans them out to matching
//! subscriptions. Distinct from [`crate::timeline::TimelineItem`], which is
//! the persisted per-agent log entry `TimelineAppended` carries.

use crate::agent::{Agent, AgentId};
use crate::permission::{PermissionOutcome, PermissionRequest, PermissionRequestId};
use crate::timeline::{TimelineCursor, TimelineItem};
use serde::{Deserialize, Serialize};

/// One file's worth of change in a checkout-diff subscription payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffFile {
    pub path: String,
    pub is_new: bool,
    pub is_deleted: bool,
    pub additions: u32,
    pub deletions: u32,
    pub hunks: Vec<DiffHunk>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffHunk {
    pub header: String,
    pub lines: Vec<String>,
}

/// Events published on the host's internal bus and fanned out by the
/// session hub to matching subscriptions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Full snapshot of an agent, published after any state transition.
    AgentState { agent: Agent },

    /// A new item was appended to an agent's timeline.
    TimelineAppended { agent_id: AgentId, cursor: TimelineCursor, item: TimelineItem },

    /// Membership change in the user-facing agent set (`labels.ui == "true"`).
    AgentDirectoryUpdate { agent: Agent, removed: bool },

    /// A provider turn parked on a permission request.
    PermissionRequested { request: PermissionRequest },

    /// A permission request reached a terminal outcome.
    PermissionResolved { id: PermissionRequestId, agent_id: AgentId, outcome: PermissionOutcome },

    /// Recomputed dirty-file list for a checkout-diff subscription.
    CheckoutDiffUpdate { cwd: String, files: Vec<DiffFile> },

    /// An agent was deleted outright (distinct from archival).
    AgentDeleted { agent_id: AgentId },
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderKind;

    #[test]
    fn agent_state_event_serializes_with_type_tag() {
        let agent = Agent::new(AgentId::new(), ProviderKind::Claude, "/tmp", "A", "plan", 0);
        let ev = Event::AgentState { agent };
        let json = serde_json::to_value(&ev).unwrap();
        assert_eq!(json["type"], "agent_state");
    }
}
