// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission request types: provider prompts that must be resolved by a
//! client before a tool call proceeds.

use crate::AgentId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

crate::define_id! {
    /// Unique identifier for a permission request, assigned by the broker.
    pub struct PermissionRequestId("prm-");
}

/// What a permission request is asking for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionKind {
    Tool,
    Plan,
    Question,
    Mode,
    Other,
}

/// A provider-initiated prompt awaiting (or resolved by) a client decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub id: PermissionRequestId,
    pub agent_id: AgentId,
    pub kind: PermissionKind,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub input: serde_json::Value,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
    pub created_at_ms: u64,
}

/// Decision delivered by a client to resolve a [`PermissionRequest`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum PermissionDecision {
    Allow,
    AllowWithModifiedInput { input: serde_json::Value },
    Deny {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        #[serde(default)]
        interrupt: bool,
    },
}

impl PermissionDecision {
    pub fn is_deny(&self) -> bool {
        matches!(self, PermissionDecision::Deny { .. })
    }

    /// Whether this denial should also cancel the agent's turn.
    pub fn should_interrupt(&self) -> bool {
        matches!(self, PermissionDecision::Deny { interrupt: true, .. })
    }
}

/// Terminal outcome of a resolved or abandoned permission request, recorded
/// for idempotence checks and for the `permission_resolved` broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionOutcome {
    Resolved,
    /// The agent was canceled or terminated before a decision arrived.
    Canceled,
    /// No client resolved it within the timeout; broker auto-denied.
    TimedOut,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_with_interrupt_should_interrupt() {
        let d = PermissionDecision::Deny { message: None, interrupt: true };
        assert!(d.should_interrupt());
        assert!(d.is_deny());
    }

    #[test]
    fn deny_without_interrupt_does_not_interrupt() {
        let d = PermissionDecision::Deny { message: Some("no".into()), interrupt: false };
        assert!(!d.should_interrupt());
    }

    #[test]
    fn allow_is_not_deny() {
        assert!(!PermissionDecision::Allow.is_deny());
    }
}
