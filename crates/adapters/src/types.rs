// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use paseo_core::{PermissionKind, ToolCallDetail, ToolCallId, ToolCallStatus};
use serde::{Deserialize, Serialize};
use tokio::process::Child;
use tokio::sync::{mpsc, Mutex};

/// What a provider turn is being asked to do.
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub agent_id: String,
    pub cwd: String,
    pub mode_id: String,
    pub model: Option<String>,
    /// Provider session identifier to resume, when the provider supports
    /// [`paseo_core::SessionPersistenceKind::SessionId`] and one exists.
    pub resume_session_id: Option<String>,
    pub prompt: String,
    pub images: Vec<String>,
}

/// A single parsed event from a provider subprocess's stdout stream.
///
/// The agent manager translates these into [`paseo_core::TimelineItem`]s and
/// [`paseo_core::Event`]s; this type is intentionally provider-agnostic so
/// claude/codex/opencode all funnel through one turn-driving loop.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    AssistantDelta { text: String },
    AssistantMessage { text: String },
    ToolCallStarted { call_id: ToolCallId, name: String, detail: ToolCallDetail },
    ToolCallUpdated { call_id: ToolCallId, status: ToolCallStatus, error: Option<String> },
    PermissionRequested {
        name: String,
        kind: PermissionKind,
        title: Option<String>,
        description: Option<String>,
        input: serde_json::Value,
    },
    /// The provider reported (or re-affirmed) its resumable session id.
    SessionId { session_id: String },
    TurnCompleted,
    TurnFailed { message: String },
}

/// A running provider turn. Holds the subprocess handle and the channel used
/// to write further newline-delimited JSON commands (permission decisions,
/// cancellation) to its stdin.
pub struct TurnHandle {
    pub(crate) child: Mutex<Child>,
    pub(crate) stdin_tx: mpsc::Sender<String>,
}

impl TurnHandle {
    /// Constructs a handle around an already-spawned child and its stdin
    /// command channel. Exposed beyond `pub(crate)` so test doubles for
    /// [`crate::ProviderAdapter`] outside this crate (e.g. the agent
    /// manager's unit tests) can stand up a handle around a trivial real
    /// subprocess without a provider CLI installed.
    pub fn new(child: Child, stdin_tx: mpsc::Sender<String>) -> Self {
        Self { child: Mutex::new(child), stdin_tx }
    }
}

/// A mode the provider exposes (e.g. `"plan"`, `"accept-edits"`, `"bypass"`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModeInfo {
    pub id: String,
    pub display_name: String,
}
