// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Timeline item types: the append-only per-agent event log entries.

use serde::{Deserialize, Serialize};

/// High-water mark into an agent's timeline.
///
/// `seq` is strictly increasing within an `epoch`; `epoch` bumps whenever an
/// agent is rehydrated after a crash, at which point `seq` resets to zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimelineCursor {
    pub epoch: u32,
    pub seq: u64,
}

impl TimelineCursor {
    pub const START: TimelineCursor = TimelineCursor { epoch: 0, seq: 0 };

    pub fn next_epoch(self) -> TimelineCursor {
        TimelineCursor { epoch: self.epoch + 1, seq: 0 }
    }

    pub fn advance(self) -> TimelineCursor {
        TimelineCursor { epoch: self.epoch, seq: self.seq + 1 }
    }
}

crate::define_id! {
    /// Unique identifier for a tool call within an agent's timeline.
    pub struct ToolCallId("tcl-");
}

/// Status of a single tool call as it progresses through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCallStatus {
    Running,
    Completed,
    Failed,
    Canceled,
}

/// What kind of side effect a tool call performs, with detail specific to
/// that kind. Required on every `tool_call` timeline item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolCallDetail {
    Shell { command: String },
    Read { path: String },
    Edit { path: String, diff: Option<String> },
    Write { path: String },
    Search { pattern: String },
    SubAgent { description: String },
    WorktreeSetup { path: String },
    Unknown,
}

/// An error attached to a failed tool call or turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineError {
    pub message: String,
}

impl TimelineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self { message: message.into() }
    }
}

/// A single observable event in an agent's timeline.
///
/// Tagged union discriminated by `type`. Items within an epoch are totally
/// ordered by `seq` (see [`TimelineCursor`]); the store assigns `seq` at
/// append time, so the item itself never carries its own position.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TimelineItem {
    UserMessage {
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        images: Vec<String>,
    },
    AssistantMessage {
        text: String,
        #[serde(default, skip_serializing_if = "std::ops::Not::not")]
        partial: bool,
    },
    ToolCall {
        call_id: ToolCallId,
        name: String,
        status: ToolCallStatus,
        detail: ToolCallDetail,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<TimelineError>,
    },
    PermissionRequest {
        id: crate::permission::PermissionRequestId,
        kind: crate::permission::PermissionKind,
    },
    TurnStarted,
    TurnCompleted,
    TurnFailed {
        error: TimelineError,
    },
    /// Synthetic marker emitted when a crashed agent is rehydrated and its
    /// epoch bumps, so subscribers know to re-subscribe from a fresh cursor.
    SessionRehydrated {
        new_epoch: u32,
    },
}

impl TimelineItem {
    /// Validates the `status == completed <=> error == null` invariant
    /// (`§3.2`) for tool-call and turn-outcome items that carry both fields.
    pub fn error_status_consistent(&self) -> bool {
        match self {
            TimelineItem::ToolCall { status, error, .. } => match status {
                ToolCallStatus::Completed => error.is_none(),
                ToolCallStatus::Failed => error.is_some(),
                ToolCallStatus::Running | ToolCallStatus::Canceled => true,
            },
            _ => true,
        }
    }
}

/// Which representation a timeline query or subscription should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineProjection {
    /// Every delta, including in-flight `tool_call` status updates.
    Raw,
    /// In-flight `tool_call` updates are collapsed into their latest state.
    Projected,
}
