// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use paseo_core::{
    Agent, AgentId, CursorPosition, PermissionOutcome, PermissionRequest, PermissionRequestId,
    TerminalId, TimelineCursor, TimelineItem,
};
use serde::{Deserialize, Serialize};

use crate::views::{CommandInfo, DiffFileView, FilesystemEntry, ModelInfo, TerminalSummary};

/// Server-pushed messages that are not correlated with a `requestId`: agent
/// directory/stream broadcasts, permission prompts, and subscription
/// payloads (`§6.2`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Push {
    Welcome {
        server_id: String,
        hostname: String,
        version: String,
        resumed: bool,
    },
    HeartbeatAck {
        server_time_ms: u64,
    },
    AgentState {
        agent: Agent,
    },
    AgentStream {
        agent_id: AgentId,
        cursor: TimelineCursor,
        item: TimelineItem,
    },
    AgentDirectoryUpdate {
        agent: Agent,
        removed: bool,
    },
    PermissionRequested {
        request: PermissionRequest,
    },
    PermissionResolved {
        id: PermissionRequestId,
        agent_id: AgentId,
        outcome: PermissionOutcome,
    },
    CheckoutDiffUpdate {
        subscription_id: String,
        cwd: String,
        files: Vec<DiffFileView>,
    },
    HighlightedDiffUpdate {
        cwd: String,
        path: String,
        html: String,
    },
    TerminalState {
        terminal_id: TerminalId,
        name: String,
        rows: u16,
        cols: u16,
        cursor: CursorPosition,
    },
}

/// A structured host-side failure attached to a [`ResponseEnvelope`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
    pub code: String,
    pub message: String,
}

impl ResponseError {
    pub fn from_host_error(err: &paseo_core::HostError) -> Self {
        Self { code: err.code().to_string(), message: err.to_string() }
    }
}

/// Correlates a [`Response`] payload with the `requestId` of the inbound
/// message that triggered it. Exactly one `ResponseEnvelope` is sent per
/// request carrying a `requestId` (`§4.4`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResponseEnvelope {
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ResponseError>,
    #[serde(flatten)]
    pub payload: Response,
}

impl ResponseEnvelope {
    pub fn ok(request_id: impl Into<String>, payload: Response) -> Self {
        Self { request_id: request_id.into(), error: None, payload }
    }

    pub fn err(request_id: impl Into<String>, err: &paseo_core::HostError) -> Self {
        Self {
            request_id: request_id.into(),
            error: Some(ResponseError::from_host_error(err)),
            payload: Response::Ack,
        }
    }
}

/// Typed reply payloads for RPC-style inbound messages (`§6.2`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Ack,
    AgentsResponse {
        agents: Vec<Agent>,
    },
    AgentResponse {
        agent: Agent,
    },
    AgentTimelineResponse {
        agent_id: AgentId,
        cursor: TimelineCursor,
        items: Vec<TimelineItem>,
    },
    TerminalsResponse {
        terminals: Vec<TerminalSummary>,
    },
    TerminalResponse {
        terminal: TerminalSummary,
    },
    ProviderModelsResponse {
        models: Vec<ModelInfo>,
    },
    CommandsResponse {
        commands: Vec<CommandInfo>,
    },
    FilesystemEntriesResponse {
        entries: Vec<FilesystemEntry>,
    },
    DownloadTokenResponse {
        token: String,
        expires_at_ms: u64,
    },
    CheckoutStatusResponse {
        branch: String,
        dirty: bool,
        ahead: u32,
        behind: u32,
    },
    CheckoutPrStatusResponse {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pr_number: Option<u64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
    },
    HighlightedDiffResponse {
        html: String,
    },
}

#[cfg(test)]
#[path = "response_tests.rs"]
mod tests;
