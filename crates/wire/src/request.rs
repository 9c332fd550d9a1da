// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::HashMap;

use paseo_core::{CheckoutDiffMode, PermissionDecision, TimelineProjection};
use serde::{Deserialize, Serialize};

/// An inbound client message, optionally correlated with a `requestId` when
/// the client expects a matching `*_response` (`§6.2`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Inbound {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    #[serde(flatten)]
    pub body: InboundMessage,
}

/// Direction for a `fetch_agent_timeline` query (`§4.2`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimelineDirection {
    Tail,
    After,
}

/// Wire cursor for timeline queries; mirrors [`paseo_core::TimelineCursor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WireCursor {
    pub epoch: u32,
    pub seq: u64,
}

/// Terminal input payload for `send_terminal_input` (`§4.5`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "input_type", rename_all = "snake_case")]
pub enum TerminalInput {
    Input { data: String },
    Resize { rows: u16, cols: u16 },
    Signal { signal: String },
}

/// The full inbound message taxonomy (`§6.2`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundMessage {
    // -- session bootstrap --
    Heartbeat {
        device_type: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        focused_agent_id: Option<String>,
        app_visible: bool,
        last_activity_at_ms: u64,
    },
    RegisterPushToken {
        token: String,
        platform: String,
    },

    // -- agent lifecycle --
    CreateAgent {
        provider: String,
        cwd: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        mode_id: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        model: Option<String>,
        #[serde(default, skip_serializing_if = "HashMap::is_empty")]
        labels: HashMap<String, String>,
    },
    SendMessage {
        agent_id: String,
        text: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        images: Vec<String>,
    },
    CancelTurn {
        agent_id: String,
    },
    RespondToPermission {
        agent_id: String,
        permission_request_id: String,
        decision: PermissionDecision,
    },
    ArchiveAgent {
        agent_id: String,
    },
    UpdateAgent {
        agent_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        labels: Option<HashMap<String, String>>,
    },
    DeleteAgent {
        agent_id: String,
    },
    FetchAgents,
    FetchAgent {
        agent_id: String,
    },
    FetchAgentTimeline {
        agent_id: String,
        direction: TimelineDirection,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor: Option<WireCursor>,
        #[serde(default)]
        limit: u32,
        #[serde(default)]
        projection: TimelineProjection,
    },
    EnsureAgentInitialized {
        agent_id: String,
    },
    RefreshAgent {
        agent_id: String,
    },
    SetMode {
        agent_id: String,
        mode_id: String,
    },
    ListProviderModels {
        provider: String,
    },
    ListCommands {
        agent_id: String,
    },

    // -- files & git --
    ExploreFilesystem {
        path: String,
    },
    RequestDownloadToken {
        path: String,
    },
    SubscribeCheckoutDiff {
        subscription_id: String,
        cwd: String,
        mode: CheckoutDiffMode,
    },
    UnsubscribeCheckoutDiff {
        subscription_id: String,
    },
    GetHighlightedDiff {
        cwd: String,
        path: String,
    },
    CheckoutStatus {
        cwd: String,
    },
    CheckoutPrStatus {
        cwd: String,
    },

    // -- terminals --
    ListTerminals {
        cwd: String,
    },
    CreateTerminal {
        cwd: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        name: Option<String>,
    },
    SubscribeTerminal {
        subscription_id: String,
        terminal_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        rows: Option<u16>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cols: Option<u16>,
    },
    UnsubscribeTerminal {
        subscription_id: String,
    },
    SendTerminalInput {
        terminal_id: String,
        #[serde(flatten)]
        input: TerminalInput,
    },
    KillTerminal {
        terminal_id: String,
    },
}

#[cfg(test)]
#[path = "request_tests.rs"]
mod tests;
