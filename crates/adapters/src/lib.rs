// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider adapters: one subprocess-driving implementation per upstream
//! coding-agent CLI (`§4.1`, `§3.4`).
//!
//! Each adapter spawns its CLI in streaming-JSON mode, translates its
//! newline-delimited stdout into the provider-agnostic [`StreamEvent`]
//! vocabulary the agent manager consumes, and accepts permission decisions
//! and cancellation by writing further JSON lines to the child's stdin.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

mod claude;
mod codex;
mod error;
mod opencode;
mod process;
mod types;

pub use claude::ClaudeAdapter;
pub use codex::CodexAdapter;
pub use error::AdapterError;
pub use opencode::OpencodeAdapter;
pub use types::{ModeInfo, StreamEvent, TurnContext, TurnHandle};

use async_trait::async_trait;
use paseo_core::{PermissionDecision, ProviderKind, SessionPersistenceKind};
use tokio::sync::mpsc;

/// Drives one upstream coding-agent CLI as a subprocess.
///
/// Implementations are stateless beyond what's needed to spawn and address
/// subprocesses; the agent manager owns agent state and timeline.
#[async_trait]
pub trait ProviderAdapter: Send + Sync {
    fn kind(&self) -> ProviderKind;

    fn session_persistence_kind(&self) -> SessionPersistenceKind;

    /// The modes this provider publishes (e.g. plan / accept-edits / bypass).
    fn supported_modes(&self) -> Vec<ModeInfo>;

    /// Starts a new turn, spawning the subprocess if one isn't already
    /// running for this context. Events are pushed to `events` until the
    /// turn reaches `TurnCompleted` or `TurnFailed`.
    async fn start_turn(
        &self,
        ctx: TurnContext,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<TurnHandle, AdapterError>;

    /// Delivers a client's decision on a permission request to the running
    /// turn.
    async fn resolve_permission(
        &self,
        handle: &TurnHandle,
        permission_request_id: &str,
        decision: PermissionDecision,
    ) -> Result<(), AdapterError>;

    /// Requests the provider cancel its in-flight turn.
    async fn cancel(&self, handle: &TurnHandle) -> Result<(), AdapterError>;

    /// Lists models this provider can run, e.g. for `list_provider_models`.
    async fn list_models(&self) -> Result<Vec<paseo_wire::ModelInfo>, AdapterError>;

    /// Tears the subprocess down. Idempotent.
    async fn close(&self, handle: TurnHandle) -> Result<(), AdapterError>;
}

/// Returns the adapter for `kind`.
pub fn adapter_for(kind: ProviderKind) -> Box<dyn ProviderAdapter> {
    match kind {
        ProviderKind::Claude => Box::new(ClaudeAdapter::default()),
        ProviderKind::Codex => Box::new(CodexAdapter::default()),
        ProviderKind::Opencode => Box::new(OpencodeAdapter::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_for_matches_kind() {
        assert_eq!(adapter_for(ProviderKind::Claude).kind(), ProviderKind::Claude);
        assert_eq!(adapter_for(ProviderKind::Codex).kind(), ProviderKind::Codex);
        assert_eq!(adapter_for(ProviderKind::Opencode).kind(), ProviderKind::Opencode);
    }
}
