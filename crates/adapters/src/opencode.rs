// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter for the OpenCode CLI, driven via `opencode run --print-logs
//! --format json`.

use async_trait::async_trait;
use paseo_core::{
    PermissionDecision, PermissionKind, ProviderKind, SessionPersistenceKind, ToolCallDetail,
    ToolCallId, ToolCallStatus,
};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::AdapterError;
use crate::process::{self, SpawnedProcess};
use crate::types::{ModeInfo, StreamEvent, TurnContext, TurnHandle};

const PROVIDER: &str = "opencode";

#[derive(Default)]
pub struct OpencodeAdapter;

#[async_trait]
impl crate::ProviderAdapter for OpencodeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Opencode
    }

    fn session_persistence_kind(&self) -> SessionPersistenceKind {
        SessionPersistenceKind::SessionId
    }

    fn supported_modes(&self) -> Vec<ModeInfo> {
        vec![ModeInfo { id: "build".into(), display_name: "Build".into() }]
    }

    async fn start_turn(
        &self,
        ctx: TurnContext,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<TurnHandle, AdapterError> {
        let mut args = vec!["run", "--format", "json"];
        if let Some(session_id) = ctx.resume_session_id.as_deref() {
            args.push("--session");
            args.push(session_id);
        }
        if let Some(model) = ctx.model.as_deref() {
            args.push("--model");
            args.push(model);
        }

        let SpawnedProcess { child, mut stdout_lines, stdin_tx } =
            process::spawn(PROVIDER, "opencode", &args, &ctx.cwd)?;

        let prompt_line = serde_json::json!({ "type": "prompt", "text": ctx.prompt }).to_string();
        let _ = stdin_tx.send(prompt_line).await;

        tokio::spawn(async move {
            while let Some(line) = stdout_lines.recv().await {
                match parse_line(&line) {
                    Ok(Some(ev)) => {
                        let done =
                            matches!(ev, StreamEvent::TurnCompleted | StreamEvent::TurnFailed { .. });
                        if events.send(ev).await.is_err() || done {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => tracing::warn!(provider = PROVIDER, error = %e, "unparseable stdout line"),
                }
            }
        });

        Ok(TurnHandle { child: tokio::sync::Mutex::new(child), stdin_tx })
    }

    async fn resolve_permission(
        &self,
        handle: &TurnHandle,
        permission_request_id: &str,
        decision: PermissionDecision,
    ) -> Result<(), AdapterError> {
        let payload = serde_json::json!({
            "type": "permission_decision",
            "id": permission_request_id,
            "allow": !decision.is_deny(),
        })
        .to_string();
        handle
            .stdin_tx
            .send(payload)
            .await
            .map_err(|_| AdapterError::TurnNotFound(permission_request_id.to_string()))
    }

    async fn cancel(&self, handle: &TurnHandle) -> Result<(), AdapterError> {
        let mut child = handle.child.lock().await;
        child.start_kill()?;
        Ok(())
    }

    async fn list_models(&self) -> Result<Vec<paseo_wire::ModelInfo>, AdapterError> {
        Ok(vec![paseo_wire::ModelInfo {
            id: "opencode/grok-code".into(),
            display_name: "Grok Code".into(),
            default: true,
        }])
    }

    async fn close(&self, handle: TurnHandle) -> Result<(), AdapterError> {
        let mut child = handle.child.lock().await;
        let _ = child.kill().await;
        Ok(())
    }
}

fn parse_line(line: &str) -> Result<Option<StreamEvent>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let json: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let kind = json.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "text" => Ok(Some(StreamEvent::AssistantMessage {
            text: json.get("text").and_then(Value::as_str).unwrap_or_default().to_string(),
        })),
        "tool_call" => {
            let name = json.get("tool").and_then(Value::as_str).unwrap_or("unknown").to_string();
            Ok(Some(StreamEvent::ToolCallStarted {
                call_id: ToolCallId::new(),
                name,
                detail: ToolCallDetail::Unknown,
            }))
        }
        "tool_result" => Ok(Some(StreamEvent::ToolCallUpdated {
            call_id: ToolCallId::new(),
            status: if json.get("ok").and_then(Value::as_bool).unwrap_or(true) {
                ToolCallStatus::Completed
            } else {
                ToolCallStatus::Failed
            },
            error: json.get("error").and_then(Value::as_str).map(str::to_string),
        })),
        "permission" => Ok(Some(StreamEvent::PermissionRequested {
            name: json.get("tool").and_then(Value::as_str).unwrap_or_default().to_string(),
            kind: PermissionKind::Tool,
            title: None,
            description: None,
            input: json.get("args").cloned().unwrap_or(Value::Null),
        })),
        "session" => match json.get("id").and_then(Value::as_str) {
            Some(id) => Ok(Some(StreamEvent::SessionId { session_id: id.to_string() })),
            None => Ok(None),
        },
        "done" => Ok(Some(StreamEvent::TurnCompleted)),
        "error" => Ok(Some(StreamEvent::TurnFailed {
            message: json.get("message").and_then(Value::as_str).unwrap_or("turn failed").to_string(),
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
#[path = "opencode_tests.rs"]
mod tests;
