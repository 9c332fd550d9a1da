// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter for the Codex CLI, driven via `codex exec --json` with prompts
//! and approvals sent as newline-delimited JSON over stdin.

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

const PROVIDER: &str = "codex";

#[derive(Default)]
pub struct CodexAdapter;

#[async_trait]
impl crate::ProviderAdapter for CodexAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Codex
    }

    fn session_persistence_kind(&self) -> SessionPersistenceKind {
        SessionPersistenceKind::None
    }

    fn supported_modes(&self) -> Vec<ModeInfo> {
        vec![
            ModeInfo { id: "suggest".into(), display_name: "Suggest".into() },
            ModeInfo { id: "auto-edit".into(), display_name: "Auto edit".into() },
            ModeInfo { id: "full-auto".into(), display_name: "Full auto".into() },
        ]
    }

    async fn start_turn(
        &self,
        ctx: TurnContext,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<TurnHandle, AdapterError> {
        let mut args = vec!["exec", "--json", "--approval-mode", approval_flag(&ctx.mode_id)];
        if let Some(model) = ctx.model.as_deref() {
            args.push("--model");
            args.push(model);
        }

        let SpawnedProcess { child, mut stdout_lines, stdin_tx } =
            process::spawn(PROVIDER, "codex", &args, &ctx.cwd)?;

        let prompt_line = serde_json::json!({ "op": "user_input", "text": ctx.prompt }).to_string();
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
        let approved = !decision.is_deny();
        let payload = serde_json::json!({
            "op": "exec_approval",
            "id": permission_request_id,
            "approved": approved,
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
            id: "gpt-5-codex".into(),
            display_name: "GPT-5 Codex".into(),
            default: true,
        }])
    }

    async fn close(&self, handle: TurnHandle) -> Result<(), AdapterError> {
        let mut child = handle.child.lock().await;
        let _ = child.kill().await;
        Ok(())
    }
}

fn approval_flag(mode_id: &str) -> &'static str {
    match mode_id {
        "auto-edit" => "auto-edit",
        "full-auto" => "full-auto",
        _ => "suggest",
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
        "agent_message" => {
            Ok(Some(StreamEvent::AssistantMessage {
                text: json.get("message").and_then(Value::as_str).unwrap_or_default().to_string(),
            }))
        }
        "agent_message_delta" => Ok(Some(StreamEvent::AssistantDelta {
            text: json.get("delta").and_then(Value::as_str).unwrap_or_default().to_string(),
        })),
        "exec_command_begin" => {
            let command = json
                .get("command")
                .and_then(Value::as_array)
                .map(|parts| {
                    parts.iter().filter_map(Value::as_str).collect::<Vec<_>>().join(" ")
                })
                .unwrap_or_default();
            Ok(Some(StreamEvent::ToolCallStarted {
                call_id: ToolCallId::new(),
                name: "exec".into(),
                detail: ToolCallDetail::Shell { command },
            }))
        }
        "exec_command_end" => Ok(Some(StreamEvent::ToolCallUpdated {
            call_id: ToolCallId::new(),
            status: if json.get("exit_code").and_then(Value::as_i64) == Some(0) {
                ToolCallStatus::Completed
            } else {
                ToolCallStatus::Failed
            },
            error: json.get("stderr").and_then(Value::as_str).map(str::to_string),
        })),
        "exec_approval_request" => Ok(Some(StreamEvent::PermissionRequested {
            name: "exec".into(),
            kind: PermissionKind::Tool,
            title: None,
            description: json.get("reason").and_then(Value::as_str).map(str::to_string),
            input: json.get("command").cloned().unwrap_or(Value::Null),
        })),
        "task_complete" => Ok(Some(StreamEvent::TurnCompleted)),
        "error" => Ok(Some(StreamEvent::TurnFailed {
            message: json.get("message").and_then(Value::as_str).unwrap_or("turn failed").to_string(),
        })),
        _ => Ok(None),
    }
}

#[cfg(test)]
#[path = "codex_tests.rs"]
mod tests;
