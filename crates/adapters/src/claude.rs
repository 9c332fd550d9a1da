// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Adapter for the Claude Code CLI, driven via `claude --print --output-format
//! stream-json --input-format stream-json --permission-prompt-tool`.

use async_trait::async_trait;
use paseo_core::{PermissionDecision, PermissionKind, ProviderKind, SessionPersistenceKind, ToolCallDetail, ToolCallId, ToolCallStatus};
use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::AdapterError;
use crate::process::{self, SpawnedProcess};
use crate::types::{ModeInfo, StreamEvent, TurnContext, TurnHandle};

const PROVIDER: &str = "claude";

#[derive(Default)]
pub struct ClaudeAdapter;

#[async_trait]
impl crate::ProviderAdapter for ClaudeAdapter {
    fn kind(&self) -> ProviderKind {
        ProviderKind::Claude
    }

    fn session_persistence_kind(&self) -> SessionPersistenceKind {
        SessionPersistenceKind::SessionId
    }

    fn supported_modes(&self) -> Vec<ModeInfo> {
        vec![
            ModeInfo { id: "plan".into(), display_name: "Plan".into() },
            ModeInfo { id: "accept-edits".into(), display_name: "Accept edits".into() },
            ModeInfo { id: "bypass-permissions".into(), display_name: "Bypass permissions".into() },
        ]
    }

    async fn start_turn(
        &self,
        ctx: TurnContext,
        events: mpsc::Sender<StreamEvent>,
    ) -> Result<TurnHandle, AdapterError> {
        let mut args = vec![
            "--print",
            "--output-format",
            "stream-json",
            "--input-format",
            "stream-json",
            "--permission-mode",
            mode_flag(&ctx.mode_id),
        ];
        if let Some(session_id) = ctx.resume_session_id.as_deref() {
            args.push("--resume");
            args.push(session_id);
        }
        if let Some(model) = ctx.model.as_deref() {
            args.push("--model");
            args.push(model);
        }

        let SpawnedProcess { child, mut stdout_lines, stdin_tx } =
            process::spawn(PROVIDER, "claude", &args, &ctx.cwd)?;

        let prompt_line = serde_json::json!({
            "type": "user",
            "message": { "role": "user", "content": ctx.prompt },
        })
        .to_string();
        let _ = stdin_tx.send(prompt_line).await;

        tokio::spawn(async move {
            while let Some(line) = stdout_lines.recv().await {
                match parse_line(&line) {
                    Ok(Some(ev)) => {
                        let done = matches!(ev, StreamEvent::TurnCompleted | StreamEvent::TurnFailed { .. });
                        if events.send(ev).await.is_err() || done {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(provider = PROVIDER, error = %e, "unparseable stdout line");
                    }
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
            "type": "permission_response",
            "request_id": permission_request_id,
            "decision": decision,
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
        Ok(vec![
            paseo_wire::ModelInfo { id: "claude-opus-4".into(), display_name: "Opus".into(), default: false },
            paseo_wire::ModelInfo { id: "claude-sonnet-4".into(), display_name: "Sonnet".into(), default: true },
        ])
    }

    async fn close(&self, handle: TurnHandle) -> Result<(), AdapterError> {
        let mut child = handle.child.lock().await;
        let _ = child.kill().await;
        Ok(())
    }
}

fn mode_flag(mode_id: &str) -> &'static str {
    match mode_id {
        "accept-edits" => "acceptEdits",
        "bypass-permissions" => "bypassPermissions",
        _ => "plan",
    }
}

/// Parses one line of Claude Code's `stream-json` stdout into a
/// [`StreamEvent`], or `None` for event kinds this host doesn't surface
/// (e.g. system init banners).
fn parse_line(line: &str) -> Result<Option<StreamEvent>, String> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    let json: Value = serde_json::from_str(line).map_err(|e| e.to_string())?;
    let kind = json.get("type").and_then(Value::as_str).unwrap_or_default();
    match kind {
        "assistant" => {
            let text = json
                .pointer("/message/content/0/text")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            Ok(Some(StreamEvent::AssistantMessage { text }))
        }
        "assistant_delta" => {
            let text = json.get("text").and_then(Value::as_str).unwrap_or_default().to_string();
            Ok(Some(StreamEvent::AssistantDelta { text }))
        }
        "tool_use" => {
            let name = json.get("name").and_then(Value::as_str).unwrap_or("unknown").to_string();
            let input = json.get("input").cloned().unwrap_or(Value::Null);
            let detail = tool_call_detail(&name, &input);
            Ok(Some(StreamEvent::ToolCallStarted { call_id: ToolCallId::new(), name, detail }))
        }
        "tool_result" => {
            let is_error = json.get("is_error").and_then(Value::as_bool).unwrap_or(false);
            Ok(Some(StreamEvent::ToolCallUpdated {
                call_id: ToolCallId::new(),
                status: if is_error { ToolCallStatus::Failed } else { ToolCallStatus::Completed },
                error: json.get("error").and_then(Value::as_str).map(str::to_string),
            }))
        }
        "permission_request" => Ok(Some(StreamEvent::PermissionRequested {
            name: json.get("name").and_then(Value::as_str).unwrap_or_default().to_string(),
            kind: PermissionKind::Tool,
            title: json.get("title").and_then(Value::as_str).map(str::to_string),
            description: json.get("description").and_then(Value::as_str).map(str::to_string),
            input: json.get("input").cloned().unwrap_or(Value::Null),
        })),
        "system" if json.get("subtype").and_then(Value::as_str) == Some("init") => {
            match json.get("session_id").and_then(Value::as_str) {
                Some(id) => Ok(Some(StreamEvent::SessionId { session_id: id.to_string() })),
                None => Ok(None),
            }
        }
        "result" => {
            let is_error = json.get("is_error").and_then(Value::as_bool).unwrap_or(false);
            if is_error {
                let message =
                    json.get("result").and_then(Value::as_str).unwrap_or("turn failed").to_string();
                Ok(Some(StreamEvent::TurnFailed { message }))
            } else {
                Ok(Some(StreamEvent::TurnCompleted))
            }
        }
        _ => Ok(None),
    }
}

fn tool_call_detail(name: &str, input: &Value) -> ToolCallDetail {
    match name {
        "Bash" => ToolCallDetail::Shell {
            command: input.get("command").and_then(Value::as_str).unwrap_or_default().to_string(),
        },
        "Read" => ToolCallDetail::Read {
            path: input.get("file_path").and_then(Value::as_str).unwrap_or_default().to_string(),
        },
        "Edit" => ToolCallDetail::Edit {
            path: input.get("file_path").and_then(Value::as_str).unwrap_or_default().to_string(),
            diff: None,
        },
        "Write" => ToolCallDetail::Write {
            path: input.get("file_path").and_then(Value::as_str).unwrap_or_default().to_string(),
        },
        "Grep" => ToolCallDetail::Search {
            pattern: input.get("pattern").and_then(Value::as_str).unwrap_or_default().to_string(),
        },
        _ => ToolCallDetail::Unknown,
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
