// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn parses_assistant_message() {
    let line = r#"{"type":"assistant","message":{"content":[{"type":"text","text":"hi"}]}}"#;
    let ev = parse_line(line).unwrap().unwrap();
    assert_eq!(ev, StreamEvent::AssistantMessage { text: "hi".into() });
}

#[test]
fn parses_tool_use_as_shell_detail() {
    let line = r#"{"type":"tool_use","name":"Bash","input":{"command":"ls -la"}}"#;
    let ev = parse_line(line).unwrap().unwrap();
    match ev {
        StreamEvent::ToolCallStarted { name, detail, .. } => {
            assert_eq!(name, "Bash");
            assert_eq!(detail, ToolCallDetail::Shell { command: "ls -la".into() });
        }
        other => panic!("unexpected: {other:?}"),
    }
}

#[test]
fn parses_successful_result_as_turn_completed() {
    let line = r#"{"type":"result","is_error":false}"#;
    let ev = parse_line(line).unwrap().unwrap();
    assert_eq!(ev, StreamEvent::TurnCompleted);
}

#[test]
fn parses_failed_result_as_turn_failed() {
    let line = r#"{"type":"result","is_error":true,"result":"boom"}"#;
    let ev = parse_line(line).unwrap().unwrap();
    assert_eq!(ev, StreamEvent::TurnFailed { message: "boom".into() });
}

#[test]
fn blank_lines_are_ignored() {
    assert_eq!(parse_line("   ").unwrap(), None);
}

#[test]
fn malformed_json_is_an_error() {
    assert!(parse_line("{not json").is_err());
}

#[yare::parameterized(
    plan = { "plan", "plan" },
    accept_edits = { "accept-edits", "acceptEdits" },
    bypass_permissions = { "bypass-permissions", "bypassPermissions" },
    unknown_defaults_to_plan = { "unknown", "plan" },
)]
fn mode_flag_maps_known_ids(mode_id: &str, expected: &str) {
    assert_eq!(mode_flag(mode_id), expected);
}
