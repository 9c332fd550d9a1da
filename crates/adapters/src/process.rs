// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared subprocess plumbing: spawn a provider CLI with piped stdio, and
//! bridge its newline-delimited JSON stdout/stdin to channels so each
//! provider adapter only has to implement line parsing and command encoding.

use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;

use crate::error::AdapterError;

pub struct SpawnedProcess {
    pub child: Child,
    pub stdout_lines: mpsc::Receiver<String>,
    pub stdin_tx: mpsc::Sender<String>,
}

/// Spawns `program` with `args` in `cwd`, piping stdin/stdout/stderr.
///
/// Stdout is read line-by-line onto a channel; stderr is forwarded to
/// `tracing::warn!` as it arrives, since provider CLIs use it for diagnostic
/// chatter rather than protocol framing.
pub fn spawn(
    provider: &'static str,
    program: &str,
    args: &[&str],
    cwd: &str,
) -> Result<SpawnedProcess, AdapterError> {
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|source| AdapterError::Spawn { provider, source })?;

    #[allow(clippy::expect_used)]
    let stdout = child.stdout.take().expect("stdout was piped");
    #[allow(clippy::expect_used)]
    let stderr = child.stderr.take().expect("stderr was piped");
    #[allow(clippy::expect_used)]
    let mut stdin = child.stdin.take().expect("stdin was piped");

    let (line_tx, stdout_lines) = mpsc::channel(256);
    tokio::spawn(async move {
        let mut reader = BufReader::new(stdout).lines();
        loop {
            match reader.next_line().await {
                Ok(Some(line)) => {
                    if line_tx.send(line).await.is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(%provider, error = %e, "stdout read error");
                    break;
                }
            }
        }
    });

    tokio::spawn(async move {
        let mut reader = BufReader::new(stderr).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            tracing::warn!(%provider, stderr = %line, "provider stderr");
        }
    });

    let (stdin_tx, mut stdin_rx) = mpsc::channel::<String>(64);
    tokio::spawn(async move {
        while let Some(line) = stdin_rx.recv().await {
            if stdin.write_all(line.as_bytes()).await.is_err() {
                break;
            }
            if stdin.write_all(b"\n").await.is_err() {
                break;
            }
            if stdin.flush().await.is_err() {
                break;
            }
        }
    });

    Ok(SpawnedProcess { child, stdout_lines, stdin_tx })
}
