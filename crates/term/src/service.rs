// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Terminal service: owns every live PTY, keyed by id and by `(cwd, name)`
//! for the auto-create-on-first-use flow (`§4.5`).

use std::collections::HashMap;
use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use paseo_core::{TerminalId, TerminalLifecycle, DEFAULT_COLS, DEFAULT_ROWS};
use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};

use crate::error::TermError;
use crate::pty::PtySession;
use crate::screen::Screen;

/// Grace period between SIGTERM and SIGKILL when killing a terminal.
const KILL_GRACE: Duration = Duration::from_millis(500);

/// Raw output broadcast capacity. Slow binary-multiplex subscribers drop
/// the oldest chunks rather than block the PTY reader (`§5` back-pressure).
const RAW_OUTPUT_CAPACITY: usize = 1024;

pub struct Terminal {
    pub id: TerminalId,
    pub cwd: String,
    pub name: String,
    pub created_at_ms: u64,
    pub pty: Arc<PtySession>,
    pub screen: Arc<Screen>,
    pub lifecycle: Mutex<TerminalLifecycle>,
    /// Bumped every time the screen is mutated by new PTY output; hub
    /// subscribers await changes to push a fresh `terminal_state`.
    updates: watch::Sender<u64>,
    /// Raw output bytes, for the binary multiplex `OutputUtf8` channel.
    raw_output: broadcast::Sender<Vec<u8>>,
}

impl Terminal {
    pub fn rows_cols(&self) -> (u16, u16) {
        self.screen.size()
    }

    pub fn subscribe_updates(&self) -> watch::Receiver<u64> {
        self.updates.subscribe()
    }

    pub fn subscribe_raw_output(&self) -> broadcast::Receiver<Vec<u8>> {
        self.raw_output.subscribe()
    }
}

#[derive(Default)]
pub struct TerminalService {
    by_id: Mutex<HashMap<TerminalId, Arc<Terminal>>>,
    by_key: Mutex<HashMap<(String, String), TerminalId>>,
}

impl TerminalService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list_for_cwd(&self, cwd: &str) -> Vec<Arc<Terminal>> {
        self.by_id.lock().values().filter(|t| t.cwd == cwd).cloned().collect()
    }

    /// Every live terminal regardless of `cwd`, used by shutdown to kill
    /// them all without enumerating working directories.
    pub fn list_all(&self) -> Vec<Arc<Terminal>> {
        self.by_id.lock().values().cloned().collect()
    }

    pub fn get(&self, id: &TerminalId) -> Result<Arc<Terminal>, TermError> {
        self.by_id.lock().get(id).cloned().ok_or_else(|| TermError::NotFound(id.to_string()))
    }

    /// Creates a terminal in `cwd`. When `name` is `None`, auto-assigns
    /// `"Terminal N"` where `N` is one past the highest existing index for
    /// that `cwd`, defaulting to `"Terminal 1"` when none exist yet.
    pub fn create(
        &self,
        cwd: &str,
        name: Option<String>,
        now_ms: u64,
    ) -> Result<Arc<Terminal>, TermError> {
        let name = name.unwrap_or_else(|| self.next_default_name(cwd));
        let (pty, mut reader) = PtySession::spawn(cwd, DEFAULT_ROWS, DEFAULT_COLS)?;
        let screen = Arc::new(Screen::new(DEFAULT_ROWS, DEFAULT_COLS, 10_000));

        let id = TerminalId::new();
        let (updates_tx, _) = watch::channel(0u64);
        let (raw_tx, _) = broadcast::channel(RAW_OUTPUT_CAPACITY);
        let terminal = Arc::new(Terminal {
            id: id.clone(),
            cwd: cwd.to_string(),
            name: name.clone(),
            created_at_ms: now_ms,
            pty,
            screen: screen.clone(),
            lifecycle: Mutex::new(TerminalLifecycle::Running),
            updates: updates_tx.clone(),
            raw_output: raw_tx.clone(),
        });

        self.by_id.lock().insert(id.clone(), terminal.clone());
        self.by_key.lock().insert((cwd.to_string(), name), id.clone());

        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 8192];
            let mut version = 0u64;
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        screen.process(&buf[..n]);
                        let _ = raw_tx.send(buf[..n].to_vec());
                        version += 1;
                        let _ = updates_tx.send(version);
                    }
                }
            }
        });

        Ok(terminal)
    }

    fn next_default_name(&self, cwd: &str) -> String {
        let by_key = self.by_key.lock();
        let next = by_key
            .keys()
            .filter(|(k_cwd, name)| k_cwd == cwd && name.starts_with("Terminal "))
            .filter_map(|(_, name)| name.strip_prefix("Terminal ")?.parse::<u32>().ok())
            .max()
            .unwrap_or(0)
            + 1;
        format!("Terminal {next}")
    }

    pub async fn send_input(&self, id: &TerminalId, data: &[u8]) -> Result<(), TermError> {
        self.get(id)?.pty.write(data)
    }

    pub async fn resize(&self, id: &TerminalId, rows: u16, cols: u16) -> Result<(), TermError> {
        let terminal = self.get(id)?;
        terminal.pty.resize(rows, cols)?;
        terminal.screen.resize(rows, cols);
        Ok(())
    }

    pub async fn send_signal(&self, id: &TerminalId, signal: &str) -> Result<(), TermError> {
        self.get(id)?.pty.send_named_signal(signal)
    }

    pub async fn kill(&self, id: &TerminalId) -> Result<(), TermError> {
        let terminal = self.get(id)?;
        *terminal.lifecycle.lock() = TerminalLifecycle::Killing;
        terminal.pty.kill(KILL_GRACE).await?;
        *terminal.lifecycle.lock() = TerminalLifecycle::Dead;
        self.by_id.lock().remove(id);
        self.by_key.lock().retain(|_, v| *v != *id);
        Ok(())
    }
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
