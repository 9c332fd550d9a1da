// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin wrapper around `portable-pty` for spawning and driving one shell's
//! PTY (`§4.5`).

use std::io::{Read, Write};
use std::sync::Arc;

use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use parking_lot::Mutex;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::error::TermError;

/// A spawned shell and the PTY it's attached to.
pub struct PtySession {
    master: Box<dyn MasterPty + Send>,
    writer: Mutex<Box<dyn Write + Send>>,
    child: Mutex<Box<dyn Child + Send + Sync>>,
}

impl PtySession {
    /// Spawns the user's `$SHELL` (falling back to `/bin/bash`) in `cwd`.
    pub fn spawn(cwd: &str, rows: u16, cols: u16) -> Result<(Arc<Self>, Box<dyn Read + Send>), TermError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| TermError::Pty(e.to_string()))?;

        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
        let mut cmd = CommandBuilder::new(shell);
        cmd.cwd(cwd);

        let child =
            pair.slave.spawn_command(cmd).map_err(|e| TermError::Pty(e.to_string()))?;
        drop(pair.slave);

        let reader = pair.master.try_clone_reader().map_err(|e| TermError::Pty(e.to_string()))?;
        let writer = pair.master.take_writer().map_err(|e| TermError::Pty(e.to_string()))?;

        let session = Arc::new(Self {
            master: pair.master,
            writer: Mutex::new(writer),
            child: Mutex::new(child),
        });
        Ok((session, reader))
    }

    pub fn write(&self, data: &[u8]) -> Result<(), TermError> {
        let mut w = self.writer.lock();
        w.write_all(data).map_err(|e| TermError::Pty(e.to_string()))?;
        w.flush().map_err(|e| TermError::Pty(e.to_string()))
    }

    pub fn resize(&self, rows: u16, cols: u16) -> Result<(), TermError> {
        self.master
            .resize(PtySize { rows, cols, pixel_width: 0, pixel_height: 0 })
            .map_err(|e| TermError::Pty(e.to_string()))
    }

    fn pid(&self) -> Option<i32> {
        self.child.lock().process_id().map(|p| p as i32)
    }

    /// Sends SIGTERM, and if the process is still alive after `grace`,
    /// SIGKILL (`§4.5` kill sequence).
    pub async fn kill(&self, grace: std::time::Duration) -> Result<(), TermError> {
        if let Some(pid) = self.pid() {
            let _ = signal::kill(Pid::from_raw(pid), Signal::SIGTERM);
            tokio::time::sleep(grace).await;
            if self.child.lock().try_wait().ok().flatten().is_none() {
                let _ = signal::kill(Pid::from_raw(pid), Signal::SIGKILL);
            }
        }
        let _ = self.child.lock().kill();
        Ok(())
    }

    pub fn is_alive(&self) -> bool {
        self.child.lock().try_wait().ok().flatten().is_none()
    }

    /// Sends a signal named the way clients send it over the wire (e.g.
    /// `"SIGINT"`, `"INT"`) to the shell process, for `send_terminal_input`'s
    /// `Signal` variant (`§4.5`).
    pub fn send_named_signal(&self, name: &str) -> Result<(), TermError> {
        let signal = parse_signal(name).ok_or_else(|| TermError::UnknownSignal(name.to_string()))?;
        if let Some(pid) = self.pid() {
            signal::kill(Pid::from_raw(pid), signal).map_err(|e| TermError::Pty(e.to_string()))?;
        }
        Ok(())
    }
}

fn parse_signal(name: &str) -> Option<Signal> {
    let name = name.strip_prefix("SIG").unwrap_or(name);
    match name.to_ascii_uppercase().as_str() {
        "INT" => Some(Signal::SIGINT),
        "TERM" => Some(Signal::SIGTERM),
        "KILL" => Some(Signal::SIGKILL),
        "HUP" => Some(Signal::SIGHUP),
        "QUIT" => Some(Signal::SIGQUIT),
        "USR1" => Some(Signal::SIGUSR1),
        "USR2" => Some(Signal::SIGUSR2),
        "WINCH" => Some(Signal::SIGWINCH),
        "CONT" => Some(Signal::SIGCONT),
        "STOP" => Some(Signal::SIGSTOP),
        _ => None,
    }
}

#[cfg(test)]
#[path = "pty_tests.rs"]
mod tests;
