// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

use crate::error::DaemonError;

/// Resolve `$PASEO_HOME`: `PASEO_HOME` env var, else `~/.paseo`.
pub fn paseo_home(override_dir: Option<PathBuf>) -> Result<PathBuf, DaemonError> {
    if let Some(dir) = override_dir {
        return Ok(dir);
    }
    if let Ok(dir) = std::env::var("PASEO_HOME") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir().map(|h| h.join(".paseo")).ok_or(DaemonError::NoHomeDir)
}
