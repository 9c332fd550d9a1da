// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon-level errors: failures in process/config/persistence plumbing that
//! sit outside the `§7` host error taxonomy (which governs per-request and
//! per-agent failures once the host is up). These are all `host_fatal` by
//! the time they reach a client, if they ever do.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("could not determine home directory; set PASEO_HOME")]
    NoHomeDir,

    #[error("failed to bind listener at {0}: {1}")]
    BindFailed(String, std::io::Error),

    #[error("invalid listen address {0:?}")]
    InvalidListenAddress(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl From<DaemonError> for paseo_core::HostError {
    fn from(e: DaemonError) -> Self {
        paseo_core::HostError::HostFatal(e.to_string())
    }
}
