// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

/// Failure spawning or talking to a provider subprocess.
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("failed to spawn {provider} subprocess: {source}")]
    Spawn { provider: &'static str, #[source] source: std::io::Error },

    #[error("{provider} exited with status {status}")]
    ExitedUnexpectedly { provider: &'static str, status: String },

    #[error("malformed {provider} stdout line: {0}")]
    Protocol(&'static str, String),

    #[error("turn for agent {0} not found on this adapter instance")]
    TurnNotFound(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<AdapterError> for paseo_core::HostError {
    fn from(e: AdapterError) -> Self {
        paseo_core::HostError::provider_failure(e.to_string())
    }
}
