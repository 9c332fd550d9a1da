// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum TermError {
    #[error("pty error: {0}")]
    Pty(String),

    #[error("terminal not found: {0}")]
    NotFound(String),

    #[error("unknown signal: {0}")]
    UnknownSignal(String),
}

impl From<TermError> for paseo_core::HostError {
    fn from(e: TermError) -> Self {
        match e {
            TermError::NotFound(id) => paseo_core::HostError::not_found(id),
            TermError::Pty(msg) => paseo_core::HostError::HostFatal(msg),
            TermError::UnknownSignal(name) => paseo_core::HostError::validation(name),
        }
    }
}
