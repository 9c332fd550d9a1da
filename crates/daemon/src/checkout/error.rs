// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("failed to execute git: {0}")]
    Spawn(String),

    #[error("not a git repository: {0}")]
    NotARepo(String),

    #[error("git command failed: {0}")]
    CommandFailed(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<CheckoutError> for paseo_core::HostError {
    fn from(e: CheckoutError) -> Self {
        match &e {
            CheckoutError::NotARepo(_) => paseo_core::HostError::validation(e.to_string()),
            _ => paseo_core::HostError::provider_failure(e.to_string()),
        }
    }
}
