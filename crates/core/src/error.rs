// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Host error taxonomy (`§7`).
//!
//! Every fallible host operation returns one of these kinds so the session
//! hub can apply a uniform propagation policy: `Validation`/`NotFound`/`Busy`
//! go back to the originating client only; `ProviderFailure` is broadcast to
//! an agent's subscribers; `HostFatal` is logged and the process exits.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum HostError {
    /// Malformed client message. Never disconnects the connection.
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown agent / terminal / subscription / permission request.
    #[error("not found: {0}")]
    NotFound(String),

    /// Operation would conflict with current agent state.
    #[error("busy: {0}")]
    Busy(String),

    /// Upstream provider subprocess failure (exit, parse error).
    #[error("provider failure: {0}")]
    ProviderFailure(String),

    /// Persistence I/O failure, bind failure, corrupted state. The process
    /// should log this and exit non-zero.
    #[error("host fatal: {0}")]
    HostFatal(String),
}

impl HostError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn busy(msg: impl Into<String>) -> Self {
        Self::Busy(msg.into())
    }

    pub fn provider_failure(msg: impl Into<String>) -> Self {
        Self::ProviderFailure(msg.into())
    }

    /// The stable short code carried on `*_response.error` and in
    /// `turn_failed`/`agent_directory` broadcasts.
    pub fn code(&self) -> &'static str {
        match self {
            HostError::Validation(_) => "validation",
            HostError::NotFound(_) => "not_found",
            HostError::Busy(_) => "busy",
            HostError::ProviderFailure(_) => "provider_failure",
            HostError::HostFatal(_) => "host_fatal",
        }
    }

    /// Whether this error terminates the daemon process.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HostError::HostFatal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn code_matches_variant() {
        assert_eq!(HostError::validation("x").code(), "validation");
        assert_eq!(HostError::not_found("x").code(), "not_found");
        assert_eq!(HostError::busy("x").code(), "busy");
        assert_eq!(HostError::provider_failure("x").code(), "provider_failure");
        assert_eq!(HostError::HostFatal("x".into()).code(), "host_fatal");
    }

    #[test]
    fn only_host_fatal_is_fatal() {
        assert!(HostError::HostFatal("x".into()).is_fatal());
        assert!(!HostError::busy("x").is_fatal());
    }
}
