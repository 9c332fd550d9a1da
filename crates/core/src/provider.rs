// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Provider identity: the external coding-agent CLI backing an [`crate::Agent`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tagged variant identifying which upstream agent CLI an [`crate::Agent`] runs.
///
/// Determines the spawn command, the set of published modes, and whether the
/// provider supports session persistence across a crash (see
/// [`SessionPersistenceKind`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Claude,
    Codex,
    Opencode,
}

impl ProviderKind {
    pub const ALL: [ProviderKind; 3] = [ProviderKind::Claude, ProviderKind::Codex, ProviderKind::Opencode];

    pub fn as_str(&self) -> &'static str {
        match self {
            ProviderKind::Claude => "claude",
            ProviderKind::Codex => "codex",
            ProviderKind::Opencode => "opencode",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "claude" => Some(ProviderKind::Claude),
            "codex" => Some(ProviderKind::Codex),
            "opencode" => Some(ProviderKind::Opencode),
            _ => None,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a provider can resume an interrupted session after a crash.
///
/// Providers with `SessionId` persistence let the agent manager rehydrate by
/// passing the saved session identifier back to a freshly spawned process;
/// `None` providers start the turn over from the timeline's last user message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPersistenceKind {
    None,
    SessionId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_round_trips_all_variants() {
        for p in ProviderKind::ALL {
            assert_eq!(ProviderKind::parse(p.as_str()), Some(p));
        }
    }

    #[test]
    fn parse_rejects_unknown() {
        assert_eq!(ProviderKind::parse("gpt5"), None);
    }
}
