// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subscription types: named topic bindings on a client connection.

use crate::agent::AgentId;
use crate::terminal::TerminalId;
use serde::{Deserialize, Serialize};

/// Diff mode for a checkout-diff subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutDiffMode {
    Uncommitted,
    CommittedVsBase,
}

/// What a subscription is bound to. The hub guarantees at-most-one live
/// subscription per `(clientId, id)` pair; re-subscribing with the same `id`
/// tears down the previous binding before installing the new one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SubscriptionTarget {
    AgentStream { agent_id: AgentId },
    CheckoutDiff { cwd: String, mode: CheckoutDiffMode },
    Terminal { terminal_id: TerminalId },
    AgentDirectory,
}

impl SubscriptionTarget {
    pub fn topic_key(&self) -> String {
        match self {
            SubscriptionTarget::AgentStream { agent_id } => format!("agent_stream:{agent_id}"),
            SubscriptionTarget::CheckoutDiff { cwd, mode } => {
                format!("checkout_diff:{cwd}:{mode:?}")
            }
            SubscriptionTarget::Terminal { terminal_id } => format!("terminal:{terminal_id}"),
            SubscriptionTarget::AgentDirectory => "agent_directory".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_key_distinguishes_agent_streams() {
        let a = SubscriptionTarget::AgentStream { agent_id: AgentId::from_string("agt-a") };
        let b = SubscriptionTarget::AgentStream { agent_id: AgentId::from_string("agt-b") };
        assert_ne!(a.topic_key(), b.topic_key());
    }

    #[test]
    fn topic_key_stable_for_same_target() {
        let a = SubscriptionTarget::AgentDirectory;
        let b = SubscriptionTarget::AgentDirectory;
        assert_eq!(a.topic_key(), b.topic_key());
    }
}
