// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent directory membership: pure logic deciding when a state transition
//! should surface as an `agent_directory_update` (`spec.md` §4.6). Membership
//! is the user-facing set, `labels.ui == "true"` and not archived.

use paseo_core::Agent;

fn is_member(agent: &Agent) -> bool {
    agent.is_ui_facing() && !agent.is_archived()
}

/// Given an agent's state before and after a mutation, decides whether a
/// directory update should be published, and with what `removed` flag.
///
/// Returns `None` when the mutation didn't change directory membership or
/// visible fields of an already-listed agent in a way worth re-announcing.
pub fn membership_delta(before: Option<&Agent>, after: &Agent) -> Option<(Agent, bool)> {
    let was_member = before.map(is_member).unwrap_or(false);
    let is_member_now = is_member(after);
    match (was_member, is_member_now) {
        (false, false) => None,
        (false, true) => Some((after.clone(), false)),
        (true, false) => Some((after.clone(), true)),
        (true, true) => before
            .filter(|b| **b == *after)
            .is_none()
            .then(|| (after.clone(), false)),
    }
}

/// The update to publish when an agent is deleted outright.
pub fn deletion_update(agent: &Agent) -> Option<(Agent, bool)> {
    is_member(agent).then(|| (agent.clone(), true))
}

#[cfg(test)]
#[path = "directory_tests.rs"]
mod tests;
