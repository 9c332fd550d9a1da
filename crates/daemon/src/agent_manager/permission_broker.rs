// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Permission broker (`spec.md` §4.3): FIFO bookkeeping for the permission
//! requests open on one agent's current turn.
//!
//! Each registered request gets a one-shot resolution channel. The agent
//! task's init-timeout watcher holds the receiving half and races it against
//! a 5-minute sleep (`SPEC_FULL.md` §9 Open Questions); `respond_to_permission`
//! and `cancel_turn` resolve the sending half directly through [`resolve`]
//! and [`cancel_all`]. Only one mutator exists per agent (`spec.md` §5), so
//! no locking is needed here beyond what the agent task already provides.

use std::collections::HashMap;

use paseo_core::{HostError, PermissionDecision, PermissionRequestId};
use tokio::sync::oneshot;

/// How a parked permission request was ultimately resolved.
#[derive(Debug)]
pub enum BrokerResolution {
    Decision(PermissionDecision),
    /// The agent was canceled before a decision arrived (`spec.md` §4.1).
    Canceled,
    /// No client resolved it within the init timeout (`spec.md` §4.3).
    TimedOut,
}

struct Pending {
    tx: oneshot::Sender<BrokerResolution>,
}

/// FIFO-ordered table of permission requests awaiting a client decision for
/// one agent's current turn.
#[derive(Default)]
pub struct PermissionBroker {
    order: Vec<PermissionRequestId>,
    pending: HashMap<PermissionRequestId, Pending>,
}

impl PermissionBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_pending(&self, id: &PermissionRequestId) -> bool {
        self.pending.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Registers a new request, returning a receiver that resolves exactly
    /// once: on a client decision, on cancellation, or on timeout.
    pub fn register(&mut self, id: PermissionRequestId) -> oneshot::Receiver<BrokerResolution> {
        let (tx, rx) = oneshot::channel();
        self.order.push(id);
        self.pending.insert(id, Pending { tx });
        rx
    }

    fn take(&mut self, id: &PermissionRequestId) -> Option<Pending> {
        let found = self.pending.remove(id);
        if found.is_some() {
            self.order.retain(|o| o != id);
        }
        found
    }

    /// Delivers a client decision. Idempotent: resolving the same `id`
    /// twice returns `not_found` the second time (`spec.md` §8).
    pub fn resolve(
        &mut self,
        id: &PermissionRequestId,
        decision: PermissionDecision,
    ) -> Result<(), HostError> {
        match self.take(id) {
            Some(pending) => {
                let _ = pending.tx.send(BrokerResolution::Decision(decision));
                Ok(())
            }
            None => {
                Err(HostError::not_found(format!("permission request {id} not found or already resolved")))
            }
        }
    }

    /// Auto-denies `id` on timeout. A no-op if it was already resolved or
    /// canceled (idempotent).
    pub fn timeout(&mut self, id: &PermissionRequestId) {
        if let Some(pending) = self.take(id) {
            let _ = pending.tx.send(BrokerResolution::TimedOut);
        }
    }

    /// Resolves every still-pending request as canceled, e.g. for
    /// `cancelTurn` while `awaiting_permission` (`spec.md` §4.1 edge
    /// policies). Returns the ids that were canceled, in FIFO order.
    pub fn cancel_all(&mut self) -> Vec<PermissionRequestId> {
        let ids = std::mem::take(&mut self.order);
        for id in &ids {
            if let Some(pending) = self.pending.remove(id) {
                let _ = pending.tx.send(BrokerResolution::Canceled);
            }
        }
        ids
    }
}

#[cfg(test)]
#[path = "permission_broker_tests.rs"]
mod tests;
