// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory timeline store (`spec.md` §4.2): append-only per-agent log
//! keyed by `(agentId, epoch, seq)`, with tail/after queries, raw/projected
//! projection, and a bounded-retention eviction policy (`SPEC_FULL.md` §12).

use std::collections::{HashMap, VecDeque};

use paseo_core::{AgentId, TimelineCursor, TimelineItem, TimelineProjection, ToolCallId};
use parking_lot::Mutex;
use tokio::sync::broadcast;

/// Per-agent in-memory retention cap. Bounded default from the documented
/// retention policy (`spec.md` §9 Open Question, resolved in `DESIGN.md`).
pub const TIMELINE_MEMORY_CAP: usize = 5_000;

const SUBSCRIBER_CAPACITY: usize = 1_024;

/// One appended entry and the cursor it was assigned.
pub type TimelineEntry = (TimelineCursor, TimelineItem);

/// Outcome of an `after`-direction query, distinguishing a same-epoch result
/// from an epoch-boundary crossing (`spec.md` §4.2).
#[derive(Debug, Clone, PartialEq)]
pub enum AfterQueryResult {
    Items { cursor: TimelineCursor, items: Vec<TimelineEntry> },
    /// The requested cursor's epoch is stale; the reader should re-subscribe
    /// from `new_cursor`.
    EpochBumped { new_cursor: TimelineCursor },
}

struct AgentLog {
    epoch: u32,
    next_seq: u64,
    items: VecDeque<(u64, TimelineItem)>,
    tx: broadcast::Sender<TimelineEntry>,
}

impl AgentLog {
    fn new() -> Self {
        let (tx, _) = broadcast::channel(SUBSCRIBER_CAPACITY);
        Self { epoch: 0, next_seq: 0, items: VecDeque::new(), tx }
    }

    fn cursor(&self) -> TimelineCursor {
        TimelineCursor { epoch: self.epoch, seq: self.next_seq }
    }

    fn evict_if_needed(&mut self) {
        while self.items.len() > TIMELINE_MEMORY_CAP {
            if let Some(idx) = self.obsolete_tool_call_index() {
                self.items.remove(idx);
            } else {
                self.items.pop_front();
            }
        }
    }

    /// Finds the earliest entry that is a `tool_call` update superseded by a
    /// later entry with the same `call_id`: those are safe to drop before
    /// resorting to truncating whole items outright.
    fn obsolete_tool_call_index(&self) -> Option<usize> {
        for (idx, (_, item)) in self.items.iter().enumerate() {
            let TimelineItem::ToolCall { call_id, .. } = item else { continue };
            if self.items.iter().skip(idx + 1).any(|(_, later)| matches_call_id(later, call_id)) {
                return Some(idx);
            }
        }
        None
    }
}

fn matches_call_id(item: &TimelineItem, call_id: &ToolCallId) -> bool {
    matches!(item, TimelineItem::ToolCall { call_id: other, .. } if other == call_id)
}

#[derive(Default)]
pub struct TimelineStore {
    agents: Mutex<HashMap<AgentId, AgentLog>>,
}

impl TimelineStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `item`, assigning the next `(epoch, seq)` cursor.
    pub fn append(&self, agent_id: &AgentId, item: TimelineItem) -> TimelineCursor {
        let mut agents = self.agents.lock();
        let log = agents.entry(agent_id.clone()).or_insert_with(AgentLog::new);
        let cursor = log.cursor();
        log.items.push_back((cursor.seq, item.clone()));
        log.next_seq += 1;
        log.evict_if_needed();
        let _ = log.tx.send((cursor, item));
        cursor
    }

    /// Bumps an agent's epoch after a crash/rehydration (`spec.md` §4.1),
    /// resetting `seq` to zero and clearing the in-memory buffer. Returns
    /// the new epoch's starting cursor.
    pub fn bump_epoch(&self, agent_id: &AgentId) -> TimelineCursor {
        let mut agents = self.agents.lock();
        let log = agents.entry(agent_id.clone()).or_insert_with(AgentLog::new);
        log.epoch += 1;
        log.next_seq = 0;
        log.items.clear();
        log.cursor()
    }

    pub fn current_cursor(&self, agent_id: &AgentId) -> TimelineCursor {
        self.agents.lock().get(agent_id).map(AgentLog::cursor).unwrap_or(TimelineCursor::START)
    }

    /// `direction=tail`: the last `limit` items in ascending order; `limit
    /// == 0` returns the whole in-memory buffer.
    pub fn tail(
        &self,
        agent_id: &AgentId,
        limit: usize,
        projection: TimelineProjection,
    ) -> Vec<TimelineEntry> {
        let agents = self.agents.lock();
        let Some(log) = agents.get(agent_id) else { return Vec::new() };
        let entries: Vec<TimelineEntry> = log
            .items
            .iter()
            .map(|(seq, item)| (TimelineCursor { epoch: log.epoch, seq: *seq }, item.clone()))
            .collect();
        let projected = project(entries, projection);
        if limit == 0 || limit >= projected.len() {
            projected
        } else {
            projected[projected.len() - limit..].to_vec()
        }
    }

    /// `direction=after`: everything strictly after `cursor` within its
    /// epoch, or an [`AfterQueryResult::EpochBumped`] sentinel if the store
    /// has since moved to a newer epoch.
    pub fn after(
        &self,
        agent_id: &AgentId,
        cursor: TimelineCursor,
        limit: usize,
        projection: TimelineProjection,
    ) -> AfterQueryResult {
        let agents = self.agents.lock();
        let Some(log) = agents.get(agent_id) else {
            return AfterQueryResult::Items { cursor: TimelineCursor::START, items: Vec::new() };
        };
        if cursor.epoch != log.epoch {
            return AfterQueryResult::EpochBumped { new_cursor: log.cursor() };
        }
        let entries: Vec<TimelineEntry> = log
            .items
            .iter()
            .filter(|(seq, _)| *seq > cursor.seq)
            .map(|(seq, item)| (TimelineCursor { epoch: log.epoch, seq: *seq }, item.clone()))
            .collect();
        let mut projected = project(entries, projection);
        if limit > 0 && projected.len() > limit {
            projected.truncate(limit);
        }
        AfterQueryResult::Items { cursor: log.cursor(), items: projected }
    }

    /// Subscribes from `from_cursor` (or the start of the current epoch):
    /// returns the historical backlog plus a receiver for everything
    /// appended from this point on. Computed atomically so nothing is
    /// duplicated or dropped across the backlog/live boundary.
    pub fn subscribe(
        &self,
        agent_id: &AgentId,
        from_cursor: Option<TimelineCursor>,
    ) -> (Vec<TimelineEntry>, broadcast::Receiver<TimelineEntry>) {
        let mut agents = self.agents.lock();
        let log = agents.entry(agent_id.clone()).or_insert_with(AgentLog::new);
        let backlog: Vec<TimelineEntry> = match from_cursor {
            Some(cursor) if cursor.epoch == log.epoch => log
                .items
                .iter()
                .filter(|(seq, _)| *seq > cursor.seq)
                .map(|(seq, item)| (TimelineCursor { epoch: log.epoch, seq: *seq }, item.clone()))
                .collect(),
            _ => log
                .items
                .iter()
                .map(|(seq, item)| (TimelineCursor { epoch: log.epoch, seq: *seq }, item.clone()))
                .collect(),
        };
        (backlog, log.tx.subscribe())
    }
}

fn project(entries: Vec<TimelineEntry>, projection: TimelineProjection) -> Vec<TimelineEntry> {
    if projection == TimelineProjection::Raw {
        return entries;
    }
    let mut latest_index: HashMap<ToolCallId, usize> = HashMap::new();
    for (idx, (_, item)) in entries.iter().enumerate() {
        if let TimelineItem::ToolCall { call_id, .. } = item {
            latest_index.insert(*call_id, idx);
        }
    }
    entries
        .into_iter()
        .enumerate()
        .filter(|(idx, (_, item))| match item {
            TimelineItem::ToolCall { call_id, .. } => latest_index.get(call_id) == Some(idx),
            _ => true,
        })
        .map(|(_, entry)| entry)
        .collect()
}

#[cfg(test)]
#[path = "timeline_store_tests.rs"]
mod tests;
