// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk persistence under `$PASEO_HOME` (`spec.md` §6.3, `SPEC_FULL.md`
//! §12): the stable `server-id`, per-agent snapshots, and append-only
//! timeline shards used to rebuild the in-memory [`crate::timeline_store`]
//! after a restart.
//!
//! Deliberately synchronous (`std::fs`): callers on the async side wrap
//! calls in `tokio::task::spawn_blocking` where they sit on a hot path
//! (matching the `portable-pty` reader loop in `paseo-term`, which does the
//! same for its own blocking I/O).

use std::path::{Path, PathBuf};

use paseo_core::{Agent, AgentId, TimelineItem};

use crate::error::DaemonError;

const SERVER_ID_LEN: usize = 12;

/// Reads the stable `server-id`, minting and persisting one on first run.
pub fn server_id(paseo_home: &Path) -> Result<String, DaemonError> {
    let path = paseo_home.join("server-id");
    match std::fs::read_to_string(&path) {
        Ok(id) => Ok(id.trim().to_string()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            std::fs::create_dir_all(paseo_home)?;
            let id = nanoid::nanoid!(SERVER_ID_LEN, &nanoid::alphabet::SAFE);
            std::fs::write(&path, &id)?;
            Ok(id)
        }
        Err(e) => Err(DaemonError::Io(e)),
    }
}

fn agent_dir(paseo_home: &Path, id: &AgentId) -> PathBuf {
    paseo_home.join("agents").join(id.as_str())
}

fn agent_snapshot_path(paseo_home: &Path, id: &AgentId) -> PathBuf {
    agent_dir(paseo_home, id).join("agent.json")
}

fn timeline_dir(paseo_home: &Path, id: &AgentId) -> PathBuf {
    agent_dir(paseo_home, id).join("timeline")
}

fn timeline_shard_path(paseo_home: &Path, id: &AgentId, epoch: u32) -> PathBuf {
    timeline_dir(paseo_home, id).join(format!("{epoch}.jsonl"))
}

/// Writes `agent`'s snapshot, overwriting any previous one.
pub fn save_agent_snapshot(paseo_home: &Path, agent: &Agent) -> Result<(), DaemonError> {
    let dir = agent_dir(paseo_home, &agent.id);
    std::fs::create_dir_all(&dir)?;
    let text = serde_json::to_string_pretty(agent)
        .map_err(|e| DaemonError::Config(e.to_string()))?;
    std::fs::write(agent_snapshot_path(paseo_home, &agent.id), text)?;
    Ok(())
}

pub fn load_agent_snapshot(
    paseo_home: &Path,
    id: &AgentId,
) -> Result<Option<Agent>, DaemonError> {
    match std::fs::read_to_string(agent_snapshot_path(paseo_home, id)) {
        Ok(text) => Ok(Some(
            serde_json::from_str(&text).map_err(|e| DaemonError::Config(e.to_string()))?,
        )),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(DaemonError::Io(e)),
    }
}

/// Lists every agent id with a snapshot on disk, in no particular order.
pub fn list_agent_ids(paseo_home: &Path) -> Result<Vec<AgentId>, DaemonError> {
    let dir = paseo_home.join("agents");
    let entries = match std::fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DaemonError::Io(e)),
    };
    let mut ids = Vec::new();
    for entry in entries {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            if let Some(name) = entry.file_name().to_str() {
                ids.push(AgentId::from_string(name));
            }
        }
    }
    Ok(ids)
}

/// Removes an agent's entire on-disk directory (snapshot + timeline shards).
/// Idempotent: a missing directory is not an error.
pub fn delete_agent(paseo_home: &Path, id: &AgentId) -> Result<(), DaemonError> {
    match std::fs::remove_dir_all(agent_dir(paseo_home, id)) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DaemonError::Io(e)),
    }
}

/// Appends one timeline item to the shard for `epoch`, creating the
/// timeline directory on first write.
pub fn append_timeline_item(
    paseo_home: &Path,
    id: &AgentId,
    epoch: u32,
    item: &TimelineItem,
) -> Result<(), DaemonError> {
    use std::io::Write;

    std::fs::create_dir_all(timeline_dir(paseo_home, id))?;
    let mut line = serde_json::to_string(item).map_err(|e| DaemonError::Config(e.to_string()))?;
    line.push('\n');
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(timeline_shard_path(paseo_home, id, epoch))?;
    file.write_all(line.as_bytes())?;
    Ok(())
}

/// Replays every item in a single epoch's shard, in append order.
pub fn load_timeline_shard(
    paseo_home: &Path,
    id: &AgentId,
    epoch: u32,
) -> Result<Vec<TimelineItem>, DaemonError> {
    let text = match std::fs::read_to_string(timeline_shard_path(paseo_home, id, epoch)) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(DaemonError::Io(e)),
    };
    text.lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(|e| DaemonError::Config(e.to_string())))
        .collect()
}

#[cfg(test)]
#[path = "persistence_tests.rs"]
mod tests;
