// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Checkout-diff engine (`spec.md` §4.5, `SPEC_FULL.md` §"Supplemented
//! features"): recomputes a working tree's dirty-file diff on demand and on
//! filesystem change, drives `checkout_status`/`checkout_pr_status`, and
//! renders `get_highlighted_diff`.

mod diff;
mod error;
mod git;
mod watch;

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;

use std::collections::HashMap;
use std::sync::Arc;

use paseo_core::{CheckoutDiffMode, DiffFile, HostError};
use parking_lot::Mutex;

pub use error::CheckoutError;
pub use git::StatusResult;

use crate::subscriptions::SubscriptionHub;
use paseo_wire::Push;

/// `checkout_pr_status` is always a stub (`SPEC_FULL.md` supplemented
/// features): hosting a PR status check requires a forge integration no
/// provider adapter currently offers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrStatus {
    pub available: bool,
}

fn topic_key(cwd: &str, mode: CheckoutDiffMode) -> String {
    format!("checkout_diff:{cwd}:{mode:?}")
}

/// Computes the [`DiffFile`] list for one `(cwd, mode)` pair by comparing
/// each changed path's before/after content.
async fn compute_diff(cwd: &str, mode: CheckoutDiffMode) -> Result<Vec<DiffFile>, CheckoutError> {
    let changed = git::changed_paths(cwd.to_string(), mode).await?;
    let base = match mode {
        CheckoutDiffMode::CommittedVsBase => Some(git::base_ref(cwd.to_string()).await?),
        CheckoutDiffMode::Uncommitted => None,
    };

    let before_rev = base.as_deref();
    let mut files = Vec::with_capacity(changed.len());
    for path in &changed {
        let before = if path.is_new {
            String::new()
        } else {
            match before_rev {
                Some(rev) => git::file_at_rev(cwd.to_string(), rev.to_string(), path.path.clone())
                    .await
                    .unwrap_or_default(),
                None => git::file_at_rev(cwd.to_string(), "HEAD".to_string(), path.path.clone())
                    .await
                    .unwrap_or_default(),
            }
        };
        let after = if path.is_deleted {
            String::new()
        } else {
            match mode {
                CheckoutDiffMode::Uncommitted => {
                    git::working_tree_file(cwd.to_string(), path.path.clone()).await.unwrap_or_default()
                }
                CheckoutDiffMode::CommittedVsBase => {
                    git::file_at_rev(cwd.to_string(), "HEAD".to_string(), path.path.clone())
                        .await
                        .unwrap_or_default()
                }
            }
        };
        files.push(diff::diff_file(path, &before, &after));
    }
    // Deterministic ordering regardless of what order git or the filesystem
    // enumerated paths in (`spec.md` §8: checkout-diff-deterministic-ordering).
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

struct WatchedTopic {
    _watcher: watch::DirWatcher,
    refcount: usize,
}

/// Facade the session hub calls into for everything checkout-related.
/// Dedups one filesystem watcher per `(cwd, mode)` across however many
/// connections subscribe to it.
pub struct CheckoutEngine {
    subscriptions: Arc<SubscriptionHub>,
    watched: Mutex<HashMap<String, WatchedTopic>>,
}

impl CheckoutEngine {
    pub fn new(subscriptions: Arc<SubscriptionHub>) -> Self {
        Self { subscriptions, watched: Mutex::new(HashMap::new()) }
    }

    pub async fn current_diff(&self, cwd: &str, mode: CheckoutDiffMode) -> Result<Vec<DiffFile>, HostError> {
        compute_diff(cwd, mode).await.map_err(HostError::from)
    }

    pub async fn status(&self, cwd: &str) -> Result<StatusResult, HostError> {
        git::status(cwd.to_string()).await.map_err(HostError::from)
    }

    /// Always reports unavailable; no provider adapter surfaces a forge's PR
    /// checks today (`SPEC_FULL.md` supplemented features).
    pub fn pr_status(&self, _cwd: &str) -> PrStatus {
        PrStatus { available: false }
    }

    pub async fn highlighted_diff(&self, cwd: &str, path: &str, mode: CheckoutDiffMode) -> Result<String, HostError> {
        let files = self.current_diff(cwd, mode).await?;
        let file = files
            .into_iter()
            .find(|f| f.path == path)
            .ok_or_else(|| HostError::not_found(format!("{path} has no pending changes in {cwd}")))?;
        Ok(diff::highlighted_diff_html(&file))
    }

    /// Ensures a watcher is running for `(cwd, mode)`, incrementing its
    /// refcount; call [`Self::release`] when the last subscriber for that
    /// topic disconnects or unsubscribes.
    pub fn ensure_watching(&self, cwd: String, mode: CheckoutDiffMode) {
        let key = topic_key(&cwd, mode);
        let mut watched = self.watched.lock();
        if let Some(entry) = watched.get_mut(&key) {
            entry.refcount += 1;
            return;
        }

        let (watcher, mut version_rx) = watch::spawn(cwd.clone(), mode);
        watched.insert(key.clone(), WatchedTopic { _watcher: watcher, refcount: 1 });

        let subscriptions = self.subscriptions.clone();
        tokio::spawn(async move {
            loop {
                if version_rx.changed().await.is_err() {
                    break;
                }
                match compute_diff(&cwd, mode).await {
                    Ok(files) => {
                        let files = files.iter().map(paseo_wire::DiffFileView::from).collect();
                        // subscription_id is filled in per-connection by the
                        // hub when it forwards this push to each writer.
                        subscriptions
                            .publish(
                                &topic_key(&cwd, mode),
                                Push::CheckoutDiffUpdate { subscription_id: String::new(), cwd: cwd.clone(), files },
                            )
                            .await;
                    }
                    Err(_) => continue,
                }
            }
        });
    }

    /// Decrements a topic's refcount, tearing down its watcher once it
    /// reaches zero.
    pub fn release(&self, cwd: &str, mode: CheckoutDiffMode) {
        let key = topic_key(cwd, mode);
        let mut watched = self.watched.lock();
        if let Some(entry) = watched.get_mut(&key) {
            entry.refcount -= 1;
            if entry.refcount == 0 {
                watched.remove(&key);
            }
        }
    }
}
