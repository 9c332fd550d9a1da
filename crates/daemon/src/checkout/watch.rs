// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Filesystem watcher for a single checkout-diff topic. One watcher per
//! `(cwd, mode)` pair runs for as long as any connection is subscribed to
//! it; `mod.rs` dedups watchers and tears them down once the last
//! subscriber leaves.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc as std_mpsc;
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use paseo_core::CheckoutDiffMode;
use tokio::sync::watch;

/// Debounce window: filesystem events tend to arrive in bursts (a save
/// touching several files, or an editor writing via a temp-file-then-rename
/// dance); this coalesces a burst into one recomputation.
const DEBOUNCE: Duration = Duration::from_millis(300);

/// Handle to a running watcher. Dropping it stops the background thread.
pub struct DirWatcher {
    stop: Arc<AtomicBool>,
}

impl Drop for DirWatcher {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::Relaxed);
    }
}

/// Spawns a `notify` watcher on its own thread plus a debounce loop that
/// bumps `version` after a quiet period following the last filesystem
/// event. `mode` only affects which watchers are considered duplicates in
/// `CheckoutEngine` — both diff modes watch the same working tree.
pub fn spawn(cwd: String, _mode: CheckoutDiffMode) -> (DirWatcher, watch::Receiver<u64>) {
    let (version_tx, version_rx) = watch::channel(0u64);
    let stop = Arc::new(AtomicBool::new(false));
    let stop_for_thread = stop.clone();

    std::thread::spawn(move || {
        let (raw_tx, raw_rx) = std_mpsc::channel::<notify::Result<notify::Event>>();
        let mut watcher = match RecommendedWatcher::new(
            move |res| {
                let _ = raw_tx.send(res);
            },
            notify::Config::default(),
        ) {
            Ok(w) => w,
            Err(_) => return,
        };
        if watcher.watch(Path::new(&cwd), RecursiveMode::Recursive).is_err() {
            return;
        }

        let mut version = 0u64;
        while !stop_for_thread.load(Ordering::Relaxed) {
            match raw_rx.recv_timeout(Duration::from_millis(200)) {
                Ok(_) => {
                    // Drain whatever else arrives during the debounce window
                    // so a burst of edits collapses into one recomputation.
                    let deadline = std::time::Instant::now() + DEBOUNCE;
                    loop {
                        let Some(remaining) = deadline.checked_duration_since(std::time::Instant::now()) else {
                            break;
                        };
                        if remaining.is_zero() || raw_rx.recv_timeout(remaining).is_err() {
                            break;
                        }
                    }
                    version += 1;
                    if version_tx.send(version).is_err() {
                        break;
                    }
                }
                Err(std_mpsc::RecvTimeoutError::Timeout) => continue,
                Err(std_mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
    });

    (DirWatcher { stop }, version_rx)
}
