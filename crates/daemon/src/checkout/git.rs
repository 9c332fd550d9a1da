// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin shell-out wrapper over the `git` binary, used by the checkout-diff
//! watcher and `checkout_status`/`get_highlighted_diff` handlers.
//!
//! Every call runs on a blocking thread (`tokio::task::spawn_blocking`) the
//! same way `paseo-term`'s PTY reader does for its own blocking I/O; none of
//! this goes through `libgit2` since the teacher's own git usage (worktree
//! setup) shells the `git` binary directly rather than linking a git library.

use std::path::Path;
use std::process::Command;

use tokio::task::spawn_blocking;

use super::error::CheckoutError;
use paseo_core::CheckoutDiffMode;

/// One file changed relative to the comparison point for a diff mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangedPath {
    pub path: String,
    pub is_new: bool,
    pub is_deleted: bool,
}

/// Result of `checkout_status` (`spec.md` §6.2, `SPEC_FULL.md` supplemented
/// features).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusResult {
    pub branch: String,
    pub dirty: bool,
    pub ahead: u32,
    pub behind: u32,
}

fn run(cwd: &str, args: &[&str]) -> Result<String, CheckoutError> {
    let output = Command::new("git")
        .args(args)
        .current_dir(cwd)
        .output()
        .map_err(|e| CheckoutError::Spawn(e.to_string()))?;
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if stderr.contains("not a git repository") {
            return Err(CheckoutError::NotARepo(cwd.to_string()));
        }
        return Err(CheckoutError::CommandFailed(stderr));
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

fn current_branch(cwd: &str) -> Result<String, CheckoutError> {
    let out = run(cwd, &["rev-parse", "--abbrev-ref", "HEAD"])?;
    Ok(out.trim().to_string())
}

fn is_dirty(cwd: &str) -> Result<bool, CheckoutError> {
    let out = run(cwd, &["status", "--porcelain=v1"])?;
    Ok(!out.trim().is_empty())
}

/// `(ahead, behind)` against the branch's upstream, or `(0, 0)` when no
/// upstream is configured.
fn ahead_behind(cwd: &str) -> Result<(u32, u32), CheckoutError> {
    let out = match run(cwd, &["rev-list", "--left-right", "--count", "HEAD...@{u}"]) {
        Ok(out) => out,
        Err(CheckoutError::CommandFailed(_)) => return Ok((0, 0)),
        Err(e) => return Err(e),
    };
    let mut parts = out.split_whitespace();
    let ahead = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let behind = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    Ok((ahead, behind))
}

/// Synchronous `checkout_status` computation; wrapped in `spawn_blocking` by
/// [`status`].
fn status_sync(cwd: &str) -> Result<StatusResult, CheckoutError> {
    Ok(StatusResult {
        branch: current_branch(cwd)?,
        dirty: is_dirty(cwd)?,
        ahead: ahead_behind(cwd)?.0,
        behind: ahead_behind(cwd)?.1,
    })
}

pub async fn status(cwd: String) -> Result<StatusResult, CheckoutError> {
    spawn_blocking(move || status_sync(&cwd)).await.map_err(|e| CheckoutError::Spawn(e.to_string()))?
}

/// The ref to diff against for `committed_vs_base`: the merge-base of `HEAD`
/// and the remote's default branch, falling back to `main`/`master` when
/// there is no `origin/HEAD` symbolic ref (e.g. a freshly initialized repo
/// with no remote configured yet).
fn base_ref_sync(cwd: &str) -> Result<String, CheckoutError> {
    if let Ok(out) = run(cwd, &["symbolic-ref", "--quiet", "refs/remotes/origin/HEAD"]) {
        let head = out.trim();
        if let Some(branch) = head.strip_prefix("refs/remotes/") {
            if let Ok(base) = run(cwd, &["merge-base", "HEAD", branch]) {
                return Ok(base.trim().to_string());
            }
        }
    }
    for candidate in ["main", "master"] {
        if let Ok(base) = run(cwd, &["merge-base", "HEAD", candidate]) {
            return Ok(base.trim().to_string());
        }
    }
    Ok(current_branch(cwd)?)
}

fn changed_paths_sync(cwd: &str, mode: CheckoutDiffMode) -> Result<Vec<ChangedPath>, CheckoutError> {
    match mode {
        CheckoutDiffMode::Uncommitted => {
            let out = run(cwd, &["status", "--porcelain=v1"])?;
            Ok(out
                .lines()
                .filter_map(|line| parse_porcelain_line(line))
                .collect())
        }
        CheckoutDiffMode::CommittedVsBase => {
            let base = base_ref_sync(cwd)?;
            let out = run(cwd, &["diff", "--name-status", &format!("{base}..HEAD")])?;
            Ok(out.lines().filter_map(parse_name_status_line).collect())
        }
    }
}

pub async fn changed_paths(
    cwd: String,
    mode: CheckoutDiffMode,
) -> Result<Vec<ChangedPath>, CheckoutError> {
    spawn_blocking(move || changed_paths_sync(&cwd, mode))
        .await
        .map_err(|e| CheckoutError::Spawn(e.to_string()))?
}

/// Parses one `git status --porcelain=v1` line into a [`ChangedPath`].
fn parse_porcelain_line(line: &str) -> Option<ChangedPath> {
    if line.len() < 4 {
        return None;
    }
    let xy = &line[0..2];
    let path = line[3..].to_string();
    // Renames are formatted "R  old -> new"; surface the destination path.
    let path = path.split(" -> ").next_back().unwrap_or(&path).to_string();
    Some(ChangedPath {
        path,
        is_new: xy.contains('?') || xy.starts_with('A'),
        is_deleted: xy.contains('D'),
    })
}

/// Parses one `git diff --name-status` line (e.g. `M\tfoo.rs`,
/// `R100\told.rs\tnew.rs`) into a [`ChangedPath`].
fn parse_name_status_line(line: &str) -> Option<ChangedPath> {
    let mut cols = line.split('\t');
    let status = cols.next()?;
    let first = cols.next()?;
    let path = cols.next().unwrap_or(first).to_string();
    Some(ChangedPath {
        path,
        is_new: status.starts_with('A'),
        is_deleted: status.starts_with('D'),
    })
}

/// Reads a file's content at `rev` (e.g. `"HEAD"` or a commit sha), or
/// `None` if the path doesn't exist at that revision.
fn file_at_rev_sync(cwd: &str, rev: &str, path: &str) -> Option<String> {
    run(cwd, &["show", &format!("{rev}:{path}")]).ok()
}

pub async fn file_at_rev(cwd: String, rev: String, path: String) -> Option<String> {
    spawn_blocking(move || file_at_rev_sync(&cwd, &rev, &path)).await.ok().flatten()
}

pub async fn base_ref(cwd: String) -> Result<String, CheckoutError> {
    spawn_blocking(move || base_ref_sync(&cwd)).await.map_err(|e| CheckoutError::Spawn(e.to_string()))?
}

/// Reads a working-tree file's current content, or `None` if it's absent
/// (deleted, or never existed).
pub async fn working_tree_file(cwd: String, path: String) -> Option<String> {
    spawn_blocking(move || std::fs::read_to_string(Path::new(&cwd).join(&path)).ok())
        .await
        .ok()
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_untracked_file() {
        let c = parse_porcelain_line("?? new.txt").expect("parses");
        assert!(c.is_new);
        assert!(!c.is_deleted);
        assert_eq!(c.path, "new.txt");
    }

    #[test]
    fn parses_deleted_file() {
        let c = parse_porcelain_line(" D gone.txt").expect("parses");
        assert!(c.is_deleted);
        assert!(!c.is_new);
    }

    #[test]
    fn parses_rename_to_destination_path() {
        let c = parse_porcelain_line("R  old.txt -> new.txt").expect("parses");
        assert_eq!(c.path, "new.txt");
    }

    #[test]
    fn parses_name_status_added() {
        let c = parse_name_status_line("A\tfoo.rs").expect("parses");
        assert!(c.is_new);
        assert_eq!(c.path, "foo.rs");
    }

    #[test]
    fn parses_name_status_rename() {
        let c = parse_name_status_line("R100\told.rs\tnew.rs").expect("parses");
        assert_eq!(c.path, "new.rs");
        assert!(!c.is_new);
        assert!(!c.is_deleted);
    }
}
