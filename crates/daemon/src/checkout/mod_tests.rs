// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::process::Command;

use paseo_core::CheckoutDiffMode;
use tempfile::TempDir;

use super::*;

fn git(dir: &std::path::Path, args: &[&str]) {
    let status = Command::new("git")
        .args(args)
        .current_dir(dir)
        .status()
        .expect("git available in test environment");
    assert!(status.success(), "git {args:?} failed");
}

fn init_repo() -> TempDir {
    let tmp = tempfile::tempdir().expect("tempdir");
    git(tmp.path(), &["init", "--initial-branch=main"]);
    git(tmp.path(), &["config", "user.email", "test@example.com"]);
    git(tmp.path(), &["config", "user.name", "Test"]);
    std::fs::write(tmp.path().join("a.txt"), "one\ntwo\nthree\n").expect("write");
    git(tmp.path(), &["add", "."]);
    git(tmp.path(), &["commit", "-m", "initial"]);
    tmp
}

#[tokio::test]
async fn status_reports_clean_repo() {
    let tmp = init_repo();
    let engine = CheckoutEngine::new(Arc::new(SubscriptionHub::new()));
    let status = engine.status(tmp.path().to_str().expect("utf8 path")).await.expect("status");
    assert_eq!(status.branch, "main");
    assert!(!status.dirty);
}

#[tokio::test]
async fn status_reports_dirty_after_edit() {
    let tmp = init_repo();
    std::fs::write(tmp.path().join("a.txt"), "one\nTWO\nthree\n").expect("write");
    let engine = CheckoutEngine::new(Arc::new(SubscriptionHub::new()));
    let status = engine.status(tmp.path().to_str().expect("utf8 path")).await.expect("status");
    assert!(status.dirty);
}

#[tokio::test]
async fn current_diff_uncommitted_reflects_working_tree_edit() {
    let tmp = init_repo();
    std::fs::write(tmp.path().join("a.txt"), "one\nTWO\nthree\n").expect("write");
    let engine = CheckoutEngine::new(Arc::new(SubscriptionHub::new()));
    let files = engine
        .current_diff(tmp.path().to_str().expect("utf8 path"), CheckoutDiffMode::Uncommitted)
        .await
        .expect("diff");
    assert_eq!(files.len(), 1);
    assert_eq!(files[0].path, "a.txt");
    assert_eq!(files[0].additions, 1);
    assert_eq!(files[0].deletions, 1);
}

#[tokio::test]
async fn current_diff_uncommitted_sees_new_untracked_file() {
    let tmp = init_repo();
    std::fs::write(tmp.path().join("new.txt"), "hello\n").expect("write");
    let engine = CheckoutEngine::new(Arc::new(SubscriptionHub::new()));
    let files = engine
        .current_diff(tmp.path().to_str().expect("utf8 path"), CheckoutDiffMode::Uncommitted)
        .await
        .expect("diff");
    assert_eq!(files.len(), 1);
    assert!(files[0].is_new);
}

#[tokio::test]
async fn current_diff_is_sorted_by_path() {
    let tmp = init_repo();
    std::fs::write(tmp.path().join("z.txt"), "z\n").expect("write");
    std::fs::write(tmp.path().join("b.txt"), "b\n").expect("write");
    let engine = CheckoutEngine::new(Arc::new(SubscriptionHub::new()));
    let files = engine
        .current_diff(tmp.path().to_str().expect("utf8 path"), CheckoutDiffMode::Uncommitted)
        .await
        .expect("diff");
    let paths: Vec<&str> = files.iter().map(|f| f.path.as_str()).collect();
    let mut sorted = paths.clone();
    sorted.sort();
    assert_eq!(paths, sorted);
}

#[tokio::test]
async fn highlighted_diff_renders_html_for_changed_path() {
    let tmp = init_repo();
    std::fs::write(tmp.path().join("a.txt"), "one\nTWO\nthree\n").expect("write");
    let engine = CheckoutEngine::new(Arc::new(SubscriptionHub::new()));
    let html = engine
        .highlighted_diff(tmp.path().to_str().expect("utf8 path"), "a.txt", CheckoutDiffMode::Uncommitted)
        .await
        .expect("renders");
    assert!(html.starts_with("<pre"));
}

#[tokio::test]
async fn highlighted_diff_errors_for_unchanged_path() {
    let tmp = init_repo();
    let engine = CheckoutEngine::new(Arc::new(SubscriptionHub::new()));
    let result = engine
        .highlighted_diff(tmp.path().to_str().expect("utf8 path"), "a.txt", CheckoutDiffMode::Uncommitted)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn pr_status_is_always_unavailable() {
    let tmp = init_repo();
    let engine = CheckoutEngine::new(Arc::new(SubscriptionHub::new()));
    assert!(!engine.pr_status(tmp.path().to_str().expect("utf8 path")).available);
}
