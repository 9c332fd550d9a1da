// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::collections::BTreeMap;
use std::sync::Arc;

use paseo_core::ProviderKind;

use super::*;
use crate::subscriptions::SubscriptionHub;
use crate::timeline_store::TimelineStore;

fn manager() -> (AgentManager, tempfile::TempDir) {
    let tmp = tempfile::tempdir().expect("tempdir");
    let manager = AgentManager::new(
        tmp.path().to_path_buf(),
        Arc::new(TimelineStore::new()),
        Arc::new(SubscriptionHub::new()),
    );
    (manager, tmp)
}

#[tokio::test]
async fn create_agent_is_idle_and_fetchable() {
    let (manager, _tmp) = manager();
    let agent = manager
        .create_agent(ProviderKind::Claude, "/tmp/x".into(), None, None, None, BTreeMap::new())
        .await
        .expect("creates");

    assert_eq!(agent.status, AgentStatus::Idle);
    assert_eq!(agent.title, "claude session");
    assert_eq!(agent.mode_id, "plan");

    let fetched = manager.fetch_agent(&agent.id).expect("fetchable");
    assert_eq!(fetched, agent);
    assert_eq!(manager.fetch_agents().len(), 1);
}

#[tokio::test]
async fn fetch_agent_unknown_id_is_not_found() {
    let (manager, _tmp) = manager();
    let err = manager.fetch_agent(&AgentId::new()).unwrap_err();
    assert_eq!(err.code(), "not_found");
}

#[tokio::test]
async fn operations_on_an_unknown_agent_are_not_found() {
    let (manager, _tmp) = manager();
    let id = AgentId::new();
    assert_eq!(manager.send_message(&id, "hi".into(), Vec::new()).await.unwrap_err().code(), "not_found");
    assert_eq!(manager.cancel_turn(&id).await.unwrap_err().code(), "not_found");
    assert_eq!(manager.archive_agent(&id).await.unwrap_err().code(), "not_found");
}

#[tokio::test]
async fn fetch_directory_lists_only_ui_labeled_non_archived_agents() {
    let (manager, _tmp) = manager();
    let mut ui_labels = BTreeMap::new();
    ui_labels.insert("ui".to_string(), "true".to_string());

    let ui_agent = manager
        .create_agent(ProviderKind::Claude, "/tmp/a".into(), None, None, None, ui_labels)
        .await
        .expect("creates");
    manager
        .create_agent(ProviderKind::Codex, "/tmp/b".into(), None, None, None, BTreeMap::new())
        .await
        .expect("creates");

    let directory = manager.fetch_directory();
    assert_eq!(directory.len(), 1);
    assert_eq!(directory[0].id, ui_agent.id);

    manager.archive_agent(&ui_agent.id).await.expect("archives");
    assert!(manager.fetch_directory().is_empty());
}

#[tokio::test]
async fn archive_agent_transitions_status_and_sets_archived_at() {
    let (manager, _tmp) = manager();
    let agent = manager
        .create_agent(ProviderKind::Claude, "/tmp/x".into(), None, None, None, BTreeMap::new())
        .await
        .expect("creates");

    manager.archive_agent(&agent.id).await.expect("archives");
    let archived = manager.fetch_agent(&agent.id).expect("still fetchable");
    assert_eq!(archived.status, AgentStatus::Archived);
    assert!(archived.archived_at_ms.is_some());
}

#[tokio::test]
async fn update_agent_changes_title_and_labels() {
    let (manager, _tmp) = manager();
    let agent = manager
        .create_agent(ProviderKind::Claude, "/tmp/x".into(), None, None, None, BTreeMap::new())
        .await
        .expect("creates");

    let mut labels = BTreeMap::new();
    labels.insert("k".to_string(), "v".to_string());
    let updated = manager
        .update_agent(&agent.id, Some("new title".into()), Some(labels.clone()))
        .await
        .expect("updates");

    assert_eq!(updated.title, "new title");
    assert_eq!(updated.labels, labels);
}

#[tokio::test]
async fn delete_agent_removes_it_from_the_manager_and_disk() {
    let (manager, tmp) = manager();
    let agent = manager
        .create_agent(ProviderKind::Claude, "/tmp/x".into(), None, None, None, BTreeMap::new())
        .await
        .expect("creates");

    manager.delete_agent(&agent.id).await.expect("deletes");

    assert_eq!(manager.fetch_agent(&agent.id).unwrap_err().code(), "not_found");
    assert!(!tmp.path().join("agents").join(agent.id.as_str()).exists());
}

#[tokio::test]
async fn load_from_disk_restarts_a_task_for_every_persisted_agent() {
    let (manager, tmp) = manager();
    let agent = manager
        .create_agent(ProviderKind::Claude, "/tmp/x".into(), None, None, None, BTreeMap::new())
        .await
        .expect("creates");

    let reloaded = AgentManager::new(
        tmp.path().to_path_buf(),
        Arc::new(TimelineStore::new()),
        Arc::new(SubscriptionHub::new()),
    );
    reloaded.load_from_disk().expect("loads");

    let fetched = reloaded.fetch_agent(&agent.id).expect("restarted");
    assert_eq!(fetched.id, agent.id);
}

#[tokio::test]
async fn list_provider_models_does_not_require_a_live_agent() {
    let (manager, _tmp) = manager();
    let models = manager.list_provider_models(ProviderKind::Claude).await.expect("lists");
    assert!(models.iter().any(|m| m.default));
}
