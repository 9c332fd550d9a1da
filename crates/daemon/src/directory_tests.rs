// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use paseo_core::{AgentId, ProviderKind, UI_LABEL_KEY, UI_LABEL_TRUE};

fn ui_agent() -> Agent {
    let mut a = Agent::new(AgentId::new(), ProviderKind::Claude, "/tmp", "A", "plan", 0);
    a.labels.insert(UI_LABEL_KEY.into(), UI_LABEL_TRUE.into());
    a
}

#[test]
fn newly_labeled_ui_agent_is_an_addition() {
    let before = Agent::new(AgentId::new(), ProviderKind::Claude, "/tmp", "A", "plan", 0);
    let mut after = before.clone();
    after.labels.insert(UI_LABEL_KEY.into(), UI_LABEL_TRUE.into());

    let (_, removed) = membership_delta(Some(&before), &after).unwrap();
    assert!(!removed);
}

#[test]
fn archiving_a_ui_agent_is_a_removal() {
    let before = ui_agent();
    let mut after = before.clone();
    after.archived_at_ms = Some(1000);

    let (_, removed) = membership_delta(Some(&before), &after).unwrap();
    assert!(removed);
}

#[test]
fn non_ui_agent_never_triggers_an_update() {
    let before = Agent::new(AgentId::new(), ProviderKind::Claude, "/tmp", "A", "plan", 0);
    let after = before.clone();
    assert!(membership_delta(Some(&before), &after).is_none());
}

#[test]
fn title_change_on_a_listed_agent_is_still_an_update() {
    let before = ui_agent();
    let mut after = before.clone();
    after.title = "renamed".into();

    let (agent, removed) = membership_delta(Some(&before), &after).unwrap();
    assert!(!removed);
    assert_eq!(agent.title, "renamed");
}

#[test]
fn identical_snapshot_produces_no_update() {
    let before = ui_agent();
    let after = before.clone();
    assert!(membership_delta(Some(&before), &after).is_none());
}

#[test]
fn deletion_of_ui_agent_reports_removal() {
    let agent = ui_agent();
    let (_, removed) = deletion_update(&agent).unwrap();
    assert!(removed);
}

#[test]
fn deletion_of_non_ui_agent_reports_nothing() {
    let agent = Agent::new(AgentId::new(), ProviderKind::Claude, "/tmp", "A", "plan", 0);
    assert!(deletion_update(&agent).is_none());
}
