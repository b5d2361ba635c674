// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use tempfile::tempdir;
use ty_core::{Project, Task};

fn state_with_task(id: i64) -> StoreState {
    let mut state = StoreState::default();
    state.projects.insert(1, Project { id: 1, name: "ops".into(), alert: false, alert_chat: None });
    state.tasks.insert(id, Task::builder().id(id).build());
    state
}

#[test]
fn missing_snapshot_is_none() {
    let dir = tempdir().unwrap();
    assert!(load_snapshot(&dir.path().join("store.json")).unwrap().is_none());
}

#[test]
fn save_then_load_restores_state() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("nested/store.json");
    save_snapshot(&path, &Snapshot::new(state_with_task(7), Utc::now())).unwrap();

    let loaded = load_snapshot(&path).unwrap().unwrap();
    assert_eq!(loaded.version, CURRENT_SNAPSHOT_VERSION);
    assert_eq!(loaded.state.tasks[&7].id, 7);
    assert_eq!(loaded.state.projects[&1].name, "ops");
    assert!(!path.with_extension("tmp").exists());
}

#[test]
fn second_save_rotates_backup() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    save_snapshot(&path, &Snapshot::new(state_with_task(1), Utc::now())).unwrap();
    save_snapshot(&path, &Snapshot::new(state_with_task(2), Utc::now())).unwrap();

    let backup: Snapshot =
        serde_json::from_slice(&fs::read(path.with_extension("bak")).unwrap()).unwrap();
    assert!(backup.state.tasks.contains_key(&1));
    assert!(load_snapshot(&path).unwrap().unwrap().state.tasks.contains_key(&2));
}

#[test]
fn backups_are_capped() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    for id in 1..=6 {
        save_snapshot(&path, &Snapshot::new(state_with_task(id), Utc::now())).unwrap();
    }
    assert!(path.with_extension("bak").exists());
    assert!(path.with_extension("bak.3").exists());
    assert!(!path.with_extension("bak.4").exists());
}

#[test]
fn newer_version_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("store.json");
    let mut snapshot = Snapshot::new(StoreState::default(), Utc::now());
    snapshot.version = CURRENT_SNAPSHOT_VERSION + 1;
    fs::write(&path, serde_json::to_vec(&snapshot).unwrap()).unwrap();

    assert!(matches!(load_snapshot(&path), Err(SnapshotError::Version(_))));
}
