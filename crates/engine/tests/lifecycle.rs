// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Status writes, audit trail, alerts, stop handling, and credential cleanup.

mod common;

use common::*;
use std::time::Duration;
use ty_adapters::{AlertCall, CallKind, CommandSpec, FakeResponse};
use ty_core::{
    AccessKey, Environment, Inventory, InventoryKind, KeySecret, Project, Repository, SecretCipher,
    TaskStatus, Template,
};
use ty_engine::{ConcurrencyMode, PoolError};
use ty_storage::MemStore;

async fn wait_for_status(h: &Harness, task_id: i64, status: TaskStatus) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while h.store.task(task_id).map(|t| t.status) != Some(status) {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
}

#[tokio::test]
async fn successful_run_records_each_transition() {
    let h = Harness::new();

    let (task, status) = h.run(task()).await;

    assert_eq!(status, TaskStatus::Success);
    assert!(task.end.unwrap() >= task.start.unwrap());
    assert_eq!(h.updates_for(task.id), vec!["preparing", "running", "success"]);
    assert_eq!(
        h.events_for(task.id),
        vec![
            "Task ID 1 (deploy) is preparing",
            "Task ID 1 (deploy) prepared",
            "Task ID 1 (deploy) is running",
            "Task ID 1 (deploy) finished - SUCCESS",
        ]
    );
    assert!(h.alerts.calls().is_empty());
    assert!(h.log(task.id).contains("Cloning repository https://git.example.com/site.git"));
    assert!(!h.tmp().join("inventory_1").exists());
}

#[tokio::test]
async fn update_envelope_carries_task_fields() {
    let h = Harness::new();

    let (task, _) = h.run(task()).await;

    let last = h.broadcaster.json_for(USER).pop().unwrap();
    assert_eq!(last["type"], "update");
    assert_eq!(last["status"], "success");
    assert_eq!(last["task_id"], task.id);
    assert_eq!(last["project_id"], PROJECT);
    assert!(last["start"].is_string());
    assert!(last["end"].is_string());
}

#[tokio::test]
async fn executor_failure_sends_alerts() {
    let h = Harness::new();
    h.store.insert_project(Project {
        id: PROJECT,
        name: "infra".into(),
        alert: true,
        alert_chat: Some("ops-room".into()),
    });
    h.commands.respond(
        "ansible-playbook",
        CallKind::Supervise,
        FakeResponse::fail(2, "fatal: [web1]: UNREACHABLE!"),
    );

    let (task, status) = h.run(task()).await;

    assert_eq!(status, TaskStatus::Error);
    assert!(h.log(task.id).contains("UNREACHABLE"));
    assert_eq!(h.events_for(task.id).last().unwrap(), "Task ID 1 (deploy) finished - ERROR");
    let calls = h.alerts.calls();
    assert_eq!(calls.len(), 2);
    match &calls[0] {
        AlertCall::Mail(alert) => {
            assert_eq!(alert.recipients, vec!["ops@example.com"]);
            assert_eq!(alert.status, TaskStatus::Error);
            assert_eq!(alert.template_alias, "deploy");
        }
        other => panic!("expected mail alert, got {other:?}"),
    }
    assert!(matches!(&calls[1], AlertCall::Chat { chat_id, .. } if chat_id == "ops-room"));
}

#[tokio::test]
async fn alert_delivery_failure_is_not_fatal() {
    let h = Harness::new();
    h.store.insert_project(Project { id: PROJECT, name: "infra".into(), alert: true, alert_chat: None });
    h.alerts.fail_sends();
    h.commands.respond("ansible-playbook", CallKind::Supervise, FakeResponse::fail(1, "boom"));

    let (task, status) = h.run(task()).await;

    assert_eq!(status, TaskStatus::Error);
    assert_eq!(task.status, TaskStatus::Error);
    assert_eq!(h.alerts.calls().len(), 1);
}

#[tokio::test]
async fn missing_template_fails_the_task() {
    let h = Harness::new();
    let mut t = task();
    t.template_id = 99;

    let (task, status) = h.run(t).await;

    assert_eq!(status, TaskStatus::Error);
    assert!(h.log(task.id).contains("template not found"));
    assert!(h.commands.calls().is_empty());
    assert_eq!(h.events_for(task.id), vec!["Task ID 1 finished - ERROR"]);
}

#[tokio::test]
async fn git_failure_fails_the_task() {
    let h = Harness::new();
    h.commands.respond("git", CallKind::Output, FakeResponse::fail(128, "fatal: could not read from remote"));

    let (task, status) = h.run(task()).await;

    assert_eq!(status, TaskStatus::Error);
    assert!(h.log(task.id).contains("git clone exited with code 128"));
    assert!(h.commands.calls_of("ansible-playbook").is_empty());
}

#[tokio::test]
async fn stop_while_running_signals_the_executor() {
    let h = Harness::new();
    h.commands.respond("ansible-playbook", CallKind::Supervise, FakeResponse::blocking());
    let task = h.create_task(task()).await;
    let handle = h.pool.submit(task.clone()).unwrap();

    wait_for_status(&h, task.id, TaskStatus::Running).await;
    h.pool.stop(task.id).await.unwrap();
    let status = tokio::time::timeout(Duration::from_secs(5), handle.wait()).await.unwrap().unwrap();

    assert_eq!(status, TaskStatus::Stopped);
    assert_eq!(h.updates_for(task.id), vec!["preparing", "running", "stopping", "stopped"]);
    assert_eq!(h.events_for(task.id).last().unwrap(), "Task ID 1 (deploy) finished - STOPPED");
}

#[tokio::test]
async fn stop_while_queued_skips_preparation() {
    let h = Harness::new();
    h.commands.respond("ansible-playbook", CallKind::Supervise, FakeResponse::blocking());
    let first = h.create_task(task()).await;
    let first_handle = h.pool.submit(first.clone()).unwrap();
    wait_for_status(&h, first.id, TaskStatus::Running).await;

    let second = h.create_task(task()).await;
    let second_handle = h.pool.submit(second.clone()).unwrap();
    h.pool.stop(second.id).await.unwrap();
    let status = tokio::time::timeout(Duration::from_secs(5), second_handle.wait()).await.unwrap().unwrap();

    assert_eq!(status, TaskStatus::Stopped);
    assert_eq!(h.updates_for(second.id), vec!["stopping", "stopped"]);
    assert_eq!(h.commands.calls_of("git").len(), 1);

    h.pool.stop(first.id).await.unwrap();
    assert_eq!(first_handle.wait().await.unwrap(), TaskStatus::Stopped);
}

#[tokio::test]
async fn stop_after_finish_is_rejected() {
    let h = Harness::new();
    let (task, _) = h.run(task()).await;

    let err = h.pool.stop(task.id).await.unwrap_err();

    assert!(matches!(err, PoolError::NotActive(id) if id == task.id));
}

#[tokio::test]
async fn credentials_exist_only_while_the_task_runs() {
    let h = Harness::new();
    h.set_repository_key(KeySecret::Ssh { private_key: "REPO-PEM".into(), passphrase: String::new() });
    h.store
        .insert_access_key(AccessKey {
            id: 5,
            name: "hosts".into(),
            project_id: Some(PROJECT),
            secret: KeySecret::Ssh { private_key: "HOST-PEM".into(), passphrase: String::new() },
        })
        .unwrap();
    h.store
        .insert_access_key(AccessKey {
            id: 6,
            name: "vault".into(),
            project_id: Some(PROJECT),
            secret: KeySecret::LoginPassword { login: String::new(), password: "open-sesame".into() },
        })
        .unwrap();
    h.store.insert_inventory(Inventory {
        id: 1,
        project_id: PROJECT,
        name: "hosts".into(),
        kind: InventoryKind::Static,
        inventory: "[web]\nweb1\n".into(),
        ssh_key_id: Some(5),
        become_key_id: None,
    });
    h.set_template(
        Template::builder().id(TEMPLATE).project_id(PROJECT).repository_id(REPOSITORY).vault_key_id(6).build(),
    );
    let tmp = h.tmp();
    let seen = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
    {
        let seen = std::sync::Arc::clone(&seen);
        let tmp = tmp.clone();
        h.commands.on_call("ansible-playbook", move |_: &CommandSpec| {
            let files = ["access_key_3", "access_key_5", "access_key_6", "inventory_1"];
            seen.lock().push(files.iter().all(|f| tmp.join(f).exists()));
        });
    }

    let (task, status) = h.run(task()).await;

    assert_eq!(status, TaskStatus::Success);
    assert!(!seen.lock().is_empty());
    assert!(seen.lock().iter().all(|present| *present));
    for file in ["access_key_3", "access_key_5", "access_key_6", "inventory_1"] {
        assert!(!tmp.join(file).exists(), "{file} left behind by task {}", task.id);
    }

    let git = &h.commands.calls_of("git")[0].spec;
    assert!(git.env_var("GIT_SSH_COMMAND").unwrap().ends_with("access_key_3"));
    let run = h
        .commands
        .calls_of("ansible-playbook")
        .into_iter()
        .find(|c| c.kind == CallKind::Supervise)
        .unwrap()
        .spec;
    assert_eq!(run.env_var("GIT_SSH_COMMAND"), None);
    let listing = h
        .commands
        .calls_of("ansible-playbook")
        .into_iter()
        .find(|c| c.kind == CallKind::Output)
        .unwrap()
        .spec;
    assert_eq!(listing.env_var("GIT_SSH_COMMAND"), None);
    let key_arg = format!("--private-key={}", tmp.join("access_key_5").display());
    assert!(run.args.contains(&key_arg));
    let vault = run.args.iter().position(|a| a == "--vault-password-file").unwrap();
    assert_eq!(run.args[vault + 1], tmp.join("access_key_6").display().to_string());
}

#[tokio::test]
async fn enumerated_hosts_stay_with_the_active_task() {
    let h = Harness::new();
    h.commands.respond(
        "ansible-playbook",
        CallKind::Output,
        FakeResponse::stdout("  play #1 (web): web\n    hosts (2):\n      web1\n      web2\n"),
    );
    h.commands.respond("ansible-playbook", CallKind::Supervise, FakeResponse::blocking());
    let task = h.create_task(task()).await;
    assert_eq!(h.pool.hosts(task.id), None);
    let handle = h.pool.submit(task.clone()).unwrap();

    wait_for_status(&h, task.id, TaskStatus::Running).await;
    assert_eq!(h.pool.hosts(task.id), Some(vec!["web1".to_string(), "web2".to_string()]));
    assert!(h.log(task.id).contains("Hosts: web1, web2"));

    h.pool.stop(task.id).await.unwrap();
    assert_eq!(handle.wait().await.unwrap(), TaskStatus::Stopped);
    assert_eq!(h.pool.hosts(task.id), None);
}

#[tokio::test]
async fn template_environment_is_used_without_inline_one() {
    let h = Harness::new();
    h.store.insert_environment(Environment {
        id: 7,
        project_id: PROJECT,
        name: "eu".into(),
        json: r#"{"region":"eu-west-1"}"#.into(),
    });
    h.set_template(
        Template::builder().id(TEMPLATE).project_id(PROJECT).repository_id(REPOSITORY).environment_id(7).build(),
    );

    h.run(task()).await;

    let run = h
        .commands
        .calls_of("ansible-playbook")
        .into_iter()
        .find(|c| c.kind == CallKind::Supervise)
        .unwrap()
        .spec;
    let at = run.args.iter().position(|a| a == "--extra-vars").unwrap();
    assert_eq!(run.args[at + 1], r#"{"region":"eu-west-1"}"#);
}

#[tokio::test]
async fn project_mode_skips_host_listing_and_runs_projects_in_parallel() {
    let h = Harness::with_mode(ConcurrencyMode::Project);
    let other = 2;
    h.store.insert_project(Project { id: other, name: "apps".into(), alert: false, alert_chat: None });
    h.store.insert_template(
        Template::builder().id(20).project_id(other).inventory_id(21).repository_id(22).build(),
    );
    h.store.insert_inventory(Inventory {
        id: 21,
        project_id: other,
        name: "apps".into(),
        kind: InventoryKind::File,
        inventory: "/etc/ansible/hosts".into(),
        ssh_key_id: None,
        become_key_id: None,
    });
    h.store.insert_repository(Repository {
        id: 22,
        project_id: other,
        name: "apps".into(),
        git_url: "https://git.example.com/apps.git#main".into(),
        ssh_key_id: 23,
    });
    h.store
        .insert_access_key(AccessKey { id: 23, name: "anon".into(), project_id: Some(other), secret: KeySecret::None })
        .unwrap();
    h.commands.set_default(
        "ansible-playbook",
        CallKind::Supervise,
        FakeResponse::ok().with_delay(Duration::from_millis(200)),
    );

    let a = h.create_task(task()).await;
    let mut b = task();
    b.project_id = other;
    b.template_id = 20;
    let b = h.create_task(b).await;
    let handles = vec![h.pool.submit(a).unwrap(), h.pool.submit(b).unwrap()];
    for handle in handles {
        assert_eq!(handle.wait().await.unwrap(), TaskStatus::Success);
    }

    assert_eq!(h.commands.max_concurrent(), 2);
    assert!(h
        .commands
        .calls_of("ansible-playbook")
        .iter()
        .all(|c| c.kind == CallKind::Supervise));
    let branches: Vec<_> = h
        .commands
        .calls_of("git")
        .into_iter()
        .map(|c| c.spec.args[3].clone())
        .collect();
    assert!(branches.contains(&"main".to_string()));
}

#[tokio::test]
async fn store_failure_escapes_and_frees_the_slot() {
    let h = Harness::new();
    let doomed = h.create_task(task()).await;
    h.store.inject_write_failure(true);
    let handle = h.pool.submit(doomed).unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), handle.wait()).await.unwrap().unwrap_err();
    assert!(matches!(err, PoolError::Fatal(_)));

    h.store.inject_write_failure(false);
    let (task, status) = h.run(task()).await;
    assert_eq!(status, TaskStatus::Success);
    assert_eq!(task.status, TaskStatus::Success);
}

#[tokio::test]
async fn unreadable_key_after_admission_ends_the_task_in_error() {
    let sealing = MemStore::new(SecretCipher::from_passphrase("old-key"));
    sealing
        .insert_access_key(AccessKey {
            id: 9,
            name: "rotated".into(),
            project_id: Some(PROJECT),
            secret: KeySecret::Ssh { private_key: "PEM".into(), passphrase: String::new() },
        })
        .unwrap();
    let h = Harness::with_store(MemStore::from_state(sealing.state(), SecretCipher::from_passphrase("new-key")));
    h.store.insert_project(Project { id: PROJECT, name: "infra".into(), alert: true, alert_chat: None });
    h.store.insert_repository(Repository {
        id: REPOSITORY,
        project_id: PROJECT,
        name: "site".into(),
        git_url: "https://git.example.com/site.git".into(),
        ssh_key_id: 9,
    });
    let doomed = h.create_task(task()).await;
    let handle = h.pool.submit(doomed.clone()).unwrap();

    let err = tokio::time::timeout(Duration::from_secs(5), handle.wait()).await.unwrap().unwrap_err();
    assert!(matches!(err, PoolError::Fatal(_)));

    let stored = h.store.task(doomed.id).unwrap();
    assert_eq!(stored.status, TaskStatus::Error);
    assert!(stored.end.is_some());
    assert_eq!(h.updates_for(doomed.id), vec!["preparing", "error"]);
    assert_eq!(h.events_for(doomed.id), vec!["Task ID 1 (deploy) finished - ERROR"]);
    assert!(matches!(
        h.alerts.calls().as_slice(),
        [AlertCall::Mail(alert)] if alert.status == TaskStatus::Error && alert.template_alias == "deploy"
    ));
    assert!(h.commands.calls().is_empty());
    assert!(h.log(doomed.id).contains("Task aborted"));
}
