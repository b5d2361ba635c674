// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine wired to in-memory fakes.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use ty_adapters::{CommandSpec, FakeAlertAdapter, FakeBroadcaster, FakeCommandRunner};
use ty_core::{
    AccessKey, FakeClock, Inventory, InventoryKind, KeySecret, Project, Repository, Task,
    TaskStatus, Template, User,
};
use ty_engine::{Arbiter, ConcurrencyMode, EngineConfig, EngineContext, TaskLogger, TaskPool};
use ty_storage::{MemStore, Store};

pub const PROJECT: i64 = 1;
pub const USER: i64 = 10;
pub const TEMPLATE: i64 = 1;
pub const REPOSITORY: i64 = 2;
pub const REPO_KEY: i64 = 3;

pub struct Harness {
    pub dir: TempDir,
    pub store: MemStore,
    pub commands: FakeCommandRunner,
    pub broadcaster: FakeBroadcaster,
    pub alerts: FakeAlertAdapter,
    pub clock: FakeClock,
    pub pool: TaskPool,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_mode(ConcurrencyMode::Global)
    }

    /// Seeded project with one template, a static inventory, and a
    /// repository reachable without credentials. `git clone` creates the
    /// checkout directory.
    pub fn with_mode(mode: ConcurrencyMode) -> Self {
        Self::build(MemStore::default(), mode)
    }

    /// Seed `store` instead of an empty plain-text one.
    pub fn with_store(store: MemStore) -> Self {
        Self::build(store, ConcurrencyMode::Global)
    }

    fn build(store: MemStore, mode: ConcurrencyMode) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let commands = FakeCommandRunner::new();
        let broadcaster = FakeBroadcaster::new();
        let alerts = FakeAlertAdapter::new();
        let clock = FakeClock::new();

        let config = EngineConfig::new(dir.path().join("tmp"), dir.path().join("logs"))
            .with_concurrency_mode(mode);
        let ctx = EngineContext {
            store: Arc::new(store.clone()),
            broadcaster: Arc::new(broadcaster.clone()),
            alerts: Arc::new(alerts.clone()),
            commands: Arc::new(commands.clone()),
            clock: Arc::new(clock.clone()),
            arbiter: Arbiter::spawn(),
            logger: Arc::new(TaskLogger::new(dir.path().join("logs"))),
            config: Arc::new(config),
        };
        let pool = TaskPool::new(ctx);

        store.insert_project(Project { id: PROJECT, name: "infra".into(), alert: false, alert_chat: None });
        store.insert_user(
            PROJECT,
            User { id: USER, username: "ops".into(), email: Some("ops@example.com".into()) },
        );
        store.insert_template(
            Template::builder().id(TEMPLATE).project_id(PROJECT).repository_id(REPOSITORY).build(),
        );
        store.insert_inventory(Inventory {
            id: 1,
            project_id: PROJECT,
            name: "hosts".into(),
            kind: InventoryKind::Static,
            inventory: "[web]\nweb1\n".into(),
            ssh_key_id: None,
            become_key_id: None,
        });
        store.insert_repository(Repository {
            id: REPOSITORY,
            project_id: PROJECT,
            name: "site".into(),
            git_url: "https://git.example.com/site.git".into(),
            ssh_key_id: REPO_KEY,
        });
        store
            .insert_access_key(AccessKey { id: REPO_KEY, name: "anon".into(), project_id: Some(PROJECT), secret: KeySecret::None })
            .unwrap();

        commands.on_call("git", |spec: &CommandSpec| {
            if spec.args.first().map(String::as_str) == Some("clone") {
                if let Some(name) = spec.args.last() {
                    std::fs::create_dir_all(spec.cwd.join(name)).unwrap();
                }
            }
        });

        Self { dir, store, commands, broadcaster, alerts, clock, pool }
    }

    pub fn tmp(&self) -> PathBuf {
        self.dir.path().join("tmp")
    }

    pub fn repo_dir(&self) -> PathBuf {
        self.tmp().join(format!("repository_{REPOSITORY}_{TEMPLATE}"))
    }

    pub fn log_path(&self, task_id: i64) -> PathBuf {
        self.dir.path().join("logs").join("task").join(format!("{task_id}.log"))
    }

    pub fn log(&self, task_id: i64) -> String {
        std::fs::read_to_string(self.log_path(task_id)).unwrap_or_default()
    }

    /// Swap the repository key for `secret`.
    pub fn set_repository_key(&self, secret: KeySecret) {
        self.store
            .insert_access_key(AccessKey { id: REPO_KEY, name: "deploy".into(), project_id: Some(PROJECT), secret })
            .unwrap();
    }

    pub fn set_template(&self, template: Template) {
        self.store.insert_template(template);
    }

    /// Persist a waiting task built from `task`.
    pub async fn create_task(&self, task: Task) -> Task {
        self.store.create_task(task).await.unwrap()
    }

    /// Create, submit, and wait for a task.
    pub async fn run(&self, task: Task) -> (Task, TaskStatus) {
        let task = self.create_task(task).await;
        let handle = self.pool.submit(task.clone()).unwrap();
        let status = tokio::time::timeout(Duration::from_secs(10), handle.wait()).await.unwrap().unwrap();
        (self.store.task(task.id).unwrap(), status)
    }

    /// Descriptions of the audit events recorded for `task_id`.
    pub fn events_for(&self, task_id: i64) -> Vec<String> {
        self.store
            .events()
            .into_iter()
            .filter(|e| e.object_id == Some(task_id))
            .map(|e| e.description)
            .collect()
    }

    /// Statuses pushed to the seeded user for `task_id`, in order.
    pub fn updates_for(&self, task_id: i64) -> Vec<String> {
        self.broadcaster
            .json_for(USER)
            .into_iter()
            .filter(|v| v["task_id"] == task_id)
            .filter_map(|v| v["status"].as_str().map(str::to_string))
            .collect()
    }
}

pub fn task() -> Task {
    Task::builder().id(0).project_id(PROJECT).template_id(TEMPLATE).build()
}

pub fn exists(path: &Path) -> bool {
    path.exists()
}
