// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine context over in-memory fakes for unit tests.

use std::path::Path;
use std::sync::Arc;
use ty_adapters::{FakeAlertAdapter, FakeBroadcaster, FakeCommandRunner};
use ty_core::{FakeClock, Project, User};
use ty_storage::MemStore;

use crate::arbiter::Arbiter;
use crate::config::EngineConfig;
use crate::runner::EngineContext;
use crate::task_logger::TaskLogger;

pub(crate) struct Fakes {
    pub store: MemStore,
    pub commands: FakeCommandRunner,
    pub broadcaster: FakeBroadcaster,
    pub alerts: FakeAlertAdapter,
}

/// Context rooted at `dir` with project 1 and its member user 10.
pub(crate) fn fake_context(dir: &Path) -> (EngineContext, Fakes) {
    let fakes = Fakes {
        store: MemStore::default(),
        commands: FakeCommandRunner::new(),
        broadcaster: FakeBroadcaster::new(),
        alerts: FakeAlertAdapter::new(),
    };
    fakes.store.insert_project(Project { id: 1, name: "infra".into(), alert: false, alert_chat: None });
    fakes.store.insert_user(1, User { id: 10, username: "ops".into(), email: None });

    let ctx = EngineContext {
        store: Arc::new(fakes.store.clone()),
        broadcaster: Arc::new(fakes.broadcaster.clone()),
        alerts: Arc::new(fakes.alerts.clone()),
        commands: Arc::new(fakes.commands.clone()),
        clock: Arc::new(FakeClock::new()),
        arbiter: Arbiter::spawn(),
        logger: Arc::new(TaskLogger::new(dir.join("logs"))),
        config: Arc::new(EngineConfig::new(dir.join("tmp"), dir.join("logs"))),
    };
    (ctx, fakes)
}
