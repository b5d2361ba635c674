// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Registry of in-flight runners: submission, stop requests, and shutdown.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use ty_core::{Task, TaskStatus};

use crate::error::{InfrastructureError, PoolError};
use crate::runner::{EngineContext, TaskRunner, TaskShared};

/// Completion handle for a submitted task.
pub struct TaskHandle {
    task_id: i64,
    join: JoinHandle<Result<TaskStatus, InfrastructureError>>,
}

impl TaskHandle {
    pub fn task_id(&self) -> i64 {
        self.task_id
    }

    /// Wait for the runner and return the terminal status.
    pub async fn wait(self) -> Result<TaskStatus, PoolError> {
        match self.join.await {
            Ok(result) => Ok(result?),
            Err(_) => Err(PoolError::RunnerLost { id: self.task_id }),
        }
    }
}

/// Spawns one runner per submitted task and keeps it addressable until it
/// finishes.
#[derive(Clone)]
pub struct TaskPool {
    ctx: EngineContext,
    active: Arc<Mutex<HashMap<i64, Arc<TaskShared>>>>,
    idle: Arc<Notify>,
}

impl TaskPool {
    pub fn new(ctx: EngineContext) -> Self {
        Self { ctx, active: Arc::default(), idle: Arc::new(Notify::new()) }
    }

    pub fn context(&self) -> &EngineContext {
        &self.ctx
    }

    /// Start a runner for a `waiting` task.
    pub fn submit(&self, task: Task) -> Result<TaskHandle, PoolError> {
        if task.status != TaskStatus::Waiting {
            return Err(PoolError::NotWaiting { id: task.id, status: task.status });
        }
        let task_id = task.id;
        let shared = {
            let mut active = self.active.lock();
            if active.contains_key(&task_id) {
                return Err(PoolError::AlreadyActive(task_id));
            }
            let shared = Arc::new(TaskShared::new(task));
            active.insert(task_id, Arc::clone(&shared));
            shared
        };
        tracing::info!(task_id, "task submitted");

        let runner = TaskRunner::new(self.ctx.clone(), shared);
        let active = Arc::clone(&self.active);
        let idle = Arc::clone(&self.idle);
        let join = tokio::spawn(async move {
            let result = runner.run().await;
            match &result {
                Ok(status) => tracing::info!(task_id, %status, "task finished"),
                Err(e) => tracing::error!(task_id, error = %e, "task runner failed"),
            }
            let mut active = active.lock();
            active.remove(&task_id);
            if active.is_empty() {
                idle.notify_waiters();
            }
            result
        });
        Ok(TaskHandle { task_id, join })
    }

    /// Ask a running or queued task to stop.
    ///
    /// The task is marked `stopping` right away; its runner settles it to
    /// `stopped`.
    pub async fn stop(&self, task_id: i64) -> Result<Task, PoolError> {
        let Some(shared) = self.active.lock().get(&task_id).cloned() else {
            return Err(PoolError::NotActive(task_id));
        };
        let task = shared.request_stop(&self.ctx).await?;
        if task.status.is_terminal() {
            return Err(PoolError::Finished { id: task_id, status: task.status });
        }
        tracing::info!(task_id, "stop requested");
        Ok(task)
    }

    /// Current row of an active task.
    pub async fn get(&self, task_id: i64) -> Option<Task> {
        let shared = self.active.lock().get(&task_id).cloned()?;
        Some(shared.snapshot().await)
    }

    /// Host list of an active task; empty until enumeration has run.
    pub fn hosts(&self, task_id: i64) -> Option<Vec<String>> {
        let shared = self.active.lock().get(&task_id).cloned()?;
        Some(shared.hosts())
    }

    pub fn is_active(&self, task_id: i64) -> bool {
        self.active.lock().contains_key(&task_id)
    }

    /// Ids of tasks with a live runner, ascending.
    pub fn active_ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.active.lock().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Resolves once no runner is active.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.idle.notified();
            if self.active.lock().is_empty() {
                return;
            }
            notified.await;
        }
    }

    /// Stop every active task and wait for the runners to settle.
    pub async fn shutdown(&self) {
        for task_id in self.active_ids() {
            match self.stop(task_id).await {
                Ok(_) | Err(PoolError::NotActive(_) | PoolError::Finished { .. }) => {}
                Err(e) => tracing::warn!(task_id, error = %e, "failed to stop task on shutdown"),
            }
        }
        self.wait_idle().await;
    }
}

#[cfg(test)]
#[path = "pool_tests.rs"]
mod tests;
