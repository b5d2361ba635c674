// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Hand-off of waiting tasks from the store to the pool.
//!
//! Tasks are created `waiting` by whatever front end writes to the store.
//! The loop polls for them and submits each one to the [`TaskPool`] in id
//! order; the arbiter then admits them first come, first served.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use ty_core::TaskStatus;
use ty_engine::{PoolError, TaskPool};
use ty_storage::{Store, StoreError};

pub struct QueueLoop {
    store: Arc<dyn Store>,
    pool: TaskPool,
    poll: Duration,
}

impl QueueLoop {
    pub fn new(store: Arc<dyn Store>, pool: TaskPool, poll: Duration) -> Self {
        Self { store, pool, poll }
    }

    /// Submit every waiting task the pool is not already running.
    ///
    /// Returns how many tasks were handed over.
    pub async fn hand_off(&self) -> Result<usize, StoreError> {
        let mut waiting = self.store.get_tasks_by_status(&[TaskStatus::Waiting]).await?;
        waiting.sort_by_key(|t| t.id);

        let mut submitted = 0;
        for task in waiting {
            let task_id = task.id;
            if self.pool.is_active(task_id) {
                continue;
            }
            match self.pool.submit(task) {
                Ok(_) => {
                    debug!(task_id, "handed task to pool");
                    submitted += 1;
                }
                // Raced with another submitter
                Err(PoolError::AlreadyActive(_)) => {}
                Err(e) => warn!(task_id, error = %e, "failed to hand off task"),
            }
        }
        Ok(submitted)
    }

    /// Poll until `shutdown` fires.
    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.poll);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    if let Err(e) = self.hand_off().await {
                        warn!(error = %e, "failed to poll waiting tasks");
                    }
                }
            }
        }
        debug!("queue loop stopped");
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
