// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Startup check for tasks a previous daemon run left mid-flight.
//!
//! A task found in `preparing`, `running` or `stopping` has no runner and no
//! process behind it anymore. It is reported and left as-is; nothing resumes
//! or fails it automatically.

use tracing::{info, warn};
use ty_core::TaskStatus;
use ty_storage::{Store, StoreError};

const IN_FLIGHT: [TaskStatus; 3] = [TaskStatus::Preparing, TaskStatus::Running, TaskStatus::Stopping];

/// Log every stranded task and return their ids in ascending order.
pub async fn stranded_tasks(store: &dyn Store) -> Result<Vec<i64>, StoreError> {
    let mut tasks = store.get_tasks_by_status(&IN_FLIGHT).await?;
    tasks.sort_by_key(|t| t.id);

    for task in &tasks {
        warn!(
            task_id = task.id,
            project_id = task.project_id,
            status = %task.status,
            "task stranded by a previous daemon run, leaving it untouched"
        );
    }
    if !tasks.is_empty() {
        info!(count = tasks.len(), "found stranded tasks");
    }

    Ok(tasks.into_iter().map(|t| t.id).collect())
}

#[cfg(test)]
#[path = "reconcile_tests.rs"]
mod tests;
