// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Audit trail records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Task;

/// Object type recorded on task lifecycle events.
pub const TASK_OBJECT_TYPE: &str = "task";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub object_type: Option<String>,
    #[serde(default)]
    pub object_id: Option<i64>,
    pub description: String,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

impl Event {
    /// Event about `task`, attributed to its submitting user.
    pub fn for_task(task: &Task, description: impl Into<String>) -> Self {
        Self {
            id: 0,
            user_id: task.user_id,
            project_id: Some(task.project_id),
            object_type: Some(TASK_OBJECT_TYPE.to_string()),
            object_id: Some(task.id),
            description: description.into(),
            created: None,
        }
    }
}
