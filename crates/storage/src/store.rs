// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The persistence interface consumed by the task runner.

use async_trait::async_trait;
use thiserror::Error;
use ty_core::{
    AccessKey, AccessKeyError, Environment, Event, Inventory, Project, Repository, SecretError,
    Task, TaskStatus, Template, User,
};

#[derive(Debug, Error)]
pub enum StoreError {
    /// A referenced row does not exist
    #[error("{kind} {id} not found")]
    NotFound { kind: &'static str, id: i64 },
    #[error("access key {id}: {source}")]
    Secret {
        id: i64,
        #[source]
        source: SecretError,
    },
    #[error("invalid access key: {0}")]
    InvalidKey(#[from] AccessKeyError),
    #[error("store backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn not_found(kind: &'static str, id: i64) -> Self {
        StoreError::NotFound { kind, id }
    }

    /// Distinguishes a missing referenced entity from an infrastructure failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }
}

/// Paging and ordering for list queries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RetrieveQueryParams {
    pub offset: usize,
    /// `None` returns everything after `offset`
    pub count: Option<usize>,
    pub sort_inverted: bool,
}

/// Row access used by runners, the task pool, and the daemon.
///
/// Implementations must be safe to call concurrently from many runners.
#[async_trait]
pub trait Store: Send + Sync + 'static {
    async fn get_template(&self, project_id: i64, template_id: i64) -> Result<Template, StoreError>;

    async fn get_project(&self, project_id: i64) -> Result<Project, StoreError>;

    async fn get_project_users(
        &self,
        project_id: i64,
        params: &RetrieveQueryParams,
    ) -> Result<Vec<User>, StoreError>;

    async fn get_inventory(&self, project_id: i64, inventory_id: i64)
        -> Result<Inventory, StoreError>;

    async fn get_repository(
        &self,
        project_id: i64,
        repository_id: i64,
    ) -> Result<Repository, StoreError>;

    async fn get_environment(
        &self,
        project_id: i64,
        environment_id: i64,
    ) -> Result<Environment, StoreError>;

    /// Load a key with its secret blob already decoded into the typed variant.
    async fn get_access_key(&self, project_id: i64, key_id: i64) -> Result<AccessKey, StoreError>;

    async fn create_event(&self, event: Event) -> Result<Event, StoreError>;

    async fn create_task(&self, task: Task) -> Result<Task, StoreError>;

    async fn get_task(&self, project_id: i64, task_id: i64) -> Result<Task, StoreError>;

    async fn update_task(&self, task: &Task) -> Result<(), StoreError>;

    /// Tasks currently in any of `statuses`, ordered by id.
    async fn get_tasks_by_status(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>, StoreError>;
}
