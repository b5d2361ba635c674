// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory store.
//!
//! All rows live in one [`StoreState`] behind a mutex. The state is plain
//! serde data so the daemon can persist it as a snapshot between runs.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use ty_core::{
    AccessKey, AccessKeyType, Environment, Event, Inventory, Project, Repository, SecretCipher,
    Task, TaskStatus, Template, User,
};

use crate::store::{RetrieveQueryParams, Store, StoreError};

/// Access key row as persisted: the secret stays sealed at rest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessKeyRecord {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(rename = "type")]
    pub key_type: AccessKeyType,
    /// Output of [`SecretCipher::seal`]
    pub secret: String,
}

/// Every table the store holds.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct StoreState {
    #[serde(default)]
    pub projects: BTreeMap<i64, Project>,
    #[serde(default)]
    pub users: BTreeMap<i64, User>,
    /// project id → member user ids
    #[serde(default)]
    pub project_users: BTreeMap<i64, Vec<i64>>,
    #[serde(default)]
    pub templates: BTreeMap<i64, Template>,
    #[serde(default)]
    pub inventories: BTreeMap<i64, Inventory>,
    #[serde(default)]
    pub repositories: BTreeMap<i64, Repository>,
    #[serde(default)]
    pub environments: BTreeMap<i64, Environment>,
    #[serde(default)]
    pub access_keys: BTreeMap<i64, AccessKeyRecord>,
    #[serde(default)]
    pub tasks: BTreeMap<i64, Task>,
    #[serde(default)]
    pub events: Vec<Event>,
}

impl StoreState {
    fn next_task_id(&self) -> i64 {
        self.tasks.keys().next_back().map_or(1, |id| id + 1)
    }

    fn next_event_id(&self) -> i64 {
        self.events.iter().map(|e| e.id).max().map_or(1, |id| id + 1)
    }
}

/// Thread-safe in-memory [`Store`].
#[derive(Clone)]
pub struct MemStore {
    state: Arc<Mutex<StoreState>>,
    cipher: SecretCipher,
    #[cfg(any(test, feature = "test-support"))]
    fail_writes: Arc<std::sync::atomic::AtomicBool>,
}

impl Default for MemStore {
    fn default() -> Self {
        Self::new(SecretCipher::Plain)
    }
}

impl MemStore {
    pub fn new(cipher: SecretCipher) -> Self {
        Self::from_state(StoreState::default(), cipher)
    }

    /// Wrap previously persisted state. The cipher must match the one the
    /// access keys were sealed with.
    pub fn from_state(state: StoreState, cipher: SecretCipher) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
            cipher,
            #[cfg(any(test, feature = "test-support"))]
            fail_writes: Arc::new(std::sync::atomic::AtomicBool::new(false)),
        }
    }

    /// Clone of the current tables, for snapshotting.
    pub fn state(&self) -> StoreState {
        self.state.lock().clone()
    }

    pub fn insert_project(&self, project: Project) {
        self.state.lock().projects.insert(project.id, project);
    }

    /// Add `user` and make them a member of `project_id`.
    pub fn insert_user(&self, project_id: i64, user: User) {
        let mut state = self.state.lock();
        let members = state.project_users.entry(project_id).or_default();
        if !members.contains(&user.id) {
            members.push(user.id);
        }
        state.users.insert(user.id, user);
    }

    pub fn insert_template(&self, template: Template) {
        self.state.lock().templates.insert(template.id, template);
    }

    pub fn insert_inventory(&self, inventory: Inventory) {
        self.state.lock().inventories.insert(inventory.id, inventory);
    }

    pub fn insert_repository(&self, repository: Repository) {
        self.state.lock().repositories.insert(repository.id, repository);
    }

    pub fn insert_environment(&self, environment: Environment) {
        self.state.lock().environments.insert(environment.id, environment);
    }

    /// Validate and seal `key` before storing it.
    pub fn insert_access_key(&self, key: AccessKey) -> Result<(), StoreError> {
        key.validate()?;
        let secret =
            self.cipher.seal(&key.secret).map_err(|source| StoreError::Secret { id: key.id, source })?;
        let record = AccessKeyRecord {
            id: key.id,
            name: key.name,
            project_id: key.project_id,
            key_type: key.secret.key_type(),
            secret,
        };
        self.state.lock().access_keys.insert(record.id, record);
        Ok(())
    }

    /// Events recorded so far, oldest first.
    pub fn events(&self) -> Vec<Event> {
        self.state.lock().events.clone()
    }

    pub fn task(&self, task_id: i64) -> Option<Task> {
        self.state.lock().tasks.get(&task_id).cloned()
    }

    /// Make every subsequent write fail with a backend error.
    #[cfg(any(test, feature = "test-support"))]
    pub fn inject_write_failure(&self, fail: bool) {
        self.fail_writes.store(fail, std::sync::atomic::Ordering::SeqCst);
    }

    fn check_writable(&self) -> Result<(), StoreError> {
        #[cfg(any(test, feature = "test-support"))]
        if self.fail_writes.load(std::sync::atomic::Ordering::SeqCst) {
            return Err(StoreError::Backend("injected write failure".to_string()));
        }
        Ok(())
    }
}

/// Look up `id` in `table`, requiring it to belong to `project_id`.
fn scoped<T: Clone>(
    table: &BTreeMap<i64, T>,
    kind: &'static str,
    id: i64,
    project_id: i64,
    owner: impl Fn(&T) -> i64,
) -> Result<T, StoreError> {
    table
        .get(&id)
        .filter(|row| owner(row) == project_id)
        .cloned()
        .ok_or(StoreError::not_found(kind, id))
}

#[async_trait]
impl Store for MemStore {
    async fn get_template(&self, project_id: i64, template_id: i64) -> Result<Template, StoreError> {
        let state = self.state.lock();
        scoped(&state.templates, "template", template_id, project_id, |t| t.project_id)
    }

    async fn get_project(&self, project_id: i64) -> Result<Project, StoreError> {
        self.state
            .lock()
            .projects
            .get(&project_id)
            .cloned()
            .ok_or(StoreError::not_found("project", project_id))
    }

    async fn get_project_users(
        &self,
        project_id: i64,
        params: &RetrieveQueryParams,
    ) -> Result<Vec<User>, StoreError> {
        let state = self.state.lock();
        let mut users: Vec<User> = state
            .project_users
            .get(&project_id)
            .into_iter()
            .flatten()
            .filter_map(|id| state.users.get(id).cloned())
            .collect();
        users.sort_by_key(|u| u.id);
        if params.sort_inverted {
            users.reverse();
        }
        let page = users.into_iter().skip(params.offset);
        Ok(match params.count {
            Some(count) => page.take(count).collect(),
            None => page.collect(),
        })
    }

    async fn get_inventory(
        &self,
        project_id: i64,
        inventory_id: i64,
    ) -> Result<Inventory, StoreError> {
        let state = self.state.lock();
        scoped(&state.inventories, "inventory", inventory_id, project_id, |i| i.project_id)
    }

    async fn get_repository(
        &self,
        project_id: i64,
        repository_id: i64,
    ) -> Result<Repository, StoreError> {
        let state = self.state.lock();
        scoped(&state.repositories, "repository", repository_id, project_id, |r| r.project_id)
    }

    async fn get_environment(
        &self,
        project_id: i64,
        environment_id: i64,
    ) -> Result<Environment, StoreError> {
        let state = self.state.lock();
        scoped(&state.environments, "environment", environment_id, project_id, |e| e.project_id)
    }

    async fn get_access_key(&self, project_id: i64, key_id: i64) -> Result<AccessKey, StoreError> {
        let record = {
            let state = self.state.lock();
            state
                .access_keys
                .get(&key_id)
                .filter(|k| k.project_id.is_none_or(|p| p == project_id))
                .cloned()
                .ok_or(StoreError::not_found("access key", key_id))?
        };
        let secret = self
            .cipher
            .open(&record.secret)
            .map_err(|source| StoreError::Secret { id: record.id, source })?;
        Ok(AccessKey { id: record.id, name: record.name, project_id: record.project_id, secret })
    }

    async fn create_event(&self, mut event: Event) -> Result<Event, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock();
        event.id = state.next_event_id();
        state.events.push(event.clone());
        Ok(event)
    }

    async fn create_task(&self, mut task: Task) -> Result<Task, StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock();
        if task.id == 0 || state.tasks.contains_key(&task.id) {
            task.id = state.next_task_id();
        }
        state.tasks.insert(task.id, task.clone());
        Ok(task)
    }

    async fn get_task(&self, project_id: i64, task_id: i64) -> Result<Task, StoreError> {
        let state = self.state.lock();
        scoped(&state.tasks, "task", task_id, project_id, |t| t.project_id)
    }

    async fn update_task(&self, task: &Task) -> Result<(), StoreError> {
        self.check_writable()?;
        let mut state = self.state.lock();
        match state.tasks.get_mut(&task.id) {
            Some(row) => {
                *row = task.clone();
                Ok(())
            }
            None => Err(StoreError::not_found("task", task.id)),
        }
    }

    async fn get_tasks_by_status(&self, statuses: &[TaskStatus]) -> Result<Vec<Task>, StoreError> {
        Ok(self
            .state
            .lock()
            .tasks
            .values()
            .filter(|t| statuses.contains(&t.status))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
