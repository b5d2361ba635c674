// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task runner: drives one task from `waiting` to a terminal status.
//!
//! ```text
//! acquire slot ─→ preparing ─→ stage workspace ─→ running ─→ success | error
//!      │              │               │              │
//!      └── stop ──────┴───────────────┴──────────────┴──→ stopped
//! ```
//!
//! Every status write goes through [`TaskShared`], which persists the row and
//! then fans the update out to the project's users while holding the task
//! lock, so subscribers observe writes in order.

use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use ty_adapters::{Alert, AlertAdapter, Broadcaster, CommandRunner, CommandSpec};
use ty_core::{
    resolve_status, AccessKey, Clock, Event, Inventory, InventoryKind, Project, Repository, Task,
    TaskStatus, TaskUpdate, Template, User,
};
use ty_storage::{RetrieveQueryParams, Store};

use crate::arbiter::{Arbiter, ArbiterScope};
use crate::config::{ConcurrencyMode, EngineConfig};
use crate::credentials::{install_key, install_vault_password, remove_quietly};
use crate::error::{InfrastructureError, RunError, TaskFailure};
use crate::playbook::{playbook_args, process_env, PlaybookInputs};
use crate::supervisor::{Supervisor, TaskControl};
use crate::task_logger::{TaskLog, TaskLogger};
use crate::workspace::{ensure_tmp_dir, repository_dir, WorkspaceManager};

/// Collaborators shared by every runner.
#[derive(Clone)]
pub struct EngineContext {
    pub store: Arc<dyn Store>,
    pub broadcaster: Arc<dyn Broadcaster>,
    pub alerts: Arc<dyn AlertAdapter>,
    pub commands: Arc<dyn CommandRunner>,
    pub clock: Arc<dyn Clock>,
    pub arbiter: Arbiter,
    pub logger: Arc<TaskLogger>,
    pub config: Arc<EngineConfig>,
}

impl EngineContext {
    fn scope_for(&self, task: &Task) -> ArbiterScope {
        match self.config.concurrency_mode {
            ConcurrencyMode::Global => ArbiterScope::Global,
            ConcurrencyMode::Project => ArbiterScope::Project(task.project_id),
        }
    }
}

/// State of one task shared between its runner and the pool.
pub(crate) struct TaskShared {
    project_id: i64,
    task: Mutex<Task>,
    /// Project users, loaded once; they receive every update
    users: OnceCell<Vec<User>>,
    /// Hosts the playbook targets, from `--list-hosts`
    hosts: parking_lot::Mutex<Vec<String>>,
    pub(crate) control: TaskControl,
}

impl TaskShared {
    pub(crate) fn new(task: Task) -> Self {
        Self {
            project_id: task.project_id,
            task: Mutex::new(task),
            users: OnceCell::new(),
            hosts: parking_lot::Mutex::default(),
            control: TaskControl::new(),
        }
    }

    pub(crate) async fn snapshot(&self) -> Task {
        self.task.lock().await.clone()
    }

    pub(crate) fn record_hosts(&self, hosts: Vec<String>) {
        *self.hosts.lock() = hosts;
    }

    pub(crate) fn hosts(&self) -> Vec<String> {
        self.hosts.lock().clone()
    }

    async fn users(&self, ctx: &EngineContext) -> Result<&[User], InfrastructureError> {
        let users = self
            .users
            .get_or_try_init(|| async {
                let params = RetrieveQueryParams::default();
                ctx.store.get_project_users(self.project_id, &params).await
            })
            .await?;
        Ok(users.as_slice())
    }

    async fn broadcast(&self, ctx: &EngineContext, task: &Task) -> Result<(), InfrastructureError> {
        let users = self.users(ctx).await?;
        let payload = match TaskUpdate::from_task(task).to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(task_id = task.id, error = %e, "failed to encode task update");
                return Ok(());
            }
        };
        for user in users {
            ctx.broadcaster.message(user.id, payload.clone());
        }
        Ok(())
    }

    /// Apply `change` to the task, persist it, and broadcast the update.
    ///
    /// `change` picks the requested status from the current one; the write
    /// is resolved with [`resolve_status`] so a stop in flight wins.
    pub(crate) async fn update<F>(
        &self,
        ctx: &EngineContext,
        change: F,
    ) -> Result<Task, InfrastructureError>
    where
        F: FnOnce(&mut Task) -> TaskStatus,
    {
        let mut task = self.task.lock().await;
        self.write(ctx, &mut task, change).await?;
        Ok(task.clone())
    }

    /// Forward-only write for the non-terminal steps.
    ///
    /// Returns `None` without writing when a stop is pending, leaving the
    /// terminal write (which carries `end`) as the only one that follows.
    pub(crate) async fn advance<F>(
        &self,
        ctx: &EngineContext,
        change: F,
    ) -> Result<Option<Task>, InfrastructureError>
    where
        F: FnOnce(&mut Task) -> TaskStatus,
    {
        let mut task = self.task.lock().await;
        if task.status == TaskStatus::Stopping {
            return Ok(None);
        }
        self.write(ctx, &mut task, change).await?;
        Ok(Some(task.clone()))
    }

    async fn write<F>(
        &self,
        ctx: &EngineContext,
        task: &mut Task,
        change: F,
    ) -> Result<(), InfrastructureError>
    where
        F: FnOnce(&mut Task) -> TaskStatus,
    {
        let current = task.status;
        let mut next = task.clone();
        let target = change(&mut next);
        next.status = resolve_status(current, target)?;
        ctx.store.update_task(&next).await?;
        *task = next;
        tracing::debug!(task_id = task.id, from = %current, to = %task.status, "task status written");
        self.broadcast(ctx, task).await
    }

    /// Mark the task `stopping` and signal its runner.
    ///
    /// Returns the task as it stands afterwards. Terminal tasks are left
    /// untouched.
    pub(crate) async fn request_stop(&self, ctx: &EngineContext) -> Result<Task, InfrastructureError> {
        let task = {
            let mut task = self.task.lock().await;
            if task.status.is_terminal() {
                return Ok(task.clone());
            }
            if task.status != TaskStatus::Stopping {
                let mut next = task.clone();
                next.status = TaskStatus::Stopping;
                ctx.store.update_task(&next).await?;
                *task = next;
                self.broadcast(ctx, &task).await?;
            }
            task.clone()
        };
        self.control.request_stop();
        Ok(task)
    }
}

/// Rows a task needs once admitted.
struct Details {
    template: Template,
    project: Project,
    inventory: Inventory,
    repository: Repository,
    repository_key: AccessKey,
    inventory_key: Option<AccessKey>,
    become_key: Option<AccessKey>,
    vault_key: Option<AccessKey>,
    /// Task inline environment, else the template's
    environment: Option<String>,
}

/// Runner-local bookkeeping used by terminal cleanup.
#[derive(Default)]
struct RunState {
    /// Set once the `preparing` write lands; failures after it must end
    /// the row
    admitted: bool,
    project: Option<Project>,
    alias: Option<String>,
    /// Files written for this task, removed during cleanup
    staged: Vec<(PathBuf, &'static str)>,
}

/// Drives one task.
pub struct TaskRunner {
    ctx: EngineContext,
    shared: Arc<TaskShared>,
}

impl TaskRunner {
    pub(crate) fn new(ctx: EngineContext, shared: Arc<TaskShared>) -> Self {
        Self { ctx, shared }
    }

    /// Run the task to a terminal status.
    ///
    /// `Err` means the task row could not be kept truthful; the slot and
    /// staged files are still released.
    pub async fn run(self) -> Result<TaskStatus, InfrastructureError> {
        let task = self.shared.snapshot().await;
        let log = self.ctx.logger.scoped(task.id);
        let mut state = RunState::default();
        self.shared.users(&self.ctx).await?;

        let scope = self.ctx.scope_for(&task);
        let acquired = tokio::select! {
            slot = self.ctx.arbiter.acquire(task.id, scope) => Some(slot?),
            _ = self.shared.control.stopped() => None,
        };

        let (mut slot, outcome) = match acquired {
            Some(slot) => {
                let outcome = self.execute(&task, &mut state, log).await;
                (Some(slot), outcome)
            }
            None => {
                tracing::info!(task_id = task.id, "task stopped while waiting for a slot");
                (None, Ok(TaskStatus::Stopped))
            }
        };

        let result = match outcome {
            Ok(status) => self.finish(status, None, &mut state, log).await,
            Err(RunError::Task(failure)) => {
                self.finish(TaskStatus::Error, Some(failure), &mut state, log).await
            }
            Err(RunError::Fatal(e)) => {
                if state.admitted {
                    self.fail_admitted(task.id, &e, &mut state, log).await;
                }
                Err(e)
            }
        };

        if result.is_err() {
            self.destroy_staged(&mut state).await;
        }
        if let Some(slot) = slot.as_mut() {
            slot.release();
        }
        result
    }

    /// Admission through executor exit. Returns the status the task should
    /// end in.
    async fn execute(
        &self,
        task: &Task,
        state: &mut RunState,
        log: TaskLog<'_>,
    ) -> Result<TaskStatus, RunError> {
        if self.shared.advance(&self.ctx, |_| TaskStatus::Preparing).await?.is_none() {
            return Ok(TaskStatus::Stopped);
        }
        state.admitted = true;

        let tmp = self.ctx.config.tmp_path();
        ensure_tmp_dir(tmp).await?;

        let details = self.load_details(task, state).await?;
        self.create_event(task, &details.template, "is preparing").await?;
        log.line(&format!("Task {} (template {}) is preparing", task.id, details.template.alias));

        let prepared = self.prepare(task, &details, state, log).await?;
        let Some((supervisor, spec)) = prepared else {
            return Ok(TaskStatus::Stopped);
        };
        self.create_event(task, &details.template, "prepared").await?;

        let clock = Arc::clone(&self.ctx.clock);
        let started = self
            .shared
            .advance(&self.ctx, |t| {
                t.start = Some(clock.now());
                TaskStatus::Running
            })
            .await?;
        if started.is_none() {
            log.line("Stop requested before run start");
            return Ok(TaskStatus::Stopped);
        }
        self.create_event(task, &details.template, "is running").await?;

        if self.shared.control.is_stop_requested() {
            return Ok(TaskStatus::Stopped);
        }

        let exit = supervisor.launch(&spec, &self.shared.control, log).await?;
        if exit.cancelled {
            Ok(TaskStatus::Stopped)
        } else if exit.success() {
            Ok(TaskStatus::Success)
        } else {
            Err(TaskFailure::ExternalCommandFailed {
                command: "ansible-playbook".to_string(),
                code: exit.code,
                stderr: exit.stderr_tail,
            }
            .into())
        }
    }

    /// Stage credentials, source, inventory and roles, then build the
    /// executor invocation. `None` if a stop arrived during host listing.
    async fn prepare(
        &self,
        task: &Task,
        details: &Details,
        state: &mut RunState,
        log: TaskLog<'_>,
    ) -> Result<Option<(Supervisor, CommandSpec)>, RunError> {
        let config = &self.ctx.config;
        let tmp = config.tmp_path();
        let workspace =
            WorkspaceManager::new(tmp, config.executables.clone(), Arc::clone(&self.ctx.commands));
        let environment = details.environment.as_deref();

        if let Some(path) = install_key(&details.repository_key, tmp).await? {
            state.staged.push((path, "access key"));
        }

        let repo_dir = repository_dir(tmp, details.repository.id, details.template.id);
        workspace
            .sync_repository(&details.repository, &details.repository_key, &repo_dir, environment, log)
            .await?;

        let inventory_path = workspace.install_inventory(&details.inventory, task.id).await?;
        if details.inventory.kind == InventoryKind::Static {
            state.staged.push((inventory_path.clone(), "inventory"));
        }
        if let Some(key) = &details.inventory_key {
            if let Some(path) = install_key(key, tmp).await? {
                state.staged.push((path, "access key"));
            }
        }

        workspace
            .install_requirements(&details.repository_key, &repo_dir, environment, log)
            .await?;

        let vault_path = match &details.vault_key {
            Some(key) => {
                let path = install_vault_password(key, tmp).await?;
                state.staged.push((path.clone(), "vault password"));
                Some(path)
            }
            None => None,
        };

        let inputs = PlaybookInputs {
            task,
            template: &details.template,
            inventory_path: &inventory_path,
            inventory_key: details.inventory_key.as_ref(),
            become_key: details.become_key.as_ref(),
            vault_path: vault_path.as_deref(),
            environment,
            tmp,
        };
        let args = playbook_args(&inputs)?;

        // Host credentials travel as executor args; the repository key is
        // only for git.
        let supervisor = Supervisor::new(Arc::clone(&self.ctx.commands), &config.executables.playbook);
        let env = process_env(tmp, &repo_dir, environment, None);
        let spec = supervisor.spec(&args, &repo_dir, env);

        if config.concurrency_mode != ConcurrencyMode::Project {
            let hosts = supervisor.list_hosts(&spec, log).await?;
            tracing::info!(task_id = task.id, hosts = hosts.len(), "hosts enumerated");
            log.line(&format!("Hosts: {}", hosts.join(", ")));
            self.shared.record_hosts(hosts);
        }
        if self.shared.control.is_stop_requested() {
            return Ok(None);
        }
        Ok(Some((supervisor, spec)))
    }

    /// Load every row the task needs. Template alias and project land on
    /// `state` as soon as they are read so a later failure can still alert.
    async fn load_details(&self, task: &Task, state: &mut RunState) -> Result<Details, RunError> {
        let store = &self.ctx.store;
        let project_id = task.project_id;

        let template = store
            .get_template(project_id, task.template_id)
            .await
            .map_err(|e| RunError::from_lookup(e, "template"))?;
        state.alias = Some(template.alias.clone());
        let project = store
            .get_project(project_id)
            .await
            .map_err(|e| RunError::from_lookup(e, "project"))?;
        state.project = Some(project.clone());
        let inventory = store
            .get_inventory(project_id, template.inventory_id)
            .await
            .map_err(|e| RunError::from_lookup(e, "inventory"))?;
        let repository = store
            .get_repository(project_id, template.repository_id)
            .await
            .map_err(|e| RunError::from_lookup(e, "repository"))?;
        let repository_key = self.load_key(project_id, repository.ssh_key_id, "repository key").await?;
        let inventory_key = self.load_optional_key(project_id, inventory.ssh_key_id, "inventory key").await?;
        let become_key = self.load_optional_key(project_id, inventory.become_key_id, "become key").await?;
        let vault_key = self.load_optional_key(project_id, template.vault_key_id, "vault key").await?;

        let environment = match (task.inline_environment(), template.environment_id) {
            (Some(inline), _) => Some(inline.to_string()),
            (None, Some(id)) => Some(
                store
                    .get_environment(project_id, id)
                    .await
                    .map_err(|e| RunError::from_lookup(e, "environment"))?
                    .json,
            ),
            (None, None) => None,
        };

        Ok(Details {
            template,
            project,
            inventory,
            repository,
            repository_key,
            inventory_key,
            become_key,
            vault_key,
            environment,
        })
    }

    async fn load_key(&self, project_id: i64, key_id: i64, what: &str) -> Result<AccessKey, RunError> {
        self.ctx
            .store
            .get_access_key(project_id, key_id)
            .await
            .map_err(|e| RunError::from_lookup(e, what))
    }

    async fn load_optional_key(
        &self,
        project_id: i64,
        key_id: Option<i64>,
        what: &str,
    ) -> Result<Option<AccessKey>, RunError> {
        match key_id {
            Some(id) => self.load_key(project_id, id, what).await.map(Some),
            None => Ok(None),
        }
    }

    async fn create_event(
        &self,
        task: &Task,
        template: &Template,
        what: &str,
    ) -> Result<(), InfrastructureError> {
        let description = format!("Task ID {} ({}) {}", task.id, template.alias, what);
        self.ctx.store.create_event(Event::for_task(task, description)).await?;
        Ok(())
    }

    /// Terminal write, alerts, audit event and file cleanup.
    async fn finish(
        &self,
        outcome: TaskStatus,
        failure: Option<TaskFailure>,
        state: &mut RunState,
        log: TaskLog<'_>,
    ) -> Result<TaskStatus, InfrastructureError> {
        let clock = Arc::clone(&self.ctx.clock);
        let task = self
            .shared
            .update(&self.ctx, |t| {
                t.end = Some(clock.now());
                match t.status {
                    TaskStatus::Stopping => TaskStatus::Stopped,
                    _ => outcome,
                }
            })
            .await?;
        let status = task.status;
        if let Some(failure) = &failure {
            tracing::warn!(task_id = task.id, error = %failure, "task failed");
            log.line(&format!("Task failed: {failure}"));
        }
        let upper = status.to_string().to_uppercase();
        log.line(&format!("Task {} finished - {upper}", task.id));

        if status == TaskStatus::Error {
            self.send_alerts(&task, state).await;
        }

        let description = match &state.alias {
            Some(alias) => format!("Task ID {} ({alias}) finished - {upper}", task.id),
            None => format!("Task ID {} finished - {upper}", task.id),
        };
        if let Err(e) = self.ctx.store.create_event(Event::for_task(&task, description)).await {
            tracing::warn!(task_id = task.id, error = %e, "failed to record terminal event");
        }

        self.destroy_staged(state).await;
        Ok(status)
    }

    /// Best-effort terminal write after an infrastructure failure, so an
    /// admitted task never stays `preparing` or `running`.
    async fn fail_admitted(
        &self,
        task_id: i64,
        error: &InfrastructureError,
        state: &mut RunState,
        log: TaskLog<'_>,
    ) {
        tracing::error!(task_id, error = %error, "task aborted by infrastructure failure");
        log.line(&format!("Task aborted: {error}"));
        if let Err(e) = self.finish(TaskStatus::Error, None, state, log).await {
            tracing::warn!(task_id, error = %e, "failed to record aborted task");
        }
    }

    async fn send_alerts(&self, task: &Task, state: &RunState) {
        let Some(project) = state.project.as_ref().filter(|p| p.alert) else {
            return;
        };
        let recipients = match self.shared.users(&self.ctx).await {
            Ok(users) => users.iter().filter_map(|u| u.email.clone()).collect(),
            Err(e) => {
                tracing::warn!(task_id = task.id, error = %e, "failed to load alert recipients");
                Vec::new()
            }
        };
        let alert = Alert {
            task_id: task.id,
            project_id: project.id,
            project_name: project.name.clone(),
            template_alias: state.alias.clone().unwrap_or_default(),
            status: task.status,
            recipients,
        };
        if let Err(e) = self.ctx.alerts.send_mail(&alert).await {
            tracing::warn!(task_id = task.id, error = %e, "failed to send mail alert");
        }
        if let Some(chat_id) = project.alert_chat.as_deref().filter(|c| !c.is_empty()) {
            if let Err(e) = self.ctx.alerts.send_chat(chat_id, &alert).await {
                tracing::warn!(task_id = task.id, error = %e, "failed to send chat alert");
            }
        }
    }

    async fn destroy_staged(&self, state: &mut RunState) {
        for (path, what) in state.staged.drain(..) {
            remove_quietly(&path, what).await;
        }
    }
}

#[cfg(test)]
#[path = "runner_tests.rs"]
mod tests;
