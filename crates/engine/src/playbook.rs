// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Executor invocation: argument vector, extra-vars and process environment.

use regex::Regex;
use serde_json::{Map, Value};
use std::path::Path;
use std::sync::LazyLock;
use ty_core::{command_environment, parse_environment, AccessKey, KeySecret, Task, Template, ENV_KEY};

use crate::error::TaskFailure;

/// Hosts kept from a `--list-hosts` run.
pub const MAX_LISTED_HOSTS: usize = 20;

// Host lines of `ansible-playbook --list-hosts` are indented by six spaces
#[allow(clippy::expect_used)]
static HOST_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^ {6}(.+)$").expect("constant regex pattern is valid"));

/// Everything the argument vector depends on.
pub struct PlaybookInputs<'a> {
    pub task: &'a Task,
    pub template: &'a Template,
    pub inventory_path: &'a Path,
    pub inventory_key: Option<&'a AccessKey>,
    pub become_key: Option<&'a AccessKey>,
    pub vault_path: Option<&'a Path>,
    /// Effective environment JSON (task inline or template environment)
    pub environment: Option<&'a str>,
    pub tmp: &'a Path,
}

fn login_password(key: Option<&AccessKey>) -> Option<(&str, &str)> {
    match key.map(|k| &k.secret) {
        Some(KeySecret::LoginPassword { login, password }) => Some((login, password)),
        _ => None,
    }
}

/// Build the `--extra-vars` document.
///
/// Connection credentials come first, then the environment overlays them;
/// the reserved `ENV` key is never passed to the executor.
pub fn extra_vars(
    inventory_key: Option<&AccessKey>,
    become_key: Option<&AccessKey>,
    environment: Option<&str>,
) -> Result<Map<String, Value>, serde_json::Error> {
    let mut vars = Map::new();
    let ssh_login = login_password(inventory_key);

    if let Some((login, password)) = ssh_login {
        if !login.is_empty() {
            vars.insert("ansible_user".into(), login.into());
        }
        vars.insert("ansible_password".into(), password.into());
    }

    if let Some((_, become_password)) = login_password(become_key) {
        // The become user is taken from the inventory key's login
        if let Some((login, _)) = ssh_login.filter(|(login, _)| !login.is_empty()) {
            vars.insert("ansible_become_user".into(), login.into());
        }
        vars.insert("ansible_become_password".into(), become_password.into());
    }

    if let Some(json) = environment {
        vars.extend(parse_environment(json)?);
    }
    vars.remove(ENV_KEY);
    Ok(vars)
}

fn parse_arguments(json: Option<&str>, owner: &str) -> Result<Vec<String>, TaskFailure> {
    match json.filter(|s| !s.trim().is_empty()) {
        None => Ok(Vec::new()),
        Some(json) => serde_json::from_str(json).map_err(|e| {
            TaskFailure::InvalidArguments(format!("{owner} arguments must be a list of strings: {e}"))
        }),
    }
}

/// Arguments for `ansible-playbook`.
///
/// With `override_arguments` the template's arguments are the whole vector
/// and no playbook is appended.
pub fn playbook_args(inputs: &PlaybookInputs<'_>) -> Result<Vec<String>, TaskFailure> {
    let template_args = parse_arguments(inputs.template.arguments.as_deref(), "template")?;
    let task_args = parse_arguments(inputs.task.arguments.as_deref(), "task")?;
    if inputs.template.override_arguments {
        return Ok(template_args);
    }

    let mut args = vec!["-i".to_string(), inputs.inventory_path.display().to_string()];

    if let Some(key) = inputs.inventory_key.filter(|k| matches!(k.secret, KeySecret::Ssh { .. })) {
        args.push(format!("--private-key={}", key.path(inputs.tmp).display()));
    }
    if inputs.task.debug {
        args.push("-vvvv".into());
    }
    if inputs.task.dry_run {
        args.push("--check".into());
    }
    if let Some(vault) = inputs.vault_path {
        args.push("--vault-password-file".into());
        args.push(vault.display().to_string());
    }

    match extra_vars(inputs.inventory_key, inputs.become_key, inputs.environment) {
        Ok(vars) if !vars.is_empty() => {
            args.push("--extra-vars".into());
            args.push(Value::Object(vars).to_string());
        }
        Ok(_) => {}
        Err(e) => tracing::warn!(
            task_id = inputs.task.id,
            error = %e,
            "environment is not a JSON object, running without --extra-vars"
        ),
    }

    args.extend(template_args);
    args.extend(task_args);
    args.push(inputs.task.effective_playbook(&inputs.template.playbook).to_string());
    Ok(args)
}

/// Host names from `--list-hosts` output, at most [`MAX_LISTED_HOSTS`].
pub fn parse_hosts(stdout: &str) -> Vec<String> {
    HOST_LINE
        .captures_iter(stdout)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().trim_end().to_string())
        .take(MAX_LISTED_HOSTS)
        .collect()
}

/// `GIT_SSH_COMMAND` that authenticates with the key file at `key_path`.
pub fn git_ssh_command(key_path: &Path) -> String {
    format!("ssh -o StrictHostKeyChecking=no -i {}", key_path.display())
}

/// Variables added to the daemon's environment for every external command.
pub fn process_env(
    home: &Path,
    pwd: &Path,
    environment: Option<&str>,
    ssh_key: Option<&Path>,
) -> Vec<(String, String)> {
    let mut env = vec![
        ("HOME".to_string(), home.display().to_string()),
        ("PWD".to_string(), pwd.display().to_string()),
        ("PYTHONUNBUFFERED".to_string(), "1".to_string()),
    ];
    if let Some(json) = environment {
        env.extend(command_environment(json));
    }
    if let Some(key) = ssh_key {
        env.push(("GIT_SSH_COMMAND".to_string(), git_ssh_command(key)));
    }
    env
}

#[cfg(test)]
#[path = "playbook_tests.rs"]
mod tests;
