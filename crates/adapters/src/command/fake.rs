// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Scripted [`CommandRunner`] for tests.

use super::{CommandOutput, CommandRunner, CommandSpec, ProcessExit};
use crate::subprocess::SubprocessError;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;

/// Which runner entry point a call went through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Output,
    Supervise,
}

/// Recorded invocation
#[derive(Debug, Clone)]
pub struct CommandCall {
    pub kind: CallKind,
    pub spec: CommandSpec,
}

/// Scripted result for one call
#[derive(Debug, Clone)]
pub struct FakeResponse {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub delay: Duration,
    /// Supervised calls only: run until cancelled
    pub block: bool,
}

impl FakeResponse {
    pub fn ok() -> Self {
        Self {
            code: Some(0),
            stdout: String::new(),
            stderr: String::new(),
            delay: Duration::ZERO,
            block: false,
        }
    }

    pub fn stdout(stdout: impl Into<String>) -> Self {
        Self { stdout: stdout.into(), ..Self::ok() }
    }

    pub fn fail(code: i32, stderr: impl Into<String>) -> Self {
        Self { code: Some(code), stderr: stderr.into(), ..Self::ok() }
    }

    pub fn blocking() -> Self {
        Self { block: true, ..Self::ok() }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

/// Pauses the next matching call until the test opens it.
#[derive(Clone, Default)]
pub struct FakeGate {
    reached: Arc<Notify>,
    open: Arc<Notify>,
}

impl FakeGate {
    /// Wait until a call has arrived at the gate.
    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    /// Let the waiting call continue.
    pub fn open(&self) {
        self.open.notify_one();
    }

    async fn pass(&self) {
        self.reached.notify_one();
        self.open.notified().await;
    }
}

type Hook = Arc<dyn Fn(&CommandSpec) + Send + Sync>;
type Key = (String, CallKind);

#[derive(Default)]
struct FakeCommandState {
    calls: Vec<CommandCall>,
    scripted: HashMap<Key, VecDeque<FakeResponse>>,
    defaults: HashMap<Key, FakeResponse>,
    hooks: HashMap<String, Hook>,
    gates: HashMap<Key, FakeGate>,
    running: usize,
    max_running: usize,
}

/// Fake command runner: scripted responses keyed by program name and entry
/// point, every call recorded. Unscripted calls succeed with no output.
#[derive(Clone, Default)]
pub struct FakeCommandRunner {
    inner: Arc<Mutex<FakeCommandState>>,
}

impl FakeCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue `response` for the next unanswered call of `program`.
    pub fn respond(&self, program: &str, kind: CallKind, response: FakeResponse) {
        self.inner.lock().scripted.entry((program.to_string(), kind)).or_default().push_back(response);
    }

    /// Response used once the queue for `program` is empty.
    pub fn set_default(&self, program: &str, kind: CallKind, response: FakeResponse) {
        self.inner.lock().defaults.insert((program.to_string(), kind), response);
    }

    /// Run `hook` on every call of `program` before it responds, e.g. to
    /// create the files a real clone would.
    pub fn on_call(&self, program: &str, hook: impl Fn(&CommandSpec) + Send + Sync + 'static) {
        self.inner.lock().hooks.insert(program.to_string(), Arc::new(hook));
    }

    /// Pause the next call of `program` until the returned gate is opened.
    pub fn gate(&self, program: &str, kind: CallKind) -> FakeGate {
        let gate = FakeGate::default();
        self.inner.lock().gates.insert((program.to_string(), kind), gate.clone());
        gate
    }

    pub fn calls(&self) -> Vec<CommandCall> {
        self.inner.lock().calls.clone()
    }

    pub fn calls_of(&self, program: &str) -> Vec<CommandCall> {
        self.inner.lock().calls.iter().filter(|c| c.spec.program_name() == program).cloned().collect()
    }

    /// Highest number of supervised processes alive at the same time.
    pub fn max_concurrent(&self) -> usize {
        self.inner.lock().max_running
    }

    /// Record the call and pick its response, gate, and hook.
    fn begin(&self, spec: &CommandSpec, kind: CallKind) -> (FakeResponse, Option<FakeGate>, Option<Hook>) {
        let mut inner = self.inner.lock();
        inner.calls.push(CommandCall { kind, spec: spec.clone() });
        let key = (spec.program_name().to_string(), kind);
        let scripted = inner.scripted.get_mut(&key).and_then(VecDeque::pop_front);
        let response = match scripted {
            Some(response) => response,
            None => inner.defaults.get(&key).cloned().unwrap_or_else(FakeResponse::ok),
        };
        let gate = inner.gates.remove(&key);
        let hook = inner.hooks.get(spec.program_name()).cloned();
        if kind == CallKind::Supervise {
            inner.running += 1;
            inner.max_running = inner.max_running.max(inner.running);
        }
        (response, gate, hook)
    }
}

#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn output(
        &self,
        spec: &CommandSpec,
        _timeout: Duration,
    ) -> Result<CommandOutput, SubprocessError> {
        let (response, gate, hook) = self.begin(spec, CallKind::Output);
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if !response.delay.is_zero() {
            tokio::time::sleep(response.delay).await;
        }
        if let Some(hook) = hook {
            hook(spec);
        }
        Ok(CommandOutput { code: response.code, stdout: response.stdout, stderr: response.stderr })
    }

    async fn supervise(
        &self,
        spec: &CommandSpec,
        cancel: CancellationToken,
        lines: mpsc::UnboundedSender<String>,
    ) -> Result<ProcessExit, SubprocessError> {
        let (response, gate, hook) = self.begin(spec, CallKind::Supervise);
        if let Some(gate) = gate {
            gate.pass().await;
        }
        if let Some(hook) = hook {
            hook(spec);
        }
        for line in response.stdout.lines().chain(response.stderr.lines()) {
            let _ = lines.send(line.to_string());
        }

        let cancelled = if response.block {
            cancel.cancelled().await;
            true
        } else {
            tokio::select! {
                _ = tokio::time::sleep(response.delay) => false,
                _ = cancel.cancelled() => true,
            }
        };

        self.inner.lock().running -= 1;
        Ok(ProcessExit {
            code: if cancelled { None } else { response.code },
            cancelled,
            stderr_tail: response.stderr,
        })
    }
}
