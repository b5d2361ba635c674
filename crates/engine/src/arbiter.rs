// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Resource arbiter: a single-slot gate per scope with FIFO admission.
//!
//! The arbiter is an actor task owning all queue state. Runners talk to it
//! through [`Arbiter::acquire`], which resolves to a [`SlotGuard`] once the
//! caller holds the slot. Release is single-shot on the guard and is also
//! issued on drop, so a runner that dies still frees the slot. Releases from
//! anyone but the current holder are ignored.

use std::collections::{HashMap, VecDeque};
use tokio::sync::{mpsc, oneshot};

use crate::error::InfrastructureError;

/// What a slot serialises.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArbiterScope {
    Global,
    Project(i64),
}

enum Request {
    Acquire { holder: i64, scope: ArbiterScope, grant: oneshot::Sender<()> },
    Release { holder: i64, scope: ArbiterScope },
}

#[derive(Default)]
struct Slot {
    holder: Option<i64>,
    waiters: VecDeque<(i64, oneshot::Sender<()>)>,
}

impl Slot {
    /// Hand the slot to the first waiter still listening.
    fn admit_next(&mut self) {
        self.holder = None;
        while let Some((holder, grant)) = self.waiters.pop_front() {
            if grant.send(()).is_ok() {
                self.holder = Some(holder);
                return;
            }
            tracing::debug!(holder, "arbiter waiter gone, skipping");
        }
    }
}

/// Handle to the arbiter actor. Cloning shares the same gate.
#[derive(Clone)]
pub struct Arbiter {
    tx: mpsc::UnboundedSender<Request>,
}

impl Arbiter {
    /// Start the actor on the current tokio runtime.
    pub fn spawn() -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run(rx));
        Self { tx }
    }

    /// Wait for the slot of `scope`. Admission is first come, first served.
    ///
    /// Dropping the returned future before it resolves gives up the place in
    /// the queue (or the slot, if it was granted in the meantime).
    pub async fn acquire(
        &self,
        holder: i64,
        scope: ArbiterScope,
    ) -> Result<SlotGuard, InfrastructureError> {
        let (grant, granted) = oneshot::channel();
        self.tx
            .send(Request::Acquire { holder, scope, grant })
            .map_err(|_| InfrastructureError::ArbiterClosed)?;
        let mut guard = SlotGuard { holder, scope, tx: self.tx.clone(), released: false };
        match granted.await {
            Ok(()) => {
                tracing::debug!(holder, ?scope, "arbiter slot granted");
                Ok(guard)
            }
            Err(_) => {
                guard.released = true;
                Err(InfrastructureError::ArbiterClosed)
            }
        }
    }
}

async fn run(mut rx: mpsc::UnboundedReceiver<Request>) {
    let mut slots: HashMap<ArbiterScope, Slot> = HashMap::new();
    while let Some(request) = rx.recv().await {
        match request {
            Request::Acquire { holder, scope, grant } => {
                let slot = slots.entry(scope).or_default();
                if slot.holder.is_none() && slot.waiters.is_empty() {
                    if grant.send(()).is_ok() {
                        slot.holder = Some(holder);
                    }
                } else {
                    slot.waiters.push_back((holder, grant));
                }
            }
            Request::Release { holder, scope } => {
                let Some(slot) = slots.get_mut(&scope) else {
                    continue;
                };
                if slot.holder != Some(holder) {
                    tracing::trace!(holder, ?scope, "ignoring release from non-holder");
                    continue;
                }
                slot.admit_next();
                if slot.holder.is_none() {
                    slots.remove(&scope);
                }
            }
        }
    }
}

/// Proof of holding a slot.
pub struct SlotGuard {
    holder: i64,
    scope: ArbiterScope,
    tx: mpsc::UnboundedSender<Request>,
    released: bool,
}

impl SlotGuard {
    pub fn holder(&self) -> i64 {
        self.holder
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    /// Give the slot back. Calling again is a no-op.
    pub fn release(&mut self) {
        if std::mem::replace(&mut self.released, true) {
            return;
        }
        tracing::debug!(holder = self.holder, scope = ?self.scope, "releasing arbiter slot");
        let _ = self.tx.send(Request::Release { holder: self.holder, scope: self.scope });
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
#[path = "arbiter_tests.rs"]
mod tests;
