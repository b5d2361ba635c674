// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live-update fan-out to connected users.
//!
//! Each user may hold several connections (one per open client). A message
//! for a user is offered to every one of their connections without waiting;
//! a connection that is closed or has fallen a full buffer behind is dropped
//! and the client is expected to reconnect.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

/// Messages buffered per connection before it is considered stalled.
pub const DEFAULT_CONNECTION_CAPACITY: usize = 64;

/// Fire-and-forget delivery of a payload to every live connection of a user.
pub trait Broadcaster: Send + Sync + 'static {
    fn message(&self, user_id: i64, payload: Vec<u8>);
}

struct Connection {
    id: u64,
    tx: mpsc::Sender<Vec<u8>>,
}

type Connections = Mutex<HashMap<i64, Vec<Connection>>>;

/// In-process [`Broadcaster`] with per-connection bounded channels.
#[derive(Clone)]
pub struct SubscriptionHub {
    connections: Arc<Connections>,
    next_id: Arc<AtomicU64>,
    capacity: usize,
}

impl Default for SubscriptionHub {
    fn default() -> Self {
        Self::new(DEFAULT_CONNECTION_CAPACITY)
    }
}

impl SubscriptionHub {
    pub fn new(capacity: usize) -> Self {
        Self {
            connections: Arc::new(Mutex::new(HashMap::new())),
            next_id: Arc::new(AtomicU64::new(1)),
            capacity: capacity.max(1),
        }
    }

    /// Open a new connection for `user_id`.
    pub fn subscribe(&self, user_id: i64) -> Subscription {
        let (tx, rx) = mpsc::channel(self.capacity);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.connections.lock().entry(user_id).or_default().push(Connection { id, tx });
        tracing::debug!(user_id, connection = id, "subscriber connected");
        Subscription { user_id, id, rx, hub: Arc::downgrade(&self.connections) }
    }

    /// Number of live connections held by `user_id`.
    pub fn connection_count(&self, user_id: i64) -> usize {
        self.connections.lock().get(&user_id).map_or(0, Vec::len)
    }
}

impl Broadcaster for SubscriptionHub {
    fn message(&self, user_id: i64, payload: Vec<u8>) {
        let mut connections = self.connections.lock();
        let Some(conns) = connections.get_mut(&user_id) else {
            return;
        };
        conns.retain(|conn| match conn.tx.try_send(payload.clone()) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(user_id, connection = conn.id, "subscriber stalled, dropping connection");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        });
        if conns.is_empty() {
            connections.remove(&user_id);
        }
    }
}

/// Receiving end of one connection. Dropping it unsubscribes.
pub struct Subscription {
    user_id: i64,
    id: u64,
    rx: mpsc::Receiver<Vec<u8>>,
    hub: Weak<Connections>,
}

impl Subscription {
    pub fn user_id(&self) -> i64 {
        self.user_id
    }

    /// Next payload, or `None` once the hub dropped this connection.
    pub async fn recv(&mut self) -> Option<Vec<u8>> {
        self.rx.recv().await
    }

    pub fn try_recv(&mut self) -> Option<Vec<u8>> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(connections) = self.hub.upgrade() else {
            return;
        };
        let mut connections = connections.lock();
        if let Some(conns) = connections.get_mut(&self.user_id) {
            conns.retain(|c| c.id != self.id);
            if conns.is_empty() {
                connections.remove(&self.user_id);
            }
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
#[cfg_attr(coverage_nightly, coverage(off))]
mod fake {
    use super::Broadcaster;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Broadcaster that records every message
    #[derive(Clone, Default)]
    pub struct FakeBroadcaster {
        messages: Arc<Mutex<Vec<(i64, Vec<u8>)>>>,
    }

    impl FakeBroadcaster {
        pub fn new() -> Self {
            Self::default()
        }

        /// All `(user_id, payload)` pairs in delivery order
        pub fn messages(&self) -> Vec<(i64, Vec<u8>)> {
            self.messages.lock().clone()
        }

        /// Payloads delivered to `user_id`, parsed as JSON
        pub fn json_for(&self, user_id: i64) -> Vec<serde_json::Value> {
            self.messages
                .lock()
                .iter()
                .filter(|(uid, _)| *uid == user_id)
                .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
                .collect()
        }
    }

    impl Broadcaster for FakeBroadcaster {
        fn message(&self, user_id: i64, payload: Vec<u8>) {
            self.messages.lock().push((user_id, payload));
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeBroadcaster;

#[cfg(test)]
#[path = "broadcast_tests.rs"]
mod tests;
