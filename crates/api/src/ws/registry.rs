use std::collections::HashMap;

use agora_core::types::DbId;
use axum::extract::ws::Message;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Identifier of one live connection. A user may hold several.
pub type ConnectionId = Uuid;

/// Channel sender half for pushing messages to a connection's writer task.
pub type ConnectionSender = mpsc::UnboundedSender<Message>;

/// One live, authenticated connection as seen by the registry.
pub struct ConnectionHandle {
    id: ConnectionId,
    user_id: DbId,
    sender: ConnectionSender,
    /// Fired to make the owning lifecycle task close the socket.
    close: CancellationToken,
}

impl ConnectionHandle {
    /// Create a handle for `user_id` together with the receiver its writer
    /// task drains.
    pub fn new(
        user_id: DbId,
        close: CancellationToken,
    ) -> (Self, mpsc::UnboundedReceiver<Message>) {
        let (sender, rx) = mpsc::unbounded_channel();
        let handle = Self {
            id: Uuid::new_v4(),
            user_id,
            sender,
            close,
        };
        (handle, rx)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }
}

/// Result of removing a connection from the registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Unregistered {
    pub user_id: DbId,
    /// Connections the same user still holds after the removal.
    pub remaining_for_user: usize,
}

/// All live connections of this process.
///
/// Every operation, including a whole dispatch pass, runs under one lock, so
/// a delivery never observes a half-applied register or unregister.
pub struct ConnectionRegistry {
    connections: Mutex<Connections>,
}

#[derive(Default)]
struct Connections {
    live: HashMap<ConnectionId, ConnectionHandle>,
    /// Connections removed on the owner's behalf (failed write, shutdown),
    /// kept until the owning task unregisters and collects the outcome.
    evicted: HashMap<ConnectionId, Unregistered>,
}

impl Connections {
    fn remaining_for(&self, user_id: DbId) -> usize {
        self.live.values().filter(|c| c.user_id == user_id).count()
    }

    fn evict(&mut self, id: ConnectionId) -> Option<DbId> {
        let handle = self.live.remove(&id)?;
        handle.close.cancel();
        let unregistered = Unregistered {
            user_id: handle.user_id,
            remaining_for_user: self.remaining_for(handle.user_id),
        };
        self.evicted.insert(id, unregistered);
        Some(handle.user_id)
    }
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self {
            connections: Mutex::new(Connections::default()),
        }
    }

    pub async fn register(&self, handle: ConnectionHandle) {
        let mut conns = self.connections.lock().await;
        tracing::debug!(
            conn_id = %handle.id,
            user_id = handle.user_id,
            total = conns.live.len() + 1,
            "Connection registered"
        );
        conns.live.insert(handle.id, handle);
    }

    /// Remove a connection. Returns `None` if it was already unregistered.
    ///
    /// The remaining count is taken under the same lock as the removal, so
    /// exactly one of a user's concurrently closing connections sees zero.
    /// A connection evicted earlier reports the count taken at eviction.
    pub async fn unregister(&self, id: ConnectionId) -> Option<Unregistered> {
        let mut conns = self.connections.lock().await;
        match conns.live.remove(&id) {
            Some(handle) => Some(Unregistered {
                user_id: handle.user_id,
                remaining_for_user: conns.remaining_for(handle.user_id),
            }),
            None => conns.evicted.remove(&id),
        }
    }

    /// Snapshot of the connection ids held by a user.
    pub async fn connections_for(&self, user_id: DbId) -> Vec<ConnectionId> {
        self.connections
            .lock()
            .await
            .live
            .values()
            .filter(|c| c.user_id == user_id)
            .map(|c| c.id)
            .collect()
    }

    pub async fn has_connections(&self, user_id: DbId) -> bool {
        self.connections
            .lock()
            .await
            .live
            .values()
            .any(|c| c.user_id == user_id)
    }

    pub async fn connection_count(&self) -> usize {
        self.connections.lock().await.live.len()
    }

    /// Distinct users with at least one live connection, ascending.
    pub async fn online_user_ids(&self) -> Vec<DbId> {
        let mut ids: Vec<DbId> = self
            .connections
            .lock()
            .await
            .live
            .values()
            .map(|c| c.user_id)
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }

    /// Ask every connection of `user_id` to close.
    ///
    /// Entries stay registered until each lifecycle task unregisters its own
    /// connection during cleanup. Returns the number of connections signalled.
    pub async fn disconnect_user(&self, user_id: DbId) -> usize {
        let conns = self.connections.lock().await;
        let mut signalled = 0;
        for conn in conns.live.values().filter(|c| c.user_id == user_id) {
            conn.close.cancel();
            signalled += 1;
        }
        if signalled > 0 {
            tracing::info!(user_id, signalled, "Disconnecting user");
        }
        signalled
    }

    /// Send a Close frame to every connection and evict them all.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) -> usize {
        let mut conns = self.connections.lock().await;
        let ids: Vec<ConnectionId> = conns.live.keys().copied().collect();
        for id in &ids {
            if let Some(conn) = conns.live.get(id) {
                let _ = conn.sender.send(Message::Close(None));
            }
            conns.evict(*id);
        }
        tracing::info!(count = ids.len(), "Closed all live connections");
        ids.len()
    }

    /// Deliver `message` to every connection of `target`, or to every
    /// connection when `target` is `None`.
    ///
    /// A connection whose writer has gone away is signalled to close and
    /// evicted; the others are unaffected. Returns the number of successful
    /// deliveries.
    pub(crate) async fn deliver(&self, target: Option<DbId>, message: &Message) -> usize {
        let mut conns = self.connections.lock().await;
        let mut delivered = 0;
        let mut dead = Vec::new();

        for conn in conns.live.values() {
            if target.is_some_and(|user_id| conn.user_id != user_id) {
                continue;
            }
            if conn.sender.send(message.clone()).is_ok() {
                delivered += 1;
            } else {
                dead.push(conn.id);
            }
        }

        for id in dead {
            if let Some(user_id) = conns.evict(id) {
                tracing::warn!(conn_id = %id, user_id, "Dropped connection after failed write");
            }
        }

        delivered
    }
}

impl Default for ConnectionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
