use itertools::Itertools;
use std::collections::{HashMap, HashSet};
use std::fmt;
use tokio::sync::{RwLock, mpsc::UnboundedSender};
use uuid::Uuid;

use super::events::ServerMessage;

/// Identifies one live transport connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(Uuid);

impl ConnectionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type Outbound = UnboundedSender<ServerMessage>;

struct Connection {
    outbound: Outbound,
    rooms: HashSet<String>,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, Connection>,
    // Last connection wins; superseded connections stay in `connections` until they close.
    users: HashMap<String, ConnectionId>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

/// Process-wide table of live connections, which user each one is addressable as, and which
/// conversation rooms they are subscribed to.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<RegistryState>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `connection_id` the addressable connection for `user_id`. A previous connection for
    /// the same user is left open but no longer receives user-addressed events.
    pub async fn register(&self, user_id: &str, connection_id: ConnectionId, outbound: Outbound) {
        let mut state = self.inner.write().await;
        state.connections.insert(
            connection_id,
            Connection {
                outbound,
                rooms: HashSet::new(),
            },
        );
        if let Some(previous) = state.users.insert(user_id.to_string(), connection_id) {
            tracing::debug!(
                "User {} moved from connection {} to {}",
                user_id,
                previous,
                connection_id
            );
        }
    }

    /// Drops the connection and its room subscriptions. The user mapping is only removed if it
    /// still points at this connection. Returns whether the user is now offline.
    pub async fn unregister(&self, user_id: &str, connection_id: ConnectionId) -> bool {
        let mut state = self.inner.write().await;

        if let Some(connection) = state.connections.remove(&connection_id) {
            for room in connection.rooms {
                if let Some(members) = state.rooms.get_mut(&room) {
                    members.remove(&connection_id);
                    if members.is_empty() {
                        state.rooms.remove(&room);
                    }
                }
            }
        }

        if state.users.get(user_id) == Some(&connection_id) {
            state.users.remove(user_id);
            true
        } else {
            false
        }
    }

    pub async fn lookup(&self, user_id: &str) -> Option<ConnectionId> {
        self.inner.read().await.users.get(user_id).copied()
    }

    /// The subset of `user_ids` that currently has an addressable connection, in input order.
    pub async fn is_online(&self, user_ids: &[String]) -> Vec<String> {
        let state = self.inner.read().await;
        user_ids
            .iter()
            .filter(|id| state.users.contains_key(id.as_str()))
            .unique()
            .cloned()
            .collect()
    }

    pub async fn join_room(&self, connection_id: ConnectionId, room: &str) -> bool {
        let mut state = self.inner.write().await;
        let Some(connection) = state.connections.get_mut(&connection_id) else {
            return false;
        };
        connection.rooms.insert(room.to_string());
        state
            .rooms
            .entry(room.to_string())
            .or_default()
            .insert(connection_id);
        true
    }

    pub async fn leave_room(&self, connection_id: ConnectionId, room: &str) {
        let mut state = self.inner.write().await;
        if let Some(connection) = state.connections.get_mut(&connection_id) {
            connection.rooms.remove(room);
        }
        if let Some(members) = state.rooms.get_mut(room) {
            members.remove(&connection_id);
            if members.is_empty() {
                state.rooms.remove(room);
            }
        }
    }

    pub async fn room_size(&self, room: &str) -> usize {
        self.inner
            .read()
            .await
            .rooms
            .get(room)
            .map(|members| members.len())
            .unwrap_or(0)
    }

    /// Fire-and-forget delivery; returns whether the event was handed to a live connection.
    pub async fn send_to_connection(&self, connection_id: ConnectionId, event: ServerMessage) -> bool {
        let state = self.inner.read().await;
        state
            .connections
            .get(&connection_id)
            .is_some_and(|connection| connection.outbound.send(event).is_ok())
    }

    pub async fn send_to_user(&self, user_id: &str, event: ServerMessage) -> bool {
        let state = self.inner.read().await;
        state
            .users
            .get(user_id)
            .and_then(|connection_id| state.connections.get(connection_id))
            .is_some_and(|connection| connection.outbound.send(event).is_ok())
    }

    /// Sends to every connection subscribed to `room`; returns how many accepted it.
    pub async fn broadcast_room(&self, room: &str, event: ServerMessage) -> usize {
        let state = self.inner.read().await;
        let Some(members) = state.rooms.get(room) else {
            return 0;
        };
        members
            .iter()
            .filter_map(|connection_id| state.connections.get(connection_id))
            .filter(|connection| connection.outbound.send(event.clone()).is_ok())
            .count()
    }

    pub async fn broadcast_all(&self, event: ServerMessage) -> usize {
        let state = self.inner.read().await;
        state
            .connections
            .values()
            .filter(|connection| connection.outbound.send(event.clone()).is_ok())
            .count()
    }
}
