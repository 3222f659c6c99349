//! In-memory registry of live connections and their room membership.

use std::collections::{HashMap, HashSet};
use std::fmt;

use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use crate::types::{ServerEvent, SyncError, SyncResult};

/// Unique identifier of one transport connection
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
        self.0.fmt(f)
    }
}

/// Snapshot of a registered connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub connection_id: ConnectionId,
    pub room_id: Option<String>,
    pub user_id: Option<String>,
}

/// Result of admitting a connection into a room
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// First room for this connection
    Admitted,
    /// Left `previous_room`, where it was present as `previous_user`. The
    /// previous room equals the new one when only the user id changed.
    Swapped {
        previous_room: String,
        previous_user: String,
    },
    /// Already in the requested room as the same user; nothing changed
    AlreadyMember,
}

/// Where a removed connection was when it left
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Departure {
    pub room_id: String,
    pub user_id: String,
}

struct ConnectionEntry {
    outbox: mpsc::Sender<ServerEvent>,
    membership: Option<Departure>,
}

#[derive(Default)]
struct RegistryState {
    connections: HashMap<ConnectionId, ConnectionEntry>,
    rooms: HashMap<String, HashSet<ConnectionId>>,
}

impl RegistryState {
    fn leave_room(&mut self, connection_id: &ConnectionId, room_id: &str) {
        if let Some(members) = self.rooms.get_mut(room_id) {
            members.remove(connection_id);
            if members.is_empty() {
                self.rooms.remove(room_id);
            }
        }
    }
}

/// Mapping of connection to (room, user) plus the per-room fan-out groups.
///
/// A connection is in at most one room. The registry is constructed
/// explicitly and shared through an `Arc`.
#[derive(Default)]
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new, not yet joined connection and its outbound queue
    pub async fn register(&self, connection_id: ConnectionId, outbox: mpsc::Sender<ServerEvent>) {
        let mut state = self.state.write().await;
        state.connections.insert(
            connection_id,
            ConnectionEntry {
                outbox,
                membership: None,
            },
        );
        debug!(%connection_id, "connection registered");
    }

    /// Place a connection into a room, leaving its previous room first.
    pub async fn admit(
        &self,
        connection_id: ConnectionId,
        room_id: &str,
        user_id: &str,
    ) -> SyncResult<Admission> {
        let mut state = self.state.write().await;

        let previous = {
            let entry = state.connections.get_mut(&connection_id).ok_or_else(|| {
                SyncError::UnknownConnection {
                    connection_id: connection_id.to_string(),
                }
            })?;

            if let Some(current) = entry.membership.as_mut() {
                if current.room_id == room_id {
                    if current.user_id == user_id {
                        return Ok(Admission::AlreadyMember);
                    }
                    // Same room under a new identity: the old user leaves.
                    let previous_user = std::mem::replace(&mut current.user_id, user_id.to_string());
                    debug!(%connection_id, room_id, user_id, %previous_user, "connection identity changed");
                    return Ok(Admission::Swapped {
                        previous_room: room_id.to_string(),
                        previous_user,
                    });
                }
            }

            entry.membership.replace(Departure {
                room_id: room_id.to_string(),
                user_id: user_id.to_string(),
            })
        };

        if let Some(previous) = previous.as_ref() {
            state.leave_room(&connection_id, &previous.room_id);
        }

        state
            .rooms
            .entry(room_id.to_string())
            .or_default()
            .insert(connection_id);

        debug!(%connection_id, room_id, user_id, "connection admitted to room");

        Ok(match previous {
            Some(previous) => Admission::Swapped {
                previous_room: previous.room_id,
                previous_user: previous.user_id,
            },
            None => Admission::Admitted,
        })
    }

    /// Unregister a connection. Safe to call repeatedly and for connections
    /// that never joined or were never registered.
    pub async fn remove(&self, connection_id: ConnectionId) -> Option<Departure> {
        let mut state = self.state.write().await;
        let entry = state.connections.remove(&connection_id)?;
        let departure = entry.membership?;
        state.leave_room(&connection_id, &departure.room_id);
        debug!(%connection_id, room_id = %departure.room_id, "connection removed from room");
        Some(departure)
    }

    pub async fn session(&self, connection_id: ConnectionId) -> Option<Session> {
        let state = self.state.read().await;
        state.connections.get(&connection_id).map(|entry| Session {
            connection_id,
            room_id: entry.membership.as_ref().map(|m| m.room_id.clone()),
            user_id: entry.membership.as_ref().map(|m| m.user_id.clone()),
        })
    }

    /// Connections currently admitted to a room
    pub async fn members(&self, room_id: &str) -> Vec<ConnectionId> {
        let state = self.state.read().await;
        state
            .rooms
            .get(room_id)
            .map(|members| members.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Outbound queues of a room's connections, minus `except`
    pub async fn recipients(
        &self,
        room_id: &str,
        except: Option<ConnectionId>,
    ) -> Vec<(ConnectionId, mpsc::Sender<ServerEvent>)> {
        let state = self.state.read().await;
        let Some(members) = state.rooms.get(room_id) else {
            return Vec::new();
        };

        members
            .iter()
            .filter(|id| Some(**id) != except)
            .filter_map(|id| {
                state
                    .connections
                    .get(id)
                    .map(|entry| (*id, entry.outbox.clone()))
            })
            .collect()
    }

    pub async fn outbox(&self, connection_id: ConnectionId) -> Option<mpsc::Sender<ServerEvent>> {
        let state = self.state.read().await;
        state
            .connections
            .get(&connection_id)
            .map(|entry| entry.outbox.clone())
    }

    /// Number of rooms with at least one connection
    pub async fn room_count(&self) -> usize {
        self.state.read().await.rooms.len()
    }

    pub async fn connection_count(&self) -> usize {
        self.state.read().await.connections.len()
    }

    /// Drop every connection and room group
    pub async fn reset(&self) {
        let mut state = self.state.write().await;
        state.connections.clear();
        state.rooms.clear();
    }
}
