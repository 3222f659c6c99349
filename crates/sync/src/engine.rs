//! The synchronization protocol engine.
//!
//! Each transport connection is driven through a [`Connection`] handle:
//! `Unjoined -> Joined -> Closed`. Edits to a room are serialized by a
//! per-room async mutex; other rooms proceed in parallel. Presence and chat
//! events are relayed without touching the store.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use roomsync_config::SyncConfig;
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, error, info, warn};

use crate::channel::{ChannelStats, RoomChannel};
use crate::entities::DocumentSnapshot;
use crate::policy::{policy_for, ConflictPolicy, EditDecision, EditProposal};
use crate::registry::{Admission, ConnectionId, SessionRegistry};
use crate::store::{DocumentStore, RoomDirectory};
use crate::types::{ClientEvent, ServerEvent, SyncError, SyncResult};

/// Engine tuning derived from the `sync` configuration section
#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub outbox_capacity: usize,
    pub store_timeout: Duration,
    pub announce_departures: bool,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::from(&SyncConfig::default())
    }
}

impl From<&SyncConfig> for EngineSettings {
    fn from(config: &SyncConfig) -> Self {
        Self {
            outbox_capacity: config.outbox_capacity.max(1),
            store_timeout: Duration::from_millis(config.store_timeout_ms.max(1)),
            announce_departures: config.announce_departures,
        }
    }
}

/// Outcome of a join request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinOutcome {
    /// Admitted and sent the snapshot at `version`
    Joined { version: u64 },
    /// Was already in the room; sent a fresh snapshot at `version`
    Rejoined { version: u64 },
    /// Admitted but the snapshot could not be read
    SnapshotUnavailable,
    /// Not admitted
    Denied { reason: String },
}

/// Outcome of an edit
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    Applied { version: u64 },
    Rejected { reason: String },
}

/// Lifecycle of one connection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    Unjoined,
    Joined { room_id: String, user_id: String },
    Closed,
}

/// Shared engine: registry, fan-out, stores and policy.
#[derive(Clone)]
pub struct SyncEngine {
    registry: Arc<SessionRegistry>,
    channel: Arc<RoomChannel>,
    documents: Arc<dyn DocumentStore>,
    directory: Arc<dyn RoomDirectory>,
    policy: Arc<dyn ConflictPolicy>,
    room_locks: Arc<Mutex<HashMap<String, Arc<Mutex<()>>>>>,
    settings: EngineSettings,
}

impl SyncEngine {
    /// Build an engine with the policy named by `config.conflict_policy`
    pub fn new(
        documents: Arc<dyn DocumentStore>,
        directory: Arc<dyn RoomDirectory>,
        config: &SyncConfig,
    ) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        Self {
            channel: Arc::new(RoomChannel::new(registry.clone())),
            registry,
            documents,
            directory,
            policy: policy_for(config.conflict_policy),
            room_locks: Arc::new(Mutex::new(HashMap::new())),
            settings: EngineSettings::from(config),
        }
    }

    pub fn with_policy(mut self, policy: Arc<dyn ConflictPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    pub fn documents(&self) -> &Arc<dyn DocumentStore> {
        &self.documents
    }

    pub fn directory(&self) -> &Arc<dyn RoomDirectory> {
        &self.directory
    }

    pub fn policy(&self) -> &Arc<dyn ConflictPolicy> {
        &self.policy
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn channel_stats(&self) -> ChannelStats {
        self.channel.stats()
    }

    pub async fn room_count(&self) -> usize {
        self.registry.room_count().await
    }

    pub async fn connection_count(&self) -> usize {
        self.registry.connection_count().await
    }

    /// Register a new connection. Events for it are queued on the returned receiver.
    pub async fn open(&self) -> (Connection, mpsc::Receiver<ServerEvent>) {
        let (outbox, inbox) = mpsc::channel(self.settings.outbox_capacity);
        let id = ConnectionId::new();
        self.registry.register(id, outbox).await;
        debug!(connection_id = %id, "connection opened");

        let connection = Connection {
            id,
            engine: self.clone(),
            state: ConnectionState::Unjoined,
        };
        (connection, inbox)
    }

    async fn room_lock(&self, room_id: &str) -> Arc<Mutex<()>> {
        let mut locks = self.room_locks.lock().await;
        locks
            .entry(room_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    async fn bounded<T, F>(&self, operation: F) -> SyncResult<T>
    where
        F: Future<Output = SyncResult<T>>,
    {
        match tokio::time::timeout(self.settings.store_timeout, operation).await {
            Ok(result) => result,
            Err(_) => Err(SyncError::StoreTimeout {
                timeout_ms: u64::try_from(self.settings.store_timeout.as_millis())
                    .unwrap_or(u64::MAX),
            }),
        }
    }

    /// Fresh read, policy check, append and fan-out, all under the room lock.
    async fn apply_edit(
        self,
        connection_id: ConnectionId,
        room_id: String,
        user_id: String,
        content: String,
        base_version: Option<u64>,
    ) -> SyncResult<EditOutcome> {
        let lock = self.room_lock(&room_id).await;
        let _guard = lock.lock().await;

        let current = self.bounded(self.documents.load(&room_id)).await?;
        let proposal = EditProposal {
            user_id: &user_id,
            content: &content,
            base_version,
        };

        if let EditDecision::Reject { reason } = self.policy.evaluate(&current, &proposal) {
            info!(
                room_id = %room_id,
                user_id = %user_id,
                version = current.version,
                policy = self.policy.name(),
                %reason,
                "edit rejected"
            );
            let rejected = SyncError::EditRejected {
                reason: reason.clone(),
            };
            self.channel
                .send_to(
                    connection_id,
                    ServerEvent::error(rejected.code(), rejected.to_string()),
                )
                .await;
            self.channel
                .send_to(connection_id, document_load(&current))
                .await;
            return Ok(EditOutcome::Rejected { reason });
        }

        // Not bounded: a timed-out append may already be committed.
        let version = self
            .documents
            .append_edit(&room_id, &content, &user_id)
            .await?;

        let event = ServerEvent::TextChange {
            content,
            user_id: user_id.clone(),
            version,
        };
        let receivers = self
            .channel
            .broadcast(&room_id, Some(connection_id), &event)
            .await;

        debug!(room_id = %room_id, user_id = %user_id, version, receivers, "edit applied");
        Ok(EditOutcome::Applied { version })
    }
}

fn document_load(snapshot: &DocumentSnapshot) -> ServerEvent {
    ServerEvent::DocumentLoad {
        content: snapshot.content.clone(),
        version: snapshot.version,
    }
}

fn require_id(value: &str, field: &str) -> SyncResult<()> {
    if value.trim().is_empty() {
        return Err(SyncError::malformed(format!("{field} must not be empty")));
    }
    Ok(())
}

/// Handle driving one connection through the protocol
pub struct Connection {
    id: ConnectionId,
    engine: SyncEngine,
    state: ConnectionState,
}

impl Connection {
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn room_id(&self) -> Option<&str> {
        match &self.state {
            ConnectionState::Joined { room_id, .. } => Some(room_id),
            _ => None,
        }
    }

    /// Dispatch a client event. Failures the client should hear about are
    /// sent to it as `error` events; malformed events are dropped.
    pub async fn handle(&mut self, event: ClientEvent) -> SyncResult<()> {
        let name = event.name();
        let result = match event {
            ClientEvent::JoinRoom { room_id, user_id } => {
                self.join(&room_id, &user_id).await.map(|_| ())
            }
            ClientEvent::TextChange {
                content,
                room_id,
                base_version,
                ..
            } => self
                .edit(content, room_id.as_deref(), base_version)
                .await
                .map(|_| ()),
            ClientEvent::CursorPosition {
                room_id, position, ..
            } => self.relay_cursor(room_id.as_deref(), position).await,
            ClientEvent::ChatMessage {
                room_id, text, ts, ..
            } => self.relay_chat(room_id.as_deref(), text, ts).await,
            ClientEvent::ChatTyping {
                room_id, is_typing, ..
            } => self.relay_typing(room_id.as_deref(), is_typing).await,
            ClientEvent::Ping => self.ping().await,
        };

        match result {
            Ok(()) => Ok(()),
            Err(SyncError::Closed) => Err(SyncError::Closed),
            Err(SyncError::Malformed { reason }) => {
                warn!(connection_id = %self.id, event = name, %reason, "dropping malformed event");
                Ok(())
            }
            Err(err) => {
                if err.is_store_failure() {
                    error!(connection_id = %self.id, event = name, error = %err, "store failure");
                } else {
                    debug!(connection_id = %self.id, event = name, error = %err, "event failed");
                }
                self.engine
                    .channel
                    .send_to(self.id, ServerEvent::error(err.code(), err.to_string()))
                    .await;
                Ok(())
            }
        }
    }

    /// Authorize, admit, send the snapshot and announce the joiner.
    pub async fn join(&mut self, room_id: &str, user_id: &str) -> SyncResult<JoinOutcome> {
        self.ensure_open()?;
        require_id(room_id, "roomId")?;
        require_id(user_id, "userId")?;

        let engine = self.engine.clone();

        let Some(room) = engine.bounded(engine.directory.find_room(room_id)).await? else {
            return Ok(self.deny(room_id, user_id, "room not found").await);
        };

        if !room.can_join(user_id) {
            return Ok(self.deny(room_id, user_id, "room is private").await);
        }

        if !room.is_member(user_id) {
            engine
                .bounded(engine.directory.add_member(room_id, user_id))
                .await?;
        }

        let lock = engine.room_lock(room_id).await;
        let guard = lock.lock().await;

        let admission = engine.registry.admit(self.id, room_id, user_id).await?;
        self.state = ConnectionState::Joined {
            room_id: room_id.to_string(),
            user_id: user_id.to_string(),
        };

        let snapshot = engine.bounded(engine.documents.load(room_id)).await;
        let outcome = match snapshot {
            Ok(snapshot) => {
                engine.channel.send_to(self.id, document_load(&snapshot)).await;
                if admission == Admission::AlreadyMember {
                    JoinOutcome::Rejoined {
                        version: snapshot.version,
                    }
                } else {
                    JoinOutcome::Joined {
                        version: snapshot.version,
                    }
                }
            }
            Err(err) => {
                error!(connection_id = %self.id, room_id, error = %err, "document load failed on join");
                engine
                    .channel
                    .send_to(self.id, ServerEvent::error(err.code(), err.to_string()))
                    .await;
                JoinOutcome::SnapshotUnavailable
            }
        };
        drop(guard);

        match admission {
            Admission::AlreadyMember => {}
            Admission::Admitted => {
                self.announce_join(room_id, user_id).await;
            }
            Admission::Swapped {
                previous_room,
                previous_user,
            } => {
                if engine.settings.announce_departures {
                    let left = ServerEvent::UserLeft {
                        user_id: previous_user,
                    };
                    engine.channel.broadcast(&previous_room, Some(self.id), &left).await;
                }
                self.announce_join(room_id, user_id).await;
            }
        }

        info!(connection_id = %self.id, room_id, user_id, ?outcome, "join processed");
        Ok(outcome)
    }

    async fn announce_join(&self, room_id: &str, user_id: &str) {
        let joined = ServerEvent::UserJoined {
            user_id: user_id.to_string(),
        };
        self.engine
            .channel
            .broadcast(room_id, Some(self.id), &joined)
            .await;
    }

    async fn deny(&self, room_id: &str, user_id: &str, reason: &str) -> JoinOutcome {
        warn!(connection_id = %self.id, room_id, user_id, reason, "join denied");
        self.engine
            .channel
            .send_to(
                self.id,
                ServerEvent::JoinDenied {
                    room_id: room_id.to_string(),
                    reason: reason.to_string(),
                },
            )
            .await;
        JoinOutcome::Denied {
            reason: reason.to_string(),
        }
    }

    /// Replace the room's document on behalf of this connection's user.
    ///
    /// The critical section runs on a detached task, so dropping this
    /// future (for example when the transport closes) does not cancel an
    /// append that has started.
    pub async fn edit(
        &mut self,
        content: String,
        room_id: Option<&str>,
        base_version: Option<u64>,
    ) -> SyncResult<EditOutcome> {
        let (joined_room, user_id) = self.joined(room_id)?;

        let task = tokio::spawn(self.engine.clone().apply_edit(
            self.id,
            joined_room,
            user_id,
            content,
            base_version,
        ));

        task.await.map_err(|err| SyncError::Internal {
            message: format!("edit task failed: {err}"),
        })?
    }

    /// Relay a cursor position to the rest of the room
    pub async fn relay_cursor(&mut self, room_id: Option<&str>, position: Value) -> SyncResult<()> {
        let (joined_room, user_id) = self.joined(room_id)?;
        let event = ServerEvent::CursorPosition { user_id, position };
        self.engine
            .channel
            .broadcast(&joined_room, Some(self.id), &event)
            .await;
        Ok(())
    }

    /// Relay a chat message; messages without a timestamp get the server time
    pub async fn relay_chat(
        &mut self,
        room_id: Option<&str>,
        text: String,
        ts: Option<i64>,
    ) -> SyncResult<()> {
        let room_id = room_id.ok_or_else(|| SyncError::malformed("chat-message without roomId"))?;
        let (joined_room, user_id) = self.joined(Some(room_id))?;
        let event = ServerEvent::ChatMessage {
            room_id: joined_room.clone(),
            user_id,
            text,
            ts: ts.unwrap_or_else(|| chrono::Utc::now().timestamp_millis()),
        };
        self.engine
            .channel
            .broadcast(&joined_room, Some(self.id), &event)
            .await;
        Ok(())
    }

    /// Relay a typing indicator
    pub async fn relay_typing(&mut self, room_id: Option<&str>, is_typing: bool) -> SyncResult<()> {
        let room_id = room_id.ok_or_else(|| SyncError::malformed("chat-typing without roomId"))?;
        let (joined_room, user_id) = self.joined(Some(room_id))?;
        let event = ServerEvent::ChatTyping {
            room_id: joined_room.clone(),
            user_id,
            is_typing,
        };
        self.engine
            .channel
            .broadcast(&joined_room, Some(self.id), &event)
            .await;
        Ok(())
    }

    pub async fn ping(&mut self) -> SyncResult<()> {
        self.ensure_open()?;
        self.engine.channel.send_to(self.id, ServerEvent::Pong).await;
        Ok(())
    }

    /// Leave the registry and announce the departure. Idempotent.
    pub async fn close(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        depart(self.engine.clone(), self.id).await;
    }

    fn ensure_open(&self) -> SyncResult<()> {
        if self.state == ConnectionState::Closed {
            return Err(SyncError::Closed);
        }
        Ok(())
    }

    /// The joined room and user, checking an optional room id carried by the event
    fn joined(&self, room_id: Option<&str>) -> SyncResult<(String, String)> {
        match &self.state {
            ConnectionState::Closed => Err(SyncError::Closed),
            ConnectionState::Unjoined => Err(SyncError::NotJoined),
            ConnectionState::Joined {
                room_id: joined,
                user_id,
            } => match room_id {
                Some(claimed) if claimed != joined => Err(SyncError::malformed(format!(
                    "event for room {claimed} on connection joined to {joined}"
                ))),
                _ => Ok((joined.clone(), user_id.clone())),
            },
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        if self.state == ConnectionState::Closed {
            return;
        }
        self.state = ConnectionState::Closed;
        // Abandoned without close(): finish the departure on the runtime.
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            handle.spawn(depart(self.engine.clone(), self.id));
        }
    }
}

/// Remove a connection from the registry and announce its departure
async fn depart(engine: SyncEngine, connection_id: ConnectionId) {
    if let Some(departure) = engine.registry.remove(connection_id).await {
        if engine.settings.announce_departures {
            let left = ServerEvent::UserLeft {
                user_id: departure.user_id.clone(),
            };
            engine
                .channel
                .broadcast(&departure.room_id, Some(connection_id), &left)
                .await;
        }
        info!(
            %connection_id,
            room_id = %departure.room_id,
            user_id = %departure.user_id,
            "connection left room"
        );
    }
    debug!(%connection_id, "connection closed");
}
