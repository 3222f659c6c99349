//! Per-room event fan-out over connection outboxes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::registry::{ConnectionId, SessionRegistry};
use crate::types::ServerEvent;

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub delivered: u64,
    pub dropped: u64,
}

/// Routes events to the connections of a room.
///
/// Delivery is best-effort and at-most-once. Events are pushed onto each
/// receiver's bounded outbox without waiting; a full or closed outbox drops
/// the event for that receiver only.
pub struct RoomChannel {
    registry: Arc<SessionRegistry>,
    delivered: AtomicU64,
    dropped: AtomicU64,
}

impl RoomChannel {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
        }
    }

    /// Deliver to every connection in `room_id` except `sender`.
    /// Returns the number of receivers the event was queued for.
    pub async fn broadcast(
        &self,
        room_id: &str,
        sender: Option<ConnectionId>,
        event: &ServerEvent,
    ) -> usize {
        let recipients = self.registry.recipients(room_id, sender).await;
        let mut queued = 0;

        for (connection_id, outbox) in recipients {
            if self.push(connection_id, &outbox, event.clone()) {
                queued += 1;
            }
        }

        debug!(room_id, event = event.name(), queued, "room broadcast");
        queued
    }

    /// Deliver to a single connection
    pub async fn send_to(&self, connection_id: ConnectionId, event: ServerEvent) -> bool {
        match self.registry.outbox(connection_id).await {
            Some(outbox) => self.push(connection_id, &outbox, event),
            None => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(%connection_id, event = event.name(), "send to unknown connection dropped");
                false
            }
        }
    }

    pub fn stats(&self) -> ChannelStats {
        ChannelStats {
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
        }
    }

    fn push(
        &self,
        connection_id: ConnectionId,
        outbox: &tokio::sync::mpsc::Sender<ServerEvent>,
        event: ServerEvent,
    ) -> bool {
        match outbox.try_send(event) {
            Ok(()) => {
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(%connection_id, event = event.name(), "outbox full, event dropped");
                false
            }
            Err(TrySendError::Closed(event)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                debug!(%connection_id, event = event.name(), "outbox closed, event dropped");
                false
            }
        }
    }
}
