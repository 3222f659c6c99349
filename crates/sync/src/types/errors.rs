//! Error types for the synchronization engine.

use roomsync_database::DatabaseError;
use thiserror::Error;

/// Result type alias for engine operations
pub type SyncResult<T> = Result<T, SyncError>;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Store operation timed out after {timeout_ms}ms")]
    StoreTimeout { timeout_ms: u64 },

    #[error("Room not found: {room_id}")]
    RoomNotFound { room_id: String },

    #[error("Connection has not joined a room")]
    NotJoined,

    #[error("Malformed event: {reason}")]
    Malformed { reason: String },

    #[error("Edit rejected: {reason}")]
    EditRejected { reason: String },

    #[error("Validation error: {message}")]
    Validation { message: String },

    #[error("Unknown connection: {connection_id}")]
    UnknownConnection { connection_id: String },

    #[error("Connection closed")]
    Closed,

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl SyncError {
    pub fn store_unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::Malformed {
            reason: reason.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Stable code sent to clients in `error` events.
    pub fn code(&self) -> &'static str {
        match self {
            SyncError::StoreUnavailable { .. } | SyncError::StoreTimeout { .. } => {
                "store-unavailable"
            }
            SyncError::RoomNotFound { .. } => "room-not-found",
            SyncError::NotJoined => "not-joined",
            SyncError::Malformed { .. } => "malformed",
            SyncError::EditRejected { .. } => "edit-rejected",
            SyncError::Validation { .. } => "invalid-request",
            SyncError::UnknownConnection { .. } | SyncError::Closed => "closed",
            SyncError::Internal { .. } => "internal",
        }
    }

    pub fn is_store_failure(&self) -> bool {
        matches!(
            self,
            SyncError::StoreUnavailable { .. } | SyncError::StoreTimeout { .. }
        )
    }
}

impl From<DatabaseError> for SyncError {
    fn from(error: DatabaseError) -> Self {
        match error {
            DatabaseError::ValidationError(message) => SyncError::Validation { message },
            other => SyncError::StoreUnavailable {
                message: other.to_string(),
            },
        }
    }
}
