//! Repository for room and membership data access operations.

use crate::entities::{CreateRoomRecord, RoomRecord};
use crate::types::{DatabaseError, DatabaseResult};
use sqlx::{sqlite::SqliteRow, Row, SqlitePool};
use tracing::{debug, info};

/// Repository for room database operations
#[derive(Clone)]
pub struct RoomRepository {
    pool: SqlitePool,
}

impl RoomRepository {
    /// Create a new room repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a room, its owner membership and its empty document in one transaction
    pub async fn create(&self, request: &CreateRoomRecord) -> DatabaseResult<RoomRecord> {
        if request.name.trim().is_empty() {
            return Err(DatabaseError::ValidationError(
                "room name must not be empty".to_string(),
            ));
        }
        if request.owner_id.trim().is_empty() {
            return Err(DatabaseError::ValidationError(
                "room owner must not be empty".to_string(),
            ));
        }

        let id = cuid2::create_id();
        let now = chrono::Utc::now().to_rfc3339();
        let name = request.name.trim().to_string();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO rooms (id, name, description, language, is_public, owner_id, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&id)
        .bind(&name)
        .bind(&request.description)
        .bind(&request.language)
        .bind(request.is_public)
        .bind(&request.owner_id)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO room_members (room_id, user_id, joined_at) VALUES (?, ?, ?)")
            .bind(&id)
            .bind(&request.owner_id)
            .bind(&now)
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            "INSERT INTO documents (room_id, content, version, last_editor, created_at, updated_at)
             VALUES (?, '', 0, NULL, ?, ?)",
        )
        .bind(&id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(room_id = %id, owner_id = %request.owner_id, is_public = request.is_public, "room created");

        Ok(RoomRecord {
            id,
            name,
            description: request.description.clone(),
            language: request.language.clone(),
            is_public: request.is_public,
            owner_id: request.owner_id.clone(),
            members: vec![request.owner_id.clone()],
            created_at: now,
        })
    }

    /// Find a room with its member list
    pub async fn find_by_id(&self, room_id: &str) -> DatabaseResult<Option<RoomRecord>> {
        let row = sqlx::query(
            "SELECT id, name, description, language, is_public, owner_id, created_at
             FROM rooms WHERE id = ?",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => {
                let members = self.members(room_id).await?;
                Ok(Some(Self::map_room(&row, members)?))
            }
            None => Ok(None),
        }
    }

    /// Member user ids of a room ordered by join time
    pub async fn members(&self, room_id: &str) -> DatabaseResult<Vec<String>> {
        let members = sqlx::query_scalar::<_, String>(
            "SELECT user_id FROM room_members WHERE room_id = ? ORDER BY joined_at ASC, rowid ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(members)
    }

    /// Add a member to a room. Returns `false` when the user already was a member.
    pub async fn add_member(&self, room_id: &str, user_id: &str) -> DatabaseResult<bool> {
        let now = chrono::Utc::now().to_rfc3339();
        let result = sqlx::query(
            "INSERT OR IGNORE INTO room_members (room_id, user_id, joined_at) VALUES (?, ?, ?)",
        )
        .bind(room_id)
        .bind(user_id)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let inserted = result.rows_affected() > 0;
        if inserted {
            debug!(room_id, user_id, "room member added");
        }
        Ok(inserted)
    }

    /// Rooms visible to a user: owned, joined, or public; newest first
    pub async fn list_for_user(&self, user_id: &str) -> DatabaseResult<Vec<RoomRecord>> {
        let rows = sqlx::query(
            "SELECT DISTINCT r.id, r.name, r.description, r.language, r.is_public, r.owner_id, r.created_at
             FROM rooms r
             LEFT JOIN room_members m ON m.room_id = r.id
             WHERE r.owner_id = ? OR m.user_id = ? OR r.is_public = 1
             ORDER BY r.created_at DESC",
        )
        .bind(user_id)
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        let mut rooms = Vec::with_capacity(rows.len());
        for row in rows {
            let room_id: String = row.try_get("id")?;
            let members = self.members(&room_id).await?;
            rooms.push(Self::map_room(&row, members)?);
        }
        Ok(rooms)
    }

    /// Total number of rooms
    pub async fn count(&self) -> DatabaseResult<i64> {
        let count = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM rooms")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    fn map_room(row: &SqliteRow, members: Vec<String>) -> DatabaseResult<RoomRecord> {
        Ok(RoomRecord {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            description: row.try_get("description")?,
            language: row.try_get("language")?,
            is_public: row.try_get("is_public")?,
            owner_id: row.try_get("owner_id")?,
            members,
            created_at: row.try_get("created_at")?,
        })
    }
}
