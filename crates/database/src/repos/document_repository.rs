//! Repository for shared document state and edit history.

use crate::entities::{DocumentRecord, HistoryRecord};
use crate::types::{DatabaseError, DatabaseResult};
use sqlx::{Row, SqlitePool};
use tracing::debug;

/// Repository for document database operations
#[derive(Clone)]
pub struct DocumentRepository {
    pool: SqlitePool,
}

impl DocumentRepository {
    /// Create a new document repository
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Load the current document for a room. A room without a stored
    /// document reads as empty content at version 0.
    pub async fn load(&self, room_id: &str) -> DatabaseResult<DocumentRecord> {
        let row = sqlx::query(
            "SELECT room_id, content, version, last_editor, updated_at
             FROM documents WHERE room_id = ?",
        )
        .bind(room_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(row) => Ok(DocumentRecord {
                room_id: row.try_get("room_id")?,
                content: row.try_get("content")?,
                version: row.try_get("version")?,
                last_editor: row.try_get("last_editor")?,
                updated_at: row.try_get("updated_at")?,
            }),
            None => Ok(DocumentRecord::empty(room_id)),
        }
    }

    /// Replace the document content, bump the version by exactly one and
    /// record the new version in the history. Returns the new version.
    ///
    /// A `history_limit` of 0 keeps every entry; otherwise only the most
    /// recent `history_limit` versions are retained.
    pub async fn append_edit(
        &self,
        room_id: &str,
        content: &str,
        editor: &str,
        history_limit: u64,
    ) -> DatabaseResult<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let version: i64 = sqlx::query_scalar(
            "INSERT INTO documents (room_id, content, version, last_editor, created_at, updated_at)
             VALUES (?, ?, 1, ?, ?, ?)
             ON CONFLICT(room_id) DO UPDATE SET
                content = excluded.content,
                version = documents.version + 1,
                last_editor = excluded.last_editor,
                updated_at = excluded.updated_at
             RETURNING version",
        )
        .bind(room_id)
        .bind(content)
        .bind(editor)
        .bind(&now)
        .bind(&now)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query(
            "INSERT INTO document_history (room_id, version, content, editor, edited_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(room_id)
        .bind(version)
        .bind(content)
        .bind(editor)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        if history_limit > 0 {
            let limit = i64::try_from(history_limit).map_err(|_| {
                DatabaseError::ValidationError("history limit out of range".to_string())
            })?;
            sqlx::query("DELETE FROM document_history WHERE room_id = ? AND version <= ?")
                .bind(room_id)
                .bind(version - limit)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        debug!(room_id, version, editor, "document edit appended");
        Ok(version)
    }

    /// Retained history entries for a room in ascending version order
    pub async fn history(&self, room_id: &str) -> DatabaseResult<Vec<HistoryRecord>> {
        let rows = sqlx::query(
            "SELECT version, content, editor, edited_at
             FROM document_history WHERE room_id = ?
             ORDER BY version ASC",
        )
        .bind(room_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| -> DatabaseResult<HistoryRecord> {
                Ok(HistoryRecord {
                    version: row.try_get("version")?,
                    content: row.try_get("content")?,
                    editor: row.try_get("editor")?,
                    edited_at: row.try_get("edited_at")?,
                })
            })
            .collect()
    }
}
