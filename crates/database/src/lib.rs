//! Roomsync Database Crate
//!
//! This crate provides the SQLite persistence layer for rooms, memberships
//! and shared documents, including connection management, migrations, and
//! repository implementations.

use roomsync_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::{prepare_database, DatabaseConnection};
pub use migrations::run_migrations;

pub use repos::{DocumentRepository, RoomRepository};

pub use entities::{CreateRoomRecord, DocumentRecord, HistoryRecord, RoomRecord};

pub use types::{DatabaseError, DatabaseResult};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

    Ok(pool)
}
