//! Database module for SQLite operations.
//!
//! This module provides the `Database` struct and all database operations
//! organized into submodules by domain.

mod advice;
mod knowledge;
mod logs;
mod migrations;
pub mod models;
mod sessions;

pub use models::{AdviceQuery, Feedback, Rating, TurnLog};

use rusqlite::Connection;
use std::path::Path;
use std::sync::Mutex;

use crate::error::{DatabaseError, ServiceError, ServiceResult};

/// Database manager for SQLite operations
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> ServiceResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ServiceError::Database(DatabaseError::Connection(
                    rusqlite::Error::ToSqlConversionFailure(Box::new(e)),
                ))
            })?;
        }

        let conn = Connection::open(path).map_err(DatabaseError::Connection)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(DatabaseError::Query)?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Private in-memory database
    #[cfg(test)]
    pub fn open_in_memory() -> ServiceResult<Self> {
        let conn = Connection::open_in_memory().map_err(DatabaseError::Connection)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")
            .map_err(DatabaseError::Query)?;

        migrations::run_migrations(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}
