//! Knowledge snapshot storage.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};

use super::Database;
use crate::error::{DatabaseError, ServiceResult};
use crate::knowledge::Catalog;

/// Snapshots kept after a save
const KEEP_SNAPSHOTS: i64 = 5;

impl Database {
    /// Store a synced catalog and prune old snapshots
    pub fn save_knowledge_snapshot(&self, catalog: &Catalog, source: &str) -> ServiceResult<i64> {
        let data = serde_json::to_string(catalog).map_err(DatabaseError::Serialization)?;
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO knowledge_snapshots (source, data, created_at) VALUES (?1, ?2, ?3)",
            params![source, data, Utc::now().to_rfc3339()],
        )
        .map_err(DatabaseError::Query)?;
        let id = conn.last_insert_rowid();

        conn.execute(
            "DELETE FROM knowledge_snapshots WHERE id NOT IN \
             (SELECT id FROM knowledge_snapshots ORDER BY id DESC LIMIT ?1)",
            params![KEEP_SNAPSHOTS],
        )
        .map_err(DatabaseError::Query)?;

        Ok(id)
    }

    /// The most recently synced catalog, if any
    pub fn latest_knowledge_snapshot(&self) -> ServiceResult<Option<Catalog>> {
        let conn = self.conn.lock().unwrap();

        let data: Option<String> = conn
            .query_row(
                "SELECT data FROM knowledge_snapshots ORDER BY id DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(DatabaseError::Query)?;

        data.map(|d| serde_json::from_str(&d).map_err(DatabaseError::Serialization))
            .transpose()
            .map_err(Into::into)
    }
}
