//! Database schema migrations.

use rusqlite::Connection;

use crate::error::{DatabaseError, ServiceResult};

/// Run all database migrations.
///
/// Called when the database is opened so the schema is always current.
pub(super) fn run_migrations(conn: &Connection) -> ServiceResult<()> {
    conn.execute_batch(
        r#"
        -- Live sessions for the sqlite session store
        CREATE TABLE IF NOT EXISTS sessions (
            id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL,
            locale TEXT NOT NULL,
            data TEXT NOT NULL,
            last_activity_ts INTEGER NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_activity ON sessions(last_activity_ts);

        -- One row per processed turn
        CREATE TABLE IF NOT EXISTS turn_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            session_id TEXT NOT NULL,
            text TEXT NOT NULL,
            reply TEXT NOT NULL,
            intent TEXT NOT NULL,
            context TEXT NOT NULL,
            created_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_turn_logs_session ON turn_logs(session_id, id);

        -- Final session snapshot written at session end
        CREATE TABLE IF NOT EXISTS session_logs (
            session_id TEXT PRIMARY KEY,
            device_id TEXT NOT NULL,
            locale TEXT NOT NULL,
            state TEXT NOT NULL,
            history TEXT NOT NULL,
            turn_count INTEGER NOT NULL,
            rating TEXT,
            comment TEXT,
            created_at TEXT NOT NULL,
            ended_at TEXT NOT NULL
        );

        -- Replies remembered through end-of-session feedback.
        -- Context columns hold '' instead of NULL so the unique key matches.
        CREATE TABLE IF NOT EXISTS advice_bank (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            champion TEXT NOT NULL DEFAULT '',
            lane TEXT NOT NULL DEFAULT '',
            enemy TEXT NOT NULL DEFAULT '',
            intent TEXT NOT NULL DEFAULT '',
            phase TEXT NOT NULL DEFAULT '',
            standing TEXT NOT NULL DEFAULT '',
            reply_text TEXT NOT NULL,
            positive INTEGER NOT NULL DEFAULT 0,
            negative INTEGER NOT NULL DEFAULT 0,
            score INTEGER NOT NULL DEFAULT 0,
            last_seen TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_advice_context
            ON advice_bank(champion, lane, enemy, intent, phase, standing, reply_text);

        -- Synced game catalogs, newest wins
        CREATE TABLE IF NOT EXISTS knowledge_snapshots (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            source TEXT NOT NULL,
            data TEXT NOT NULL,
            created_at TEXT NOT NULL
        );
        "#,
    )
    .map_err(DatabaseError::Query)?;

    run_reply_source_migration(conn)?;

    Ok(())
}

/// Add reply_source to turn_logs.
fn run_reply_source_migration(conn: &Connection) -> ServiceResult<()> {
    let has_column: bool = conn
        .query_row(
            "SELECT COUNT(*) FROM pragma_table_info('turn_logs') WHERE name='reply_source'",
            [],
            |row| row.get::<_, i64>(0).map(|c| c > 0),
        )
        .map_err(DatabaseError::Query)?;

    if !has_column {
        conn.execute_batch(
            "ALTER TABLE turn_logs ADD COLUMN reply_source TEXT NOT NULL DEFAULT 'fallback';",
        )
        .map_err(DatabaseError::Query)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_migrations(&conn).unwrap();
        run_migrations(&conn).unwrap();

        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name IN \
                 ('sessions','turn_logs','session_logs','advice_bank','knowledge_snapshots')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 5);
    }
}
