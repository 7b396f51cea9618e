//! Turn and session logs.

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{Database, Feedback, TurnLog};
use crate::error::{DatabaseError, ServiceResult};
use crate::session::{HistoryEntry, Session};

const TURN_COLUMNS: &str = "id, session_id, text, reply, intent, reply_source, context, created_at";

impl Database {
    /// Append a processed turn
    pub fn insert_turn_log(
        &self,
        session_id: &str,
        entry: &HistoryEntry,
        reply_source: &str,
    ) -> ServiceResult<i64> {
        let context = serde_json::to_string(&entry.context).map_err(DatabaseError::Serialization)?;
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO turn_logs (session_id, text, reply, intent, reply_source, context, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                session_id,
                entry.text,
                entry.reply,
                entry.intent.to_string(),
                reply_source,
                context,
                entry.timestamp.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(conn.last_insert_rowid())
    }

    /// Turns of one session, oldest first
    pub fn session_turns(&self, session_id: &str, limit: u32) -> ServiceResult<Vec<TurnLog>> {
        let conn = self.conn.lock().unwrap();

        // Newest `limit` rows, then flipped back into conversation order
        let sql = format!(
            "SELECT {TURN_COLUMNS} FROM (\
               SELECT * FROM turn_logs WHERE session_id = ?1 ORDER BY id DESC LIMIT ?2\
             ) ORDER BY id ASC"
        );
        let mut stmt = conn.prepare(&sql).map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![session_id, limit], TurnLog::from_row)
            .map_err(DatabaseError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)
            .map_err(Into::into)
    }

    /// Most recent turns across all sessions, newest first
    pub fn recent_turns(&self, limit: u32) -> ServiceResult<Vec<TurnLog>> {
        let conn = self.conn.lock().unwrap();

        let sql = format!("SELECT {TURN_COLUMNS} FROM turn_logs ORDER BY id DESC LIMIT ?1");
        let mut stmt = conn.prepare(&sql).map_err(DatabaseError::Query)?;

        let rows = stmt
            .query_map(params![limit], TurnLog::from_row)
            .map_err(DatabaseError::Query)?;

        rows.collect::<Result<Vec<_>, _>>()
            .map_err(DatabaseError::Query)
            .map_err(Into::into)
    }

    /// Write the final state of an ended session
    pub fn insert_session_log(
        &self,
        session: &Session,
        feedback: Option<&Feedback>,
        ended_at: DateTime<Utc>,
    ) -> ServiceResult<()> {
        let state = serde_json::to_string(&session.state).map_err(DatabaseError::Serialization)?;
        let history =
            serde_json::to_string(&session.history).map_err(DatabaseError::Serialization)?;
        let conn = self.conn.lock().unwrap();

        conn.execute(
            "INSERT INTO session_logs \
             (session_id, device_id, locale, state, history, turn_count, rating, comment, created_at, ended_at) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
             ON CONFLICT(session_id) DO UPDATE SET state = excluded.state, \
             history = excluded.history, turn_count = excluded.turn_count, \
             rating = excluded.rating, comment = excluded.comment, ended_at = excluded.ended_at",
            params![
                session.id,
                session.device_id,
                session.locale,
                state,
                history,
                session.turn_count,
                feedback.map(|f| f.rating.to_string()),
                feedback.and_then(|f| f.comment.clone()),
                session.created_at.to_rfc3339(),
                ended_at.to_rfc3339(),
            ],
        )
        .map_err(DatabaseError::Query)?;

        Ok(())
    }

    /// Number of ended sessions on record
    pub fn count_session_logs(&self) -> ServiceResult<u64> {
        let conn = self.conn.lock().unwrap();

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM session_logs", [], |row| row.get(0))
            .map_err(DatabaseError::Query)?;

        Ok(count.max(0) as u64)
    }
}
