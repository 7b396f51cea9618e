//! Session row storage.
//!
//! Sessions are stored as one JSON document per row. Reads and writes happen
//! under the connection lock, so a read-modify-write through
//! [`Database::modify_session`] is atomic with respect to other callers.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use super::Database;
use crate::error::{DatabaseError, ServiceResult};
use crate::session::Session;

impl Database {
    /// Insert or replace a session row
    pub fn save_session(&self, session: &Session) -> ServiceResult<()> {
        let conn = self.conn.lock().unwrap();
        upsert(&conn, session)
    }

    /// Load a session by id
    pub fn load_session(&self, id: &str) -> ServiceResult<Option<Session>> {
        let conn = self.conn.lock().unwrap();
        load(&conn, id)
    }

    /// Load, mutate and write back a session while holding the lock.
    ///
    /// The closure sees `None` for an unknown id. Leaving `Some` stores the
    /// session; setting `None` deletes the row.
    pub fn modify_session<T>(
        &self,
        id: &str,
        f: impl FnOnce(&mut Option<Session>) -> T,
    ) -> ServiceResult<T> {
        let conn = self.conn.lock().unwrap();

        let mut slot = load(&conn, id)?;
        let existed = slot.is_some();
        let result = f(&mut slot);

        match slot {
            Some(session) => upsert(&conn, &session)?,
            None if existed => {
                conn.execute("DELETE FROM sessions WHERE id = ?1", params![id])
                    .map_err(DatabaseError::Query)?;
            }
            None => {}
        }

        Ok(result)
    }

    /// Delete sessions whose last activity is before `cutoff`
    pub fn delete_sessions_inactive_since(&self, cutoff: DateTime<Utc>) -> ServiceResult<usize> {
        let conn = self.conn.lock().unwrap();

        let rows = conn
            .execute(
                "DELETE FROM sessions WHERE last_activity_ts < ?1",
                params![cutoff.timestamp_millis()],
            )
            .map_err(DatabaseError::Query)?;

        Ok(rows)
    }
}

fn upsert(conn: &Connection, session: &Session) -> ServiceResult<()> {
    let data = serde_json::to_string(session).map_err(DatabaseError::Serialization)?;

    conn.execute(
        "INSERT INTO sessions (id, device_id, locale, data, last_activity_ts, created_at) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6) \
         ON CONFLICT(id) DO UPDATE SET data = excluded.data, \
         last_activity_ts = excluded.last_activity_ts",
        params![
            session.id,
            session.device_id,
            session.locale,
            data,
            session.last_activity.timestamp_millis(),
            session.created_at.to_rfc3339(),
        ],
    )
    .map_err(DatabaseError::Query)?;

    Ok(())
}

fn load(conn: &Connection, id: &str) -> ServiceResult<Option<Session>> {
    let data: Option<String> = conn
        .query_row(
            "SELECT data FROM sessions WHERE id = ?1",
            params![id],
            |row| row.get(0),
        )
        .optional()
        .map_err(DatabaseError::Query)?;

    match data {
        Some(data) => {
            let session = serde_json::from_str(&data).map_err(DatabaseError::Serialization)?;
            Ok(Some(session))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::new_session;
    use chrono::Duration;

    #[test]
    fn test_save_and_load_round_trip() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(new_session(), Utc::now());
        db.save_session(&session).unwrap();

        let loaded = db.load_session(&session.id).unwrap().unwrap();
        assert_eq!(loaded, session);
        assert!(db.load_session("missing").unwrap().is_none());
    }

    #[test]
    fn test_modify_session_writes_back_and_deletes() {
        let db = Database::open_in_memory().unwrap();
        let session = Session::new(new_session(), Utc::now());
        db.save_session(&session).unwrap();

        let gold = db
            .modify_session(&session.id, |slot| {
                let s = slot.as_mut().unwrap();
                s.state.gold = Some(900);
                s.state.gold
            })
            .unwrap();
        assert_eq!(gold, Some(900));
        assert_eq!(
            db.load_session(&session.id).unwrap().unwrap().state.gold,
            Some(900)
        );

        db.modify_session(&session.id, |slot| slot.take()).unwrap();
        assert!(db.load_session(&session.id).unwrap().is_none());
    }

    #[test]
    fn test_delete_inactive() {
        let db = Database::open_in_memory().unwrap();
        let now = Utc::now();
        let old = Session::new(new_session(), now - Duration::hours(2));
        let fresh = Session::new(new_session(), now);
        db.save_session(&old).unwrap();
        db.save_session(&fresh).unwrap();

        let removed = db
            .delete_sessions_inactive_since(now - Duration::hours(1))
            .unwrap();
        assert_eq!(removed, 1);
        assert!(db.load_session(&fresh.id).unwrap().is_some());
    }
}
