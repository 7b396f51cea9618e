use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::{NewSession, Session, SessionStore, StoreLimits, not_found};
use crate::db::Database;
use crate::error::ServiceResult;

/// Sessions persisted as JSON rows. Survives restarts; each mutation is a
/// read-modify-write under the database lock.
pub struct SqliteSessionStore {
    db: Arc<Database>,
    limits: StoreLimits,
}

impl SqliteSessionStore {
    pub fn new(db: Arc<Database>, limits: StoreLimits) -> Self {
        Self { db, limits }
    }

    /// Run `f` on a live session, deleting it if expired
    fn with_live<T>(
        &self,
        id: &str,
        now: DateTime<Utc>,
        f: impl FnOnce(&mut Session) -> T,
    ) -> ServiceResult<T> {
        self.db.modify_session(id, |slot| {
            let Some(session) = slot.as_mut() else {
                return Err(not_found(id));
            };
            if let Err(e) = self.limits.check_live(session, now) {
                *slot = None;
                return Err(e);
            }
            Ok(f(session))
        })?
    }
}

impl SessionStore for SqliteSessionStore {
    fn create(&self, new: NewSession, now: DateTime<Utc>) -> ServiceResult<Session> {
        let swept = self.db.delete_sessions_inactive_since(now - self.limits.ttl)?;
        if swept > 0 {
            debug!(swept, "Swept expired sessions");
        }

        let session = Session::new(new, now);
        self.db.save_session(&session)?;
        Ok(session)
    }

    fn get(&self, id: &str, now: DateTime<Utc>) -> ServiceResult<Session> {
        self.with_live(id, now, |session| session.clone())
    }

    fn update(
        &self,
        id: &str,
        now: DateTime<Utc>,
        mutator: &mut dyn FnMut(&mut Session),
    ) -> ServiceResult<Session> {
        self.with_live(id, now, |session| {
            self.limits.apply(session, now, mutator);
            session.clone()
        })
    }

    fn end(&self, id: &str, now: DateTime<Utc>) -> ServiceResult<Session> {
        self.db.modify_session(id, |slot| {
            let session = slot.take().ok_or_else(|| not_found(id))?;
            self.limits.check_live(&session, now)?;
            Ok(session)
        })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{exercise_store, exercise_sweep};
    use chrono::Duration;

    fn limits() -> StoreLimits {
        StoreLimits {
            ttl: Duration::seconds(60),
            max_history: 4,
        }
    }

    fn store() -> SqliteSessionStore {
        SqliteSessionStore::new(Arc::new(Database::open_in_memory().unwrap()), limits())
    }

    #[test]
    fn test_sqlite_store_contract() {
        exercise_store(&store(), limits());
    }

    #[test]
    fn test_sqlite_store_sweeps_on_create() {
        exercise_sweep(&store(), limits());
    }

    #[test]
    fn test_sessions_survive_store_recreation() {
        let db = Arc::new(Database::open_in_memory().unwrap());
        let now = Utc::now();
        let id = SqliteSessionStore::new(db.clone(), limits())
            .create(crate::session::tests::new_session(), now)
            .unwrap()
            .id;

        let reopened = SqliteSessionStore::new(db, limits());
        assert_eq!(reopened.get(&id, now).unwrap().id, id);
    }
}
