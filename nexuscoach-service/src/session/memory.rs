use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::debug;

use super::{NewSession, Session, SessionStore, StoreLimits, not_found};
use crate::error::ServiceResult;

/// Sessions held in process memory. Each mutation runs under the entry's
/// shard lock.
pub struct MemorySessionStore {
    sessions: DashMap<String, Session>,
    limits: StoreLimits,
}

impl MemorySessionStore {
    pub fn new(limits: StoreLimits) -> Self {
        Self {
            sessions: DashMap::new(),
            limits,
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl SessionStore for MemorySessionStore {
    fn create(&self, new: NewSession, now: DateTime<Utc>) -> ServiceResult<Session> {
        let before = self.sessions.len();
        self.sessions
            .retain(|_, s| !s.is_expired(now, self.limits.ttl));
        let swept = before - self.sessions.len();
        if swept > 0 {
            debug!(swept, "Swept expired sessions");
        }

        let session = Session::new(new, now);
        self.sessions.insert(session.id.clone(), session.clone());
        Ok(session)
    }

    fn get(&self, id: &str, now: DateTime<Utc>) -> ServiceResult<Session> {
        match self.sessions.entry(id.to_string()) {
            Entry::Occupied(entry) => {
                if let Err(e) = self.limits.check_live(entry.get(), now) {
                    entry.remove();
                    return Err(e);
                }
                Ok(entry.get().clone())
            }
            Entry::Vacant(_) => Err(not_found(id)),
        }
    }

    fn update(
        &self,
        id: &str,
        now: DateTime<Utc>,
        mutator: &mut dyn FnMut(&mut Session),
    ) -> ServiceResult<Session> {
        match self.sessions.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if let Err(e) = self.limits.check_live(entry.get(), now) {
                    entry.remove();
                    return Err(e);
                }
                let session = entry.get_mut();
                self.limits.apply(session, now, mutator);
                Ok(session.clone())
            }
            Entry::Vacant(_) => Err(not_found(id)),
        }
    }

    fn end(&self, id: &str, now: DateTime<Utc>) -> ServiceResult<Session> {
        let (_, session) = self.sessions.remove(id).ok_or_else(|| not_found(id))?;
        self.limits.check_live(&session, now)?;
        Ok(session)
    }
}
