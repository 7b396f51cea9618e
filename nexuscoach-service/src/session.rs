//! Session store: per-conversation state with TTL expiry.
//!
//! Expiry is lazy. An expired session is removed the first time it is touched
//! and reported as [`ServiceError::SessionExpired`]; creating a session sweeps
//! every expired entry. There is no background timer.

mod memory;
mod sqlite;
mod state;

pub use memory::MemorySessionStore;
pub use sqlite::SqliteSessionStore;
pub use state::{
    EnemyState, GamePhase, GameState, HistoryEntry, NewSession, Session, Standing, TurnContext,
};

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::info;

use crate::config::{SessionBackend, SessionConfig};
use crate::db::Database;
use crate::error::{ServiceError, ServiceResult};

/// Storage backend for sessions
pub trait SessionStore: Send + Sync {
    /// Store a new session, sweeping expired ones first
    fn create(&self, new: NewSession, now: DateTime<Utc>) -> ServiceResult<Session>;

    /// Fetch a live session
    fn get(&self, id: &str, now: DateTime<Utc>) -> ServiceResult<Session>;

    /// Mutate a live session in place. Refreshes `last_activity` and trims
    /// history to the configured window.
    fn update(
        &self,
        id: &str,
        now: DateTime<Utc>,
        mutator: &mut dyn FnMut(&mut Session),
    ) -> ServiceResult<Session>;

    /// Remove a live session and return its final state
    fn end(&self, id: &str, now: DateTime<Utc>) -> ServiceResult<Session>;
}

/// Expiry and history bounds shared by the backends
#[derive(Debug, Clone, Copy)]
pub struct StoreLimits {
    pub ttl: Duration,
    pub max_history: usize,
}

impl StoreLimits {
    pub fn from_config(config: &SessionConfig) -> ServiceResult<Self> {
        let ttl = i64::try_from(config.ttl_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| ServiceError::Config {
                message: format!("session.ttl_secs is out of range: {}", config.ttl_secs),
            })?;
        Ok(Self {
            ttl,
            max_history: config.max_history,
        })
    }

    fn check_live(&self, session: &Session, now: DateTime<Utc>) -> ServiceResult<()> {
        if session.is_expired(now, self.ttl) {
            Err(ServiceError::SessionExpired {
                session_id: session.id.clone(),
            })
        } else {
            Ok(())
        }
    }

    fn apply(
        &self,
        session: &mut Session,
        now: DateTime<Utc>,
        mutator: &mut dyn FnMut(&mut Session),
    ) {
        mutator(session);
        session.last_activity = now;
        session.truncate_history(self.max_history);
    }
}

fn not_found(id: &str) -> ServiceError {
    ServiceError::SessionNotFound {
        session_id: id.to_string(),
    }
}

/// Build the configured session store
pub fn build_store(
    config: &SessionConfig,
    db: Option<Arc<Database>>,
) -> ServiceResult<Arc<dyn SessionStore>> {
    let limits = StoreLimits::from_config(config)?;
    match (config.backend, db) {
        (SessionBackend::Memory, _) => {
            info!(ttl_secs = config.ttl_secs, "Using in-memory session store");
            Ok(Arc::new(MemorySessionStore::new(limits)))
        }
        (SessionBackend::Sqlite, Some(db)) => {
            info!(ttl_secs = config.ttl_secs, "Using SQLite session store");
            Ok(Arc::new(SqliteSessionStore::new(db, limits)))
        }
        (SessionBackend::Sqlite, None) => Err(ServiceError::Config {
            message: "session.backend = sqlite requires a database".to_string(),
        }),
    }
}
