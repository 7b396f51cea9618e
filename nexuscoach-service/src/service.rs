//! Coaching service: ties the session store, knowledge base, strategy engine
//! and providers together.

mod admin;
mod prompts;
mod response;
mod turn;

pub use admin::{HealthReport, SyncSummary};
pub use turn::{ClientStateHint, TurnOutcome};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::db::{Database, Feedback};
use crate::error::{ServiceError, ServiceResult};
use crate::i18n::{DEFAULT_LOCALE, I18n};
use crate::knowledge::{CatalogFetcher, CatalogSource, KnowledgeBase, KnowledgeStore, Lane};
use crate::llm::{TextGenerator, build_generator};
use crate::session::{GameState, NewSession, SessionStore, build_store};
use crate::stt::{Transcriber, build_transcriber};

/// Request to open a session
#[derive(Debug, Clone)]
pub struct StartSession {
    pub device_id: String,
    pub locale: Option<String>,
    pub champion: String,
    pub lane: Lane,
    pub enemy: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionStarted {
    pub session_id: String,
    pub greeting: String,
    pub state: GameState,
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionEnded {
    pub session_id: String,
    pub message: String,
    pub turn_count: u32,
}

/// Main service coordinator
pub struct CoachService {
    pub sessions: Arc<dyn SessionStore>,
    pub knowledge: Arc<KnowledgeStore>,
    pub db: Arc<Database>,
    pub i18n: Arc<I18n>,
    generator: Option<Arc<dyn TextGenerator>>,
    transcriber: Option<Arc<dyn Transcriber>>,
    fetcher: CatalogFetcher,
    knowledge_source: CatalogSource,
    llm_timeout: Duration,
    persist_logs: bool,
}

impl CoachService {
    /// Create a new service instance from configuration
    pub async fn new(config: &AppConfig) -> ServiceResult<Self> {
        info!("Initializing NexusCoach service");

        let db_path = config.storage.database_path();
        let db = Arc::new(Database::open(&db_path)?);
        info!(path = %db_path.display(), "Database opened");

        let fetcher = CatalogFetcher::new()?;
        let knowledge_source = CatalogSource::from_config(&config.knowledge);
        let kb = load_knowledge(&db, &fetcher, &knowledge_source).await?;
        info!(
            champions = kb.champions().len(),
            items = kb.items().len(),
            "Knowledge base ready"
        );

        let sessions = build_store(&config.session, Some(db.clone()))?;
        let generator = build_generator(&config.llm)?;
        let transcriber = build_transcriber(&config.stt)?;

        Ok(Self::assemble(
            sessions,
            Arc::new(KnowledgeStore::new(kb)),
            db,
            generator,
            transcriber,
            fetcher,
            knowledge_source,
            config.llm.timeout(),
            config.storage.persist_logs,
        ))
    }

    #[allow(clippy::too_many_arguments)]
    pub(crate) fn assemble(
        sessions: Arc<dyn SessionStore>,
        knowledge: Arc<KnowledgeStore>,
        db: Arc<Database>,
        generator: Option<Arc<dyn TextGenerator>>,
        transcriber: Option<Arc<dyn Transcriber>>,
        fetcher: CatalogFetcher,
        knowledge_source: CatalogSource,
        llm_timeout: Duration,
        persist_logs: bool,
    ) -> Self {
        Self {
            sessions,
            knowledge,
            db,
            i18n: Arc::new(I18n::new()),
            generator,
            transcriber,
            fetcher,
            knowledge_source,
            llm_timeout,
            persist_logs,
        }
    }

    /// Open a coaching session and greet the player
    pub fn start_session(&self, request: StartSession) -> ServiceResult<SessionStarted> {
        let device_id = request.device_id.trim();
        if device_id.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "device_id is required".to_string(),
            });
        }
        let champion = request.champion.trim();
        if champion.is_empty() {
            return Err(ServiceError::InvalidRequest {
                message: "initial_context.champion is required".to_string(),
            });
        }

        // Unknown names are kept as typed; known ones take the catalog spelling
        let kb = self.knowledge.snapshot();
        let canonical = |name: &str| {
            kb.champion(name)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| name.to_string())
        };
        let champion = canonical(champion);
        let enemy = request
            .enemy
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .map(canonical);

        let locale = request
            .locale
            .as_deref()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .unwrap_or(DEFAULT_LOCALE)
            .to_string();

        let session = self.sessions.create(
            NewSession {
                device_id: device_id.to_string(),
                locale,
                champion,
                lane: request.lane,
                enemy,
            },
            Utc::now(),
        )?;

        let greeting = self.greeting(&session.locale, &session.state);
        metrics::counter!("nexuscoach_sessions_started_total").increment(1);
        info!(
            session_id = %session.id,
            locale = %session.locale,
            champion = session.state.champion.as_deref().unwrap_or(""),
            "Session started"
        );

        Ok(SessionStarted {
            session_id: session.id,
            greeting,
            state: session.state,
        })
    }

    fn greeting(&self, locale: &str, state: &GameState) -> String {
        let champion = state.champion.as_deref().unwrap_or_default();
        let lane = state
            .lane
            .map(|l| self.i18n.get(locale, &format!("lane-{l}"), None))
            .unwrap_or_default();
        match &state.lane_opponent {
            Some(enemy) => self.i18n.format(
                locale,
                "greeting-enemy",
                &[("champion", champion), ("lane", &lane), ("enemy", enemy)],
            ),
            None => self.i18n.format(
                locale,
                "greeting",
                &[("champion", champion), ("lane", &lane)],
            ),
        }
    }

    /// End a session, log it, and learn from the feedback
    pub fn end_session(
        &self,
        session_id: &str,
        feedback: Option<Feedback>,
    ) -> ServiceResult<SessionEnded> {
        let now = Utc::now();
        let session = self.sessions.end(session_id, now)?;

        if self.persist_logs {
            if let Err(e) = self.db.insert_session_log(&session, feedback.as_ref(), now) {
                warn!(session_id, error = %e, "Failed to write session log");
            }
            if let Some(feedback) = &feedback {
                match self.db.record_feedback(&session, feedback) {
                    Ok(rows) => {
                        info!(session_id, rating = %feedback.rating, rows, "Feedback recorded")
                    }
                    Err(e) => warn!(session_id, error = %e, "Failed to record feedback"),
                }
            }
        }

        metrics::counter!("nexuscoach_sessions_ended_total").increment(1);
        info!(session_id, turns = session.turn_count, "Session ended");

        let key = if feedback.is_some() {
            "session-ended-feedback"
        } else {
            "session-ended"
        };
        Ok(SessionEnded {
            session_id: session.id,
            message: self.i18n.get(&session.locale, key, None),
            turn_count: session.turn_count,
        })
    }
}

/// Latest stored snapshot, else the configured source, else the embedded seed
async fn load_knowledge(
    db: &Database,
    fetcher: &CatalogFetcher,
    source: &CatalogSource,
) -> ServiceResult<KnowledgeBase> {
    match db.latest_knowledge_snapshot() {
        Ok(Some(catalog)) => match KnowledgeBase::from_catalog(catalog) {
            Ok(kb) => {
                info!("Loaded knowledge from stored snapshot");
                return Ok(kb);
            }
            Err(e) => warn!(error = %e, "Stored knowledge snapshot is invalid"),
        },
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Failed to read knowledge snapshot"),
    }

    if *source != CatalogSource::Embedded {
        match fetcher.fetch(source).await.and_then(KnowledgeBase::from_catalog) {
            Ok(kb) => {
                info!(source = %source.describe(), "Loaded knowledge from configured source");
                return Ok(kb);
            }
            Err(e) => {
                warn!(source = %source.describe(), error = %e, "Falling back to embedded catalog")
            }
        }
    }

    KnowledgeBase::seed()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::config::SessionConfig;
    use crate::db::Rating;
    use crate::session::MemorySessionStore;
    use crate::session::StoreLimits;

    /// Service over an in-memory database and session store
    pub fn service_with(
        generator: Option<Arc<dyn TextGenerator>>,
        transcriber: Option<Arc<dyn Transcriber>>,
    ) -> CoachService {
        let config: SessionConfig = serde_json::from_str("{}").unwrap();
        CoachService::assemble(
            Arc::new(MemorySessionStore::new(StoreLimits::from_config(&config).unwrap())),
            Arc::new(KnowledgeStore::new(KnowledgeBase::seed().unwrap())),
            Arc::new(Database::open_in_memory().unwrap()),
            generator,
            transcriber,
            CatalogFetcher::new().unwrap(),
            CatalogSource::Embedded,
            Duration::from_millis(200),
            true,
        )
    }

    pub fn start(service: &CoachService, locale: &str) -> SessionStarted {
        service
            .start_session(StartSession {
                device_id: "device-1".to_string(),
                locale: Some(locale.to_string()),
                champion: "garen".to_string(),
                lane: Lane::Top,
                enemy: Some("darius".to_string()),
            })
            .unwrap()
    }

    #[test]
    fn test_start_session_greets_with_canonical_names() {
        let service = service_with(None, None);
        let started = start(&service, "en-US");

        assert_eq!(started.state.champion.as_deref(), Some("Garen"));
        assert_eq!(started.state.lane_opponent.as_deref(), Some("Darius"));
        assert_eq!(
            started.greeting,
            "Ready! Garen in top lane against Darius. Ask me about builds, the matchup, or what to do next."
        );
    }

    #[test]
    fn test_start_session_defaults_locale() {
        let service = service_with(None, None);
        let started = service
            .start_session(StartSession {
                device_id: "d".to_string(),
                locale: None,
                champion: "Ahri".to_string(),
                lane: Lane::Mid,
                enemy: None,
            })
            .unwrap();

        let session = service
            .sessions
            .get(&started.session_id, Utc::now())
            .unwrap();
        assert_eq!(session.locale, "pt-BR");
        assert!(started.greeting.contains("Ahri"));
    }

    #[test]
    fn test_start_session_validates_input() {
        let service = service_with(None, None);
        let err = service
            .start_session(StartSession {
                device_id: " ".to_string(),
                locale: None,
                champion: "Garen".to_string(),
                lane: Lane::Top,
                enemy: None,
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest { .. }));

        let err = service
            .start_session(StartSession {
                device_id: "d".to_string(),
                locale: None,
                champion: String::new(),
                lane: Lane::Top,
                enemy: None,
            })
            .unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest { .. }));
    }

    #[test]
    fn test_end_session_logs_and_forgets() {
        let service = service_with(None, None);
        let started = start(&service, "en");

        let ended = service
            .end_session(
                &started.session_id,
                Some(Feedback {
                    rating: Rating::Good,
                    comment: Some("nice".to_string()),
                }),
            )
            .unwrap();

        assert_eq!(ended.message, "Thanks for the feedback. Good game!");
        assert_eq!(service.db.count_session_logs().unwrap(), 1);

        let err = service.end_session(&started.session_id, None).unwrap_err();
        assert!(err.is_session_gone());
    }

    #[tokio::test]
    async fn test_load_knowledge_prefers_snapshot() {
        let db = Database::open_in_memory().unwrap();
        let fetcher = CatalogFetcher::new().unwrap();

        let seeded = load_knowledge(&db, &fetcher, &CatalogSource::Embedded)
            .await
            .unwrap();
        let mut catalog = seeded.catalog().clone();
        catalog.champions.truncate(3);
        catalog.matchups.clear();
        db.save_knowledge_snapshot(&catalog, "test").unwrap();

        let loaded = load_knowledge(&db, &fetcher, &CatalogSource::Embedded)
            .await
            .unwrap();
        assert_eq!(loaded.champions().len(), 3);
    }

    #[tokio::test]
    async fn test_load_knowledge_bad_file_falls_back_to_seed() {
        let db = Database::open_in_memory().unwrap();
        let fetcher = CatalogFetcher::new().unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("catalog.json");
        std::fs::write(&path, "not json").unwrap();

        let kb = load_knowledge(&db, &fetcher, &CatalogSource::File(path))
            .await
            .unwrap();
        assert_eq!(kb.champions().len(), KnowledgeBase::seed().unwrap().champions().len());
    }
}
