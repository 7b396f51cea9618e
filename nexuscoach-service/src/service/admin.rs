//! Catalog sync, lookups and turn logs for operators.

use serde::Serialize;
use tracing::info;

use super::CoachService;
use crate::db::TurnLog;
use crate::error::{ServiceError, ServiceResult};
use crate::knowledge::{Champion, Item, ItemCategory, KnowledgeBase};

/// Turn log page size when the caller gives none
pub const DEFAULT_TURN_LIMIT: u32 = 50;
const MAX_TURN_LIMIT: u32 = 500;

#[derive(Debug, Clone, Serialize)]
pub struct SyncSummary {
    pub source: String,
    pub snapshot_id: i64,
    pub champions: usize,
    pub items: usize,
    pub matchups: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: &'static str,
    pub version: &'static str,
    pub champions: usize,
    pub items: usize,
    pub generator: Option<&'static str>,
    pub transcriber: Option<&'static str>,
}

impl CoachService {
    /// Reload the catalog from the configured source, store it, and swap it in
    pub async fn sync_game_data(&self) -> ServiceResult<SyncSummary> {
        let source = self.knowledge_source.describe();
        info!(source = %source, "Syncing game data");

        let catalog = self.fetcher.fetch(&self.knowledge_source).await?;
        let kb = KnowledgeBase::from_catalog(catalog)?;
        let snapshot_id = self.db.save_knowledge_snapshot(kb.catalog(), &source)?;

        let summary = SyncSummary {
            source,
            snapshot_id,
            champions: kb.champions().len(),
            items: kb.items().len(),
            matchups: kb.catalog().matchups.len(),
        };
        self.knowledge.replace(kb);

        info!(
            snapshot_id,
            champions = summary.champions,
            items = summary.items,
            matchups = summary.matchups,
            "Game data synced"
        );
        Ok(summary)
    }

    pub fn champion(&self, name: &str) -> ServiceResult<Champion> {
        self.knowledge
            .snapshot()
            .champion(name)
            .cloned()
            .ok_or_else(|| ServiceError::ChampionNotFound {
                name: name.to_string(),
            })
    }

    pub fn item(&self, name: &str) -> ServiceResult<Item> {
        self.knowledge
            .snapshot()
            .item(name)
            .cloned()
            .ok_or_else(|| ServiceError::ItemNotFound {
                name: name.to_string(),
            })
    }

    /// Catalog items, optionally one category only
    pub fn items(&self, category: Option<ItemCategory>) -> Vec<Item> {
        let kb = self.knowledge.snapshot();
        match category {
            Some(category) => kb.items_by_category(category).into_iter().cloned().collect(),
            None => kb.items().to_vec(),
        }
    }

    /// Logged turns of one session, oldest first
    pub fn session_turns(&self, session_id: &str, limit: Option<u32>) -> ServiceResult<Vec<TurnLog>> {
        self.db.session_turns(session_id, clamp_limit(limit))
    }

    /// Latest logged turns across sessions, newest first
    pub fn recent_turns(&self, limit: Option<u32>) -> ServiceResult<Vec<TurnLog>> {
        self.db.recent_turns(clamp_limit(limit))
    }

    pub fn health(&self) -> HealthReport {
        let kb = self.knowledge.snapshot();
        HealthReport {
            status: "ok",
            version: env!("CARGO_PKG_VERSION"),
            champions: kb.champions().len(),
            items: kb.items().len(),
            generator: self.generator.as_ref().map(|g| g.name()),
            transcriber: self.transcriber.as_ref().map(|t| t.name()),
        }
    }
}

fn clamp_limit(limit: Option<u32>) -> u32 {
    limit.unwrap_or(DEFAULT_TURN_LIMIT).clamp(1, MAX_TURN_LIMIT)
}
