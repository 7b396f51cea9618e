//! Database row models.

use chrono::{DateTime, Utc};
use rusqlite::Row;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::knowledge::Lane;
use crate::nlu::Intent;
use crate::session::{GamePhase, Standing, TurnContext};

/// End-of-session rating
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Good,
    Bad,
}

impl Rating {
    /// Score delta applied to each remembered reply
    pub fn delta(&self) -> i64 {
        match self {
            Rating::Good => 1,
            Rating::Bad => -1,
        }
    }
}

/// Feedback sent when a session ends
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feedback {
    pub rating: Rating,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// A logged turn
#[derive(Debug, Clone, Serialize)]
pub struct TurnLog {
    pub id: i64,
    pub session_id: String,
    pub text: String,
    pub reply: String,
    pub intent: Intent,
    pub reply_source: String,
    pub context: TurnContext,
    pub created_at: DateTime<Utc>,
}

impl TurnLog {
    pub(crate) fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        let intent_str: String = row.get(4)?;
        let context_str: String = row.get(6)?;
        let created_at_str: String = row.get(7)?;

        Ok(Self {
            id: row.get(0)?,
            session_id: row.get(1)?,
            text: row.get(2)?,
            reply: row.get(3)?,
            intent: intent_str.parse().unwrap_or_default(),
            reply_source: row.get(5)?,
            context: serde_json::from_str(&context_str).unwrap_or_default(),
            created_at: DateTime::parse_from_rfc3339(&created_at_str)
                .map(|dt| dt.with_timezone(&Utc))
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

/// Context used to look up remembered advice
#[derive(Debug, Clone, Default)]
pub struct AdviceQuery {
    pub champion: Option<String>,
    pub lane: Option<Lane>,
    pub enemy: Option<String>,
    pub intent: Option<Intent>,
    pub phase: Option<GamePhase>,
    pub standing: Option<Standing>,
}

impl AdviceQuery {
    pub fn from_context(context: &TurnContext, intent: Intent) -> Self {
        Self {
            champion: context.champion.clone(),
            lane: context.lane,
            enemy: context.enemy.clone(),
            intent: Some(intent),
            phase: context.phase,
            standing: context.standing,
        }
    }
}

/// Key column value: lowercased, '' when absent
pub(crate) fn key_text(value: Option<impl ToString>) -> String {
    value
        .map(|v| v.to_string().trim().to_lowercase())
        .unwrap_or_default()
}
