//! Per-session game state and conversation history.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;

use crate::knowledge::Lane;
use crate::nlu::Intent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Standing {
    Ahead,
    Even,
    Behind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Early,
    Mid,
    Late,
}

impl GamePhase {
    /// Phase implied by how far the conversation has gone
    pub fn from_turns(turn_count: u32) -> Self {
        match turn_count {
            0..6 => GamePhase::Early,
            6..14 => GamePhase::Mid,
            _ => GamePhase::Late,
        }
    }
}

/// What we know about one enemy champion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnemyState {
    pub champion: String,
    pub standing: Standing,
    #[serde(default)]
    pub is_laner: bool,
    #[serde(default)]
    pub items: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub building: Option<String>,
}

impl EnemyState {
    pub fn new(champion: impl Into<String>) -> Self {
        Self {
            champion: champion.into(),
            standing: Standing::Even,
            is_laner: false,
            items: Vec::new(),
            building: None,
        }
    }
}

/// Game state accumulated over a session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameState {
    pub champion: Option<String>,
    pub lane: Option<Lane>,
    pub lane_opponent: Option<String>,
    #[serde(default)]
    pub enemies: Vec<EnemyState>,
    pub gold: Option<u32>,
    pub kills: Option<u32>,
    pub deaths: Option<u32>,
    pub assists: Option<u32>,
    /// Phase stated by the player; otherwise derived from turn count
    pub phase: Option<GamePhase>,
    pub standing: Option<Standing>,
    #[serde(default)]
    pub items: Vec<String>,
    pub building: Option<String>,
    pub last_intent: Option<Intent>,
    pub last_reply: Option<String>,
}

impl GameState {
    pub fn enemy(&self, champion: &str) -> Option<&EnemyState> {
        self.enemies
            .iter()
            .find(|e| e.champion.eq_ignore_ascii_case(champion))
    }

    /// Existing enemy entry or a new one
    pub fn upsert_enemy(&mut self, champion: &str) -> &mut EnemyState {
        let pos = match self
            .enemies
            .iter()
            .position(|e| e.champion.eq_ignore_ascii_case(champion))
        {
            Some(pos) => pos,
            None => {
                self.enemies.push(EnemyState::new(champion));
                self.enemies.len() - 1
            }
        };
        &mut self.enemies[pos]
    }

    /// Enemies currently ahead
    pub fn fed_enemies(&self) -> impl Iterator<Item = &EnemyState> {
        self.enemies.iter().filter(|e| e.standing == Standing::Ahead)
    }

    /// Champion, lane and opponent are all known
    pub fn has_core_context(&self) -> bool {
        self.champion.is_some() && self.lane.is_some() && self.lane_opponent.is_some()
    }
}

/// Context snapshot stored with each turn
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TurnContext {
    pub champion: Option<String>,
    pub lane: Option<Lane>,
    pub enemy: Option<String>,
    pub phase: Option<GamePhase>,
    pub standing: Option<Standing>,
    pub gold: Option<u32>,
}

/// One exchange in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub text: String,
    pub reply: String,
    pub intent: Intent,
    pub context: TurnContext,
    pub timestamp: DateTime<Utc>,
}

/// Data needed to open a session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub device_id: String,
    pub locale: String,
    pub champion: String,
    pub lane: Lane,
    pub enemy: Option<String>,
}

/// A coaching conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub device_id: String,
    pub locale: String,
    pub state: GameState,
    pub history: Vec<HistoryEntry>,
    pub turn_count: u32,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl Session {
    pub fn new(new: NewSession, now: DateTime<Utc>) -> Self {
        let mut state = GameState {
            champion: Some(new.champion),
            lane: Some(new.lane),
            ..Default::default()
        };
        if let Some(enemy) = new.enemy {
            state.upsert_enemy(&enemy).is_laner = true;
            state.lane_opponent = Some(enemy);
        }

        Self {
            id: Uuid::new_v4().to_string(),
            device_id: new.device_id,
            locale: new.locale,
            state,
            history: Vec::new(),
            turn_count: 0,
            created_at: now,
            last_activity: now,
        }
    }

    /// Inactive for longer than `ttl`
    pub fn is_expired(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        now - self.last_activity > ttl
    }

    /// Drop the oldest entries beyond `max`
    pub fn truncate_history(&mut self, max: usize) {
        if self.history.len() > max {
            let excess = self.history.len() - max;
            self.history.drain(..excess);
        }
    }

    pub fn phase(&self) -> GamePhase {
        self.state
            .phase
            .unwrap_or_else(|| GamePhase::from_turns(self.turn_count))
    }

    pub fn turn_context(&self) -> TurnContext {
        TurnContext {
            champion: self.state.champion.clone(),
            lane: self.state.lane,
            enemy: self.state.lane_opponent.clone(),
            phase: Some(self.phase()),
            standing: self.state.standing,
            gold: self.state.gold,
        }
    }
}
