//! Merging extracted slots into session state.

use serde::Serialize;

use crate::knowledge::Lane;
use crate::nlu::{ItemOwner, ItemProgress, Slots};
use crate::session::{GamePhase, GameState, Standing};

/// One piece of state recorded from an utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum StateChange {
    Gold {
        gold: u32,
    },
    Score {
        kills: Option<u32>,
        deaths: Option<u32>,
        assists: Option<u32>,
    },
    Standing {
        standing: Standing,
    },
    Phase {
        phase: GamePhase,
    },
    Champion {
        champion: String,
    },
    Lane {
        lane: Lane,
    },
    Enemy {
        champion: String,
        standing: Option<Standing>,
        is_laner: bool,
    },
    EnemyItem {
        champion: String,
        item: String,
        progress: ItemProgress,
    },
    OwnItem {
        item: String,
        progress: ItemProgress,
    },
}

/// Merge slots into `state` and report what was recorded.
///
/// Gold is replaced, never added. Champion and lane only fill in when unset.
/// Enemies are upserted by name; items are appended once.
pub fn apply_slots(state: &mut GameState, slots: &Slots) -> Vec<StateChange> {
    let mut changes = Vec::new();

    if let Some(gold) = slots.gold {
        state.gold = Some(gold);
        changes.push(StateChange::Gold { gold });
    }

    if slots.kills.is_some() || slots.deaths.is_some() || slots.assists.is_some() {
        state.kills = slots.kills.or(state.kills);
        state.deaths = slots.deaths.or(state.deaths);
        state.assists = slots.assists.or(state.assists);
        changes.push(StateChange::Score {
            kills: slots.kills,
            deaths: slots.deaths,
            assists: slots.assists,
        });
    }

    if let Some(standing) = slots.standing {
        state.standing = Some(standing);
        changes.push(StateChange::Standing { standing });
    }

    if let Some(phase) = slots.phase {
        state.phase = Some(phase);
        changes.push(StateChange::Phase { phase });
    }

    if state.champion.is_none()
        && let Some(champion) = &slots.own_champion
    {
        state.champion = Some(champion.clone());
        changes.push(StateChange::Champion {
            champion: champion.clone(),
        });
    }

    if state.lane.is_none()
        && let Some(lane) = slots.lane
    {
        state.lane = Some(lane);
        changes.push(StateChange::Lane { lane });
    }

    for mention in &slots.champions {
        if is_own(state, &mention.champion) {
            continue;
        }
        let enemy = state.upsert_enemy(&mention.champion);
        if let Some(standing) = mention.standing {
            enemy.standing = standing;
        }
        if mention.is_laner {
            enemy.is_laner = true;
            state.lane_opponent = Some(mention.champion.clone());
        }
        changes.push(StateChange::Enemy {
            champion: mention.champion.clone(),
            standing: mention.standing,
            is_laner: mention.is_laner,
        });
    }

    if let Some(item) = &slots.item {
        match &item.owner {
            ItemOwner::Own => {
                record_item(&mut state.items, &mut state.building, &item.item, item.progress);
                changes.push(StateChange::OwnItem {
                    item: item.item.clone(),
                    progress: item.progress,
                });
            }
            ItemOwner::Enemy(champion) if !is_own(state, champion) => {
                let enemy = state.upsert_enemy(champion);
                record_item(&mut enemy.items, &mut enemy.building, &item.item, item.progress);
                changes.push(StateChange::EnemyItem {
                    champion: champion.clone(),
                    item: item.item.clone(),
                    progress: item.progress,
                });
            }
            ItemOwner::Enemy(_) => {}
        }
    }

    changes
}

/// Apply a client-side state hint. Same rules as slots.
pub fn apply_hint(
    state: &mut GameState,
    gold: Option<u32>,
    kills: Option<u32>,
    deaths: Option<u32>,
    standing: Option<Standing>,
    phase: Option<GamePhase>,
) {
    let slots = Slots {
        gold,
        kills,
        deaths,
        standing,
        phase,
        ..Default::default()
    };
    apply_slots(state, &slots);
}

fn is_own(state: &GameState, champion: &str) -> bool {
    state
        .champion
        .as_deref()
        .is_some_and(|own| own.eq_ignore_ascii_case(champion))
}

fn record_item(
    items: &mut Vec<String>,
    building: &mut Option<String>,
    item: &str,
    progress: ItemProgress,
) {
    match progress {
        ItemProgress::Has => {
            if !items.iter().any(|i| i == item) {
                items.push(item.to_string());
            }
            if building.as_deref() == Some(item) {
                *building = None;
            }
        }
        ItemProgress::Building => *building = Some(item.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::KnowledgeBase;
    use crate::nlu::classify;

    fn state() -> GameState {
        GameState {
            champion: Some("Garen".to_string()),
            lane: Some(Lane::Top),
            ..Default::default()
        }
    }

    fn slots(text: &str) -> Slots {
        let kb = KnowledgeBase::seed().unwrap();
        classify(text, "pt-BR", &kb).slots
    }

    #[test]
    fn test_gold_is_replaced_not_added() {
        let mut state = state();
        let s = slots("1500 de ouro");
        apply_slots(&mut state, &s);
        apply_slots(&mut state, &s);
        assert_eq!(state.gold, Some(1500));
    }

    #[test]
    fn test_enemy_standing_recorded() {
        let mut state = state();
        let changes = apply_slots(&mut state, &slots("yasuo ta fed"));
        assert_eq!(state.enemy("Yasuo").unwrap().standing, Standing::Ahead);
        assert!(matches!(&changes[0], StateChange::Enemy { champion, .. } if champion == "Yasuo"));

        // A later plain mention keeps the standing
        apply_slots(&mut state, &slots("o yasuo ta bot"));
        assert_eq!(state.enemy("Yasuo").unwrap().standing, Standing::Ahead);
        assert_eq!(state.enemies.len(), 1);
    }

    #[test]
    fn test_champion_and_lane_are_locked() {
        let mut state = state();
        let s = Slots {
            own_champion: Some("Darius".to_string()),
            lane: Some(Lane::Mid),
            ..Default::default()
        };
        let changes = apply_slots(&mut state, &s);
        assert_eq!(state.champion.as_deref(), Some("Garen"));
        assert_eq!(state.lane, Some(Lane::Top));
        assert!(changes.is_empty());
    }

    #[test]
    fn test_laner_sets_lane_opponent() {
        let mut state = state();
        apply_slots(&mut state, &slots("como jogo contra o darius"));
        assert_eq!(state.lane_opponent.as_deref(), Some("Darius"));
        assert!(state.enemy("Darius").unwrap().is_laner);
    }

    #[test]
    fn test_items_appended_once() {
        let mut state = state();
        let s = slots("darius fez thornmail");
        apply_slots(&mut state, &s);
        apply_slots(&mut state, &s);
        let darius = state.enemy("Darius").unwrap();
        assert_eq!(darius.items, vec!["Thornmail".to_string()]);
    }

    #[test]
    fn test_own_item_building_then_done() {
        let mut items = Vec::new();
        let mut building = None;
        record_item(&mut items, &mut building, "Sunfire Aegis", ItemProgress::Building);
        assert_eq!(building.as_deref(), Some("Sunfire Aegis"));
        record_item(&mut items, &mut building, "Sunfire Aegis", ItemProgress::Has);
        assert!(building.is_none());
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn test_hint_uses_same_rules() {
        let mut state = state();
        apply_hint(&mut state, Some(900), Some(2), None, Some(Standing::Ahead), None);
        assert_eq!(state.gold, Some(900));
        assert_eq!(state.kills, Some(2));
        assert_eq!(state.standing, Some(Standing::Ahead));
    }
}
