//! Strategy engine: merges a turn's slots into game state and decides what
//! the coach should say.
//!
//! The output is a structured [`Recommendation`]; wording is left to the
//! response generator.

mod build;
mod composition;
mod macro_play;
mod merge;

pub use build::{BuildAdvice, BuildContext, BuildReason, recommend_build};
pub use composition::{Composition, Defense, analyze};
pub use macro_play::{MacroAdvice, MacroCall, macro_call};
pub use merge::{StateChange, apply_hint, apply_slots};

use serde::Serialize;
use tracing::debug;

use crate::knowledge::{Champion, KnowledgeBase, LocalizedText, Role};
use crate::nlu::{Intent, IntentResult};
use crate::session::{GamePhase, GameState, Standing};

/// Matchup guidance for the player against one enemy
#[derive(Debug, Clone, Serialize)]
pub struct MatchupAdvice {
    pub own: Option<String>,
    pub enemy: String,
    /// Pair-specific tips from the catalog
    pub tips: Option<LocalizedText>,
    /// Enemy's primary role, used for generic advice
    pub enemy_role: Option<Role>,
    pub favored: Option<String>,
    /// Own champion's winrate in the current lane, as a percentage
    pub winrate: Option<f32>,
}

/// Self assessment
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatusReport {
    /// `None` when neither standing nor score is known
    pub standing: Option<Standing>,
    /// Standing was inferred from kills and deaths
    pub from_score: bool,
    pub kills: Option<u32>,
    pub deaths: Option<u32>,
    pub gold: Option<u32>,
    pub threats: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Acknowledgement {
    pub changes: Vec<StateChange>,
    /// Present when the turn mentioned two or more enemies
    pub composition: Option<Composition>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Clarification {
    /// Previous reply, to continue that line of advice
    pub last_reply: Option<String>,
    /// Best remembered advice for this context
    pub remembered: Option<String>,
    /// Champion, lane or opponent is still unknown
    pub missing_context: bool,
}

/// What the coach should say this turn
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum Recommendation {
    Build(BuildAdvice),
    Matchup(MatchupAdvice),
    Macro(MacroAdvice),
    Status(StatusReport),
    Acknowledge(Acknowledgement),
    Clarify(Clarification),
}

impl Recommendation {
    pub fn kind(&self) -> &'static str {
        match self {
            Recommendation::Build(_) => "build",
            Recommendation::Matchup(_) => "matchup",
            Recommendation::Macro(_) => "macro",
            Recommendation::Status(_) => "status",
            Recommendation::Acknowledge(_) => "acknowledge",
            Recommendation::Clarify(_) => "clarify",
        }
    }
}

/// Effective phase: stated by the player, else derived from turn count
pub fn effective_phase(state: &GameState, turn_count: u32) -> GamePhase {
    state
        .phase
        .unwrap_or_else(|| GamePhase::from_turns(turn_count))
}

/// Merge the turn into `state` and derive a recommendation.
///
/// `remembered` is ranked advice from earlier rated sessions, best first.
pub fn recommend(
    state: &mut GameState,
    result: &IntentResult,
    kb: &KnowledgeBase,
    turn_count: u32,
    remembered: &[String],
) -> Recommendation {
    let changes = apply_slots(state, &result.slots);
    let phase = effective_phase(state, turn_count);
    let mentioned = mentioned_enemies(state, result);

    let recommendation = match result.intent {
        Intent::AskBuild => build(state, kb, &mentioned, phase)
            .map(Recommendation::Build)
            .unwrap_or_else(|| clarify(state, remembered)),
        Intent::AskMatchup => matchup(state, kb, &mentioned)
            .map(Recommendation::Matchup)
            .unwrap_or_else(|| clarify(state, remembered)),
        Intent::AskMacro => Recommendation::Macro(macro_advice(state, result, phase)),
        Intent::AskStatus => Recommendation::Status(status(state)),
        Intent::UpdateGold | Intent::UpdateStatus | Intent::UpdateEnemyStatus => {
            let composition = (mentioned.len() >= 2).then(|| {
                let known: Vec<&Champion> = state
                    .enemies
                    .iter()
                    .filter_map(|e| kb.champion(&e.champion))
                    .collect();
                analyze(&known, &fed_names(state))
            });
            Recommendation::Acknowledge(Acknowledgement {
                changes,
                composition,
            })
        }
        Intent::Unknown => clarify(state, remembered),
    };

    debug!(
        intent = %result.intent,
        kind = recommendation.kind(),
        phase = %phase,
        "Strategy decided"
    );
    recommendation
}

/// Enemies named this turn, in mention order
fn mentioned_enemies(state: &GameState, result: &IntentResult) -> Vec<String> {
    result
        .slots
        .champions
        .iter()
        .map(|m| m.champion.clone())
        .filter(|name| {
            !state
                .champion
                .as_deref()
                .is_some_and(|own| own.eq_ignore_ascii_case(name))
        })
        .collect()
}

fn fed_names(state: &GameState) -> Vec<String> {
    state.fed_enemies().map(|e| e.champion.clone()).collect()
}

/// Build targets: this turn's mentions, else known enemies ordered ahead
/// first, then the lane opponent, then the rest.
fn build_targets(state: &GameState, mentioned: &[String]) -> Vec<String> {
    if !mentioned.is_empty() {
        return mentioned.to_vec();
    }

    let mut targets: Vec<String> = fed_names(state);
    if let Some(laner) = &state.lane_opponent
        && !targets.iter().any(|t| t.eq_ignore_ascii_case(laner))
    {
        targets.push(laner.clone());
    }
    for enemy in &state.enemies {
        if !targets.iter().any(|t| t.eq_ignore_ascii_case(&enemy.champion)) {
            targets.push(enemy.champion.clone());
        }
    }
    targets
}

fn build(
    state: &GameState,
    kb: &KnowledgeBase,
    mentioned: &[String],
    phase: GamePhase,
) -> Option<BuildAdvice> {
    let targets: Vec<&Champion> = build_targets(state, mentioned)
        .iter()
        .filter_map(|name| kb.champion(name))
        .collect();
    let composition = analyze(&targets, &fed_names(state));

    let ctx = BuildContext {
        own: state.champion.as_deref().and_then(|c| kb.champion(c)),
        owned: &state.items,
        phase,
        gold: state.gold,
    };
    recommend_build(kb, &targets, &composition, &ctx)
}

fn matchup(state: &GameState, kb: &KnowledgeBase, mentioned: &[String]) -> Option<MatchupAdvice> {
    let enemy_name = mentioned
        .first()
        .or(state.lane_opponent.as_ref())?
        .clone();
    let own = state.champion.as_deref().and_then(|c| kb.champion(c));
    let enemy = kb.champion(&enemy_name);

    let specific = own.and_then(|o| kb.matchup(&o.name, &enemy_name, state.lane));

    Some(MatchupAdvice {
        own: own.map(|o| o.name.clone()),
        enemy: enemy.map(|e| e.name.clone()).unwrap_or(enemy_name),
        tips: specific.map(|m| m.tips.clone()),
        enemy_role: enemy.and_then(Champion::primary_role),
        favored: specific.and_then(|m| m.favored.clone()),
        winrate: own
            .and_then(|o| o.winrate(state.lane))
            .map(|w| w.winrate),
    })
}

fn macro_advice(state: &GameState, result: &IntentResult, phase: GamePhase) -> MacroAdvice {
    let standing = state.standing.or_else(|| score_standing(state));
    let threats = fed_names(state);
    MacroAdvice {
        call: macro_call(phase, standing, result.slots.macro_topic, threats.len()),
        phase,
        standing,
        topic: result.slots.macro_topic,
        threats,
    }
}

/// Standing implied by kills minus deaths
fn score_standing(state: &GameState) -> Option<Standing> {
    if state.kills.is_none() && state.deaths.is_none() {
        return None;
    }
    let diff = i64::from(state.kills.unwrap_or(0)) - i64::from(state.deaths.unwrap_or(0));
    Some(match diff {
        d if d >= 2 => Standing::Ahead,
        d if d <= -2 => Standing::Behind,
        _ => Standing::Even,
    })
}

fn status(state: &GameState) -> StatusReport {
    let (standing, from_score) = match state.standing {
        Some(s) => (Some(s), false),
        None => {
            let derived = score_standing(state);
            (derived, derived.is_some())
        }
    };
    StatusReport {
        standing,
        from_score,
        kills: state.kills,
        deaths: state.deaths,
        gold: state.gold,
        threats: fed_names(state),
    }
}

fn clarify(state: &GameState, remembered: &[String]) -> Recommendation {
    Recommendation::Clarify(Clarification {
        last_reply: state.last_reply.clone(),
        remembered: remembered.first().cloned(),
        missing_context: !state.has_core_context(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Lane;
    use crate::nlu::classify;
    use crate::session::EnemyState;

    fn state() -> GameState {
        let mut state = GameState {
            champion: Some("Garen".to_string()),
            lane: Some(Lane::Top),
            lane_opponent: Some("Darius".to_string()),
            ..Default::default()
        };
        state.enemies.push(EnemyState {
            is_laner: true,
            ..EnemyState::new("Darius")
        });
        state
    }

    fn run(state: &mut GameState, text: &str) -> Recommendation {
        let kb = KnowledgeBase::seed().unwrap();
        let result = classify(text, "pt-BR", &kb);
        recommend(state, &result, &kb, 0, &[])
    }

    #[test]
    fn test_build_with_gold_counters_laner() {
        let kb = KnowledgeBase::seed().unwrap();
        let mut state = state();
        let rec = run(&mut state, "to com 1200 de ouro, qual item compro?");
        assert_eq!(state.gold, Some(1200));
        let Recommendation::Build(advice) = rec else {
            panic!("expected build, got {rec:?}");
        };
        let item = kb.item(&advice.item).unwrap();
        assert!(item.counters_any(&kb.champion("Darius").unwrap().archetypes()));
        assert!(item.cost <= 1200);
        assert_eq!(advice.targets, vec!["Darius".to_string()]);
    }

    #[test]
    fn test_build_targets_order() {
        let mut state = state();
        state.enemies.push(EnemyState::new("Lux"));
        state.enemies.push(EnemyState {
            standing: Standing::Ahead,
            ..EnemyState::new("Zed")
        });
        assert_eq!(build_targets(&state, &[]), vec!["Zed", "Darius", "Lux"]);
        assert_eq!(build_targets(&state, &["Lux".to_string()]), vec!["Lux"]);
    }

    #[test]
    fn test_enemy_update_acknowledged() {
        let mut state = state();
        let rec = run(&mut state, "yasuo ta fed");
        assert_eq!(state.enemy("Yasuo").unwrap().standing, Standing::Ahead);
        let Recommendation::Acknowledge(ack) = rec else {
            panic!("expected acknowledgement");
        };
        assert!(ack.composition.is_none());
        assert_eq!(ack.changes.len(), 1);
    }

    #[test]
    fn test_two_enemies_carry_composition_in_any_order() {
        let mut a = state();
        let mut b = state();
        let Recommendation::Acknowledge(first) = run(&mut a, "caitlyn e nami tao fed") else {
            panic!("expected acknowledgement");
        };
        let Recommendation::Acknowledge(second) = run(&mut b, "nami e caitlyn tao fed") else {
            panic!("expected acknowledgement");
        };
        let comp = first.composition.unwrap();
        assert_eq!(Some(comp.clone()), second.composition);
        assert!(comp.has_healer());
        assert!(comp.defenses.contains(&Defense::AntiHeal));
        assert_eq!(comp.threats, vec!["Caitlyn".to_string(), "Nami".to_string()]);
    }

    #[test]
    fn test_repeated_gold_is_idempotent() {
        let mut state = state();
        run(&mut state, "1500 de ouro");
        let before = state.clone();
        run(&mut state, "1500 de ouro");
        assert_eq!(state, before);
    }

    #[test]
    fn test_matchup_uses_catalog_tips() {
        let mut state = state();
        let Recommendation::Matchup(advice) = run(&mut state, "como jogo contra o darius?") else {
            panic!("expected matchup");
        };
        assert_eq!(advice.enemy, "Darius");
        assert!(advice.tips.is_some());
        assert!(advice.winrate.is_some());
    }

    #[test]
    fn test_matchup_generic_by_role() {
        let mut state = state();
        let Recommendation::Matchup(advice) = run(&mut state, "como jogo contra a soraka?") else {
            panic!("expected matchup");
        };
        assert!(advice.tips.is_none());
        assert_eq!(advice.enemy_role, Some(Role::Support));
    }

    #[test]
    fn test_status_from_score() {
        let mut state = state();
        state.kills = Some(1);
        state.deaths = Some(4);
        let Recommendation::Status(report) = run(&mut state, "como estou?") else {
            panic!("expected status");
        };
        assert_eq!(report.standing, Some(Standing::Behind));
        assert!(report.from_score);
    }

    #[test]
    fn test_macro_uses_topic() {
        let mut state = state();
        let Recommendation::Macro(advice) = run(&mut state, "vale all in?") else {
            panic!("expected macro");
        };
        assert_eq!(advice.call, MacroCall::AvoidAllIn);
        assert_eq!(advice.phase, GamePhase::Early);
    }

    #[test]
    fn test_unknown_clarifies_with_last_reply() {
        let mut state = state();
        state.last_reply = Some("Compre Chain Vest.".to_string());
        let remembered = vec!["Jogue seguro ate o nivel 3.".to_string()];
        let kb = KnowledgeBase::seed().unwrap();
        let result = classify("bom dia", "pt-BR", &kb);
        let Recommendation::Clarify(c) = recommend(&mut state, &result, &kb, 3, &remembered)
        else {
            panic!("expected clarification");
        };
        assert_eq!(c.last_reply.as_deref(), Some("Compre Chain Vest."));
        assert_eq!(c.remembered.as_deref(), Some("Jogue seguro ate o nivel 3."));
        assert!(!c.missing_context);
    }

    #[test]
    fn test_phase_from_turns_unless_stated() {
        let mut state = GameState::default();
        assert_eq!(effective_phase(&state, 7), GamePhase::Mid);
        state.phase = Some(GamePhase::Late);
        assert_eq!(effective_phase(&state, 0), GamePhase::Late);
    }
}
