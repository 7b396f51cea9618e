//! Macro calls from phase, standing and topic.

use serde::Serialize;
use strum::Display;

use crate::nlu::MacroTopic;
use crate::session::{GamePhase, Standing};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "kebab-case")]
#[serde(rename_all = "snake_case")]
pub enum MacroCall {
    PressObjectives,
    ContestWithVision,
    SplitPush,
    Group,
    PlaySafe,
    AvoidAllIn,
    ForceAllIn,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacroAdvice {
    pub call: MacroCall,
    pub phase: GamePhase,
    pub standing: Option<Standing>,
    pub topic: Option<MacroTopic>,
    pub threats: Vec<String>,
}

/// Decide the macro call. `threats` are enemies currently ahead.
pub fn macro_call(
    phase: GamePhase,
    standing: Option<Standing>,
    topic: Option<MacroTopic>,
    threats: usize,
) -> MacroCall {
    let ahead = standing == Some(Standing::Ahead);
    let behind = standing == Some(Standing::Behind);

    match topic {
        Some(MacroTopic::AllIn) => {
            if ahead && threats == 0 {
                MacroCall::ForceAllIn
            } else {
                MacroCall::AvoidAllIn
            }
        }
        Some(MacroTopic::Objective) => {
            if behind {
                MacroCall::PlaySafe
            } else if ahead && threats == 0 {
                MacroCall::PressObjectives
            } else {
                MacroCall::ContestWithVision
            }
        }
        Some(MacroTopic::Split) => {
            if behind || threats >= 2 {
                MacroCall::Group
            } else {
                MacroCall::SplitPush
            }
        }
        Some(MacroTopic::Teamfight) => {
            if behind {
                MacroCall::PlaySafe
            } else {
                MacroCall::Group
            }
        }
        None => match (phase, standing) {
            (_, Some(Standing::Behind)) => MacroCall::PlaySafe,
            (GamePhase::Late, _) => MacroCall::Group,
            (_, Some(Standing::Ahead)) => MacroCall::PressObjectives,
            (GamePhase::Early, _) if threats > 0 => MacroCall::PlaySafe,
            (GamePhase::Early, _) => MacroCall::ContestWithVision,
            (GamePhase::Mid, _) => MacroCall::Group,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_in() {
        assert_eq!(
            macro_call(GamePhase::Early, None, Some(MacroTopic::AllIn), 0),
            MacroCall::AvoidAllIn
        );
        assert_eq!(
            macro_call(GamePhase::Mid, Some(Standing::Ahead), Some(MacroTopic::AllIn), 0),
            MacroCall::ForceAllIn
        );
        assert_eq!(
            macro_call(GamePhase::Mid, Some(Standing::Ahead), Some(MacroTopic::AllIn), 1),
            MacroCall::AvoidAllIn
        );
    }

    #[test]
    fn test_objectives() {
        assert_eq!(
            macro_call(GamePhase::Mid, Some(Standing::Ahead), Some(MacroTopic::Objective), 0),
            MacroCall::PressObjectives
        );
        assert_eq!(
            macro_call(GamePhase::Mid, None, Some(MacroTopic::Objective), 0),
            MacroCall::ContestWithVision
        );
        assert_eq!(
            macro_call(GamePhase::Mid, Some(Standing::Behind), Some(MacroTopic::Objective), 0),
            MacroCall::PlaySafe
        );
    }

    #[test]
    fn test_split_vs_group() {
        assert_eq!(
            macro_call(GamePhase::Mid, Some(Standing::Even), Some(MacroTopic::Split), 0),
            MacroCall::SplitPush
        );
        assert_eq!(
            macro_call(GamePhase::Mid, Some(Standing::Even), Some(MacroTopic::Split), 2),
            MacroCall::Group
        );
    }

    #[test]
    fn test_no_topic() {
        assert_eq!(macro_call(GamePhase::Early, None, None, 0), MacroCall::ContestWithVision);
        assert_eq!(macro_call(GamePhase::Early, None, None, 1), MacroCall::PlaySafe);
        assert_eq!(macro_call(GamePhase::Late, None, None, 0), MacroCall::Group);
        assert_eq!(
            macro_call(GamePhase::Late, Some(Standing::Behind), None, 0),
            MacroCall::PlaySafe
        );
        assert_eq!(
            macro_call(GamePhase::Mid, Some(Standing::Ahead), None, 0),
            MacroCall::PressObjectives
        );
    }

    #[test]
    fn test_call_message_suffix() {
        assert_eq!(MacroCall::SplitPush.to_string(), "split-push");
        assert_eq!(MacroCall::AvoidAllIn.to_string(), "avoid-all-in");
    }
}
