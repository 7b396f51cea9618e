//! Intent rule table.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::extract::Slots;
use super::text::contains_any;

/// Closed set of turn intents
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    AskBuild,
    AskMatchup,
    AskMacro,
    AskStatus,
    UpdateGold,
    UpdateStatus,
    UpdateEnemyStatus,
    #[default]
    Unknown,
}

impl Intent {
    /// Intents that only report state
    pub fn is_update(&self) -> bool {
        matches!(
            self,
            Intent::UpdateGold | Intent::UpdateStatus | Intent::UpdateEnemyStatus
        )
    }
}

/// How a rule decides whether it fires
pub enum Matcher {
    /// Any keyword (single or multi-word) on token boundaries
    Keywords(&'static [&'static str]),
    /// Predicate over the extracted slots
    Slots(fn(&Slots) -> bool),
}

pub struct Rule {
    pub name: &'static str,
    pub priority: u8,
    pub intent: Intent,
    pub matcher: Matcher,
}

impl Rule {
    pub fn matches(&self, tokens: &[&str], slots: &Slots) -> bool {
        match &self.matcher {
            Matcher::Keywords(keywords) => contains_any(tokens, keywords),
            Matcher::Slots(predicate) => predicate(slots),
        }
    }
}

/// Ordered rule table. Higher priority wins; equal priorities keep table order.
pub static RULES: &[Rule] = &[
    Rule {
        name: "build_question",
        priority: 90,
        intent: Intent::AskBuild,
        matcher: Matcher::Keywords(&[
            "item", "itens", "items", "build", "proximo", "prox", "compro", "comprar", "compra",
            "next", "buy",
        ]),
    },
    Rule {
        name: "matchup_question",
        priority: 80,
        intent: Intent::AskMatchup,
        matcher: Matcher::Keywords(&[
            "contra", "against", "vs", "versus", "matchup", "como evito", "como lido com",
            "how do i beat", "how to beat",
        ]),
    },
    Rule {
        name: "macro_question",
        priority: 70,
        intent: Intent::AskMacro,
        matcher: Matcher::Keywords(&[
            "macro", "split", "agrupo", "agrupar", "group", "teamfight", "team fight", "tf",
            "dragao", "arauto", "baron", "barao", "objetivo", "dragon", "herald", "objective",
            "all in", "allin", "e agora", "what now", "what should i do", "o que faco",
        ]),
    },
    Rule {
        name: "status_question",
        priority: 60,
        intent: Intent::AskStatus,
        matcher: Matcher::Keywords(&[
            "como estou", "como to", "to ganhando", "to perdendo", "how am i doing",
            "am i winning", "am i losing",
        ]),
    },
    Rule {
        name: "enemy_standing",
        priority: 50,
        intent: Intent::UpdateEnemyStatus,
        matcher: Matcher::Slots(Slots::has_enemy_report),
    },
    Rule {
        name: "self_standing",
        priority: 40,
        intent: Intent::UpdateStatus,
        matcher: Matcher::Slots(Slots::has_self_report),
    },
    Rule {
        name: "gold_report",
        priority: 30,
        intent: Intent::UpdateGold,
        matcher: Matcher::Slots(|s| s.gold.is_some()),
    },
    Rule {
        name: "enemy_mention",
        priority: 20,
        intent: Intent::UpdateEnemyStatus,
        matcher: Matcher::Slots(|s| !s.champions.is_empty()),
    },
];
