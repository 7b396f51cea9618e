//! Slot extraction: numbers, standings, champions and items in an utterance.
//!
//! Runs on normalized text independently of which intent rule wins.

use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use strum::{Display, EnumString};

use super::text::{contains_any, phrase_positions};
use crate::knowledge::{KnowledgeBase, Lane, Term};
use crate::session::{GamePhase, Standing};

/// A champion named in the utterance
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChampionMention {
    pub champion: String,
    pub standing: Option<Standing>,
    /// Named as the lane opponent (`contra X`)
    pub is_laner: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "champion")]
pub enum ItemOwner {
    Own,
    Enemy(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemProgress {
    Has,
    Building,
}

/// An item someone has or is building, resolved against the catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemMention {
    pub owner: ItemOwner,
    pub item: String,
    pub progress: ItemProgress,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MacroTopic {
    Objective,
    AllIn,
    Split,
    Teamfight,
}

/// Typed slots found in one utterance
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Slots {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gold: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kills: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub deaths: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assists: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub standing: Option<Standing>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<GamePhase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lane: Option<Lane>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub own_champion: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub champions: Vec<ChampionMention>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<ItemMention>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub macro_topic: Option<MacroTopic>,
}

impl Slots {
    pub fn is_empty(&self) -> bool {
        *self == Slots::default()
    }

    /// Whether the player reported anything about their own game
    pub fn has_self_report(&self) -> bool {
        self.standing.is_some()
            || self.phase.is_some()
            || self.lane.is_some()
            || self.kills.is_some()
            || self.deaths.is_some()
            || self.own_champion.is_some()
            || matches!(&self.item, Some(ItemMention { owner: ItemOwner::Own, .. }))
    }

    /// Whether anything was said about an enemy's strength or items
    pub fn has_enemy_report(&self) -> bool {
        self.champions.iter().any(|c| c.standing.is_some())
            || matches!(&self.item, Some(ItemMention { owner: ItemOwner::Enemy(_), .. }))
    }
}

static GOLD_AMOUNT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{3,5})\s*(?:de\s+)?(?:gold|ouro|g)\b").unwrap());
static GOLD_HAVE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:tenho|to com|tou com|estou com|fiquei com|i have|i got|ive got)\s+(\d{3,5})\b")
        .unwrap()
});
static KDA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(\d{1,2})/(\d{1,2})(?:/(\d{1,2}))?(?:\s|$)").unwrap());
static KILLS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,2})\s*(?:kills?|abates?)\b").unwrap());
static DEATHS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(?:(\d{1,2})\s*(?:mortes?|deaths?)|morri\s+(\d{1,2}))\b").unwrap()
});

const ARTICLES: &[&str] = &["o", "a", "os", "as", "um", "uma", "the", "an"];
const CONNECTORS: &[&str] = &["e", "and", "o", "a", "os", "as", "com", "tambem", "also"];
const WINDOW_STOPS: &[&str] = &["mas", "but", "porem", "eu", "i"];
const ENEMY_AHEAD: &[&str] = &[
    "fed", "forte", "fortes", "strong", "feedado", "feedada", "feedados", "ahead", "frente",
    "amassando", "carregando", "matou", "killed", "stomping",
];
const ENEMY_BEHIND: &[&str] = &["fraco", "fraca", "fracos", "weak", "atras", "behind", "morrendo"];
const KILL_VERBS: &[&str] = &[
    "amassei", "ganhei", "venci", "matei", "destrui", "killed", "beat", "stomped", "solei",
];
const LANER_MARKERS: &[&str] = &["contra", "against", "vs", "versus", "enfrentando", "facing"];
const OWN_BEFORE: &[&str] = &["meu", "minha", "playing", "jogando", "sou"];
const OWN_DE_VERBS: &[&str] = &["to", "tou", "estou", "jogo", "vou", "sou", "jogando"];
const OWN_AFTER: &[&str] = &["main", "otp", "aqui"];
const FIRST_PERSON: &[&str] = &[
    "eu", "to", "tou", "estou", "i", "im", "we", "estamos", "tamo", "meu", "minha", "my",
];
const SELF_AHEAD: &[&str] = &["na frente", "vantagem", "ahead", "fed", "forte", "winning"];
const SELF_BEHIND: &[&str] = &["atras", "desvantagem", "behind", "losing", "perdendo", "fraco"];
const SELF_EVEN: &[&str] = &["empatado", "empate", "even", "igual"];
const PHASE_EARLY: &[&str] = &["early", "early game", "inicio", "comeco"];
const PHASE_MID: &[&str] = &["mid game", "midgame", "meio do jogo", "meio de jogo", "meio da partida"];
const PHASE_LATE: &[&str] = &["late", "late game", "lategame", "fim", "fim de jogo", "final do jogo"];
const OWN_HAS: &[&str] = &[
    "to com", "tou com", "estou com", "tenho", "fechei", "comprei", "fiz", "i have", "i bought",
    "i built", "i got", "ive got",
];
const OWN_BUILDING: &[&str] = &[
    "to fazendo", "estou fazendo", "vou fazer", "to fechando", "im building", "i am building",
    "im buying",
];
const ENEMY_HAS: &[&str] = &[
    "fez", "comprou", "tem", "fechou", "ta com", "esta com", "has", "built", "bought", "got",
    "finished",
];
const ENEMY_BUILDING: &[&str] = &[
    "ta fazendo", "esta fazendo", "fazendo", "fechando", "comprando", "is building", "building",
    "buying", "is buying",
];
const MACRO_TOPICS: &[(MacroTopic, &[&str])] = &[
    (MacroTopic::AllIn, &["all in", "allin"]),
    (
        MacroTopic::Objective,
        &["dragao", "drake", "dragon", "arauto", "herald", "baron", "barao", "objetivo", "objective"],
    ),
    (MacroTopic::Split, &["split", "splitar", "split push", "splitpush"]),
    (
        MacroTopic::Teamfight,
        &["teamfight", "team fight", "tf", "agrupo", "agrupar", "group", "grupo"],
    ),
];

/// A catalog term located in the token stream, `[start, end)`
#[derive(Debug, Clone, Copy)]
struct Span {
    start: usize,
    end: usize,
    index: usize,
}

/// Extract every slot from a tokenized, normalized utterance
pub fn extract_slots(normalized: &str, tokens: &[&str], kb: &KnowledgeBase) -> Slots {
    let mut slots = Slots {
        gold: extract_gold(normalized),
        macro_topic: extract_macro_topic(tokens),
        phase: extract_phase(tokens),
        lane: extract_lane(tokens),
        ..Default::default()
    };
    extract_kda(normalized, &mut slots);

    let mut claimed = vec![false; tokens.len()];
    let champion_spans = find_terms(tokens, kb.champion_terms(), &mut claimed);
    let item_spans = find_terms(tokens, kb.item_terms(), &mut claimed.clone());

    let (own, mentions) = champion_mentions(tokens, &champion_spans, kb, &mut claimed);
    slots.own_champion = own;
    slots.item = item_mention(tokens, &item_spans, &champion_spans, kb);

    if mentions.is_empty() || contains_any(tokens, FIRST_PERSON) {
        slots.standing = extract_self_standing(tokens, &claimed);
    }
    slots.champions = mentions;

    slots
}

fn extract_gold(normalized: &str) -> Option<u32> {
    [&*GOLD_AMOUNT, &*GOLD_HAVE].iter().find_map(|re| {
        re.captures(normalized)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse().ok())
    })
}

fn extract_kda(normalized: &str, slots: &mut Slots) {
    let num = |c: &regex::Captures<'_>, i: usize| -> Option<u32> {
        c.get(i).and_then(|m| m.as_str().parse().ok())
    };

    if let Some(c) = KDA.captures(normalized) {
        slots.kills = num(&c, 1);
        slots.deaths = num(&c, 2);
        slots.assists = num(&c, 3);
        return;
    }
    if let Some(c) = KILLS.captures(normalized) {
        slots.kills = num(&c, 1);
    }
    if let Some(c) = DEATHS.captures(normalized) {
        slots.deaths = num(&c, 1).or_else(|| num(&c, 2));
    }
}

fn extract_macro_topic(tokens: &[&str]) -> Option<MacroTopic> {
    MACRO_TOPICS
        .iter()
        .find(|(_, keywords)| contains_any(tokens, keywords))
        .map(|(topic, _)| *topic)
}

fn extract_phase(tokens: &[&str]) -> Option<GamePhase> {
    if contains_any(tokens, PHASE_EARLY) {
        Some(GamePhase::Early)
    } else if contains_any(tokens, PHASE_MID) {
        Some(GamePhase::Mid)
    } else if contains_any(tokens, PHASE_LATE) {
        Some(GamePhase::Late)
    } else {
        None
    }
}

/// Lane word and whether it only counts next to `rota`/`lane`
fn lane_word(token: &str) -> Option<(Lane, bool)> {
    match token {
        "meio" => Some((Lane::Mid, false)),
        "selva" => Some((Lane::Jungle, false)),
        "suporte" => Some((Lane::Support, false)),
        "baron" | "dragao" | "dragon" | "duo" => Lane::from_str(token)
            .ok()
            .or(Some(Lane::Bot))
            .map(|l| (l, true)),
        _ => Lane::from_str(token).ok().map(|l| (l, false)),
    }
}

fn extract_lane(tokens: &[&str]) -> Option<Lane> {
    for (i, token) in tokens.iter().enumerate() {
        let Some((lane, strict)) = lane_word(token) else {
            continue;
        };
        let prev = i.checked_sub(1).map(|p| tokens[p]);
        let prev2 = i.checked_sub(2).map(|p| tokens[p]);
        let next = tokens.get(i + 1).copied();

        let by_route = matches!(prev, Some("rota" | "lane"))
            || (matches!(prev, Some("do" | "da")) && prev2 == Some("rota"))
            || matches!(next, Some("lane" | "rota"));
        let by_place = matches!(prev, Some("no" | "na" | "in" | "playing" | "jogando"));

        if by_route || (!strict && by_place) {
            return Some(lane);
        }
    }
    None
}

/// Locate catalog terms, longest first, never overlapping claimed tokens
fn find_terms(tokens: &[&str], terms: &[Term], claimed: &mut [bool]) -> Vec<Span> {
    let mut spans = Vec::new();
    for term in terms {
        for start in phrase_positions(tokens, &term.tokens) {
            let end = start + term.tokens.len();
            if claimed[start..end].iter().any(|c| *c) {
                continue;
            }
            claimed[start..end].iter_mut().for_each(|c| *c = true);
            spans.push(Span {
                start,
                end,
                index: term.index,
            });
        }
    }
    spans.sort_by_key(|s| s.start);
    spans
}

/// Previous token index, skipping articles
fn prev_index(tokens: &[&str], before: usize) -> Option<usize> {
    (0..before).rev().find(|&i| !ARTICLES.contains(&tokens[i]))
}

fn is_own_mention(tokens: &[&str], span: &Span) -> bool {
    if tokens
        .get(span.end)
        .is_some_and(|t| OWN_AFTER.contains(t))
    {
        return true;
    }
    let Some(p1) = prev_index(tokens, span.start) else {
        return false;
    };
    if OWN_BEFORE.contains(&tokens[p1]) {
        return true;
    }
    tokens[p1] == "de" && p1 > 0 && OWN_DE_VERBS.contains(&tokens[p1 - 1])
}

fn champion_mentions(
    tokens: &[&str],
    spans: &[Span],
    kb: &KnowledgeBase,
    claimed: &mut [bool],
) -> (Option<String>, Vec<ChampionMention>) {
    let mut own = None;
    let mut enemy_spans = Vec::new();
    let mut mentions: Vec<ChampionMention> = Vec::new();

    for span in spans {
        let Some(champion) = kb.champion_at(span.index) else {
            continue;
        };
        if own.is_none() && is_own_mention(tokens, span) {
            own = Some(champion.name.clone());
            continue;
        }
        if own.as_deref() == Some(champion.name.as_str()) {
            continue;
        }

        let laner = prev_index(tokens, span.start)
            .is_some_and(|p| LANER_MARKERS.contains(&tokens[p]));

        // Standing words after the name, up to the next champion
        let limit = spans
            .iter()
            .map(|s| s.start)
            .find(|&s| s > span.start)
            .unwrap_or(tokens.len())
            .min(span.end + 4);
        let mut standing = None;
        for j in span.end..limit {
            if WINDOW_STOPS.contains(&tokens[j]) {
                break;
            }
            claimed[j] = true;
            if ENEMY_AHEAD.contains(&tokens[j]) {
                standing = Some(Standing::Ahead);
                break;
            }
            if ENEMY_BEHIND.contains(&tokens[j]) {
                standing = Some(Standing::Behind);
                break;
            }
        }
        if standing.is_none()
            && prev_index(tokens, span.start).is_some_and(|p| KILL_VERBS.contains(&tokens[p]))
        {
            standing = Some(Standing::Behind);
        }

        enemy_spans.push(*span);
        mentions.push(ChampionMention {
            champion: champion.name.clone(),
            standing,
            is_laner: laner,
        });
    }

    // "caitlyn e nami tao fed": a group shares the standing that follows it
    for i in (0..mentions.len().saturating_sub(1)).rev() {
        if mentions[i].standing.is_some() {
            continue;
        }
        let between = &tokens[enemy_spans[i].end..enemy_spans[i + 1].start];
        if between.iter().all(|t| CONNECTORS.contains(t)) {
            mentions[i].standing = mentions[i + 1].standing;
        }
    }

    // One entry per champion, first mention wins unless it carried nothing
    let mut unique: Vec<ChampionMention> = Vec::new();
    for mention in mentions {
        match unique.iter_mut().find(|m| m.champion == mention.champion) {
            Some(existing) => {
                existing.standing = existing.standing.or(mention.standing);
                existing.is_laner |= mention.is_laner;
            }
            None => unique.push(mention),
        }
    }

    (own, unique)
}

fn extract_self_standing(tokens: &[&str], claimed: &[bool]) -> Option<Standing> {
    let free: Vec<&str> = tokens
        .iter()
        .zip(claimed)
        .map(|(t, c)| if *c { "_" } else { *t })
        .collect();

    if contains_any(&free, SELF_AHEAD) {
        Some(Standing::Ahead)
    } else if contains_any(&free, SELF_BEHIND) {
        Some(Standing::Behind)
    } else if contains_any(&free, SELF_EVEN) {
        Some(Standing::Even)
    } else {
        None
    }
}

fn item_mention(
    tokens: &[&str],
    item_spans: &[Span],
    champion_spans: &[Span],
    kb: &KnowledgeBase,
) -> Option<ItemMention> {
    for span in item_spans {
        let Some(item) = kb.item_at(span.index) else {
            continue;
        };
        let Some(verb_end) = prev_index(tokens, span.start).map(|p| p + 1) else {
            continue;
        };

        // Longest verb phrase ending right before the item
        let found = (1..=3).rev().find_map(|len| {
            let start = verb_end.checked_sub(len)?;
            let phrase = tokens[start..verb_end].join(" ");
            classify_verb(&phrase).map(|kind| (start, kind))
        });
        let Some((verb_start, (own_verb, progress))) = found else {
            continue;
        };

        let owner = if own_verb {
            ItemOwner::Own
        } else {
            // Subject is the champion right before the verb, else the last one named
            let subject = champion_spans
                .iter()
                .filter(|c| c.end <= verb_start)
                .max_by_key(|c| c.end)
                .and_then(|c| kb.champion_at(c.index));
            match subject {
                Some(champion) => ItemOwner::Enemy(champion.name.clone()),
                None if verb_start > 0 && matches!(tokens[verb_start - 1], "eu" | "i") => {
                    ItemOwner::Own
                }
                None => continue,
            }
        };

        return Some(ItemMention {
            owner,
            item: item.name.clone(),
            progress,
        });
    }
    None
}

/// `(is_first_person, progress)` for a verb phrase
fn classify_verb(phrase: &str) -> Option<(bool, ItemProgress)> {
    if OWN_HAS.contains(&phrase) {
        Some((true, ItemProgress::Has))
    } else if OWN_BUILDING.contains(&phrase) {
        Some((true, ItemProgress::Building))
    } else if ENEMY_HAS.contains(&phrase) {
        Some((false, ItemProgress::Has))
    } else if ENEMY_BUILDING.contains(&phrase) {
        Some((false, ItemProgress::Building))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nlu::text::{normalize, tokens};

    fn slots(text: &str) -> Slots {
        let kb = KnowledgeBase::seed().unwrap();
        let norm = normalize(text);
        let toks = tokens(&norm);
        extract_slots(&norm, &toks, &kb)
    }

    #[test]
    fn test_gold_forms() {
        assert_eq!(slots("to com 1200 de ouro").gold, Some(1200));
        assert_eq!(slots("1500 gold").gold, Some(1500));
        assert_eq!(slots("tenho 900g").gold, Some(900));
        assert_eq!(slots("i have 2300").gold, Some(2300));
        assert_eq!(slots("qual item").gold, None);
        assert_eq!(slots("tenho 12 de ouro").gold, None);
    }

    #[test]
    fn test_kda() {
        let s = slots("to 3/1/2");
        assert_eq!((s.kills, s.deaths, s.assists), (Some(3), Some(1), Some(2)));

        let s = slots("ja morri 4 vezes");
        assert_eq!(s.deaths, Some(4));
        assert_eq!(s.kills, None);
    }

    #[test]
    fn test_enemy_standing_after_name() {
        let s = slots("yasuo ta fed");
        assert_eq!(s.champions.len(), 1);
        assert_eq!(s.champions[0].champion, "Yasuo");
        assert_eq!(s.champions[0].standing, Some(Standing::Ahead));
        assert_eq!(s.standing, None);
    }

    #[test]
    fn test_group_shares_standing() {
        let s = slots("caitlyn e nami tao fed");
        let names: Vec<_> = s.champions.iter().map(|c| c.champion.as_str()).collect();
        assert_eq!(names, vec!["Caitlyn", "Nami"]);
        assert!(s.champions.iter().all(|c| c.standing == Some(Standing::Ahead)));
    }

    #[test]
    fn test_kill_verb_marks_behind() {
        let s = slots("amassei o darius");
        assert_eq!(s.champions[0].standing, Some(Standing::Behind));
    }

    #[test]
    fn test_own_champion_and_laner() {
        let s = slots("to de garen contra um darius no top");
        assert_eq!(s.own_champion.as_deref(), Some("Garen"));
        assert_eq!(s.champions.len(), 1);
        assert!(s.champions[0].is_laner);
        assert_eq!(s.lane, Some(Lane::Top));
    }

    #[test]
    fn test_multi_word_names_and_aliases() {
        let s = slots("miss fortune e lee tao fortes");
        let names: Vec<_> = s.champions.iter().map(|c| c.champion.as_str()).collect();
        assert_eq!(names, vec!["Miss Fortune", "Lee Sin"]);
    }

    #[test]
    fn test_self_standing_ignores_enemy_window() {
        let s = slots("darius ta fed e eu to atras");
        assert_eq!(s.champions[0].standing, Some(Standing::Ahead));
        assert_eq!(s.standing, Some(Standing::Behind));

        let s = slots("to na frente");
        assert_eq!(s.standing, Some(Standing::Ahead));
    }

    #[test]
    fn test_phase_and_lane_need_context() {
        assert_eq!(slots("estamos no late").phase, Some(GamePhase::Late));
        assert_eq!(slots("meio do jogo").phase, Some(GamePhase::Mid));
        assert_eq!(slots("vamos no baron").lane, None);
        assert_eq!(slots("rota do meio").lane, Some(Lane::Mid));
        assert_eq!(slots("to na selva").lane, Some(Lane::Jungle));
    }

    #[test]
    fn test_enemy_item() {
        let s = slots("o darius fez thornmail");
        assert_eq!(
            s.item,
            Some(ItemMention {
                owner: ItemOwner::Enemy("Darius".to_string()),
                item: "Thornmail".to_string(),
                progress: ItemProgress::Has,
            })
        );
        assert!(s.has_enemy_report());
    }

    #[test]
    fn test_item_at_start_does_not_hide_later_mention() {
        let s = slots("thornmail? o darius fez thornmail");
        assert_eq!(
            s.item,
            Some(ItemMention {
                owner: ItemOwner::Enemy("Darius".to_string()),
                item: "Thornmail".to_string(),
                progress: ItemProgress::Has,
            })
        );
    }

    #[test]
    fn test_own_item_building() {
        let s = slots("to fazendo o cleaver");
        assert_eq!(
            s.item,
            Some(ItemMention {
                owner: ItemOwner::Own,
                item: "Black Cleaver".to_string(),
                progress: ItemProgress::Building,
            })
        );
    }

    #[test]
    fn test_unknown_item_text_is_ignored() {
        assert_eq!(slots("tenho espada magica").item, None);
        assert_eq!(slots("qual item contra thornmail").item, None);
    }

    #[test]
    fn test_macro_topic() {
        assert_eq!(slots("vale all-in?").macro_topic, Some(MacroTopic::AllIn));
        assert_eq!(slots("faco dragao?").macro_topic, Some(MacroTopic::Objective));
        assert_eq!(slots("split ou agrupo").macro_topic, Some(MacroTopic::Split));
    }
}
