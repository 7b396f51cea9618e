//! Game catalog records.
//!
//! The same structs serve as the on-disk catalog schema (embedded seed,
//! `knowledge.data_path`, `knowledge.sync_url`) and the admin API payloads.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Map lane. Accepts the in-game names (`baron`, `duo`) as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize)]
#[strum(ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum Lane {
    #[strum(to_string = "top", serialize = "baron")]
    #[serde(alias = "baron")]
    Top,
    #[strum(to_string = "jungle", serialize = "jg")]
    #[serde(alias = "jg")]
    Jungle,
    #[strum(to_string = "mid", serialize = "middle")]
    #[serde(alias = "middle")]
    Mid,
    #[strum(to_string = "bot", serialize = "duo", serialize = "adc", serialize = "dragon")]
    #[serde(alias = "duo", alias = "adc", alias = "dragon")]
    Bot,
    #[strum(to_string = "support", serialize = "sup")]
    #[serde(alias = "sup")]
    Support,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Fighter,
    Tank,
    Assassin,
    Mage,
    Marksman,
    Support,
}

/// Champion kit traits that matter for itemization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ChampionTrait {
    /// Heals allies
    Healer,
    /// Heals itself through its kit
    SelfHeal,
    Burst,
    Engage,
    Shields,
}

/// What an item is good against
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Archetype {
    Fighter,
    Tank,
    Assassin,
    Mage,
    Marksman,
    Support,
    Healer,
}

impl From<Role> for Archetype {
    fn from(role: Role) -> Self {
        match role {
            Role::Fighter => Archetype::Fighter,
            Role::Tank => Archetype::Tank,
            Role::Assassin => Archetype::Assassin,
            Role::Mage => Archetype::Mage,
            Role::Marksman => Archetype::Marksman,
            Role::Support => Archetype::Support,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum DamageType {
    Physical,
    Magic,
    Mixed,
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, EnumString, Display, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[serde(rename_all = "snake_case")]
pub enum ItemCategory {
    Physical,
    Magic,
    Defense,
    Boots,
    Support,
    #[default]
    General,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumString, Display, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ItemTag {
    Armor,
    MagicResist,
    Health,
    AntiHeal,
    ArmorPen,
    MagicPen,
    Crit,
    AttackSpeed,
    AbilityHaste,
    Mana,
    Sustain,
    Shield,
    Slow,
    Execute,
    Tenacity,
    /// Only worth it once the game has gone long
    LateGame,
    Core,
    AntiCrit,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LaneWinrate {
    pub lane: Lane,
    /// Percentage, e.g. `51.3`
    pub winrate: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pick_rate: Option<f32>,
}

/// Champion record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Champion {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    pub roles: Vec<Role>,
    #[serde(default)]
    pub traits: Vec<ChampionTrait>,
    pub damage_type: DamageType,
    /// 1 (easy) to 3 (hard)
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    /// 1-10 rating
    #[serde(default = "default_rating")]
    pub damage: u8,
    /// 1-10 rating
    #[serde(default = "default_rating")]
    pub survivability: u8,
    #[serde(default)]
    pub winrates: Vec<LaneWinrate>,
}

fn default_difficulty() -> u8 {
    2
}

fn default_rating() -> u8 {
    5
}

impl Champion {
    pub fn primary_role(&self) -> Option<Role> {
        self.roles.first().copied()
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn has_trait(&self, t: ChampionTrait) -> bool {
        self.traits.contains(&t)
    }

    /// Heals itself or its allies
    pub fn heals(&self) -> bool {
        self.has_trait(ChampionTrait::Healer) || self.has_trait(ChampionTrait::SelfHeal)
    }

    /// Archetypes an item can counter on this champion
    pub fn archetypes(&self) -> Vec<Archetype> {
        let mut out: Vec<Archetype> = self.roles.iter().map(|r| Archetype::from(*r)).collect();
        if self.heals() {
            out.push(Archetype::Healer);
        }
        out
    }

    pub fn winrate(&self, lane: Option<Lane>) -> Option<&LaneWinrate> {
        match lane {
            Some(lane) => self.winrates.iter().find(|w| w.lane == lane),
            None => self.winrates.first(),
        }
    }
}

/// Flat item stats as parsed from stat text (`+55 AD`, `+40 MR`)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ItemStats {
    pub attack_damage: u32,
    pub ability_power: u32,
    pub health: u32,
    pub mana: u32,
    pub armor: u32,
    pub magic_resist: u32,
    pub attack_speed: u32,
    pub crit_chance: u32,
    pub ability_haste: u32,
    pub magic_pen: u32,
    pub omnivamp: u32,
    pub heal_shield_power: u32,
}

impl ItemStats {
    pub fn is_empty(&self) -> bool {
        *self == ItemStats::default()
    }
}

/// Item record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default)]
    pub aliases: Vec<String>,
    #[serde(default)]
    pub category: ItemCategory,
    pub cost: u32,
    #[serde(default, skip_serializing_if = "ItemStats::is_empty")]
    pub stats: ItemStats,
    #[serde(default)]
    pub passive: String,
    #[serde(default)]
    pub tags: Vec<ItemTag>,
    #[serde(default)]
    pub counters: Vec<Archetype>,
    /// Raw stat line from the source, used to derive `stats`/`tags` when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stats_text: Option<String>,
}

impl Item {
    pub fn has_tag(&self, tag: ItemTag) -> bool {
        self.tags.contains(&tag)
    }

    pub fn counters_any(&self, archetypes: &[Archetype]) -> bool {
        self.counters.iter().any(|a| archetypes.contains(a))
    }
}

/// Localized tip text
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalizedText {
    pub en: String,
    pub pt: String,
}

impl LocalizedText {
    pub fn for_locale(&self, locale: &str) -> &str {
        if crate::i18n::is_english(locale) {
            &self.en
        } else {
            &self.pt
        }
    }
}

/// Matchup between an unordered champion pair
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Matchup {
    pub champions: [String; 2],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lane: Option<Lane>,
    /// 1 (easy) to 3 (hard) for the first champion
    #[serde(default = "default_difficulty")]
    pub difficulty: u8,
    /// Champion favored in the matchup, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub favored: Option<String>,
    pub tips: LocalizedText,
}

impl Matchup {
    pub fn involves(&self, a: &str, b: &str) -> bool {
        let [x, y] = &self.champions;
        (x.eq_ignore_ascii_case(a) && y.eq_ignore_ascii_case(b))
            || (x.eq_ignore_ascii_case(b) && y.eq_ignore_ascii_case(a))
    }
}

/// Whole catalog document
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub champions: Vec<Champion>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub matchups: Vec<Matchup>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_lane_accepts_in_game_names() {
        assert_eq!(Lane::from_str("baron").unwrap(), Lane::Top);
        assert_eq!(Lane::from_str("DUO").unwrap(), Lane::Bot);
        assert_eq!(Lane::Top.to_string(), "top");

        let lane: Lane = serde_json::from_str("\"duo\"").unwrap();
        assert_eq!(lane, Lane::Bot);
    }

    #[test]
    fn test_archetypes_include_healer() {
        let champ: Champion = serde_json::from_str(
            r#"{"name":"Nami","roles":["support","mage"],"traits":["healer"],"damage_type":"magic"}"#,
        )
        .unwrap();

        assert_eq!(
            champ.archetypes(),
            vec![Archetype::Support, Archetype::Mage, Archetype::Healer]
        );
        assert_eq!(champ.damage, 5);
    }

    #[test]
    fn test_matchup_is_unordered() {
        let m = Matchup {
            champions: ["Darius".into(), "Garen".into()],
            lane: Some(Lane::Top),
            difficulty: 2,
            favored: None,
            tips: LocalizedText {
                en: "x".into(),
                pt: "y".into(),
            },
        };
        assert!(m.involves("garen", "darius"));
        assert!(!m.involves("garen", "jax"));
    }
}
