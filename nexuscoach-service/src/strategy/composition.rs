//! Enemy team composition analysis.

use serde::Serialize;
use strum::Display;

use crate::knowledge::{Champion, DamageType, ItemTag, Role};

/// Defensive or itemization need derived from a composition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Defense {
    MagicResist,
    Armor,
    AntiHeal,
    ArmorPen,
}

impl Defense {
    /// Item tag that satisfies this need
    pub fn tag(&self) -> ItemTag {
        match self {
            Defense::MagicResist => ItemTag::MagicResist,
            Defense::Armor => ItemTag::Armor,
            Defense::AntiHeal => ItemTag::AntiHeal,
            Defense::ArmorPen => ItemTag::ArmorPen,
        }
    }
}

/// Summary of a group of enemies
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Composition {
    /// Sorted champion names
    pub champions: Vec<String>,
    /// Damage-rating weighted totals
    pub physical: f32,
    pub magic: f32,
    /// `Mixed` on a tie, `None` when no damage was counted
    pub dominant: Option<DamageType>,
    pub healers: Vec<String>,
    pub tanks: Vec<String>,
    pub assassins: Vec<String>,
    /// Enemies reported as ahead
    pub threats: Vec<String>,
    /// Needs in priority order
    pub defenses: Vec<Defense>,
}

impl Composition {
    pub fn has_healer(&self) -> bool {
        !self.healers.is_empty()
    }

    pub fn has_tank(&self) -> bool {
        !self.tanks.is_empty()
    }

    pub fn has_assassin(&self) -> bool {
        !self.assassins.is_empty()
    }
}

/// Survivability at which a champion counts as a tank regardless of role
const TANKY_SURVIVABILITY: u8 = 7;

/// Analyze a set of champions. `fed` names the ones currently ahead.
///
/// Input order does not matter.
pub fn analyze(champions: &[&Champion], fed: &[String]) -> Composition {
    let mut sorted: Vec<&Champion> = champions.to_vec();
    sorted.sort_by(|a, b| a.name.cmp(&b.name));
    sorted.dedup_by(|a, b| a.name == b.name);

    let mut comp = Composition::default();
    for champion in &sorted {
        let weight = f32::from(champion.damage.max(1));
        match champion.damage_type {
            DamageType::Physical => comp.physical += weight,
            DamageType::Magic => comp.magic += weight,
            DamageType::Mixed => {
                comp.physical += weight / 2.0;
                comp.magic += weight / 2.0;
            }
        }

        let name = champion.name.clone();
        if champion.heals() {
            comp.healers.push(name.clone());
        }
        if champion.has_role(Role::Tank) || champion.survivability >= TANKY_SURVIVABILITY {
            comp.tanks.push(name.clone());
        }
        if champion.has_role(Role::Assassin) {
            comp.assassins.push(name.clone());
        }
        if fed.iter().any(|f| f.eq_ignore_ascii_case(&name)) {
            comp.threats.push(name.clone());
        }
        comp.champions.push(name);
    }

    comp.dominant = if comp.physical == 0.0 && comp.magic == 0.0 {
        None
    } else if comp.physical > comp.magic {
        Some(DamageType::Physical)
    } else if comp.magic > comp.physical {
        Some(DamageType::Magic)
    } else {
        Some(DamageType::Mixed)
    };

    match comp.dominant {
        Some(DamageType::Physical) => comp.defenses.push(Defense::Armor),
        Some(DamageType::Magic) => comp.defenses.push(Defense::MagicResist),
        Some(DamageType::Mixed) => {
            comp.defenses.push(Defense::Armor);
            comp.defenses.push(Defense::MagicResist);
        }
        None => {}
    }
    if comp.has_healer() {
        comp.defenses.push(Defense::AntiHeal);
    }
    if comp.has_tank() {
        comp.defenses.push(Defense::ArmorPen);
    }

    comp
}
