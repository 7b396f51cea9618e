//! Next-item selection.
//!
//! A heuristic starting policy: items are filtered by what the targets need
//! and what the player can use, then ranked by the earliest need they
//! satisfy, the narrowest tag set, and catalog order.

use serde::Serialize;

use super::composition::{Composition, Defense};
use crate::knowledge::{
    Archetype, Champion, DamageType, Item, ItemCategory, ItemTag, KnowledgeBase, Role,
};
use crate::session::GamePhase;

/// Alternatives listed after the pick
const MAX_ALTERNATIVES: usize = 2;

/// Why an item was picked
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "value")]
pub enum BuildReason {
    Need(Defense),
    Counters(Archetype),
    /// No target-specific candidate; general-purpose pick
    Core,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BuildAdvice {
    pub item: String,
    pub cost: u32,
    pub reason: BuildReason,
    pub alternatives: Vec<String>,
    pub targets: Vec<String>,
    pub gold: Option<u32>,
    /// Nothing is affordable with the known gold
    pub save_up: bool,
}

/// Player-side constraints on item choice
pub struct BuildContext<'a> {
    pub own: Option<&'a Champion>,
    pub owned: &'a [String],
    pub phase: GamePhase,
    pub gold: Option<u32>,
}

#[derive(Clone)]
struct Candidate<'a> {
    item: &'a Item,
    order: usize,
    need_rank: usize,
    reason: BuildReason,
}

/// Pick the next item against `targets` given their composition.
pub fn recommend_build(
    kb: &KnowledgeBase,
    targets: &[&Champion],
    composition: &Composition,
    ctx: &BuildContext<'_>,
) -> Option<BuildAdvice> {
    let archetypes: Vec<Archetype> = targets.iter().flat_map(|c| c.archetypes()).collect();
    let target_names: Vec<String> = targets.iter().map(|c| c.name.clone()).collect();

    let mut candidates: Vec<Candidate<'_>> = kb
        .items()
        .iter()
        .enumerate()
        .filter(|(_, item)| usable(item, ctx))
        .filter_map(|(order, item)| {
            let need = composition
                .defenses
                .iter()
                .position(|d| item.has_tag(d.tag()));
            let countered = item.counters.iter().find(|a| archetypes.contains(a));
            let (need_rank, reason) = match (need, countered) {
                (Some(i), _) => (i, BuildReason::Need(composition.defenses[i])),
                (None, Some(a)) => (composition.defenses.len(), BuildReason::Counters(*a)),
                (None, None) => return None,
            };
            Some(Candidate {
                item,
                order,
                need_rank,
                reason,
            })
        })
        .collect();

    candidates.sort_by(|a, b| {
        a.need_rank
            .cmp(&b.need_rank)
            .then_with(|| a.item.tags.len().cmp(&b.item.tags.len()))
            .then_with(|| a.order.cmp(&b.order))
    });

    if candidates.is_empty() {
        return core_pick(kb, ctx, target_names);
    }

    let mut save_up = false;
    if let Some(gold) = ctx.gold {
        let affordable: Vec<Candidate<'_>> = candidates
            .iter()
            .filter(|c| c.item.cost <= gold)
            .cloned()
            .collect();
        if affordable.is_empty() {
            save_up = true;
        } else {
            candidates = affordable;
        }
    }

    let mut picks = candidates.into_iter();
    let first = picks.next()?;
    let alternatives = picks
        .take(MAX_ALTERNATIVES)
        .map(|c| c.item.name.clone())
        .collect();

    Some(BuildAdvice {
        item: first.item.name.clone(),
        cost: first.item.cost,
        reason: first.reason,
        alternatives,
        targets: target_names,
        gold: ctx.gold,
        save_up,
    })
}

/// Whether the player should consider `item` at all
fn usable(item: &Item, ctx: &BuildContext<'_>) -> bool {
    if owns(ctx, item) {
        return false;
    }
    if ctx.phase == GamePhase::Early && item.has_tag(ItemTag::LateGame) {
        return false;
    }
    let Some(own) = ctx.own else {
        return true;
    };
    match item.category {
        ItemCategory::Physical => own.damage_type != DamageType::Magic,
        ItemCategory::Magic => own.damage_type != DamageType::Physical,
        ItemCategory::Support => own.has_role(Role::Support),
        _ => true,
    }
}

fn owns(ctx: &BuildContext<'_>, item: &Item) -> bool {
    ctx.owned.iter().any(|o| o.eq_ignore_ascii_case(&item.name))
}

/// Offensive category matching the player's damage type
fn damage_category(own: Option<&Champion>) -> ItemCategory {
    match own.map(|c| c.damage_type) {
        Some(DamageType::Magic) => ItemCategory::Magic,
        _ => ItemCategory::Physical,
    }
}

fn core_pick(
    kb: &KnowledgeBase,
    ctx: &BuildContext<'_>,
    targets: Vec<String>,
) -> Option<BuildAdvice> {
    let category = damage_category(ctx.own);
    let pool: Vec<&Item> = kb
        .items()
        .iter()
        .filter(|i| i.category == category && !owns(ctx, i))
        .collect();

    // Core items first, then whatever the category has
    let item = pool
        .iter()
        .filter(|i| i.has_tag(ItemTag::Core))
        .filter(|i| ctx.phase != GamePhase::Early || !i.has_tag(ItemTag::LateGame))
        .min_by_key(|i| i.cost)
        .or_else(|| pool.iter().find(|i| i.has_tag(ItemTag::Core)))
        .or_else(|| pool.first())?;

    Some(BuildAdvice {
        item: item.name.clone(),
        cost: item.cost,
        reason: BuildReason::Core,
        alternatives: Vec::new(),
        targets,
        gold: ctx.gold,
        save_up: ctx.gold.is_some_and(|g| g < item.cost),
    })
}
