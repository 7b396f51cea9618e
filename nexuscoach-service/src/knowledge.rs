//! Game knowledge base: champions, items, matchups.
//!
//! The base is immutable once built. [`KnowledgeStore`] holds the current
//! snapshot and swaps in a new one when the catalog is re-synced, so turns in
//! flight keep reading the snapshot they started with.

mod models;
mod seed;
mod sync;

pub use models::*;
pub use seed::seed_catalog;
pub use sync::{CatalogFetcher, CatalogSource};
use sync::enrich_item;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::info;

use crate::error::{ServiceError, ServiceResult};
use crate::nlu::text::normalize;

/// A normalized name or alias pointing at a catalog entry
#[derive(Debug, Clone)]
pub struct Term {
    pub tokens: Vec<String>,
    pub index: usize,
}

/// Indexed, validated catalog
#[derive(Debug)]
pub struct KnowledgeBase {
    catalog: Catalog,
    champion_lookup: HashMap<String, usize>,
    item_lookup: HashMap<String, usize>,
    champion_terms: Vec<Term>,
    item_terms: Vec<Term>,
}

impl KnowledgeBase {
    /// Validate and index a catalog. Items missing tags are categorized from
    /// their stat text and passive.
    pub fn from_catalog(mut catalog: Catalog) -> ServiceResult<Self> {
        if catalog.champions.is_empty() {
            return Err(ServiceError::InvalidCatalog {
                message: "catalog has no champions".to_string(),
            });
        }
        if catalog.items.is_empty() {
            return Err(ServiceError::InvalidCatalog {
                message: "catalog has no items".to_string(),
            });
        }

        for item in &mut catalog.items {
            enrich_item(item);
        }

        let (champion_lookup, champion_terms) = index_names(
            catalog
                .champions
                .iter()
                .map(|c| (c.name.as_str(), c.aliases.as_slice())),
        )?;
        let (item_lookup, item_terms) = index_names(
            catalog
                .items
                .iter()
                .map(|i| (i.name.as_str(), i.aliases.as_slice())),
        )?;

        for matchup in &catalog.matchups {
            for name in &matchup.champions {
                if !champion_lookup.contains_key(&normalize(name)) {
                    return Err(ServiceError::InvalidCatalog {
                        message: format!("matchup references unknown champion '{}'", name),
                    });
                }
            }
        }

        Ok(Self {
            catalog,
            champion_lookup,
            item_lookup,
            champion_terms,
            item_terms,
        })
    }

    /// Knowledge base built from the embedded catalog
    pub fn seed() -> ServiceResult<Self> {
        Self::from_catalog(seed_catalog()?)
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn champions(&self) -> &[Champion] {
        &self.catalog.champions
    }

    pub fn items(&self) -> &[Item] {
        &self.catalog.items
    }

    /// Champion names and aliases, longest phrase first
    pub fn champion_terms(&self) -> &[Term] {
        &self.champion_terms
    }

    /// Item names and aliases, longest phrase first
    pub fn item_terms(&self) -> &[Term] {
        &self.item_terms
    }

    pub fn champion_at(&self, index: usize) -> Option<&Champion> {
        self.catalog.champions.get(index)
    }

    pub fn item_at(&self, index: usize) -> Option<&Item> {
        self.catalog.items.get(index)
    }

    /// Look up a champion by name or alias
    pub fn champion(&self, name: &str) -> Option<&Champion> {
        self.champion_lookup
            .get(&normalize(name))
            .and_then(|&i| self.champion_at(i))
    }

    /// Look up an item by name or alias, then by partial name
    pub fn item(&self, name: &str) -> Option<&Item> {
        let key = normalize(name);
        if key.is_empty() {
            return None;
        }
        if let Some(&i) = self.item_lookup.get(&key) {
            return self.item_at(i);
        }
        self.catalog
            .items
            .iter()
            .find(|item| normalize(&item.name).contains(&key))
    }

    /// Items of a category, most expensive first
    pub fn items_by_category(&self, category: ItemCategory) -> Vec<&Item> {
        let mut items: Vec<&Item> = self
            .catalog
            .items
            .iter()
            .filter(|i| i.category == category)
            .collect();
        items.sort_by(|a, b| b.cost.cmp(&a.cost));
        items
    }

    /// Matchup for an unordered pair, preferring one recorded for `lane`
    pub fn matchup(&self, a: &str, b: &str, lane: Option<Lane>) -> Option<&Matchup> {
        let mut candidates = self.catalog.matchups.iter().filter(|m| m.involves(a, b));
        match lane {
            Some(lane) => {
                let all: Vec<&Matchup> = candidates.collect();
                all.iter()
                    .find(|m| m.lane == Some(lane))
                    .or_else(|| all.iter().find(|m| m.lane.is_none()))
                    .or_else(|| all.first())
                    .copied()
            }
            None => candidates.next(),
        }
    }
}

type NameIndex = (HashMap<String, usize>, Vec<Term>);

fn index_names<'a>(entries: impl Iterator<Item = (&'a str, &'a [String])>) -> ServiceResult<NameIndex> {
    let mut lookup = HashMap::new();
    let mut terms = Vec::new();
    let mut names = HashSet::new();

    for (index, (name, aliases)) in entries.enumerate() {
        let canonical = normalize(name);
        if canonical.is_empty() || !names.insert(canonical.clone()) {
            return Err(ServiceError::InvalidCatalog {
                message: format!("duplicate or empty name '{}'", name),
            });
        }
        for key in std::iter::once(canonical).chain(aliases.iter().map(|a| normalize(a))) {
            if key.is_empty() {
                continue;
            }
            // First entry claiming an alias keeps it
            if lookup.contains_key(&key) {
                continue;
            }
            lookup.insert(key.clone(), index);
            terms.push(Term {
                tokens: key.split(' ').map(str::to_string).collect(),
                index,
            });
        }
    }

    // "miss fortune" before "fortune", "lee sin" before "lee"
    terms.sort_by(|a, b| {
        b.tokens
            .len()
            .cmp(&a.tokens.len())
            .then_with(|| b.tokens.concat().len().cmp(&a.tokens.concat().len()))
    });

    Ok((lookup, terms))
}

/// Holds the current knowledge snapshot
pub struct KnowledgeStore {
    current: ArcSwap<KnowledgeBase>,
}

impl KnowledgeStore {
    pub fn new(base: KnowledgeBase) -> Self {
        Self {
            current: ArcSwap::from_pointee(base),
        }
    }

    /// Snapshot for the duration of one turn
    pub fn snapshot(&self) -> Arc<KnowledgeBase> {
        self.current.load_full()
    }

    /// Atomically replace the knowledge base
    pub fn replace(&self, base: KnowledgeBase) {
        info!(
            champions = base.champions().len(),
            items = base.items().len(),
            matchups = base.catalog().matchups.len(),
            "Knowledge base replaced"
        );
        self.current.store(Arc::new(base));
    }
}
