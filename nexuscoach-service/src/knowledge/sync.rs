//! Catalog loading from external sources and item categorization.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use reqwest::Client;
use tracing::{debug, info};

use super::seed::{parse_catalog, seed_catalog};
use super::{Catalog, Item, ItemCategory, ItemStats, ItemTag};
use crate::config::KnowledgeConfig;
use crate::error::{ProviderError, ServiceError, ServiceResult};

const SYNC_TIMEOUT_SECS: u64 = 30;

/// Where a catalog document comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogSource {
    Url(String),
    File(PathBuf),
    Embedded,
}

impl CatalogSource {
    /// URL wins over file; neither means the embedded seed
    pub fn from_config(config: &KnowledgeConfig) -> Self {
        if let Some(url) = config.sync_url.as_ref().filter(|u| !u.trim().is_empty()) {
            CatalogSource::Url(url.clone())
        } else if let Some(path) = &config.data_path {
            CatalogSource::File(path.clone())
        } else {
            CatalogSource::Embedded
        }
    }

    pub fn describe(&self) -> String {
        match self {
            CatalogSource::Url(url) => url.clone(),
            CatalogSource::File(path) => path.display().to_string(),
            CatalogSource::Embedded => "embedded".to_string(),
        }
    }
}

/// Fetches catalog documents
pub struct CatalogFetcher {
    client: Client,
}

impl CatalogFetcher {
    pub fn new() -> ServiceResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(SYNC_TIMEOUT_SECS))
            .user_agent("NexusCoach/1.0")
            .build()
            .map_err(|e| ProviderError::Connection {
                url: "catalog".to_string(),
                source: e,
            })?;
        Ok(Self { client })
    }

    pub async fn fetch(&self, source: &CatalogSource) -> ServiceResult<Catalog> {
        debug!(source = %source.describe(), "Fetching game catalog");
        match source {
            CatalogSource::Url(url) => self.fetch_url(url).await,
            CatalogSource::File(path) => {
                let content = tokio::fs::read_to_string(path).await.map_err(|e| {
                    ServiceError::InvalidCatalog {
                        message: format!("cannot read {}: {}", path.display(), e),
                    }
                })?;
                parse_catalog(&content)
            }
            CatalogSource::Embedded => seed_catalog(),
        }
    }

    async fn fetch_url(&self, url: &str) -> ServiceResult<Catalog> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ProviderError::Connection {
                url: url.to_string(),
                source: e,
            })?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            return Err(ProviderError::Request { status, message }.into());
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::InvalidResponse {
                provider: "catalog",
                message: e.to_string(),
            })?;

        let catalog = parse_catalog(&body)?;
        info!(url, champions = catalog.champions.len(), items = catalog.items.len(), "Downloaded game catalog");
        Ok(catalog)
    }
}

static STAT_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    [
        ("AD", "attack_damage"),
        ("AP", "ability_power"),
        ("HP", "health"),
        ("Health", "health"),
        ("Mana", "mana"),
        ("Armor", "armor"),
        ("MR", "magic_resist"),
        ("AS", "attack_speed"),
        ("Crit", "crit_chance"),
        ("Haste", "ability_haste"),
        ("MPen", "magic_pen"),
        ("Omnivamp", "omnivamp"),
        ("HSS", "heal_shield_power"),
    ]
    .into_iter()
    .map(|(suffix, field)| {
        let re = Regex::new(&format!(r"(?i)\+(\d+)%?\s*{}\b", suffix)).unwrap();
        (re, field)
    })
    .collect()
});

/// Parse a stat line such as `+55 AD +20 Haste`
pub fn parse_item_stats(text: &str) -> ItemStats {
    let mut stats = ItemStats::default();
    for (re, field) in STAT_PATTERNS.iter() {
        let Some(value) = re
            .captures(text)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<u32>().ok())
        else {
            continue;
        };
        let slot = match *field {
            "attack_damage" => &mut stats.attack_damage,
            "ability_power" => &mut stats.ability_power,
            "health" => &mut stats.health,
            "mana" => &mut stats.mana,
            "armor" => &mut stats.armor,
            "magic_resist" => &mut stats.magic_resist,
            "attack_speed" => &mut stats.attack_speed,
            "crit_chance" => &mut stats.crit_chance,
            "ability_haste" => &mut stats.ability_haste,
            "magic_pen" => &mut stats.magic_pen,
            "omnivamp" => &mut stats.omnivamp,
            _ => &mut stats.heal_shield_power,
        };
        *slot = value;
    }
    stats
}

/// Derive a category and tags from stats and passive text
pub fn categorize_item(stats: &ItemStats, passive: &str) -> (ItemCategory, Vec<ItemTag>) {
    let mut tags = Vec::new();

    let category = if stats.attack_damage > 0 {
        ItemCategory::Physical
    } else if stats.ability_power > 0 {
        ItemCategory::Magic
    } else if stats.armor > 0 || stats.magic_resist > 0 || stats.health > 300 {
        ItemCategory::Defense
    } else {
        ItemCategory::General
    };

    if stats.armor > 0 {
        tags.push(ItemTag::Armor);
    }
    if stats.magic_resist > 0 {
        tags.push(ItemTag::MagicResist);
    }
    if stats.health > 0 {
        tags.push(ItemTag::Health);
    }
    if stats.crit_chance > 0 {
        tags.push(ItemTag::Crit);
    }
    if stats.attack_speed > 0 {
        tags.push(ItemTag::AttackSpeed);
    }
    if stats.ability_haste > 0 {
        tags.push(ItemTag::AbilityHaste);
    }
    if stats.mana > 0 {
        tags.push(ItemTag::Mana);
    }
    if stats.magic_pen > 0 {
        tags.push(ItemTag::MagicPen);
    }

    let passive = passive.to_lowercase();
    if stats.omnivamp > 0 || passive.contains("vamp") || passive.contains("lifesteal") {
        tags.push(ItemTag::Sustain);
    }
    if passive.contains("grievous") || passive.contains("anti-heal") {
        tags.push(ItemTag::AntiHeal);
    }
    if passive.contains("armor pen") || passive.contains("penetration") {
        tags.push(ItemTag::ArmorPen);
    }
    if passive.contains("shield") {
        tags.push(ItemTag::Shield);
    }
    if passive.contains("slow") {
        tags.push(ItemTag::Slow);
    }
    if passive.contains("execute") {
        tags.push(ItemTag::Execute);
    }

    (category, tags)
}

/// Fill in stats and tags an item record left out
pub fn enrich_item(item: &mut Item) {
    if item.stats.is_empty() {
        if let Some(text) = &item.stats_text {
            item.stats = parse_item_stats(text);
        }
    }
    if item.tags.is_empty() {
        let (category, tags) = categorize_item(&item.stats, &item.passive);
        if item.category == ItemCategory::General {
            item.category = category;
        }
        item.tags = tags;
    }
}
